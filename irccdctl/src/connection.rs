//! Resolves CLI flags into a connected transport stream (spec §6.4).
//!
//! Reuses the daemon's [`AnyStream`] so the one-shot client and the
//! accept loop share exactly one TCP/Unix union type.

use std::path::PathBuf;

use irccd::transport::listener::AnyStream;
use irccd_util::{IrccdError, Result};
use tokio::net::{TcpStream, UnixStream};

use crate::cli::{Args, TransportType};

/// Pick a transport from explicit flags first, falling back to the
/// config file's first configured transport, then the XDG default Unix
/// socket (spec §6.4: "--host/--path override the configured transport").
/// Returns the stream plus the transport's configured password, if any
/// (spec §3 "Auth frame" — only a config-sourced transport can carry one,
/// since `--host`/`--path` name no password flag per spec §6.4).
pub async fn connect(args: &Args) -> Result<(AnyStream, Option<String>)> {
    if let Some(path) = &args.path {
        return Ok((connect_unix(path.clone()).await?, None));
    }
    if let Some(host) = &args.host {
        let port = args.port.unwrap_or(9999);
        return Ok((connect_tcp(host, port).await?, None));
    }

    let config = args
        .config
        .as_deref()
        .map(irccd::config::ConfigLoader::load_from_path)
        .unwrap_or_else(irccd::config::ConfigLoader::load);

    if let Ok(config) = config {
        if let Some(transport) = pick_configured_transport(&config, args.transport_type) {
            let stream = connect_configured(transport).await?;
            return Ok((stream, transport.password.clone()));
        }
    }

    Ok((connect_unix(irccd_util::paths::default_unix_socket_path()).await?, None))
}

fn pick_configured_transport(
    config: &irccd::config::Config,
    preferred: Option<TransportType>,
) -> Option<&irccd::config::TransportConfig> {
    use irccd::config::TransportKind;
    if let Some(preferred) = preferred {
        let want = match preferred {
            TransportType::Unix => TransportKind::Unix,
            TransportType::Ip => TransportKind::Ip,
            TransportType::Ipv6 => TransportKind::Ip6,
        };
        return config.transports.iter().find(|t| t.kind == want);
    }
    config.transports.first()
}

async fn connect_configured(transport: &irccd::config::TransportConfig) -> Result<AnyStream> {
    use irccd::config::TransportKind;
    match transport.kind {
        TransportKind::Unix => {
            let path = transport
                .path
                .clone()
                .map(PathBuf::from)
                .unwrap_or_else(irccd_util::paths::default_unix_socket_path);
            connect_unix(path).await
        }
        TransportKind::Ip | TransportKind::Ip6 => {
            let host = transport.address.clone().unwrap_or_else(|| "127.0.0.1".to_string());
            let port = transport.port.unwrap_or(9999);
            connect_tcp(&host, port).await
        }
    }
}

async fn connect_unix(path: PathBuf) -> Result<AnyStream> {
    if !path.exists() {
        return Err(IrccdError::NotRunning { path });
    }
    let stream = UnixStream::connect(&path).await.map_err(IrccdError::Io)?;
    Ok(AnyStream::Unix(stream))
}

async fn connect_tcp(host: &str, port: u16) -> Result<AnyStream> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| IrccdError::Connection(format!("{host}:{port}: {e}")))?;
    Ok(AnyStream::Tcp(stream))
}
