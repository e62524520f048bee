//! irccd: the daemon binary. Loads config, spawns the dispatch task (spec
//! §4.6), binds the configured transports (spec §6.2), and runs until
//! interrupted.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};

use irccd::config::{Config, TransportConfig, TransportKind};
use irccd::transport::listener::Listener;
use irccd::Daemon;
use irccd_util::{init_logging, IrccdError, LogConfig, Result};

#[derive(Parser, Debug)]
#[command(name = "irccd", about = "IRC bot daemon", version)]
struct Args {
    /// Path to the configuration file (spec §6.5), default is the XDG path.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(LogConfig::daemon(args.verbose))?;

    let config = match &args.config {
        Some(path) => irccd::config::ConfigLoader::load_from_path(path)?,
        None => irccd::config::ConfigLoader::load()?,
    };

    info!(
        servers = config.servers.len(),
        transports = config.transports.len(),
        "starting irccd"
    );

    let (daemon, dispatch_handle) = Daemon::spawn(config.clone());
    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);

    let listener_handles = bind_transports(&config, daemon.events(), &shutdown_tx).await;

    tokio::signal::ctrl_c().await.map_err(IrccdError::Io)?;
    info!("shutdown requested");
    let _ = shutdown_tx.send(());
    daemon.stop().await;

    for handle in listener_handles {
        let _ = handle.await;
    }
    let _ = dispatch_handle.await;

    Ok(())
}

async fn bind_transports(
    config: &Config,
    events: tokio::sync::mpsc::UnboundedSender<irccd::dispatch::DispatchEvent>,
    shutdown_tx: &tokio::sync::broadcast::Sender<()>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();
    for transport in &config.transports {
        match bind_one(transport).await {
            Ok(listener) => {
                let events = events.clone();
                let shutdown_rx = shutdown_tx.subscribe();
                handles.push(tokio::spawn(listener.run(events, shutdown_rx)));
            }
            Err(e) => {
                error!(error = %e, "failed to bind transport, skipping");
            }
        }
    }
    if handles.is_empty() {
        warn!("no transports bound; irccdctl will not be able to connect");
    }
    handles
}

async fn bind_one(transport: &TransportConfig) -> Result<Listener> {
    let listener = match transport.kind {
        TransportKind::Unix => {
            let path = transport
                .path
                .clone()
                .map(PathBuf::from)
                .unwrap_or_else(irccd_util::paths::default_unix_socket_path);
            Listener::bind_unix(path).await?
        }
        TransportKind::Ip => {
            let addr = transport.address.clone().unwrap_or_else(|| "0.0.0.0".to_string());
            let port = transport.port.unwrap_or(9999);
            Listener::bind_tcp(&format!("{addr}:{port}"), true).await?
        }
        TransportKind::Ip6 => {
            let addr = transport.address.clone().unwrap_or_else(|| "::".to_string());
            let port = transport.port.unwrap_or(9999);
            Listener::bind_tcp(&format!("[{addr}]:{port}"), false).await?
        }
    };
    let listener = listener.with_password(transport.password.clone());

    match &transport.tls {
        Some(tls) => {
            let cert = std::fs::read(&tls.cert).map_err(IrccdError::Io)?;
            let key = std::fs::read(&tls.key).map_err(IrccdError::Io)?;
            listener.with_tls(&cert, &key)
        }
        None => Ok(listener),
    }
}
