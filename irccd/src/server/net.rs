//! Server network connection (spec §4.1 adapter + §4.2 "Connecting").
//!
//! Owns the actual socket and feeds complete raw IRC lines to
//! [`crate::irc::parse_line`], posting the resulting events back to the
//! dispatch task. This is the concrete, always-connected half of what
//! spec §4.1 calls the IRC codec adapter; `server::state` is the
//! connection-lifecycle half.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::client::TlsStream;
use tracing::{debug, warn};

use irccd_util::{IrccdError, Result};

use crate::irc;

/// Either a plain or TLS-wrapped outbound IRC connection.
pub enum IrcStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl IrcStream {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await.map_err(IrccdError::Io)?;
        Ok(Self::Plain(stream))
    }

    pub async fn connect_tls(host: &str, port: u16, verify: bool) -> Result<Self> {
        use tokio_rustls::rustls::pki_types::ServerName;

        let tcp = TcpStream::connect((host, port)).await.map_err(IrccdError::Io)?;
        let connector = super::super::transport::tls::client_connector(verify);
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| IrccdError::Tls(format!("invalid server name '{host}'")))?;
        let tls = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| IrccdError::Tls(e.to_string()))?;
        Ok(Self::Tls(Box::new(tls)))
    }

    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            IrcStream::Plain(s) => s.read(buf).await,
            IrcStream::Tls(s) => s.read(buf).await,
        }
    }

    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            IrcStream::Plain(s) => s.write_all(buf).await,
            IrcStream::Tls(s) => s.write_all(buf).await,
        }
    }
}

/// Spawned once a server reaches `Connecting`; reads lines and posts
/// parsed events on `sink`, writes lines received on `outbox`. Exits (and
/// drops `sink`, signalling disconnection) on any IO error or EOF.
pub async fn run_connection(
    mut stream: IrcStream,
    sink: mpsc::UnboundedSender<irc::Event>,
    mut outbox: mpsc::UnboundedReceiver<String>,
) {
    let mut buf = Vec::new();
    let mut read_buf = [0u8; 4096];

    loop {
        tokio::select! {
            line = next_line(&mut stream, &mut buf, &mut read_buf) => {
                match line {
                    Ok(Some(line)) => {
                        match irc::parse_line(&line) {
                            Ok(Some(event)) => {
                                if sink.send(event).is_err() {
                                    return;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => debug!(error = %e, line, "unparsable IRC line, ignored"),
                        }
                    }
                    Ok(None) => {
                        debug!("server connection closed");
                        return;
                    }
                    Err(e) => {
                        warn!(error = %e, "server connection read error");
                        return;
                    }
                }
            }
            outgoing = outbox.recv() => {
                match outgoing {
                    Some(line) => {
                        let mut data = line.into_bytes();
                        data.extend_from_slice(b"\r\n");
                        if stream.write_all(&data).await.is_err() {
                            return;
                        }
                    }
                    None => return,
                }
            }
        }
    }
}

async fn next_line(
    stream: &mut IrcStream,
    buf: &mut Vec<u8>,
    read_buf: &mut [u8],
) -> std::io::Result<Option<String>> {
    loop {
        if let Some(pos) = find_crlf(buf) {
            let line_bytes: Vec<u8> = buf.drain(..pos).collect();
            buf.drain(..2.min(buf.len())); // consume the \r\n itself
            let line = String::from_utf8_lossy(&line_bytes).into_owned();
            return Ok(Some(line));
        }
        let n = stream.read(read_buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&read_buf[..n]);
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_crlf_locates_terminator() {
        assert_eq!(find_crlf(b"PING :x\r\nJOIN"), Some(7));
        assert_eq!(find_crlf(b"no terminator here"), None);
    }
}
