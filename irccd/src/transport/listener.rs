//! Listening endpoints (spec §4.4 "Listening endpoint", §6.2).
//!
//! Grounded directly on the daemon template's TCP accept loop
//! (`tokio::select!` between `listener.accept()` and a shutdown broadcast,
//! one spawned task per accepted connection) and generalized to the four
//! concrete variants spec §6.2 names.

use std::net::SocketAddr;
use std::path::PathBuf;

use socket2::{Domain, Socket, Type};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

use irccd_util::{IrccdError, Result};

use super::client::{run_client_task, AcceptedStream};
use super::tls::server_acceptor;
use crate::dispatch::DispatchEvent;

/// The four endpoint kinds of spec §6.2, plus TLS wrapping any of them.
pub enum ListenerKind {
    Tcp(TcpListener),
    Tcp6(TcpListener),
    Unix { listener: UnixListener, path: PathBuf },
}

/// A bound listening endpoint, optionally TLS-wrapped.
pub struct Listener {
    kind: ListenerKind,
    tls: Option<tokio_rustls::TlsAcceptor>,
    password: Option<String>,
}

impl Listener {
    /// Binds a TCP listener at `addr`. For IPv6 addresses, `dual_stack`
    /// controls `IPV6_V6ONLY` at the socket level (spec §6.2: "IPv6
    /// defaults to v6-only; dual-stack requires an explicit flag") rather
    /// than only tagging the resulting [`ListenerKind`] variant.
    pub async fn bind_tcp(addr: &str, dual_stack: bool) -> Result<Self> {
        let socket_addr: SocketAddr = addr.parse().map_err(|_| {
            IrccdError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("invalid address: {addr}")))
        })?;
        let is_v6 = socket_addr.is_ipv6();
        let domain = if is_v6 { Domain::IPV6 } else { Domain::IPV4 };

        let socket = Socket::new(domain, Type::STREAM, None).map_err(IrccdError::Io)?;
        if is_v6 {
            socket.set_only_v6(!dual_stack).map_err(IrccdError::Io)?;
        }
        socket.set_reuse_address(true).map_err(IrccdError::Io)?;
        socket.set_nonblocking(true).map_err(IrccdError::Io)?;
        socket.bind(&socket_addr.into()).map_err(IrccdError::Io)?;
        socket.listen(1024).map_err(IrccdError::Io)?;

        let listener = TcpListener::from_std(socket.into()).map_err(IrccdError::Io)?;
        let kind = if is_v6 { ListenerKind::Tcp6(listener) } else { ListenerKind::Tcp(listener) };
        Ok(Self { kind, tls: None, password: None })
    }

    pub async fn bind_unix(path: PathBuf) -> Result<Self> {
        // spec §4.4: "the Unix-domain variant removes the socket file on
        // destruction" — also remove any stale file left by a prior run.
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).map_err(IrccdError::Io)?;
        Ok(Self {
            kind: ListenerKind::Unix { listener, path },
            tls: None,
            password: None,
        })
    }

    pub fn with_tls(mut self, cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        let acceptor = server_acceptor(cert_pem, key_pem).map_err(IrccdError::Io)?;
        self.tls = Some(acceptor);
        Ok(self)
    }

    /// Sets the password every client of this endpoint must present in an
    /// `auth` frame before it is registered with the dispatcher (spec §3
    /// "Transport settings", §6.1).
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    /// Accept loop: spawns one task per connection, exits on the shutdown
    /// signal (spec §4.6 "Stop" applied to each selectable independently).
    pub async fn run(
        self,
        events: mpsc::UnboundedSender<DispatchEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                accepted = self.accept_one() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "transport client accepted");
                            let tls = self.tls.clone();
                            let events = events.clone();
                            let password = self.password.clone();
                            tokio::spawn(async move {
                                let stream: AcceptedStream = match tls {
                                    Some(acceptor) => match acceptor.accept(stream).await {
                                        Ok(tls_stream) => AcceptedStream::Tls(Box::new(tls_stream)),
                                        Err(e) => {
                                            error!(%peer, error = %e, "TLS handshake failed");
                                            return;
                                        }
                                    },
                                    None => AcceptedStream::Plain(stream),
                                };
                                run_client_task(stream, events, password).await;
                            });
                        }
                        Err(e) => error!(error = %e, "accept error"),
                    }
                }
                _ = shutdown.recv() => {
                    info!("transport listener shutting down");
                    break;
                }
            }
        }
    }

    async fn accept_one(&self) -> std::io::Result<(AnyStream, String)> {
        match &self.kind {
            ListenerKind::Tcp(l) | ListenerKind::Tcp6(l) => {
                let (stream, addr) = l.accept().await?;
                Ok((AnyStream::Tcp(stream), addr.to_string()))
            }
            ListenerKind::Unix { listener, .. } => {
                let (stream, _addr) = listener.accept().await?;
                Ok((AnyStream::Unix(stream), "unix-peer".to_string()))
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let ListenerKind::Unix { path, .. } = &self.kind {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Either concrete stream type an accept call can produce, unified so
/// [`Listener::run`] can spawn a single generic client task.
pub enum AnyStream {
    Tcp(tokio::net::TcpStream),
    Unix(tokio::net::UnixStream),
}

impl tokio::io::AsyncRead for AnyStream {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.get_mut() {
            AnyStream::Tcp(s) => std::pin::Pin::new(s).poll_read(cx, buf),
            AnyStream::Unix(s) => std::pin::Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl tokio::io::AsyncWrite for AnyStream {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        match self.get_mut() {
            AnyStream::Tcp(s) => std::pin::Pin::new(s).poll_write(cx, buf),
            AnyStream::Unix(s) => std::pin::Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.get_mut() {
            AnyStream::Tcp(s) => std::pin::Pin::new(s).poll_flush(cx),
            AnyStream::Unix(s) => std::pin::Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.get_mut() {
            AnyStream::Tcp(s) => std::pin::Pin::new(s).poll_shutdown(cx),
            AnyStream::Unix(s) => std::pin::Pin::new(s).poll_shutdown(cx),
        }
    }
}
