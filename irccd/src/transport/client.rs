//! Accepted transport client (spec §4.4 "Accepted client").
//!
//! Each connection gets its own task: read frames off the wire, hand each
//! one to the command registry via a `DispatchEvent`, write back whatever
//! the dispatcher sends on this client's outbound channel. `died` (EOF, IO
//! error, or frame-parse failure) tears the task down and notifies the
//! dispatcher to drop the client from the registry.

use futures::{SinkExt, StreamExt};
use subtle::ConstantTimeEq;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;
use tracing::debug;

use irccd_protocol::{AuthRequest, AuthResponse, AuthTag, Banner, CommandResponse, EventFrame, FrameCodec};

use super::listener::AnyStream;
use crate::dispatch::DispatchEvent;
use crate::registry::ClientId;

/// Either a plain or TLS-wrapped accepted stream (spec §4.4's "TLS wraps
/// the above" note, applied to the accepted side).
pub enum AcceptedStream {
    Plain(AnyStream),
    Tls(Box<tokio_rustls::server::TlsStream<AnyStream>>),
}

impl AsyncRead for AcceptedStream {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.get_mut() {
            AcceptedStream::Plain(s) => std::pin::Pin::new(s).poll_read(cx, buf),
            AcceptedStream::Tls(s) => std::pin::Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for AcceptedStream {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        match self.get_mut() {
            AcceptedStream::Plain(s) => std::pin::Pin::new(s).poll_write(cx, buf),
            AcceptedStream::Tls(s) => std::pin::Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.get_mut() {
            AcceptedStream::Plain(s) => std::pin::Pin::new(s).poll_flush(cx),
            AcceptedStream::Tls(s) => std::pin::Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.get_mut() {
            AcceptedStream::Plain(s) => std::pin::Pin::new(s).poll_shutdown(cx),
            AcceptedStream::Tls(s) => std::pin::Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Frames the dispatcher pushes back down to a specific transport client:
/// either a broadcast event, or the response to a command that client sent.
pub enum OutboundFrame {
    Event(EventFrame),
    Response(CommandResponse),
}

pub async fn run_client_task(
    stream: AcceptedStream,
    events: mpsc::UnboundedSender<DispatchEvent>,
    password: Option<String>,
) {
    let mut framed = Framed::new(stream, FrameCodec::new());

    if framed.send(serde_json::to_value(&Banner::current()).unwrap_or_default()).await.is_err() {
        return;
    }

    if let Some(expected) = password {
        let Some(Ok(frame)) = framed.next().await else {
            debug!("transport client closed before authenticating");
            return;
        };
        let authenticated = serde_json::from_value::<AuthRequest>(frame)
            .map(|req| passwords_match(&req.password, &expected))
            .unwrap_or(false);

        let response = AuthResponse { response: AuthTag::Auth, result: authenticated };
        if framed.send(serde_json::to_value(&response).unwrap_or_default()).await.is_err() {
            return;
        }
        if !authenticated {
            debug!("transport client rejected: bad auth password");
            return;
        }
    }

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutboundFrame>();

    let (id_tx, id_rx) = oneshot::channel();
    if events
        .send(DispatchEvent::ClientConnected { sender: out_tx, reply: id_tx })
        .is_err()
    {
        return;
    }
    let Ok(client_id) = id_rx.await else { return };

    loop {
        tokio::select! {
            frame = framed.next() => {
                match frame {
                    Some(Ok(value)) => {
                        let (reply_tx, reply_rx) = oneshot::channel();
                        if events
                            .send(DispatchEvent::ClientFrame { client: client_id, frame: value, reply: reply_tx })
                            .is_err()
                        {
                            break;
                        }
                        if let Ok(response) = reply_rx.await {
                            if framed.send(serde_json::to_value(&response).unwrap_or_default()).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        debug!(client = %client_id, error = %e, "transport client died");
                        break;
                    }
                    None => {
                        debug!(client = %client_id, "transport client closed connection");
                        break;
                    }
                }
            }
            outbound = out_rx.recv() => {
                match outbound {
                    Some(OutboundFrame::Event(ev)) => {
                        if framed.send(serde_json::to_value(&ev).unwrap_or_default()).await.is_err() {
                            break;
                        }
                    }
                    Some(OutboundFrame::Response(resp)) => {
                        if framed.send(serde_json::to_value(&resp).unwrap_or_default()).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    let _ = events.send(DispatchEvent::ClientDisconnected { client: client_id });
}

/// Constant-time password comparison (spec §6.1 "auth frame"). Lengths
/// are compared first since `ct_eq` requires equal-length slices; the
/// transport password is never secret-dependent on its own length in a
/// way this leaks anything `ct_eq` itself wouldn't already reveal.
fn passwords_match(provided: &str, expected: &str) -> bool {
    provided.len() == expected.len() && provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

pub type Id = ClientId;

#[cfg(test)]
mod auth_tests {
    use super::passwords_match;

    #[test]
    fn matching_passwords_compare_equal() {
        assert!(passwords_match("hunter2", "hunter2"));
    }

    #[test]
    fn mismatched_passwords_compare_unequal() {
        assert!(!passwords_match("hunter2", "hunter3"));
        assert!(!passwords_match("short", "muchlonger"));
    }
}
