//! Outbound client state machine (spec §4.4 "Outbound client state
//! machine"), used by `irccdctl` to talk to the daemon. Re-grounded on the
//! JSON+`\r\n\r\n` codec instead of the daemon template's length-prefixed
//! bincode framing used by its one-shot CLI client.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use irccd_protocol::{
    AuthRequest, AuthResponse, Banner, CommandRequest, CommandResponse, FrameCodec,
};
use irccd_util::{IrccdError, Result};

/// Connects to the daemon, verifies the banner, authenticates if a
/// password is configured, and sends exactly one command (spec §6.4
/// "one-shot" CLI usage — `irccdctl` does not stay resident).
pub async fn send_one_shot<S>(
    stream: S,
    password: Option<&str>,
    command: CommandRequest,
) -> Result<CommandResponse>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, FrameCodec::new());

    let banner_value = framed
        .next()
        .await
        .ok_or(IrccdError::ConnectionClosed)?
        .map_err(|e| IrccdError::Protocol(e.to_string()))?;
    let banner: Banner =
        serde_json::from_value(banner_value).map_err(|e| IrccdError::Protocol(e.to_string()))?;
    banner
        .compatible_with(Banner::current().major, Banner::current().minor)
        .map_err(IrccdError::Protocol)?;

    if let Some(password) = password {
        let auth = AuthRequest::new(password);
        framed
            .send(serde_json::to_value(&auth).unwrap())
            .await
            .map_err(|e| IrccdError::Protocol(e.to_string()))?;
        let response_value = framed
            .next()
            .await
            .ok_or(IrccdError::ConnectionClosed)?
            .map_err(|e| IrccdError::Protocol(e.to_string()))?;
        let response: AuthResponse = serde_json::from_value(response_value)
            .map_err(|e| IrccdError::Protocol(e.to_string()))?;
        if !response.result {
            return Err(IrccdError::Connection("authentication rejected".into()));
        }
    }

    framed
        .send(serde_json::to_value(&command).unwrap())
        .await
        .map_err(|e| IrccdError::Protocol(e.to_string()))?;

    let response_value = framed
        .next()
        .await
        .ok_or(IrccdError::ConnectionClosed)?
        .map_err(|e| IrccdError::Protocol(e.to_string()))?;
    serde_json::from_value(response_value).map_err(|e| IrccdError::Protocol(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Buf, BytesMut};
    use irccd_protocol::TERMINATOR;
    use tokio::io::DuplexStream;

    fn push_frame(buf: &mut BytesMut, value: &serde_json::Value) {
        buf.extend_from_slice(&serde_json::to_vec(value).unwrap());
        buf.extend_from_slice(TERMINATOR);
    }

    #[tokio::test]
    async fn rejects_incompatible_banner_major_version() {
        let (client, mut server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            let mut buf = BytesMut::new();
            push_frame(
                &mut buf,
                &serde_json::json!({
                    "program": "irccd", "major": 99, "minor": 0, "patch": 0,
                    "ssl": false, "javascript": false,
                }),
            );
            let _ = server.write_all(&buf).await;
            let mut rest = Vec::new();
            let _ = tokio::io::AsyncReadExt::read_to_end(&mut server, &mut rest).await;
        });

        let command = CommandRequest {
            command: "server-list".to_string(),
            args: serde_json::json!({}),
        };
        let result = send_one_shot(client, None, command).await;
        assert!(result.is_err());
    }

    #[allow(unused)]
    fn _type_check(_: DuplexStream) {}
}
