//! Frame codec: one JSON object followed by the literal terminator
//! `\r\n\r\n` (spec §3 "Transport framing"). This is an explicit departure
//! from the length-prefixed `bincode` framing of this crate's architectural
//! ancestor — the wire format here is dictated by spec.md, not inherited.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// 4-byte literal terminator that closes every frame.
pub const TERMINATOR: &[u8] = b"\r\n\r\n";

/// Maximum accepted frame size, guarding against a peer that never sends
/// the terminator.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Codec error.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

/// Decodes `\r\n\r\n`-terminated JSON objects, encodes any `Serialize`
/// value the same way. Used symmetrically by the daemon's transport-client
/// handler and by `irccdctl`'s outbound client.
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Bytes already confirmed not to contain the terminator, so repeated
    /// `decode` calls on a growing buffer don't rescan from the start.
    scanned: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self { scanned: 0 }
    }
}

impl Decoder for FrameCodec {
    type Item = serde_json::Value;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() > MAX_FRAME_SIZE {
            return Err(CodecError::FrameTooLarge {
                size: src.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        let scan_from = self.scanned.min(src.len());
        let pos = find_terminator(&src[scan_from..]);

        let Some(rel_pos) = pos else {
            // Remember we've already scanned this many bytes for next time,
            // but stay 3 bytes back in case the terminator is split across
            // two `read()` calls.
            self.scanned = src.len().saturating_sub(TERMINATOR.len() - 1);
            return Ok(None);
        };

        let end = scan_from + rel_pos;
        let frame = src.split_to(end);
        src.advance(TERMINATOR.len());
        self.scanned = 0;

        let value: serde_json::Value = serde_json::from_slice(&frame)?;
        Ok(Some(value))
    }
}

impl<T: serde::Serialize> Encoder<T> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let data = serde_json::to_vec(&item)?;
        if data.len() > MAX_FRAME_SIZE {
            return Err(CodecError::FrameTooLarge {
                size: data.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        dst.reserve(data.len() + TERMINATOR.len());
        dst.extend_from_slice(&data);
        dst.extend_from_slice(TERMINATOR);
        Ok(())
    }
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(TERMINATOR.len())
        .position(|window| window == TERMINATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_single_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(json!({"command": "ping"}), &mut buf).unwrap();
        assert!(buf.ends_with(TERMINATOR));

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, json!({"command": "ping"}));
        assert!(buf.is_empty());
    }

    #[test]
    fn returns_none_on_partial_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(br#"{"command":"ping"}"#);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(TERMINATOR);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, json!({"command": "ping"}));
    }

    #[test]
    fn decodes_multiple_messages_in_one_buffer_in_order() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(json!({"n": 1}), &mut buf).unwrap();
        codec.encode(json!({"n": 2}), &mut buf).unwrap();
        codec.encode(json!({"n": 3}), &mut buf).unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        let third = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first, json!({"n": 1}));
        assert_eq!(second, json!({"n": 2}));
        assert_eq!(third, json!({"n": 3}));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn terminator_split_across_reads_is_handled() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(br#"{"a":1}"#);
        buf.extend_from_slice(b"\r\n");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"\r\n");
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, json!({"a": 1}));
    }

    #[test]
    fn oversized_buffer_without_terminator_errors() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&vec![b'a'; MAX_FRAME_SIZE + 1]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::FrameTooLarge { .. })
        ));
    }
}
