//! irccd-protocol: wire types and framing shared between the `irccd`
//! daemon and the `irccdctl` control client.

pub mod codec;
pub mod messages;
pub mod types;

pub use codec::{CodecError, FrameCodec, MAX_FRAME_SIZE, TERMINATOR};
pub use messages::{
    AuthRequest, AuthResponse, AuthTag, Banner, CommandRequest, CommandResponse, EventFrame,
    PROGRAM_NAME, PROTOCOL_MAJOR, PROTOCOL_MINOR, PROTOCOL_PATCH,
};
pub use types::{
    Channel, Names, Rule, RuleAction, RuleMatch, ServerFlags, ServerIdentity, ServerSettings,
    Whois,
};
