//! Transport layer (spec §4.4): listening endpoints and the two client
//! state machines that speak the `\r\n\r\n`-terminated JSON protocol over
//! them — the accepted side (daemon) and the outbound side (`irccdctl`).

pub mod client;
pub mod listener;
pub mod outbound;
pub mod tls;

pub use listener::{Listener, ListenerKind};
