//! Daemon façade (spec §3 "Daemon façade", component H).
//!
//! Owns the `mpsc::Sender<DispatchEvent>` that is spec's `post()`
//! operation, plus the shutdown signal that is spec's `stop()`. Mirrors
//! the daemon template's top-level `Server` facade shape; persistence,
//! checkpointing and crash recovery are dropped (spec §1 Non-goals: no
//! built-in persistence beyond the seed config file).

use tokio::sync::mpsc;
use tracing::info;

use irccd_protocol::{Rule, ServerIdentity, ServerSettings};

use crate::command::server::is_valid_identifier;
use crate::config::Config;
use crate::dispatch::{self, DispatchEvent, DispatchState};

pub struct Daemon {
    events_tx: mpsc::UnboundedSender<DispatchEvent>,
    shutdown_tx: mpsc::Sender<()>,
}

impl Daemon {
    /// Build the dispatch state from a loaded config and spawn the
    /// dispatch task (spec §4.6 "the loop").
    pub fn spawn(config: Config) -> (Self, tokio::task::JoinHandle<()>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let mut state = DispatchState::new(events_tx.clone());
        for server in &config.servers {
            if !is_valid_identifier(&server.name) {
                tracing::warn!(server = %server.name, "skipping config server with invalid identifier");
                continue;
            }
            let identity = ServerIdentity {
                name: server.name.clone(),
                host: server.host.clone(),
                port: server.port,
                password: server.password.clone(),
                flags: server_flags(server),
                nickname: server.nickname.clone(),
                username: server.username.clone(),
                realname: server.realname.clone(),
                ctcp_version: "irccd".to_string(),
                channels: server.channels.iter().cloned().map(Into::into).collect(),
            };
            let settings = ServerSettings {
                reconnect_tries: server.reconnect_tries,
                reconnect_delay_sec: server.reconnect_delay,
                ping_timeout_sec: server.ping_timeout,
                command_char: server.command_char,
            };
            state.add_server(identity, settings);
        }
        for rule in config.rules.clone() {
            let rule: Rule = rule.into();
            state.rules.add(rule);
        }

        let handle = tokio::spawn(dispatch::run(state, events_rx, shutdown_rx));
        (Self { events_tx, shutdown_tx }, handle)
    }

    pub fn events(&self) -> mpsc::UnboundedSender<DispatchEvent> {
        self.events_tx.clone()
    }

    /// spec §4.6 "Stop": sets a running flag and interrupts; the loop
    /// exits at the next iteration boundary.
    pub async fn stop(&self) {
        info!("stopping daemon");
        let _ = self.shutdown_tx.send(()).await;
    }
}

fn server_flags(server: &crate::config::ServerConfig) -> irccd_protocol::ServerFlags {
    let mut flags = irccd_protocol::ServerFlags::empty();
    if server.ssl {
        flags |= irccd_protocol::ServerFlags::TLS;
    }
    if server.ssl_verify {
        flags |= irccd_protocol::ServerFlags::TLS_VERIFY;
    }
    if server.auto_rejoin_on_kick {
        flags |= irccd_protocol::ServerFlags::AUTO_REJOIN_ON_KICK;
    }
    if server.join_on_invite {
        flags |= irccd_protocol::ServerFlags::JOIN_ON_INVITE;
    }
    flags
}
