//! The event dispatcher (spec §4.6, component G): the actor that owns all
//! mutable daemon state.
//!
//! Spec.md's original is a single-threaded `select()` loop with a posted-
//! work queue feeding a dispatcher that serializes every state mutation.
//! The idiomatic Tokio translation keeps that exact guarantee — "only one
//! task ever touches the servers/rules/clients tables" — by making this
//! loop the sole owner of [`DispatchState`] and having every other task
//! (server connections, transport clients, timers) communicate with it
//! exclusively through [`DispatchEvent`]s on an `mpsc` channel. That
//! channel *is* spec's interrupt-channel-plus-posted-closure mechanism;
//! no locks are needed around any daemon table because nothing outside
//! this task ever reaches them.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use irccd_protocol::{CommandResponse, EventFrame, Rule, RuleAction, RuleMatch, ServerIdentity, ServerSettings};
use irccd_util::IrccdError;

use crate::command::Registry;
use crate::irc;
use crate::registry::{ClientId, ClientRegistry};
use crate::rule::RuleSet;
use crate::server::{net, state::Effect, Server};
use crate::transport::client::OutboundFrame;

/// Everything a loaded plugin needs recorded, since the scripting host
/// itself is out of scope (spec §1) — just enough bookkeeping for the
/// `plugin-*` commands to behave observably (SPEC_FULL "command/" note).
#[derive(Debug, Clone, Default)]
pub struct PluginEntry {
    pub loaded: bool,
    pub config: HashMap<String, String>,
}

/// All daemon state, owned exclusively by the dispatch task.
pub struct DispatchState {
    pub servers: HashMap<String, Server>,
    pub rules: RuleSet,
    pub clients: ClientRegistry,
    pub plugins: HashMap<String, PluginEntry>,
    pub events_tx: mpsc::UnboundedSender<DispatchEvent>,
}

impl DispatchState {
    pub fn new(events_tx: mpsc::UnboundedSender<DispatchEvent>) -> Self {
        Self {
            servers: HashMap::new(),
            rules: RuleSet::new(),
            clients: ClientRegistry::new(),
            plugins: HashMap::new(),
            events_tx,
        }
    }

    /// Add a server and kick off its connection attempt (spec §4.2
    /// Disconnected -> Connecting path, entered immediately rather than
    /// waiting out `reconnect_delay_sec` the first time).
    pub fn add_server(&mut self, identity: ServerIdentity, settings: ServerSettings) {
        let name = identity.name.clone();
        let mut server = Server::new(identity, settings);
        server.reconnect();
        self.servers.insert(name.clone(), server);
        self.spawn_connection_attempt(name);
    }

    pub(crate) fn spawn_connection_attempt(&mut self, name: String) {
        let Some(server) = self.servers.get(&name) else { return };
        let host = server.identity.host.clone();
        let port = server.identity.port;
        let use_tls = server.identity.flags.contains(irccd_protocol::ServerFlags::TLS);
        let verify = server.identity.flags.contains(irccd_protocol::ServerFlags::TLS_VERIFY);
        let events_tx = self.events_tx.clone();

        tokio::spawn(async move {
            let stream = if use_tls {
                net::IrcStream::connect_tls(&host, port, verify).await
            } else {
                net::IrcStream::connect(&host, port).await
            };
            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    warn!(server = %name, error = %e, "connect attempt failed");
                    let _ = events_tx.send(DispatchEvent::ServerConnectFailed { name });
                    return;
                }
            };

            let (event_tx, mut event_rx) = mpsc::unbounded_channel::<irc::Event>();
            let (line_tx, line_rx) = mpsc::unbounded_channel::<String>();
            let _ = events_tx.send(DispatchEvent::ServerOutboxReady {
                name: name.clone(),
                outbox: line_tx,
            });

            let forward_name = name.clone();
            let forward_tx = events_tx.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(event) = event_rx.recv().await {
                    if forward_tx
                        .send(DispatchEvent::ServerIrcEvent { name: forward_name.clone(), event })
                        .is_err()
                    {
                        break;
                    }
                }
            });

            net::run_connection(stream, event_tx, line_rx).await;
            forwarder.abort();
            let _ = events_tx.send(DispatchEvent::ServerConnectionDied { name });
        });
    }

    /// Broadcast `event` to transport clients, then route it through the
    /// rule engine for each loaded plugin (spec §4.6 "Event routing").
    ///
    /// `message`/`query` events carrying a body prefixed with the
    /// originating server's `command_char` are reclassified (spec §4.6
    /// "`command_char || plugin_name` prefix"): `!ask weather?` is routed
    /// exclusively to the `ask` plugin as a command with argument text
    /// `weather?`, bypassing the normal per-plugin event loop below.
    fn route_server_event(&mut self, server_name: &str, event: crate::server::ServerEvent) {
        let frame = EventFrame::new(event.name, server_name, event.fields.clone());
        self.clients.broadcast(&frame);

        let origin = event
            .fields
            .get("origin")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let channel = event
            .fields
            .get("channel")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        if matches!(event.name, "message" | "query") {
            let command_char = self.servers.get(server_name).map(|s| s.settings.command_char).unwrap_or('!');
            let text = event.fields.get("message").and_then(|v| v.as_str()).unwrap_or("");
            if let Some((plugin_name, command_text)) = split_command(text, command_char) {
                if self.plugins.get(plugin_name).is_some_and(|p| p.loaded) {
                    let tuple = RuleMatch {
                        server: server_name,
                        channel: &channel,
                        origin: &origin,
                        plugin: plugin_name,
                        event: "command",
                    };
                    if self.rules.resolve(&tuple) == RuleAction::Accept {
                        debug!(plugin = %plugin_name, command = %command_text, "command routed to plugin");
                    }
                    return;
                }
            }
        }

        for (plugin_name, entry) in &self.plugins {
            if !entry.loaded {
                continue;
            }
            let tuple = RuleMatch {
                server: server_name,
                channel: &channel,
                origin: &origin,
                plugin: plugin_name,
                event: event.name,
            };
            if self.rules.resolve(&tuple) == RuleAction::Accept {
                debug!(plugin = %plugin_name, event = event.name, "event accepted by rule engine");
                // Plugin callback dispatch is the scripting host's job
                // (out of scope, spec §1); rule-engine acceptance is the
                // observable boundary this daemon owns and tests.
            }
        }
    }
}

/// Work items posted to the dispatch task — this *is* spec's
/// `post(closure)` mechanism, typed instead of boxed-closure based.
pub enum DispatchEvent {
    ClientConnected {
        sender: mpsc::UnboundedSender<OutboundFrame>,
        reply: oneshot::Sender<ClientId>,
    },
    ClientDisconnected {
        client: ClientId,
    },
    ClientFrame {
        client: ClientId,
        frame: serde_json::Value,
        reply: oneshot::Sender<CommandResponse>,
    },
    ServerOutboxReady {
        name: String,
        outbox: mpsc::UnboundedSender<String>,
    },
    ServerIrcEvent {
        name: String,
        event: irc::Event,
    },
    ServerConnectFailed {
        name: String,
    },
    ServerConnectionDied {
        name: String,
    },
}

/// Runs forever until `events` closes (all senders dropped) or `shutdown`
/// fires. This is spec §4.6's loop, minus the explicit readiness poll —
/// each background task already only wakes this one up when it has
/// something to say.
pub async fn run(mut state: DispatchState, mut events: mpsc::UnboundedReceiver<DispatchEvent>, mut shutdown: mpsc::Receiver<()>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(event) => handle_event(&mut state, event).await,
                    None => break,
                }
            }
            _ = ticker.tick() => {
                tick_servers(&mut state);
            }
            _ = shutdown.recv() => {
                info!("dispatcher stopping");
                break;
            }
        }
    }
}

async fn handle_event(state: &mut DispatchState, event: DispatchEvent) {
    match event {
        DispatchEvent::ClientConnected { sender, reply } => {
            let id = state.clients.register(sender);
            state.clients.mark_ready(id);
            let _ = reply.send(id);
        }
        DispatchEvent::ClientDisconnected { client } => {
            state.clients.unregister(client);
        }
        DispatchEvent::ClientFrame { client: _, frame, reply } => {
            let response = Registry::dispatch(state, frame);
            let _ = reply.send(response);
        }
        DispatchEvent::ServerOutboxReady { name, outbox } => {
            if let Some(server) = state.servers.get_mut(&name) {
                server.attach_outbox(outbox);
            }
        }
        DispatchEvent::ServerIrcEvent { name, event } => {
            let Some(server) = state.servers.get_mut(&name) else { return };
            let server_events = server.handle_event(event);
            for ev in server_events {
                state.route_server_event(&name, ev);
            }
        }
        DispatchEvent::ServerConnectFailed { name } => {
            if let Some(server) = state.servers.get_mut(&name) {
                server.disconnect();
            }
        }
        DispatchEvent::ServerConnectionDied { name } => {
            if let Some(server) = state.servers.get_mut(&name) {
                warn!(server = %name, "connection died, will retry per reconnect policy");
                server.disconnect();
            }
        }
    }
}

/// Splits `text` into `(plugin_name, rest)` if it starts with
/// `command_char` (spec §4.6 `command_char || plugin_name` prefix),
/// e.g. `split_command("!ask weather?", '!') == Some(("ask", "weather?"))`.
fn split_command(text: &str, command_char: char) -> Option<(&str, &str)> {
    let rest = text.strip_prefix(command_char)?;
    Some(match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim_start()),
        None => (rest, ""),
    })
}

fn tick_servers(state: &mut DispatchState) {
    let now = std::time::Instant::now();
    let mut to_remove = Vec::new();
    let mut to_reconnect = Vec::new();

    for (name, server) in state.servers.iter_mut() {
        let effect = server.tick(now);
        server.update();
        match effect {
            Effect::None => {}
            Effect::BeginConnect => {
                server.begin_reconnect_attempt();
                to_reconnect.push(name.clone());
            }
            Effect::ConnectTimedOut | Effect::PingTimedOut => {
                debug!(server = %name, ?effect, "connection effect");
            }
            Effect::RetriesExhausted => {
                warn!(server = %name, "reconnect tries exhausted, removing server");
                to_remove.push(name.clone());
            }
        }
    }

    for name in to_reconnect {
        state.spawn_connection_attempt(name);
    }
    for name in to_remove {
        state.servers.remove(&name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_command_separates_plugin_name_and_args() {
        assert_eq!(split_command("!ask weather?", '!'), Some(("ask", "weather?")));
    }

    #[test]
    fn split_command_handles_bare_plugin_name() {
        assert_eq!(split_command("!ask", '!'), Some(("ask", "")));
    }

    #[test]
    fn split_command_ignores_text_without_the_prefix() {
        assert_eq!(split_command("hey everyone", '!'), None);
    }

    #[test]
    fn split_command_respects_a_custom_command_char() {
        assert_eq!(split_command(".ask weather?", '.'), Some(("ask", "weather?")));
        assert_eq!(split_command("!ask weather?", '.'), None);
    }
}
