//! Server subsystem (spec §4.2, component A): per-network connection
//! state, command methods, and callback-driven event bookkeeping.

pub mod net;
pub mod state;

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use irccd_protocol::{Names, ServerFlags, ServerIdentity, ServerSettings, Whois};

use crate::irc::{self, Event};
use state::{ConnState, Effect, Timing};

/// A fully resolved IRC channel event handed to the dispatcher, shaped for
/// both transport broadcast and plugin dispatch (spec §4.6).
#[derive(Debug, Clone)]
pub struct ServerEvent {
    pub server: String,
    pub name: &'static str,
    pub fields: serde_json::Value,
}

/// The Server subsystem itself (spec §3 "Server runtime state").
pub struct Server {
    pub identity: ServerIdentity,
    pub settings: ServerSettings,

    state: ConnState,
    next_state: Option<ConnState>,
    timing: Timing,

    /// Mode char -> prefix symbol, from ISUPPORT (spec §4.2).
    prefixes: Vec<(char, char)>,
    /// Our own current nickname, updated on successful NICK changes.
    nickname: String,
    joined_channels: std::collections::HashSet<String>,

    names_in_progress: HashMap<String, Names>,
    whois_in_progress: HashMap<String, Whois>,

    /// Commands queued before the connection exists yet, or while
    /// momentarily disconnected; replayed once `outbox` is set again.
    pending: VecDeque<String>,
    outbox: Option<mpsc::UnboundedSender<String>>,
    connected: bool,
}

impl Server {
    pub fn new(identity: ServerIdentity, settings: ServerSettings) -> Self {
        let nickname = identity.nickname.clone();
        Self {
            identity,
            settings,
            state: ConnState::Disconnected,
            next_state: None,
            timing: Timing {
                state_entered: Instant::now(),
                last_activity: Instant::now(),
                reconnect_attempts: 0,
            },
            prefixes: Vec::new(),
            nickname,
            joined_channels: std::collections::HashSet::new(),
            names_in_progress: HashMap::new(),
            whois_in_progress: HashMap::new(),
            pending: VecDeque::new(),
            outbox: None,
            connected: false,
        }
    }

    pub fn conn_state(&self) -> ConnState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Attach the send half once `net::run_connection` is spawned.
    pub fn attach_outbox(&mut self, outbox: mpsc::UnboundedSender<String>) {
        while let Some(line) = self.pending.pop_front() {
            let _ = outbox.send(line);
        }
        self.outbox = Some(outbox);
    }

    pub fn detach_outbox(&mut self) {
        self.outbox = None;
        self.connected = false;
    }

    /// One dispatch-loop tick (spec §4.2 `prepare`). Returns the effect the
    /// caller (dispatch.rs) must act on; never mutates `state` itself —
    /// that happens in [`Server::update`].
    pub fn tick(&mut self, now: Instant) -> Effect {
        let (next, effect) = state::step(self.state, &self.timing, &self.settings, now, self.connected);
        self.next_state = Some(next);
        effect
    }

    /// Commit the staged transition (spec §4.2 "Transitions are staged").
    pub fn update(&mut self) {
        if let Some(next) = self.next_state.take() {
            if next != self.state {
                self.timing.state_entered = Instant::now();
            }
            self.state = next;
        }
    }

    pub fn begin_reconnect_attempt(&mut self) {
        self.timing.reconnect_attempts += 1;
    }

    pub fn reset_reconnect_attempts(&mut self) {
        self.timing.reconnect_attempts = 0;
    }

    pub fn reset_ping_timer(&mut self) {
        self.timing.last_activity = Instant::now();
    }

    // === Command methods (spec §4.2 "queued, never block") ===

    fn enqueue(&mut self, line: String) {
        match &self.outbox {
            Some(tx) => {
                if tx.send(line.clone()).is_err() {
                    self.pending.push_back(line);
                }
            }
            None => self.pending.push_back(line),
        }
    }

    pub fn send_raw(&mut self, line: impl Into<String>) {
        self.enqueue(line.into());
    }

    pub fn message(&mut self, target: &str, text: &str) {
        self.enqueue(format!("PRIVMSG {target} :{text}"));
    }

    pub fn me(&mut self, target: &str, text: &str) {
        self.enqueue(format!("PRIVMSG {target} :\u{1}ACTION {text}\u{1}"));
    }

    pub fn notice(&mut self, target: &str, text: &str) {
        self.enqueue(format!("NOTICE {target} :{text}"));
    }

    pub fn cnotice(&mut self, target: &str, channel: &str, text: &str) {
        self.enqueue(format!("NOTICE {channel} :{target}: {text}"));
    }

    pub fn join(&mut self, channel: &str, password: Option<&str>) {
        match password {
            Some(pw) => self.enqueue(format!("JOIN {channel} {pw}")),
            None => self.enqueue(format!("JOIN {channel}")),
        }
        self.joined_channels.insert(channel.to_string());
    }

    pub fn part(&mut self, channel: &str, reason: Option<&str>) {
        match reason {
            Some(r) => self.enqueue(format!("PART {channel} :{r}")),
            None => self.enqueue(format!("PART {channel}")),
        }
        self.joined_channels.remove(channel);
    }

    pub fn kick(&mut self, channel: &str, target: &str, reason: Option<&str>) {
        match reason {
            Some(r) => self.enqueue(format!("KICK {channel} {target} :{r}")),
            None => self.enqueue(format!("KICK {channel} {target}")),
        }
    }

    pub fn topic(&mut self, channel: &str, topic: &str) {
        self.enqueue(format!("TOPIC {channel} :{topic}"));
    }

    pub fn invite(&mut self, target: &str, channel: &str) {
        self.enqueue(format!("INVITE {target} {channel}"));
    }

    pub fn mode(&mut self, mode: &str) {
        let nick = self.nickname.clone();
        self.enqueue(format!("MODE {nick} {mode}"));
    }

    pub fn cmode(&mut self, channel: &str, mode: &str) {
        self.enqueue(format!("MODE {channel} {mode}"));
    }

    pub fn nick(&mut self, nickname: &str) {
        self.enqueue(format!("NICK {nickname}"));
    }

    pub fn names(&mut self, channel: &str) {
        self.enqueue(format!("NAMES {channel}"));
    }

    pub fn whois(&mut self, target: &str) {
        self.enqueue(format!("WHOIS {target}"));
    }

    pub fn disconnect(&mut self) {
        self.detach_outbox();
        self.state = ConnState::Disconnected;
        self.next_state = None;
    }

    pub fn reconnect(&mut self) {
        self.detach_outbox();
        self.state = ConnState::Connecting;
        self.next_state = None;
        self.timing.state_entered = Instant::now();
    }

    /// Translate one parsed [`Event`] into callback bookkeeping plus zero
    /// or more outward-facing [`ServerEvent`]s (spec §4.2 "Callback
    /// handling rules").
    pub fn handle_event(&mut self, event: Event) -> Vec<ServerEvent> {
        let server_name = self.identity.name.clone();
        let mut out = Vec::new();
        let emit = |name: &'static str, fields: serde_json::Value| ServerEvent {
            server: server_name.clone(),
            name,
            fields,
        };

        match event {
            Event::Connect => {
                self.reset_reconnect_attempts();
                self.reset_ping_timer();
                self.connected = true;
                out.push(emit("connect", serde_json::json!({})));
                for channel in self.identity.channels.clone() {
                    self.join(&channel.name, channel.password.as_deref());
                }
            }
            Event::Ping { token } => {
                self.reset_ping_timer();
                self.enqueue(format!("PONG :{token}"));
            }
            Event::Kick { origin, channel, target, reason } => {
                self.reset_ping_timer();
                if irc::is_self(&target, &self.nickname)
                    && self.identity.flags.contains(ServerFlags::AUTO_REJOIN_ON_KICK)
                {
                    self.join(&channel, None);
                }
                out.push(emit(
                    "kick",
                    serde_json::json!({"origin": origin, "channel": channel, "target": target, "reason": reason}),
                ));
            }
            Event::Invite { origin, channel, target } => {
                self.reset_ping_timer();
                if irc::is_self(&target, &self.nickname)
                    && self.identity.flags.contains(ServerFlags::JOIN_ON_INVITE)
                {
                    self.join(&channel, None);
                }
                out.push(emit("invite", serde_json::json!({"origin": origin, "channel": channel})));
            }
            Event::NickChange { origin, nickname } => {
                self.reset_ping_timer();
                if irc::is_self(&origin, &self.nickname) {
                    self.nickname = nickname.clone();
                }
                out.push(emit("nick", serde_json::json!({"origin": origin, "nickname": nickname})));
            }
            Event::Numeric { code, params } => {
                self.reset_ping_timer();
                self.handle_numeric(code, params, &mut out, &emit);
            }
            Event::ChannelMessage { origin, channel, message } => {
                self.reset_ping_timer();
                out.push(emit("message", serde_json::json!({"origin": origin, "channel": channel, "message": message})));
            }
            Event::ChannelMode { origin, channel, mode, args } => {
                self.reset_ping_timer();
                out.push(emit("cmode", serde_json::json!({"origin": origin, "channel": channel, "mode": mode, "args": args})));
            }
            Event::ChannelNotice { origin, channel, message } => {
                self.reset_ping_timer();
                out.push(emit("cnotice", serde_json::json!({"origin": origin, "channel": channel, "message": message})));
            }
            Event::CtcpAction { origin, channel, message } => {
                self.reset_ping_timer();
                out.push(emit("me", serde_json::json!({"origin": origin, "channel": channel, "message": message})));
            }
            Event::Join { origin, channel } => {
                self.reset_ping_timer();
                out.push(emit("join", serde_json::json!({"origin": origin, "channel": channel})));
            }
            Event::UserNotice { origin, message } => {
                self.reset_ping_timer();
                out.push(emit("notice", serde_json::json!({"origin": origin, "message": message})));
            }
            Event::Part { origin, channel, reason } => {
                self.reset_ping_timer();
                out.push(emit("part", serde_json::json!({"origin": origin, "channel": channel, "reason": reason})));
            }
            Event::PrivateMessage { origin, message } => {
                self.reset_ping_timer();
                out.push(emit("query", serde_json::json!({"origin": origin, "message": message})));
            }
            Event::Topic { origin, channel, topic } => {
                self.reset_ping_timer();
                out.push(emit("topic", serde_json::json!({"origin": origin, "channel": channel, "topic": topic})));
            }
            Event::UserMode { origin, mode } => {
                self.reset_ping_timer();
                out.push(emit("mode", serde_json::json!({"origin": origin, "mode": mode})));
            }
        }
        out
    }

    fn handle_numeric(
        &mut self,
        code: u32,
        params: Vec<String>,
        out: &mut Vec<ServerEvent>,
        emit: &impl Fn(&'static str, serde_json::Value) -> ServerEvent,
    ) {
        match code {
            5 => {
                if let Some(prefixes) = irc::parse_prefix_token(&params) {
                    self.prefixes = prefixes;
                }
            }
            353 => {
                // RPL_NAMREPLY: "<me> = <channel> :name1 name2 ..."
                if let (Some(channel), Some(names_blob)) = (params.get(2), params.get(3)) {
                    let entry = self
                        .names_in_progress
                        .entry(channel.clone())
                        .or_insert_with(|| Names { channel: channel.clone(), names: Vec::new() });
                    for name in names_blob.split_whitespace() {
                        entry.names.push(irc::strip_name_prefix(name, &self.prefixes).to_string());
                    }
                }
            }
            366 => {
                // RPL_ENDOFNAMES
                if let Some(channel) = params.get(1) {
                    if let Some(names) = self.names_in_progress.remove(channel) {
                        out.push(emit("names", serde_json::to_value(&names).unwrap()));
                    }
                }
            }
            311 => {
                // RPL_WHOISUSER: "<me> <nick> <user> <host> * :<realname>"
                if let (Some(nick), Some(user), Some(host)) =
                    (params.get(1), params.get(2), params.get(3))
                {
                    let realname = params.get(5).cloned().unwrap_or_default();
                    self.whois_in_progress.insert(
                        nick.clone(),
                        Whois {
                            nickname: nick.clone(),
                            user: user.clone(),
                            host: host.clone(),
                            realname,
                            channels: Vec::new(),
                        },
                    );
                }
            }
            319 => {
                // RPL_WHOISCHANNELS: "<me> <nick> :#a #b"
                if let (Some(nick), Some(channels_blob)) = (params.get(1), params.get(2)) {
                    if let Some(whois) = self.whois_in_progress.get_mut(nick) {
                        whois.channels.extend(channels_blob.split_whitespace().map(String::from));
                    }
                }
            }
            318 => {
                // RPL_ENDOFWHOIS
                if let Some(nick) = params.get(1) {
                    if let Some(whois) = self.whois_in_progress.remove(nick) {
                        out.push(emit("whois", serde_json::to_value(&whois).unwrap()));
                    }
                }
            }
            _ => {
                debug!(code, "unhandled numeric reply");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ServerIdentity {
        ServerIdentity {
            name: "freenode".to_string(),
            host: "irc.example.net".to_string(),
            port: 6667,
            password: None,
            flags: ServerFlags::AUTO_REJOIN_ON_KICK | ServerFlags::JOIN_ON_INVITE,
            nickname: "irccd".to_string(),
            username: "irccd".to_string(),
            realname: "irccd".to_string(),
            ctcp_version: "irccd".to_string(),
            channels: vec![irccd_protocol::Channel::new("#staff")],
        }
    }

    #[test]
    fn on_connect_resets_counters_and_auto_joins() {
        let mut server = Server::new(identity(), ServerSettings::default());
        server.begin_reconnect_attempt();
        let events = server.handle_event(Event::Connect);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "connect");
        assert_eq!(server.timing.reconnect_attempts, 0);
        assert_eq!(server.pending.len(), 1);
        assert_eq!(server.pending[0], "JOIN #staff");
    }

    #[test]
    fn on_kick_self_with_auto_rejoin_enqueues_join() {
        let mut server = Server::new(identity(), ServerSettings::default());
        let events = server.handle_event(Event::Kick {
            origin: "op!u@h".to_string(),
            channel: "#staff".to_string(),
            target: "irccd".to_string(),
            reason: "bye".to_string(),
        });
        assert_eq!(events[0].name, "kick");
        assert_eq!(server.pending.back().unwrap(), "JOIN #staff");
    }

    #[test]
    fn on_kick_someone_else_does_not_rejoin() {
        let mut server = Server::new(identity(), ServerSettings::default());
        server.handle_event(Event::Kick {
            origin: "op!u@h".to_string(),
            channel: "#staff".to_string(),
            target: "someone-else".to_string(),
            reason: "bye".to_string(),
        });
        assert!(server.pending.is_empty());
    }

    #[test]
    fn nick_change_of_self_updates_cache() {
        let mut server = Server::new(identity(), ServerSettings::default());
        server.handle_event(Event::NickChange {
            origin: "irccd!u@h".to_string(),
            nickname: "irccd2".to_string(),
        });
        assert_eq!(server.nickname(), "irccd2");
    }

    #[test]
    fn nick_change_of_someone_else_is_ignored() {
        let mut server = Server::new(identity(), ServerSettings::default());
        server.handle_event(Event::NickChange {
            origin: "someone!u@h".to_string(),
            nickname: "other".to_string(),
        });
        assert_eq!(server.nickname(), "irccd");
    }

    #[test]
    fn isupport_prefix_is_parsed_and_strips_names() {
        let mut server = Server::new(identity(), ServerSettings::default());
        server.handle_event(Event::Numeric {
            code: 5,
            params: vec!["PREFIX=(ov)@+".to_string()],
        });
        server.handle_event(Event::Numeric {
            code: 353,
            params: vec!["irccd".into(), "=".into(), "#staff".into(), "@alice +bob carol".into()],
        });
        let events = server.handle_event(Event::Numeric {
            code: 366,
            params: vec!["irccd".into(), "#staff".into()],
        });
        let names: irccd_protocol::Names = serde_json::from_value(events[0].fields.clone()).unwrap();
        assert_eq!(names.names, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn whois_accumulates_across_numerics() {
        let mut server = Server::new(identity(), ServerSettings::default());
        server.handle_event(Event::Numeric {
            code: 311,
            params: vec!["irccd".into(), "bob".into(), "u".into(), "h".into(), "*".into(), "Bob Realname".into()],
        });
        server.handle_event(Event::Numeric {
            code: 319,
            params: vec!["irccd".into(), "bob".into(), "#a #b".into()],
        });
        let events = server.handle_event(Event::Numeric {
            code: 318,
            params: vec!["irccd".into(), "bob".into()],
        });
        let whois: Whois = serde_json::from_value(events[0].fields.clone()).unwrap();
        assert_eq!(whois.channels, vec!["#a", "#b"]);
    }

    #[test]
    fn commands_queue_while_disconnected() {
        let mut server = Server::new(identity(), ServerSettings::default());
        server.message("#staff", "hi");
        assert_eq!(server.pending.back().unwrap(), "PRIVMSG #staff :hi");
    }
}
