//! `server-*` commands (spec §4.5).

use irccd_protocol::{ServerFlags, ServerIdentity, ServerSettings};
use irccd_util::{IrccdError, Result};

use super::{optional_bool, optional_i32, optional_str, optional_u16, require_str};
use crate::dispatch::DispatchState;

/// Identifier regex spec §4.5 requires for `server-connect`'s `name`
/// (and, by extension, every other identifier-shaped field): letters,
/// digits, `-` and `_`, non-empty.
pub fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// `server-connect` worked example (spec §4.5), validated field by field.
pub fn connect(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let name = require_str(frame, "name")?;
    if !is_valid_identifier(name) {
        return Err(IrccdError::InvalidPropertyType {
            name: "name".to_string(),
            expected: "identifier",
            got: "string",
        });
    }
    if state.servers.contains_key(name) {
        return Err(IrccdError::ServerExists(name.to_string()));
    }

    let host = require_str(frame, "host")?;
    if host.is_empty() {
        return Err(IrccdError::MissingProperty("host".to_string()));
    }

    let port = optional_u16(frame, "port", 6667, 1, 65535)?;
    let ssl = optional_bool(frame, "ssl")?;
    let ssl_verify = optional_bool(frame, "sslVerify")?;
    let nickname = optional_str(frame, "nickname")?.unwrap_or("irccd").to_string();
    let username = optional_str(frame, "username")?.unwrap_or("irccd").to_string();
    let realname = optional_str(frame, "realname")?.unwrap_or("irccd").to_string();
    let ctcp_version = optional_str(frame, "ctcpVersion")?.unwrap_or("irccd").to_string();
    let command_char = optional_str(frame, "commandChar")?
        .and_then(|s| s.chars().next())
        .unwrap_or('!');
    let reconnect_tries = optional_i32(frame, "reconnectTries", -1)?;
    let reconnect_timeout = optional_u16(frame, "reconnectTimeout", 30, 0, 65535)?;

    let mut flags = ServerFlags::empty();
    if ssl {
        flags |= ServerFlags::TLS;
    }
    if ssl_verify {
        flags |= ServerFlags::TLS_VERIFY;
    }

    let identity = ServerIdentity {
        name: name.to_string(),
        host: host.to_string(),
        port,
        password: optional_str(frame, "password")?.map(String::from),
        flags,
        nickname,
        username,
        realname,
        ctcp_version,
        channels: Vec::new(),
    };
    let settings = ServerSettings {
        reconnect_tries,
        reconnect_delay_sec: reconnect_timeout,
        ping_timeout_sec: 300,
        command_char,
    };

    state.add_server(identity, settings);
    Ok(serde_json::json!({"name": name}))
}

fn lookup<'a>(state: &'a mut DispatchState, frame: &serde_json::Value) -> Result<&'a mut crate::server::Server> {
    let name = require_str(frame, "server")?.to_string();
    state
        .servers
        .get_mut(&name)
        .ok_or_else(|| IrccdError::ServerNotFound(name))
}

pub fn disconnect(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    lookup(state, frame)?.disconnect();
    Ok(serde_json::json!({}))
}

pub fn reconnect(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let name = require_str(frame, "server")?.to_string();
    if !state.servers.contains_key(&name) {
        return Err(IrccdError::ServerNotFound(name));
    }
    state.servers.get_mut(&name).unwrap().reconnect();
    state.spawn_connection_attempt(name);
    Ok(serde_json::json!({}))
}

pub fn list(state: &mut DispatchState, _frame: &serde_json::Value) -> Result<serde_json::Value> {
    let names: Vec<&str> = state.servers.keys().map(String::as_str).collect();
    Ok(serde_json::json!({"list": names}))
}

pub fn info(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let server = lookup(state, frame)?;
    Ok(serde_json::json!({
        "name": server.identity.name,
        "host": server.identity.host,
        "port": server.identity.port,
        "nickname": server.nickname(),
        "connected": server.is_connected(),
    }))
}

pub fn message(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let target = require_str(frame, "target")?.to_string();
    let text = require_str(frame, "message")?.to_string();
    lookup(state, frame)?.message(&target, &text);
    Ok(serde_json::json!({}))
}

pub fn me(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let target = require_str(frame, "target")?.to_string();
    let text = require_str(frame, "message")?.to_string();
    lookup(state, frame)?.me(&target, &text);
    Ok(serde_json::json!({}))
}

pub fn notice(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let target = require_str(frame, "target")?.to_string();
    let text = require_str(frame, "message")?.to_string();
    lookup(state, frame)?.notice(&target, &text);
    Ok(serde_json::json!({}))
}

pub fn cnotice(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let channel = require_str(frame, "channel")?.to_string();
    let target = require_str(frame, "target")?.to_string();
    let text = require_str(frame, "message")?.to_string();
    lookup(state, frame)?.cnotice(&target, &channel, &text);
    Ok(serde_json::json!({}))
}

pub fn cmode(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let channel = require_str(frame, "channel")?.to_string();
    let mode = require_str(frame, "mode")?.to_string();
    lookup(state, frame)?.cmode(&channel, &mode);
    Ok(serde_json::json!({}))
}

pub fn invite(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let target = require_str(frame, "target")?.to_string();
    let channel = require_str(frame, "channel")?.to_string();
    lookup(state, frame)?.invite(&target, &channel);
    Ok(serde_json::json!({}))
}

pub fn join(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let channel = require_str(frame, "channel")?.to_string();
    let password = optional_str(frame, "password")?.map(String::from);
    lookup(state, frame)?.join(&channel, password.as_deref());
    Ok(serde_json::json!({}))
}

pub fn kick(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let channel = require_str(frame, "channel")?.to_string();
    let target = require_str(frame, "target")?.to_string();
    let reason = optional_str(frame, "reason")?.map(String::from);
    lookup(state, frame)?.kick(&channel, &target, reason.as_deref());
    Ok(serde_json::json!({}))
}

pub fn mode(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let mode = require_str(frame, "mode")?.to_string();
    lookup(state, frame)?.mode(&mode);
    Ok(serde_json::json!({}))
}

pub fn nick(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let nickname = require_str(frame, "nickname")?.to_string();
    lookup(state, frame)?.nick(&nickname);
    Ok(serde_json::json!({}))
}

pub fn part(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let channel = require_str(frame, "channel")?.to_string();
    let reason = optional_str(frame, "reason")?.map(String::from);
    lookup(state, frame)?.part(&channel, reason.as_deref());
    Ok(serde_json::json!({}))
}

pub fn topic(state: &mut DispatchState, frame: &serde_json::Value) -> Result<serde_json::Value> {
    let channel = require_str(frame, "channel")?.to_string();
    let topic = require_str(frame, "topic")?.to_string();
    lookup(state, frame)?.topic(&channel, &topic);
    Ok(serde_json::json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> DispatchState {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        DispatchState::new(tx)
    }

    #[test]
    fn identifier_validation_matches_spec_charset() {
        assert!(is_valid_identifier("freenode"));
        assert!(is_valid_identifier("free-node_1"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("free node"));
        assert!(!is_valid_identifier("free!node"));
    }

    #[test]
    fn connect_rejects_missing_host() {
        let mut s = state();
        let frame = serde_json::json!({"name": "freenode"});
        let err = connect(&mut s, &frame).unwrap_err();
        assert!(matches!(err, IrccdError::MissingProperty(_)));
    }

    #[test]
    fn connect_rejects_bad_port_type() {
        let mut s = state();
        let frame = serde_json::json!({"name": "freenode", "host": "irc.example", "port": "not a number"});
        let err = connect(&mut s, &frame).unwrap_err();
        assert!(matches!(err, IrccdError::InvalidPropertyType { .. }));
    }

    #[test]
    fn connect_rejects_out_of_range_port() {
        let mut s = state();
        let frame = serde_json::json!({"name": "freenode", "host": "irc.example", "port": 99999});
        let err = connect(&mut s, &frame).unwrap_err();
        assert!(matches!(err, IrccdError::OutOfRange { .. }));
    }

    #[test]
    fn connect_rejects_port_zero() {
        let mut s = state();
        let frame = serde_json::json!({"name": "freenode", "host": "irc.example", "port": 0});
        let err = connect(&mut s, &frame).unwrap_err();
        assert!(matches!(err, IrccdError::OutOfRange { .. }));
    }

    #[test]
    fn connect_rejects_duplicate_name() {
        let mut s = state();
        let frame = serde_json::json!({"name": "freenode", "host": "irc.example"});
        connect(&mut s, &frame).unwrap();
        let err = connect(&mut s, &frame).unwrap_err();
        assert!(matches!(err, IrccdError::ServerExists(_)));
    }

    #[test]
    fn connect_defaults_port_to_6667() {
        let mut s = state();
        let frame = serde_json::json!({"name": "freenode", "host": "irc.example"});
        connect(&mut s, &frame).unwrap();
        assert_eq!(s.servers["freenode"].identity.port, 6667);
    }
}
