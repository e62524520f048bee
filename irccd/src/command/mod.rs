//! Command registry (spec §4.5, component F).
//!
//! `Registry::dispatch` validates the frame's `command` field, routes it
//! to the matching handler, and wraps the result into the
//! `{"status":true,"response":...}` / `{"status":false,"error":...}` shape
//! spec §4.5 mandates. Unknown commands get exactly
//! `{"status":false,"error":"command does not exist"}`.

pub mod plugin;
pub mod rule;
pub mod server;

use irccd_protocol::CommandResponse;
use irccd_util::IrccdError;

use crate::dispatch::DispatchState;

pub type HandlerResult = Result<serde_json::Value, IrccdError>;

pub struct Registry;

impl Registry {
    /// Dispatch a raw client frame (spec §4.5 `exec(daemon, request_json)`).
    pub fn dispatch(state: &mut DispatchState, frame: serde_json::Value) -> CommandResponse {
        let Some(name) = frame.get("command").and_then(|v| v.as_str()) else {
            return CommandResponse::err("unknown", "missing 'command' property");
        };
        let name = name.to_string();

        let result = match name.as_str() {
            "server-connect" => server::connect(state, &frame),
            "server-disconnect" => server::disconnect(state, &frame),
            "server-reconnect" => server::reconnect(state, &frame),
            "server-list" => server::list(state, &frame),
            "server-info" => server::info(state, &frame),
            "server-message" => server::message(state, &frame),
            "server-me" => server::me(state, &frame),
            "server-notice" => server::notice(state, &frame),
            "server-cnotice" => server::cnotice(state, &frame),
            "server-cmode" => server::cmode(state, &frame),
            "server-invite" => server::invite(state, &frame),
            "server-join" => server::join(state, &frame),
            "server-kick" => server::kick(state, &frame),
            "server-mode" => server::mode(state, &frame),
            "server-nick" => server::nick(state, &frame),
            "server-part" => server::part(state, &frame),
            "server-topic" => server::topic(state, &frame),
            "rule-add" => rule::add(state, &frame),
            "rule-remove" => rule::remove(state, &frame),
            "rule-list" => rule::list(state, &frame),
            "rule-move" => rule::move_rule(state, &frame),
            "plugin-load" => plugin::load(state, &frame),
            "plugin-unload" => plugin::unload(state, &frame),
            "plugin-reload" => plugin::reload(state, &frame),
            "plugin-list" => plugin::list(state, &frame),
            "plugin-info" => plugin::info(state, &frame),
            "plugin-config" => plugin::config(state, &frame),
            _ => Err(IrccdError::UnknownCommand),
        };

        match result {
            Ok(extra) => CommandResponse::ok(name, extra),
            Err(e) => CommandResponse::err(name, e.to_string()),
        }
    }
}

// === Shared request-validation helpers (spec §4.5 worked example) ===

pub fn require_str<'a>(frame: &'a serde_json::Value, key: &str) -> Result<&'a str, IrccdError> {
    match frame.get(key) {
        None | Some(serde_json::Value::Null) => Err(IrccdError::MissingProperty(key.to_string())),
        Some(serde_json::Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(IrccdError::InvalidPropertyType {
            name: key.to_string(),
            expected: "string",
            got: json_type_name(other),
        }),
    }
}

pub fn optional_str<'a>(frame: &'a serde_json::Value, key: &str) -> Result<Option<&'a str>, IrccdError> {
    match frame.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(IrccdError::InvalidPropertyType {
            name: key.to_string(),
            expected: "string",
            got: json_type_name(other),
        }),
    }
}

pub fn optional_bool(frame: &serde_json::Value, key: &str) -> Result<bool, IrccdError> {
    match frame.get(key) {
        None | Some(serde_json::Value::Null) => Ok(false),
        Some(serde_json::Value::Bool(b)) => Ok(*b),
        Some(other) => Err(IrccdError::InvalidPropertyType {
            name: key.to_string(),
            expected: "bool",
            got: json_type_name(other),
        }),
    }
}

pub fn optional_u16(frame: &serde_json::Value, key: &str, default: u16, min: i64, max: i64) -> Result<u16, IrccdError> {
    match frame.get(key) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(serde_json::Value::Number(n)) => {
            let got = n.as_i64().ok_or_else(|| IrccdError::InvalidPropertyType {
                name: key.to_string(),
                expected: "unsigned integer",
                got: "float",
            })?;
            if got < min || got > max {
                return Err(IrccdError::OutOfRange { name: key.to_string(), min, max, got });
            }
            Ok(got as u16)
        }
        Some(other) => Err(IrccdError::InvalidPropertyType {
            name: key.to_string(),
            expected: "unsigned integer",
            got: json_type_name(other),
        }),
    }
}

pub fn optional_i32(frame: &serde_json::Value, key: &str, default: i32) -> Result<i32, IrccdError> {
    match frame.get(key) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(serde_json::Value::Number(n)) => {
            n.as_i64().map(|v| v as i32).ok_or_else(|| IrccdError::InvalidPropertyType {
                name: key.to_string(),
                expected: "integer",
                got: "float",
            })
        }
        Some(other) => Err(IrccdError::InvalidPropertyType {
            name: key.to_string(),
            expected: "integer",
            got: json_type_name(other),
        }),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
