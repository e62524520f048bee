//! Request/response/event envelopes (spec §3 "Transport ..." and §6.1).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The handshake banner the daemon sends immediately after accept
/// (spec §3 "Transport initial handshake").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Banner {
    pub program: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub ssl: bool,
    /// Whether a scripting host is compiled in. irccd's core never loads
    /// plugins itself (§1 Non-goals), but the field is part of the wire
    /// contract clients rely on, so it is always reported truthfully by
    /// the daemon for the scripting host it was built with.
    pub javascript: bool,
}

pub const PROGRAM_NAME: &str = "irccd";
pub const PROTOCOL_MAJOR: u32 = 2;
pub const PROTOCOL_MINOR: u32 = 0;
pub const PROTOCOL_PATCH: u32 = 0;

impl Banner {
    pub fn current() -> Self {
        Self {
            program: PROGRAM_NAME.to_string(),
            major: PROTOCOL_MAJOR,
            minor: PROTOCOL_MINOR,
            patch: PROTOCOL_PATCH,
            ssl: cfg!(feature = "tls"),
            javascript: false,
        }
    }

    /// Client-side compatibility check (spec §4.4 "Banner verification"):
    /// major must match exactly, client minor must be <= server minor.
    pub fn compatible_with(&self, client_major: u32, client_minor: u32) -> Result<(), String> {
        if self.major != client_major {
            return Err(if self.major > client_major {
                "server version too recent".to_string()
            } else {
                "server version too old".to_string()
            });
        }
        if client_minor > self.minor {
            return Err("server version too recent".to_string());
        }
        Ok(())
    }
}

/// Client -> daemon auth frame (spec §3 "Auth frame").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    pub command: AuthTag,
    pub password: String,
}

/// Newtype so `{"command":"auth",...}` deserializes only when the tag matches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum AuthTag {
    #[serde(rename = "auth")]
    Auth,
}

impl AuthRequest {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            command: AuthTag::Auth,
            password: password.into(),
        }
    }
}

/// Daemon -> client auth result (spec §3 "Auth frame").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub response: AuthTag,
    pub result: bool,
}

/// A generic command request: `{"command":"<name>", ...args}` (spec §3
/// "Command frame"). Kept as a loosely-typed JSON object per spec §9's
/// "Duck-typed JSON" note — validation happens centrally in the command
/// registry (irccd crate), not at this wire layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(flatten)]
    pub args: Value,
}

/// A generic command response: always carries `response`/`status`, and
/// `error` on failure (spec §3 "Command frame").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub response: String,
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Value,
}

impl CommandResponse {
    pub fn ok(name: impl Into<String>, extra: Value) -> Self {
        Self {
            response: name.into(),
            status: true,
            error: None,
            extra,
        }
    }

    pub fn err(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            response: name.into(),
            status: false,
            error: Some(message.into()),
            extra: Value::Object(Default::default()),
        }
    }
}

/// A broadcast event frame: `{"event":"<name>","server":"<id>", ...}`
/// (spec §3 "Event broadcast frame").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    pub server: String,
    #[serde(flatten)]
    pub fields: Value,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, server: impl Into<String>, fields: Value) -> Self {
        Self {
            event: event.into(),
            server: server.into(),
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn banner_rejects_newer_major() {
        let banner = Banner {
            major: 3,
            minor: 0,
            ..Banner::current()
        };
        assert!(banner.compatible_with(2, 0).is_err());
    }

    #[test]
    fn banner_accepts_equal_major_lower_client_minor() {
        let banner = Banner {
            major: 2,
            minor: 5,
            ..Banner::current()
        };
        assert!(banner.compatible_with(2, 1).is_ok());
    }

    #[test]
    fn banner_rejects_client_minor_ahead_of_server() {
        let banner = Banner {
            major: 2,
            minor: 0,
            ..Banner::current()
        };
        assert!(banner.compatible_with(2, 1).is_err());
    }

    #[test]
    fn command_response_serializes_error_only_on_failure() {
        let ok = CommandResponse::ok("server-list", json!({"servers": []}));
        let v = serde_json::to_value(&ok).unwrap();
        assert!(v.get("error").is_none());

        let err = CommandResponse::err("server-connect", "server 'x' already exists");
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["error"], "server 'x' already exists");
        assert_eq!(v["status"], false);
    }

    #[test]
    fn auth_request_tags_command() {
        let req = AuthRequest::new("s3cret");
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["command"], "auth");
        assert_eq!(v["password"], "s3cret");
    }
}
