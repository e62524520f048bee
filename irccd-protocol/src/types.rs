//! Shared data types for the control protocol (spec §3 "Data model").

use std::collections::HashSet;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Per-server behavioral flags (spec §3 "Server identity").
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ServerFlags: u8 {
        const IPV6               = 0b0000_0001;
        const TLS                = 0b0000_0010;
        const TLS_VERIFY         = 0b0000_0100;
        const AUTO_REJOIN_ON_KICK = 0b0000_1000;
        const JOIN_ON_INVITE     = 0b0001_0000;
    }
}

impl Default for ServerFlags {
    fn default() -> Self {
        ServerFlags::empty()
    }
}

/// A channel to auto-join, with an optional password (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: None,
        }
    }
}

/// Static identity of an IRC network (spec §3 "Server identity").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerIdentity {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub flags: ServerFlags,
    pub nickname: String,
    pub username: String,
    pub realname: String,
    pub ctcp_version: String,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

/// Tunable policy settings (spec §3 "Server settings").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// -1 = infinite, 0 = never.
    pub reconnect_tries: i32,
    pub reconnect_delay_sec: u16,
    pub ping_timeout_sec: u16,
    pub command_char: char,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            reconnect_tries: -1,
            reconnect_delay_sec: 30,
            ping_timeout_sec: 300,
            command_char: '!',
        }
    }
}

/// Verdict a [`crate::types::Rule`] resolves to (spec §3 "Rule").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Accept,
    Drop,
}

/// A single filter rule; empty sets match anything (spec §4.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub servers: HashSet<String>,
    #[serde(default)]
    pub channels: HashSet<String>,
    #[serde(default)]
    pub origins: HashSet<String>,
    #[serde(default)]
    pub plugins: HashSet<String>,
    #[serde(default)]
    pub events: HashSet<String>,
    #[serde(default)]
    pub action: RuleAction,
}

impl Default for RuleAction {
    fn default() -> Self {
        RuleAction::Accept
    }
}

impl Default for Rule {
    fn default() -> Self {
        Self {
            servers: HashSet::new(),
            channels: HashSet::new(),
            origins: HashSet::new(),
            plugins: HashSet::new(),
            events: HashSet::new(),
            action: RuleAction::Accept,
        }
    }
}

/// The tuple a rule evaluation matches against (spec §4.3).
#[derive(Debug, Clone, Copy)]
pub struct RuleMatch<'a> {
    pub server: &'a str,
    pub channel: &'a str,
    pub origin: &'a str,
    pub plugin: &'a str,
    pub event: &'a str,
}

/// Accumulated result of an in-progress WHOIS (spec §4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Whois {
    pub nickname: String,
    pub user: String,
    pub host: String,
    pub realname: String,
    #[serde(default)]
    pub channels: Vec<String>,
}

/// Accumulated result of an in-progress NAMES (spec §4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Names {
    pub channel: String,
    #[serde(default)]
    pub names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_default_to_empty() {
        assert_eq!(ServerFlags::default(), ServerFlags::empty());
    }

    #[test]
    fn flags_roundtrip_json() {
        let flags = ServerFlags::TLS | ServerFlags::AUTO_REJOIN_ON_KICK;
        let json = serde_json::to_string(&flags).unwrap();
        let back: ServerFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(flags, back);
    }

    #[test]
    fn settings_preserve_zero_vs_negative_one_asymmetry() {
        // spec §9: reconnect_tries == -1 is infinite, == 0 is never. These
        // must remain distinguishable, not collapsed by a bounds check.
        let never = ServerSettings {
            reconnect_tries: 0,
            ..ServerSettings::default()
        };
        let infinite = ServerSettings {
            reconnect_tries: -1,
            ..ServerSettings::default()
        };
        assert_ne!(never.reconnect_tries, infinite.reconnect_tries);
    }
}
