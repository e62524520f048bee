//! TOML config schema (SPEC_FULL §10).

use serde::Deserialize;

use irccd_protocol::{Channel, Rule, RuleAction};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub transports: Vec<TransportConfig>,
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GeneralConfig {
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Unix,
    Ip,
    Ip6,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(rename = "type")]
    pub kind: TransportKind,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    pub cert: String,
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default)]
    pub ssl_verify: bool,
    #[serde(default = "default_nickname")]
    pub nickname: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_realname")]
    pub realname: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
    #[serde(default)]
    pub auto_rejoin_on_kick: bool,
    #[serde(default)]
    pub join_on_invite: bool,
    #[serde(default = "default_reconnect_tries")]
    pub reconnect_tries: i32,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: u16,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u16,
    #[serde(default = "default_command_char")]
    pub command_char: char,
}

fn default_port() -> u16 {
    6667
}
fn default_nickname() -> String {
    "irccd".to_string()
}
fn default_username() -> String {
    "irccd".to_string()
}
fn default_realname() -> String {
    "irccd".to_string()
}
fn default_reconnect_tries() -> i32 {
    -1
}
fn default_reconnect_delay() -> u16 {
    30
}
fn default_ping_timeout() -> u16 {
    300
}
fn default_command_char() -> char {
    '!'
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl From<ChannelConfig> for Channel {
    fn from(c: ChannelConfig) -> Self {
        Channel { name: c.name, password: c.password }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub origins: Vec<String>,
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default = "default_rule_action")]
    pub action: RuleAction,
}

fn default_rule_action() -> RuleAction {
    RuleAction::Accept
}

impl From<RuleConfig> for Rule {
    fn from(c: RuleConfig) -> Self {
        Rule {
            servers: c.servers.into_iter().collect(),
            channels: c.channels.into_iter().collect(),
            origins: c.origins.into_iter().collect(),
            plugins: c.plugins.into_iter().collect(),
            events: c.events.into_iter().collect(),
            action: c.action,
        }
    }
}
