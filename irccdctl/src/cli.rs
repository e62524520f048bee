//! Command-line argument parsing for irccdctl (spec §6.4, §15).
//!
//! Ported pattern from the daemon template's `ccmux-client/src/cli.rs`:
//! a flat clap-derive `Args` struct plus a `Subcommand` enum, one variant
//! per registry command (spec §4.5).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum TransportType {
    Ip,
    Ipv6,
    Unix,
}

/// irccdctl - control client for the irccd daemon
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to irccd's configuration file, used to discover the transport
    /// to connect to when --host/--path are not given directly.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Daemon host to connect to (selects the IP transport).
    #[arg(short = 'h', long = "host")]
    pub host: Option<String>,

    /// Daemon port to connect to, used with --host.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Unix socket path to connect to (selects the Unix transport).
    #[arg(short = 'P', long = "path")]
    pub path: Option<PathBuf>,

    /// Transport type to use when more than one is configured.
    #[arg(short = 't', long = "type")]
    pub transport_type: Option<TransportType>,

    /// Enable debug logging.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// One variant per command registry entry (spec §4.5), matching spec §15's
/// mandate that subcommands "mirror the command registry one-to-one".
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    #[command(name = "server-connect")]
    ServerConnect {
        #[arg(long)]
        name: String,
        #[arg(long)]
        host: String,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        ssl: bool,
        #[arg(long = "ssl-verify")]
        ssl_verify: bool,
        #[arg(long)]
        nickname: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        realname: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    #[command(name = "server-disconnect")]
    ServerDisconnect { server: String },
    #[command(name = "server-reconnect")]
    ServerReconnect { server: String },
    #[command(name = "server-list")]
    ServerList,
    #[command(name = "server-info")]
    ServerInfo { server: String },
    #[command(name = "server-message")]
    ServerMessage { server: String, target: String, message: String },
    #[command(name = "server-me")]
    ServerMe { server: String, target: String, message: String },
    #[command(name = "server-notice")]
    ServerNotice { server: String, target: String, message: String },
    #[command(name = "server-cnotice")]
    ServerCnotice { server: String, channel: String, target: String, message: String },
    #[command(name = "server-cmode")]
    ServerCmode { server: String, channel: String, mode: String },
    #[command(name = "server-invite")]
    ServerInvite { server: String, target: String, channel: String },
    #[command(name = "server-join")]
    ServerJoin {
        server: String,
        channel: String,
        #[arg(long)]
        password: Option<String>,
    },
    #[command(name = "server-kick")]
    ServerKick {
        server: String,
        channel: String,
        target: String,
        #[arg(long)]
        reason: Option<String>,
    },
    #[command(name = "server-mode")]
    ServerMode { server: String, mode: String },
    #[command(name = "server-nick")]
    ServerNick { server: String, nickname: String },
    #[command(name = "server-part")]
    ServerPart {
        server: String,
        channel: String,
        #[arg(long)]
        reason: Option<String>,
    },
    #[command(name = "server-topic")]
    ServerTopic { server: String, channel: String, topic: String },
    #[command(name = "rule-add")]
    RuleAdd {
        #[arg(long, value_delimiter = ',')]
        servers: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        channels: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        origins: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        plugins: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        events: Vec<String>,
        #[arg(long)]
        action: String,
    },
    #[command(name = "rule-remove")]
    RuleRemove { index: usize },
    #[command(name = "rule-list")]
    RuleList,
    #[command(name = "rule-move")]
    RuleMove { index: usize, to: usize },
    #[command(name = "plugin-load")]
    PluginLoad { plugin: String },
    #[command(name = "plugin-unload")]
    PluginUnload { plugin: String },
    #[command(name = "plugin-reload")]
    PluginReload { plugin: String },
    #[command(name = "plugin-list")]
    PluginList,
    #[command(name = "plugin-info")]
    PluginInfo { plugin: String },
    #[command(name = "plugin-config")]
    PluginConfig {
        plugin: String,
        #[arg(long)]
        variable: Option<String>,
        #[arg(long)]
        value: Option<String>,
    },
}

impl Command {
    /// Flatten a subcommand into the registry command name and its JSON
    /// argument object (spec §3 "Command frame").
    pub fn to_frame(&self) -> (&'static str, serde_json::Value) {
        use serde_json::json;
        match self {
            Command::ServerConnect {
                name, host, port, ssl, ssl_verify, nickname, username, realname, password,
            } => (
                "server-connect",
                json!({
                    "name": name, "host": host, "port": port, "ssl": ssl,
                    "sslVerify": ssl_verify, "nickname": nickname, "username": username,
                    "realname": realname, "password": password,
                }),
            ),
            Command::ServerDisconnect { server } => ("server-disconnect", json!({"server": server})),
            Command::ServerReconnect { server } => ("server-reconnect", json!({"server": server})),
            Command::ServerList => ("server-list", json!({})),
            Command::ServerInfo { server } => ("server-info", json!({"server": server})),
            Command::ServerMessage { server, target, message } => {
                ("server-message", json!({"server": server, "target": target, "message": message}))
            }
            Command::ServerMe { server, target, message } => {
                ("server-me", json!({"server": server, "target": target, "message": message}))
            }
            Command::ServerNotice { server, target, message } => {
                ("server-notice", json!({"server": server, "target": target, "message": message}))
            }
            Command::ServerCnotice { server, channel, target, message } => (
                "server-cnotice",
                json!({"server": server, "channel": channel, "target": target, "message": message}),
            ),
            Command::ServerCmode { server, channel, mode } => {
                ("server-cmode", json!({"server": server, "channel": channel, "mode": mode}))
            }
            Command::ServerInvite { server, target, channel } => {
                ("server-invite", json!({"server": server, "target": target, "channel": channel}))
            }
            Command::ServerJoin { server, channel, password } => {
                ("server-join", json!({"server": server, "channel": channel, "password": password}))
            }
            Command::ServerKick { server, channel, target, reason } => (
                "server-kick",
                json!({"server": server, "channel": channel, "target": target, "reason": reason}),
            ),
            Command::ServerMode { server, mode } => ("server-mode", json!({"server": server, "mode": mode})),
            Command::ServerNick { server, nickname } => {
                ("server-nick", json!({"server": server, "nickname": nickname}))
            }
            Command::ServerPart { server, channel, reason } => {
                ("server-part", json!({"server": server, "channel": channel, "reason": reason}))
            }
            Command::ServerTopic { server, channel, topic } => {
                ("server-topic", json!({"server": server, "channel": channel, "topic": topic}))
            }
            Command::RuleAdd { servers, channels, origins, plugins, events, action } => (
                "rule-add",
                json!({
                    "servers": servers, "channels": channels, "origins": origins,
                    "plugins": plugins, "events": events, "action": action,
                }),
            ),
            Command::RuleRemove { index } => ("rule-remove", json!({"index": index})),
            Command::RuleList => ("rule-list", json!({})),
            Command::RuleMove { index, to } => ("rule-move", json!({"index": index, "to": to})),
            Command::PluginLoad { plugin } => ("plugin-load", json!({"plugin": plugin})),
            Command::PluginUnload { plugin } => ("plugin-unload", json!({"plugin": plugin})),
            Command::PluginReload { plugin } => ("plugin-reload", json!({"plugin": plugin})),
            Command::PluginList => ("plugin-list", json!({})),
            Command::PluginInfo { plugin } => ("plugin-info", json!({"plugin": plugin})),
            Command::PluginConfig { plugin, variable, value } => {
                ("plugin-config", json!({"plugin": plugin, "variable": variable, "value": value}))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_connect() {
        let args = Args::parse_from([
            "irccdctl", "server-connect", "--name", "freenode", "--host", "irc.example",
        ]);
        let (name, frame) = args.command.to_frame();
        assert_eq!(name, "server-connect");
        assert_eq!(frame["name"], "freenode");
        assert_eq!(frame["host"], "irc.example");
    }

    #[test]
    fn parses_global_flags_before_subcommand() {
        let args = Args::parse_from(["irccdctl", "-h", "localhost", "-p", "9999", "server-list"]);
        assert_eq!(args.host, Some("localhost".to_string()));
        assert_eq!(args.port, Some(9999));
    }

    #[test]
    fn rule_add_splits_comma_lists() {
        let args = Args::parse_from([
            "irccdctl", "rule-add", "--plugins", "logger,greet", "--action", "drop",
        ]);
        let (name, frame) = args.command.to_frame();
        assert_eq!(name, "rule-add");
        assert_eq!(frame["plugins"], serde_json::json!(["logger", "greet"]));
    }
}
