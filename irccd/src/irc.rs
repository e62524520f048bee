//! IRC codec adapter (spec §4.1): the external collaborator that parses
//! raw lines into the event callback surface the `Server` translates.
//!
//! Wire parsing itself is delegated to `irc-proto`'s `Message`/`Command`
//! types; this module's job is narrower than a full IRC client — it only
//! turns a parsed `Message` into one `Event` the rest of the daemon
//! understands, matching the callback names spec §4.1 lists verbatim.

use std::str::FromStr;

use irc_proto::{Command, Message, Response};

/// One parsed IRC event, named after the callback spec §4.1 requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect,
    ChannelMessage { origin: String, channel: String, message: String },
    ChannelMode { origin: String, channel: String, mode: String, args: Vec<String> },
    ChannelNotice { origin: String, channel: String, message: String },
    CtcpAction { origin: String, channel: String, message: String },
    Invite { origin: String, channel: String, target: String },
    Join { origin: String, channel: String },
    Kick { origin: String, channel: String, target: String, reason: String },
    NickChange { origin: String, nickname: String },
    UserNotice { origin: String, message: String },
    Part { origin: String, channel: String, reason: Option<String> },
    Ping { token: String },
    PrivateMessage { origin: String, message: String },
    Topic { origin: String, channel: String, topic: String },
    UserMode { origin: String, mode: String },
    Numeric { code: u32, params: Vec<String> },
}

/// Parse one raw IRC line (without trailing CRLF) into zero-or-one events.
///
/// Returns `Ok(None)` for messages the daemon has no use for (server
/// notices about capability negotiation, etc.) rather than erroring —
/// spec §4.1 only names a fixed callback set, everything else is ignored.
pub fn parse_line(line: &str) -> Result<Option<Event>, irc_proto::error::MessageParseError> {
    let message = Message::from_str(line)?;
    let origin = message
        .prefix
        .as_ref()
        .map(|p| p.to_string())
        .unwrap_or_default();

    let event = match message.command {
        Command::PRIVMSG(ref target, ref text) => {
            if let Some(action) = ctcp_action(text) {
                if is_channel(target) {
                    Event::CtcpAction { origin, channel: target.clone(), message: action }
                } else {
                    // CTCP ACTION only makes sense in a channel context for
                    // this daemon; private CTCP is folded into a plain PM.
                    Event::PrivateMessage { origin, message: action }
                }
            } else if is_channel(target) {
                Event::ChannelMessage {
                    origin,
                    channel: target.clone(),
                    message: text.clone(),
                }
            } else {
                Event::PrivateMessage { origin, message: text.clone() }
            }
        }
        Command::NOTICE(ref target, ref text) => {
            if is_channel(target) {
                Event::ChannelNotice {
                    origin,
                    channel: target.clone(),
                    message: text.clone(),
                }
            } else {
                Event::UserNotice { origin, message: text.clone() }
            }
        }
        Command::JOIN(ref channel, _, _) => Event::Join { origin, channel: channel.clone() },
        Command::PART(ref channel, ref reason) => Event::Part {
            origin,
            channel: channel.clone(),
            reason: reason.clone(),
        },
        Command::KICK(ref channel, ref target, ref reason) => Event::Kick {
            origin,
            channel: channel.clone(),
            target: target.clone(),
            reason: reason.clone().unwrap_or_default(),
        },
        Command::INVITE(ref target, ref channel) => Event::Invite {
            origin,
            channel: channel.clone(),
            target: target.clone(),
        },
        Command::TOPIC(ref channel, Some(ref topic)) => Event::Topic {
            origin,
            channel: channel.clone(),
            topic: topic.clone(),
        },
        Command::NICK(ref nickname) => Event::NickChange { origin, nickname: nickname.clone() },
        Command::PING(ref token, _) => Event::Ping { token: token.clone() },
        Command::ChannelMODE(ref channel, ref modes) => {
            let (mode, args) = flatten_modes(modes);
            Event::ChannelMode { origin, channel: channel.clone(), mode, args }
        }
        Command::UserMODE(_, ref modes) => {
            let (mode, _) = flatten_modes(modes);
            Event::UserMode { origin, mode }
        }
        Command::Response(code, ref params) => Event::Numeric {
            code: response_code(code),
            params: params.clone(),
        },
        _ => return Ok(None),
    };
    Ok(Some(event))
}

fn is_channel(target: &str) -> bool {
    matches!(target.chars().next(), Some('#') | Some('&') | Some('!') | Some('+'))
}

/// `\x01ACTION ...\x01` inside a PRIVMSG body (spec §4.1 `on_ctcp_action`).
fn ctcp_action(text: &str) -> Option<String> {
    let inner = text.strip_prefix('\u{1}')?.strip_suffix('\u{1}')?;
    inner.strip_prefix("ACTION ").map(|s| s.to_string())
}

fn flatten_modes<M: std::fmt::Display>(modes: &[irc_proto::Mode<M>]) -> (String, Vec<String>) {
    let mut mode_string = String::new();
    let mut args = Vec::new();
    for m in modes {
        mode_string.push_str(&m.to_string());
        mode_string.push(' ');
    }
    for m in modes {
        if let Some(arg) = mode_arg(m) {
            args.push(arg);
        }
    }
    (mode_string.trim_end().to_string(), args)
}

fn mode_arg<M: std::fmt::Display>(mode: &irc_proto::Mode<M>) -> Option<String> {
    let text = mode.to_string();
    text.split_whitespace().nth(1).map(|s| s.to_string())
}

fn response_code(response: Response) -> u32 {
    response as u32
}

/// "Is this me?" (spec §4.2 "Identity matching"): strip `nick!user@host`
/// down to the nick and compare case-sensitively against `cached_nick`.
pub fn origin_nick(origin: &str) -> &str {
    origin.split('!').next().unwrap_or(origin)
}

pub fn is_self(origin: &str, cached_nick: &str) -> bool {
    origin_nick(origin) == cached_nick
}

/// Parse the `PREFIX=(ov)@+` token out of an ISUPPORT (numeric 005) params
/// list, returning the `mode char -> symbol char` pairs in order.
pub fn parse_prefix_token(params: &[String]) -> Option<Vec<(char, char)>> {
    for param in params {
        let rest = param.strip_prefix("PREFIX=")?;
        let rest = rest.strip_prefix('(')?;
        let (modes, symbols) = rest.split_once(')')?;
        if modes.len() != symbols.len() {
            return None;
        }
        return Some(modes.chars().zip(symbols.chars()).collect());
    }
    None
}

/// Strip any known prefix symbol from a NAMES nickname (spec §4.2
/// "Use that map to strip nickname prefixes from subsequent NAMES output").
pub fn strip_name_prefix(name: &str, prefixes: &[(char, char)]) -> &str {
    if let Some(first) = name.chars().next() {
        if prefixes.iter().any(|(_, symbol)| *symbol == first) {
            return &name[first.len_utf8()..];
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privmsg_to_channel_is_channel_message() {
        let event = parse_line(":nick!u@h PRIVMSG #chan :hello there")
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            Event::ChannelMessage {
                origin: "nick!u@h".to_string(),
                channel: "#chan".to_string(),
                message: "hello there".to_string(),
            }
        );
    }

    #[test]
    fn privmsg_to_nick_is_private_message() {
        let event = parse_line(":nick!u@h PRIVMSG irccd :hi").unwrap().unwrap();
        assert_eq!(
            event,
            Event::PrivateMessage {
                origin: "nick!u@h".to_string(),
                message: "hi".to_string(),
            }
        );
    }

    #[test]
    fn ctcp_action_is_extracted() {
        let event = parse_line(":nick!u@h PRIVMSG #chan :\u{1}ACTION waves\u{1}")
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            Event::CtcpAction {
                origin: "nick!u@h".to_string(),
                channel: "#chan".to_string(),
                message: "waves".to_string(),
            }
        );
    }

    #[test]
    fn ping_carries_token() {
        let event = parse_line("PING :abc123").unwrap().unwrap();
        assert_eq!(event, Event::Ping { token: "abc123".to_string() });
    }

    #[test]
    fn kick_captures_target_and_reason() {
        let event = parse_line(":op!u@h KICK #chan nick :bye").unwrap().unwrap();
        assert_eq!(
            event,
            Event::Kick {
                origin: "op!u@h".to_string(),
                channel: "#chan".to_string(),
                target: "nick".to_string(),
                reason: "bye".to_string(),
            }
        );
    }

    #[test]
    fn numeric_reply_is_preserved() {
        let event = parse_line(":irc.example.net 353 me = #chan :alice @bob")
            .unwrap()
            .unwrap();
        assert!(matches!(event, Event::Numeric { code: 353, .. }));
    }

    #[test]
    fn origin_nick_strips_user_and_host() {
        assert_eq!(origin_nick("alice!a@example.net"), "alice");
        assert_eq!(origin_nick("alice"), "alice");
    }

    #[test]
    fn is_self_is_case_sensitive() {
        assert!(is_self("Alice!a@h", "Alice"));
        assert!(!is_self("Alice!a@h", "alice"));
    }

    #[test]
    fn prefix_token_parses_isupport() {
        let params = vec!["PREFIX=(ov)@+".to_string()];
        let prefixes = parse_prefix_token(&params).unwrap();
        assert_eq!(prefixes, vec![('o', '@'), ('v', '+')]);
    }

    #[test]
    fn strip_name_prefix_removes_known_symbol() {
        let prefixes = vec![('o', '@'), ('v', '+')];
        assert_eq!(strip_name_prefix("@bob", &prefixes), "bob");
        assert_eq!(strip_name_prefix("alice", &prefixes), "alice");
    }
}
