//! Per-network connection state machine (spec §4.2, §9 "State machines
//! over virtual dispatch").
//!
//! The original source models `Disconnected`/`Connecting`/`Connected` as
//! three polymorphic classes (`server-state-*.cpp`). Per spec §9's own
//! recommendation, this is ported as a tagged enum plus a pure `step()`
//! function whose arms mirror that table exactly — no heap allocation per
//! transition, and the match is exhaustive at compile time.
//!
//! `step()` never mutates anything; it is called once per dispatch-loop
//! tick with the current state and timing facts, and returns the *staged*
//! next state plus any side effect the caller (`server::Server`) must
//! perform. The caller commits the staged state in `update()`, guaranteeing
//! at most one transition per tick (spec §3 "Server invariants").

use std::time::{Duration, Instant};

use irccd_protocol::ServerSettings;

/// Connection state (spec §3 "Server runtime state").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
}

/// Side effect `step()` asks the caller to perform this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Nothing to do.
    None,
    /// Close any residual codec session and begin a fresh non-blocking
    /// connect (spec §4.2 Disconnected "close any residual codec session").
    BeginConnect,
    /// The connect attempt exceeded `reconnect_delay_sec * 1000` ms without
    /// the codec reporting success (spec §4.2 Connecting).
    ConnectTimedOut,
    /// Either the codec no longer reports connected, or
    /// `now - last_activity >= ping_timeout_sec` (spec §4.2 Connected,
    /// §3 "ping watchdog").
    PingTimedOut,
    /// `reconnect_tries == 0`, or the attempt counter has reached a
    /// non-negative `reconnect_tries` (spec §3 "Reconnection honors
    /// reconnect_tries"). The server must be torn down with a `died`
    /// signal and removed (spec §4.2 "Failure semantics").
    RetriesExhausted,
}

/// Timing facts `step()` needs; owned by `server::Server`.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// When the current state was entered (used for both the
    /// disconnect-delay and the connect-timeout checks).
    pub state_entered: Instant,
    /// Last time any byte was received on this connection (ping watchdog).
    pub last_activity: Instant,
    /// How many reconnect attempts have been made since the server last
    /// successfully connected.
    pub reconnect_attempts: u32,
}

/// One logical tick of the state machine (spec §4.2 `prepare`).
///
/// `codec_connected` reports whether the underlying IRC codec still
/// considers the socket connected (Connecting/Connected states only).
pub fn step(
    state: ConnState,
    timing: &Timing,
    settings: &ServerSettings,
    now: Instant,
    codec_connected: bool,
) -> (ConnState, Effect) {
    match state {
        ConnState::Disconnected => step_disconnected(timing, settings, now),
        ConnState::Connecting => step_connecting(timing, settings, now, codec_connected),
        ConnState::Connected => step_connected(timing, settings, now, codec_connected),
    }
}

fn step_disconnected(
    timing: &Timing,
    settings: &ServerSettings,
    now: Instant,
) -> (ConnState, Effect) {
    if retries_exhausted(settings.reconnect_tries, timing.reconnect_attempts) {
        return (ConnState::Disconnected, Effect::RetriesExhausted);
    }
    let delay = Duration::from_secs(settings.reconnect_delay_sec as u64);
    if now.saturating_duration_since(timing.state_entered) >= delay {
        return (ConnState::Connecting, Effect::BeginConnect);
    }
    (ConnState::Disconnected, Effect::None)
}

fn step_connecting(
    timing: &Timing,
    settings: &ServerSettings,
    now: Instant,
    codec_connected: bool,
) -> (ConnState, Effect) {
    if codec_connected {
        // `on_connect` (handled by the caller) stages Connected; step()
        // itself never observes success, only timeout.
        return (ConnState::Connecting, Effect::None);
    }
    let timeout = Duration::from_millis(settings.reconnect_delay_sec as u64 * 1000);
    if now.saturating_duration_since(timing.state_entered) >= timeout {
        return (ConnState::Disconnected, Effect::ConnectTimedOut);
    }
    (ConnState::Connecting, Effect::None)
}

fn step_connected(
    timing: &Timing,
    settings: &ServerSettings,
    now: Instant,
    codec_connected: bool,
) -> (ConnState, Effect) {
    if !codec_connected {
        return (ConnState::Disconnected, Effect::PingTimedOut);
    }
    let timeout = Duration::from_secs(settings.ping_timeout_sec as u64);
    if now.saturating_duration_since(timing.last_activity) >= timeout {
        return (ConnState::Disconnected, Effect::PingTimedOut);
    }
    (ConnState::Connected, Effect::None)
}

/// spec §9: `reconnect_tries == -1` is infinite, `== 0` is never, and these
/// two must stay asymmetric (never collapse to the same bounds check).
fn retries_exhausted(reconnect_tries: i32, attempts: u32) -> bool {
    if reconnect_tries == 0 {
        return true;
    }
    if reconnect_tries < 0 {
        return false;
    }
    attempts as i64 >= reconnect_tries as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(tries: i32) -> ServerSettings {
        ServerSettings {
            reconnect_tries: tries,
            reconnect_delay_sec: 5,
            ping_timeout_sec: 10,
            command_char: '!',
        }
    }

    fn timing(entered_secs_ago: u64, activity_secs_ago: u64, attempts: u32) -> (Timing, Instant) {
        let now = Instant::now();
        let timing = Timing {
            state_entered: now - Duration::from_secs(entered_secs_ago),
            last_activity: now - Duration::from_secs(activity_secs_ago),
            reconnect_attempts: attempts,
        };
        (timing, now)
    }

    #[test]
    fn disconnected_waits_out_the_delay_before_reconnecting() {
        let (timing, now) = timing(1, 0, 0);
        let (state, effect) = step(ConnState::Disconnected, &timing, &settings(-1), now, false);
        assert_eq!(state, ConnState::Disconnected);
        assert_idle(effect);
    }

    #[test]
    fn disconnected_reconnects_after_delay_elapses() {
        let (timing, now) = timing(5, 0, 0);
        let (state, effect) = step(ConnState::Disconnected, &timing, &settings(-1), now, false);
        assert_eq!(state, ConnState::Connecting);
        assert_eq!(effect, Effect::BeginConnect);
    }

    #[test]
    fn reconnect_tries_zero_means_never() {
        let (timing, now) = timing(100, 0, 0);
        let (_, effect) = step(ConnState::Disconnected, &timing, &settings(0), now, false);
        assert_eq!(effect, Effect::RetriesExhausted);
    }

    #[test]
    fn reconnect_tries_negative_one_means_infinite() {
        let (timing, now) = timing(5, 0, 1_000_000);
        let (state, effect) = step(ConnState::Disconnected, &timing, &settings(-1), now, false);
        assert_eq!(state, ConnState::Connecting);
        assert_eq!(effect, Effect::BeginConnect);
    }

    #[test]
    fn reconnect_attempts_exhaust_positive_budget() {
        let (timing, now) = timing(5, 0, 3);
        let (_, effect) = step(ConnState::Disconnected, &timing, &settings(3), now, false);
        assert_eq!(effect, Effect::RetriesExhausted);
    }

    #[test]
    fn connecting_times_out_in_milliseconds_of_reconnect_delay() {
        let (timing, now) = timing(5, 0, 0);
        let (state, effect) = step(ConnState::Connecting, &timing, &settings(-1), now, false);
        assert_eq!(state, ConnState::Disconnected);
        assert_eq!(effect, Effect::ConnectTimedOut);
    }

    #[test]
    fn connecting_stays_put_while_within_timeout_and_not_yet_connected() {
        let (timing, now) = timing(1, 0, 0);
        let (state, effect) = step(ConnState::Connecting, &timing, &settings(-1), now, false);
        assert_eq!(state, ConnState::Connecting);
        assert_idle(effect);
    }

    #[test]
    fn connecting_holds_once_codec_reports_connected() {
        let (timing, now) = timing(100, 0, 0);
        let (state, effect) = step(ConnState::Connecting, &timing, &settings(-1), now, true);
        assert_eq!(state, ConnState::Connecting);
        assert_idle(effect);
    }

    #[test]
    fn connected_pings_out_after_inactivity() {
        let (timing, now) = timing(0, 10, 0);
        let (state, effect) = step(ConnState::Connected, &timing, &settings(-1), now, true);
        assert_eq!(state, ConnState::Disconnected);
        assert_eq!(effect, Effect::PingTimedOut);
    }

    #[test]
    fn connected_survives_recent_activity() {
        let (timing, now) = timing(0, 1, 0);
        let (state, effect) = step(ConnState::Connected, &timing, &settings(-1), now, true);
        assert_eq!(state, ConnState::Connected);
        assert_idle(effect);
    }

    #[test]
    fn connected_drops_if_codec_reports_disconnected() {
        let (timing, now) = timing(0, 0, 0);
        let (state, effect) = step(ConnState::Connected, &timing, &settings(-1), now, false);
        assert_eq!(state, ConnState::Disconnected);
        assert_eq!(effect, Effect::PingTimedOut);
    }

    fn assert_idle(effect: Effect) {
        assert_eq!(effect, Effect::None);
    }
}
