//! Timer service (spec §5 "background threads exist only for timers").
//!
//! Timers never touch daemon state directly — they only post closures
//! (here, `DispatchEvent`s) back to the dispatch task over its channel,
//! the same rule every other background task in this daemon follows.
//! Kept from the watchdog-timer pattern this module replaces: one cancel
//! channel per running timer, a spawned task per timer, fire-and-forget
//! from the registrar's point of view.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// A running or one-shot timer, identified for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Registers timers and hands back [`TimerId`]s that can be cancelled.
pub struct TimerService {
    next_id: u64,
    cancels: std::collections::HashMap<TimerId, oneshot::Sender<()>>,
}

impl Default for TimerService {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerService {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            cancels: std::collections::HashMap::new(),
        }
    }

    /// Fire `event` once after `delay`.
    pub fn after<T>(&mut self, delay: Duration, event: T, sink: mpsc::UnboundedSender<T>) -> TimerId
    where
        T: Send + 'static,
    {
        let id = self.alloc_id();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.cancels.insert(id, cancel_tx);
        tokio::spawn(one_shot(delay, event, sink, cancel_rx));
        id
    }

    /// Fire `make_event()` every `period`, until cancelled. `make_event` is
    /// called fresh on each tick so periodic timers can carry a counter or
    /// timestamp without the service needing to know their payload shape.
    pub fn every<T, F>(&mut self, period: Duration, make_event: F, sink: mpsc::UnboundedSender<T>) -> TimerId
    where
        T: Send + 'static,
        F: Fn() -> T + Send + 'static,
    {
        let id = self.alloc_id();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.cancels.insert(id, cancel_tx);
        tokio::spawn(periodic(period, make_event, sink, cancel_rx));
        id
    }

    /// Cancel a timer. No-op if it already fired or doesn't exist.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        if let Some(tx) = self.cancels.remove(&id) {
            let _ = tx.send(());
            debug!(timer = id.0, "timer cancelled");
            true
        } else {
            false
        }
    }

    fn alloc_id(&mut self) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        id
    }
}

async fn one_shot<T: Send + 'static>(
    delay: Duration,
    event: T,
    sink: mpsc::UnboundedSender<T>,
    mut cancel: oneshot::Receiver<()>,
) {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {
            let _ = sink.send(event);
        }
        _ = &mut cancel => {}
    }
}

async fn periodic<T, F>(
    period: Duration,
    make_event: F,
    sink: mpsc::UnboundedSender<T>,
    mut cancel: oneshot::Receiver<()>,
) where
    T: Send + 'static,
    F: Fn() -> T + Send + 'static,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if sink.send(make_event()).is_err() {
                    return;
                }
            }
            _ = &mut cancel => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn after_fires_once_past_the_delay() {
        let mut timers = TimerService::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        timers.after(Duration::from_millis(5), "fired", tx);
        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(received, Some("fired"));
    }

    #[tokio::test]
    async fn cancel_prevents_a_pending_one_shot_from_firing() {
        let mut timers = TimerService::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = timers.after(Duration::from_millis(50), "fired", tx);
        assert!(timers.cancel(id));
        let result = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn every_fires_multiple_times_until_cancelled() {
        let mut timers = TimerService::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = timers.every(Duration::from_millis(5), || "tick", tx);
        for _ in 0..3 {
            let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap();
            assert_eq!(received, Some("tick"));
        }
        timers.cancel(id);
    }
}
