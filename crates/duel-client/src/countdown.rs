use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use duel_common::countdown::{Clock, CountdownAnchor, Urgency};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    Study,
    Question,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    Tick {
        timer: Timer,
        anchor: CountdownAnchor,
        remaining: u64,
    },
    Elapsed {
        timer: Timer,
        anchor: CountdownAnchor,
    },
}

/// Ticks a countdown at ~1 Hz. Every tick recomputes the remaining time from
/// the anchor, so skipped or delayed ticks never accumulate drift.
pub struct CountdownSynchronizer {
    timer: Timer,
    clock: Arc<dyn Clock>,
    anchor: Option<CountdownAnchor>,
    cancel: Option<CancellationToken>,
}

impl CountdownSynchronizer {
    pub fn new(timer: Timer, clock: Arc<dyn Clock>) -> Self {
        Self {
            timer,
            clock,
            anchor: None,
            cancel: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.cancel.is_some()
    }

    /// Whether an event stamped with `anchor` comes from the live ticker.
    /// Events still queued from a stopped or replaced ticker do not.
    pub fn owns(&self, anchor: CountdownAnchor) -> bool {
        self.is_running() && self.anchor == Some(anchor)
    }

    pub fn urgency(&self) -> Option<Urgency> {
        let now = self.clock.now_millis();
        self.anchor
            .filter(|_| self.is_running())
            .map(|a| Urgency::from_remaining(a.remaining_seconds(now)))
    }

    /// Start ticking toward `anchor`, replacing any running ticker.
    pub fn start(&mut self, anchor: CountdownAnchor, events: mpsc::UnboundedSender<CountdownEvent>) {
        self.stop();
        let token = CancellationToken::new();
        tracing::debug!(timer = ?self.timer, end_time = anchor.end_time_millis, "countdown started");
        tokio::spawn(tick_loop(
            self.timer,
            anchor,
            self.clock.clone(),
            events,
            token.clone(),
        ));
        self.anchor = Some(anchor);
        self.cancel = Some(token);
    }

    pub fn stop(&mut self) {
        if let Some(token) = self.cancel.take() {
            tracing::debug!(timer = ?self.timer, "countdown stopped");
            token.cancel();
        }
    }
}

impl Drop for CountdownSynchronizer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn tick_loop(
    timer: Timer,
    anchor: CountdownAnchor,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<CountdownEvent>,
    token: CancellationToken,
) {
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }
        let remaining = anchor.remaining_seconds(clock.now_millis());
        if events
            .send(CountdownEvent::Tick {
                timer,
                anchor,
                remaining,
            })
            .is_err()
        {
            break;
        }
        if remaining == 0 {
            let _ = events.send(CountdownEvent::Elapsed { timer, anchor });
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_common::countdown::ManualClock;

    const T0: i64 = 1_700_000_000_000;

    fn tick(timer: Timer, end: i64, remaining: u64) -> CountdownEvent {
        CountdownEvent::Tick {
            timer,
            anchor: CountdownAnchor::at(end),
            remaining,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_follow_the_anchor() {
        let clock = Arc::new(ManualClock::new(T0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sync = CountdownSynchronizer::new(Timer::Study, clock.clone());
        let end = T0 + 3_000;
        sync.start(CountdownAnchor::at(end), tx);

        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            seen.push(event);
            clock.advance(Duration::from_secs(1));
        }
        assert_eq!(
            seen,
            vec![
                tick(Timer::Study, end, 3),
                tick(Timer::Study, end, 2),
                tick(Timer::Study, end, 1),
                tick(Timer::Study, end, 0),
                CountdownEvent::Elapsed {
                    timer: Timer::Study,
                    anchor: CountdownAnchor::at(end),
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_suspended_clock_jump_does_not_drift() {
        let clock = Arc::new(ManualClock::new(T0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sync = CountdownSynchronizer::new(Timer::Question, clock.clone());
        let end = T0 + 15_000;
        sync.start(CountdownAnchor::at(end), tx);

        assert_eq!(rx.recv().await, Some(tick(Timer::Question, end, 15)));
        // The process was asleep for 12 seconds between ticks.
        clock.advance(Duration::from_secs(12));
        assert_eq!(rx.recv().await, Some(tick(Timer::Question, end, 3)));
        assert_eq!(sync.urgency(), Some(Urgency::Critical));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_anchor_finishes_immediately() {
        let clock = Arc::new(ManualClock::new(T0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sync = CountdownSynchronizer::new(Timer::Study, clock);
        let end = T0 - 5_000;
        sync.start(CountdownAnchor::at(end), tx);
        assert_eq!(rx.recv().await, Some(tick(Timer::Study, end, 0)));
        assert_eq!(
            rx.recv().await,
            Some(CountdownEvent::Elapsed {
                timer: Timer::Study,
                anchor: CountdownAnchor::at(end),
            })
        );
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_releases_the_ticker() {
        let clock = Arc::new(ManualClock::new(T0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sync = CountdownSynchronizer::new(Timer::Study, clock);
        sync.start(CountdownAnchor::at(T0 + 60_000), tx);
        assert!(sync.is_running());
        assert!(rx.recv().await.is_some());

        sync.stop();
        assert!(!sync.is_running());
        assert_eq!(sync.urgency(), None);
        // The task drops its sender once cancelled.
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_anchor() {
        let clock = Arc::new(ManualClock::new(T0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sync = CountdownSynchronizer::new(Timer::Study, clock);
        sync.start(CountdownAnchor::at(T0 + 60_000), tx.clone());
        sync.start(CountdownAnchor::at(T0 + 30_000), tx);
        assert!(sync.owns(CountdownAnchor::at(T0 + 30_000)));
        assert!(!sync.owns(CountdownAnchor::at(T0 + 60_000)));
        assert_eq!(rx.recv().await, Some(tick(Timer::Study, T0 + 30_000, 30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_ticks_are_stale_after_stop_or_restart() {
        let clock = Arc::new(ManualClock::new(T0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sync = CountdownSynchronizer::new(Timer::Question, clock.clone());
        let first = CountdownAnchor::at(T0 + 15_000);
        sync.start(first, tx.clone());
        let queued = rx.recv().await;
        assert_eq!(queued, Some(tick(Timer::Question, T0 + 15_000, 15)));
        assert!(sync.owns(first));

        sync.stop();
        assert!(!sync.owns(first));

        clock.advance(Duration::from_secs(2));
        let second = CountdownAnchor::at(T0 + 17_000);
        sync.start(second, tx);
        assert!(!sync.owns(first));
        assert!(sync.owns(second));
    }
}
