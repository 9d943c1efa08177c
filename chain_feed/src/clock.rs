//! Live ages: one formatter, one time source, no I/O.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::data::{Tick, TickHub};
use crate::store::Store;

/// Seconds since `timestamp` as a short relative string.
/// Future timestamps (clock skew) read as `0s ago`.
pub fn age(timestamp: i64, now: i64) -> String {
    format_age(now.saturating_sub(timestamp).max(0) as u64)
}

pub fn format_age(secs: u64) -> String {
    if secs < 60 {
        format!("{secs}s ago")
    } else if secs < 3_600 {
        format!("{}m {}s ago", secs / 60, secs % 60)
    } else if secs < 86_400 {
        format!("{}h {}m ago", secs / 3_600, (secs / 60) % 60)
    } else {
        format!("{}d {}h ago", secs / 86_400, (secs / 3_600) % 24)
    }
}

/// Source of "now" in Unix seconds.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> i64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Hand-driven clock for tests and replays.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self(Arc::new(AtomicI64::new(now)))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// The shared 1 Hz ticker: recompute every cached age, then notify subscribers.
/// Never touches the network; exits on shutdown or once the store is closed.
pub(crate) async fn run_ticker(
    store: Arc<Store>,
    hub: Arc<TickHub>,
    clock: Arc<dyn Clock>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut timer = tokio::time::interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut seq = 0;
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = timer.tick() => {}
        }
        let now = clock.now();
        let Some(refreshed) = store.refresh_ages(now) else {
            break;
        };
        seq += 1;
        log::trace!("tick {seq}: {refreshed} ages at {now}");
        hub.broadcast(Tick { now, seq });
    }
    log::debug!("ticker stopped after {seq} ticks");
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn age_buckets() {
        assert_eq!(age(NOW - 45, NOW), "45s ago");
        assert_eq!(age(NOW - 125, NOW), "2m 5s ago");
        assert_eq!(age(NOW - 7384, NOW), "2h 3m ago");
        assert_eq!(age(NOW - 90000, NOW), "1d 1h ago");
    }

    #[test]
    fn age_boundaries() {
        assert_eq!(format_age(59), "59s ago");
        assert_eq!(format_age(60), "1m 0s ago");
        assert_eq!(format_age(3_600), "1h 0m ago");
        assert_eq!(format_age(86_400), "1d 0h ago");
    }

    #[test]
    fn future_timestamps_clamp_to_zero() {
        assert_eq!(age(NOW + 30, NOW), "0s ago");
    }

    #[test]
    fn same_instant_same_string() {
        let clock = ManualClock::new(NOW);
        let first = age(NOW - 125, clock.now());
        let second = age(NOW - 125, clock.now());
        assert_eq!(first, second);

        clock.advance(1);
        assert_eq!(age(NOW - 125, clock.now()), "2m 6s ago");
    }
}
