//! Polling scheduler: one independent loop per adapter.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::adapter::Adapter;
use crate::store::Store;

/// Cadence shared by every poll loop.
#[derive(Clone, Copy, Debug)]
pub struct PollSettings {
    pub interval: Duration,
    /// Cap for exponential backoff after consecutive failures; `None` keeps the fixed interval.
    pub max_backoff: Option<Duration>,
}

/// Fetch immediately, then after every delay, until shutdown or store close.
///
/// The in-flight fetch is raced against shutdown, so a hung upstream never
/// outlives teardown; anything that does finish is still gated by the store.
pub(crate) async fn poll_loop(
    mut adapter: Adapter,
    store: Arc<Store>,
    settings: PollSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    let chain = adapter.chain();
    log::info!(
        "{chain}: polling every {:?} ({} mode)",
        settings.interval,
        adapter.mode()
    );
    let mut cycles: u64 = 0;
    loop {
        let snapshot = tokio::select! {
            _ = shutdown.changed() => break,
            snapshot = adapter.fetch() => snapshot,
        };
        cycles += 1;
        if !store.publish(snapshot) {
            break;
        }
        adapter.settle();

        let delay = adapter.next_delay(settings.interval, settings.max_backoff);
        if delay != settings.interval {
            log::info!(
                "{chain}: {} consecutive failures, next poll in {delay:?}",
                adapter.consecutive_failures()
            );
        }
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    log::debug!("{chain}: poller stopped after {cycles} cycles");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::clock::ManualClock;
    use crate::data::{synthetic, ChainData, ChainFetcher, ChainId, SnapshotSource};
    use crate::error::FetchError;

    const NOW: i64 = 1_700_000_000;

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ChainFetcher for Counting {
        fn chain(&self) -> ChainId {
            ChainId::Ethereum
        }

        async fn fetch(&self) -> Result<ChainData, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(synthetic::dataset(ChainId::Ethereum, NOW))
        }
    }

    fn setup() -> (Adapter, Arc<Store>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let clock = Arc::new(ManualClock::new(NOW));
        let adapter = Adapter::live(
            Box::new(Counting {
                calls: calls.clone(),
            }),
            clock.clone(),
            Duration::from_secs(10),
        );
        let store = Arc::new(Store::new(
            ChainId::Ethereum,
            [adapter.fallback()],
            NOW,
        ));
        (adapter, store, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_immediately_then_every_interval() {
        let (adapter, store, calls) = setup();
        let (_tx, rx) = watch::channel(false);
        let settings = PollSettings {
            interval: Duration::from_secs(30),
            max_backoff: None,
        };
        let handle = tokio::spawn(poll_loop(adapter, store.clone(), settings, rx));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.current_view().source, SnapshotSource::Live);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        store.close();
        tokio::time::sleep(Duration::from_secs(30)).await;
        handle.await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_the_timer() {
        let (adapter, store, calls) = setup();
        let (tx, rx) = watch::channel(false);
        let settings = PollSettings {
            interval: Duration::from_secs(30),
            max_backoff: None,
        };
        let handle = tokio::spawn(poll_loop(adapter, store, settings, rx));
        tokio::time::sleep(Duration::from_millis(1)).await;

        tx.send(true).unwrap();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
