use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender, TrySendError};

/// Emitted once per clock tick after ages were recomputed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tick {
    /// Unix seconds the ages were computed against.
    pub now: i64,
    pub seq: u64,
}

const TICK_BUFFER: usize = 4;

#[derive(Default)]
struct Subscribers {
    senders: Vec<Sender<Tick>>,
    closed: bool,
}

/// Fan-out of tick notifications to any number of consumers.
/// Each subscriber owns a small bounded channel; a slow reader just misses
/// ticks, and a dropped receiver is pruned on the next broadcast.
#[derive(Default)]
pub struct TickHub {
    subscribers: Mutex<Subscribers>,
}

impl TickHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Once the hub is closed the returned receiver is already disconnected.
    pub fn subscribe(&self) -> Receiver<Tick> {
        let (tx, rx) = crossbeam_channel::bounded(TICK_BUFFER);
        let mut subscribers = self.lock();
        if !subscribers.closed {
            subscribers.senders.push(tx);
        }
        rx
    }

    /// Deliver `tick` to every live subscriber.
    pub fn broadcast(&self, tick: Tick) {
        self.lock().senders.retain(|tx| match tx.try_send(tick) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Drop every sender so subscribers observe disconnection, now and later.
    pub fn close(&self) {
        let mut subscribers = self.lock();
        subscribers.closed = true;
        subscribers.senders.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().senders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_sees_the_tick() {
        let hub = TickHub::new();
        let a = hub.subscribe();
        let b = hub.subscribe();

        hub.broadcast(Tick { now: 10, seq: 1 });

        assert_eq!(a.try_recv().unwrap(), Tick { now: 10, seq: 1 });
        assert_eq!(b.try_recv().unwrap().seq, 1);
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let hub = TickHub::new();
        let kept = hub.subscribe();
        drop(hub.subscribe());

        hub.broadcast(Tick { now: 1, seq: 1 });

        assert_eq!(hub.subscriber_count(), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn slow_reader_does_not_block_broadcast() {
        let hub = TickHub::new();
        let slow = hub.subscribe();
        for seq in 0..(TICK_BUFFER as u64 * 3) {
            hub.broadcast(Tick { now: seq as i64, seq });
        }
        assert_eq!(slow.len(), TICK_BUFFER);
    }

    #[test]
    fn close_disconnects_subscribers() {
        let hub = TickHub::new();
        let rx = hub.subscribe();
        hub.close();
        assert!(rx.recv().is_err());
    }

    #[test]
    fn subscribing_after_close_is_disconnected() {
        let hub = TickHub::new();
        hub.close();

        let late = hub.subscribe();
        hub.broadcast(Tick { now: 1, seq: 1 });

        assert!(hub.is_closed());
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(late.recv(), Err(crossbeam_channel::RecvError));
    }
}
