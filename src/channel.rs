//! Broadcast event channels.
//!
//! Every component that emits events owns an [`EventChannel`] instead of inheriting emitter
//! behaviour. Each call to [`EventChannel::subscribe`] creates an independent queue, so every
//! subscriber observes every event emitted after it subscribed. Delivery is deferred: events sit in
//! the subscriber's queue until it drains them, which keeps emitters free of re-entrant callbacks.

use crossbeam::channel::{unbounded, Receiver, Sender, TryRecvError};

/// Subscriber side of an [`EventChannel`]
pub struct Subscription<T> {
    receiver: Receiver<T>,
}

impl<T> Subscription<T> {
    /// Take the next pending event, if any
    pub fn try_next(&self) -> Option<T> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Drain every pending event
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    /// Number of events waiting in this subscription
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

/// Fan-out channel owned by an emitting component
pub struct EventChannel<T: Clone> {
    senders: Vec<Sender<T>>,
    emitted_count: u64,
}

impl<T: Clone> EventChannel<T> {
    /// Create a channel with no subscribers
    pub fn new() -> Self {
        Self {
            senders: Vec::new(),
            emitted_count: 0,
        }
    }

    /// Attach a new subscriber
    pub fn subscribe(&mut self) -> Subscription<T> {
        let (sender, receiver) = unbounded();
        self.senders.push(sender);
        Subscription { receiver }
    }

    /// Send an event to every live subscriber; dropped subscriptions are pruned
    pub fn emit(&mut self, event: T) {
        self.emitted_count += 1;
        self.senders
            .retain(|sender| sender.send(event.clone()).is_ok());
    }

    /// Number of live subscribers (as of the last emit)
    pub fn subscriber_count(&self) -> usize {
        self.senders.len()
    }

    /// Total events emitted over the channel's lifetime
    pub fn emitted_count(&self) -> u64 {
        self.emitted_count
    }

    /// Detach every subscriber
    pub fn clear_subscribers(&mut self) {
        self.senders.clear();
    }
}

impl<T: Clone> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_all_subscribers() {
        let mut channel = EventChannel::new();
        let first = channel.subscribe();
        let second = channel.subscribe();

        channel.emit(7u32);

        assert_eq!(first.drain(), vec![7]);
        assert_eq!(second.drain(), vec![7]);
        assert_eq!(channel.emitted_count(), 1);
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let mut channel = EventChannel::new();
        channel.emit("early");
        let late = channel.subscribe();
        channel.emit("late");

        assert_eq!(late.drain(), vec!["late"]);
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let mut channel = EventChannel::new();
        let kept = channel.subscribe();
        {
            let _dropped = channel.subscribe();
        }
        channel.emit(1u8);

        assert_eq!(channel.subscriber_count(), 1);
        assert_eq!(kept.pending(), 1);
    }
}
