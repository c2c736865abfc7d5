//! Multi-subscriber notification channel.

use std::sync::{Mutex, MutexGuard, PoisonError};

use flume::{Receiver, Sender};

/// Fan-out signal backed by one unbounded `flume` channel per subscriber.
///
/// Once closed, emissions are dropped and new subscribers receive an
/// already-disconnected receiver.
pub(crate) struct Signal<T> {
    state: Mutex<SignalState<T>>,
}

struct SignalState<T> {
    subscribers: Vec<Sender<T>>,
    closed: bool,
}

impl<T: Clone> Signal<T> {
    pub(crate) const fn new() -> Self {
        Self {
            state: Mutex::new(SignalState {
                subscribers: Vec::new(),
                closed: false,
            }),
        }
    }

    pub(crate) fn subscribe(&self) -> Receiver<T> {
        let (sender, receiver) = flume::unbounded();
        let mut state = self.lock();
        if !state.closed {
            state.subscribers.push(sender);
        }
        receiver
    }

    /// Delivers `value` to every live subscriber and returns how many
    /// received it. Subscribers whose receiver was dropped are pruned.
    pub(crate) fn emit(&self, value: &T) -> usize {
        let mut state = self.lock();
        if state.closed {
            return 0;
        }
        state
            .subscribers
            .retain(|subscriber| subscriber.send(value.clone()).is_ok());
        state.subscribers.len()
    }

    /// Disconnects all subscribers and ignores later emissions.
    pub(crate) fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.subscribers.clear();
    }

    fn lock(&self) -> MutexGuard<'_, SignalState<T>> {
        // A panicking subscriber cannot leave the list inconsistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn fans_out_to_every_subscriber() {
        let signal = Signal::new();
        let first = signal.subscribe();
        let second = signal.subscribe();

        assert_eq!(signal.emit(&7_u8), 2);
        assert_eq!(first.try_recv().ok(), Some(7));
        assert_eq!(second.try_recv().ok(), Some(7));
    }

    #[rstest]
    fn prunes_dropped_subscribers() {
        let signal = Signal::new();
        let kept = signal.subscribe();
        drop(signal.subscribe());

        assert_eq!(signal.emit(&1_u8), 1);
        assert_eq!(kept.try_recv().ok(), Some(1));
    }

    #[rstest]
    fn closed_signals_disconnect_and_drop_emissions() {
        let signal = Signal::new();
        let early = signal.subscribe();
        signal.close();

        assert_eq!(signal.emit(&1_u8), 0);
        assert!(early.try_recv().is_err());
        assert!(early.is_disconnected());
        assert!(signal.subscribe().is_disconnected());
    }
}
