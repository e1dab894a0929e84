//! Network reachability as seen by the rest of the system.

use futures::Stream;
use std::pin::Pin;
use tokio::sync::watch;

pub type ConnectivityStream = Pin<Box<dyn Stream<Item = bool> + Send + 'static>>;

/// Point-in-time reachability plus a push stream of transitions. Each call to
/// `observe_changes` yields a fresh, independent stream.
pub trait ConnectivityObserver: Send + Sync {
    fn is_available(&self) -> bool;
    fn observe_changes(&self) -> ConnectivityStream;
}

/// Watch-channel backed observer. Whoever holds the handle (platform glue in
/// production, the test harness in tests) flips availability; subscribers see
/// each transition exactly once.
#[derive(Clone)]
pub struct ConnectivityHandle {
    tx: watch::Sender<bool>,
}

impl ConnectivityHandle {
    pub fn new(initially_available: bool) -> Self {
        let (tx, _) = watch::channel(initially_available);
        Self { tx }
    }

    pub fn set_available(&self, available: bool) {
        self.tx.send_if_modified(|current| {
            let changed = *current != available;
            *current = available;
            changed
        });
    }
}

impl ConnectivityObserver for ConnectivityHandle {
    fn is_available(&self) -> bool {
        *self.tx.borrow()
    }

    fn observe_changes(&self) -> ConnectivityStream {
        let rx = self.tx.subscribe();
        Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let value = *rx.borrow_and_update();
            Some((value, rx))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_point_in_time_state() {
        let handle = ConnectivityHandle::new(true);
        assert!(handle.is_available());

        handle.set_available(false);
        assert!(!handle.is_available());
    }

    #[tokio::test]
    async fn test_stream_emits_transitions() {
        let handle = ConnectivityHandle::new(true);
        let mut stream = handle.observe_changes();

        handle.set_available(false);
        assert_eq!(stream.next().await, Some(false));

        handle.set_available(true);
        assert_eq!(stream.next().await, Some(true));
    }

    #[tokio::test]
    async fn test_stream_skips_redundant_updates() {
        let handle = ConnectivityHandle::new(true);
        let mut stream = handle.observe_changes();

        // No transition, nothing to deliver
        handle.set_available(true);
        handle.set_available(false);
        assert_eq!(stream.next().await, Some(false));
    }

    #[tokio::test]
    async fn test_streams_are_independent() {
        let handle = ConnectivityHandle::new(true);
        let mut first = handle.observe_changes();
        handle.set_available(false);
        assert_eq!(first.next().await, Some(false));

        // A later subscriber starts from the current value and only sees new
        // transitions
        let mut second = handle.observe_changes();
        handle.set_available(true);
        assert_eq!(second.next().await, Some(true));
    }
}
