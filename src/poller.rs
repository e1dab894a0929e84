//! Background polling of the rates feed.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::rates::{RateSnapshot, RateStore};
use crate::source::{FetchError, RatesSource};

/// Receives the outcome of every fetch attempt. Implementations must not
/// block; they run on the polling task.
pub trait FetchObserver: Send + Sync {
    fn fetch_started(&self);
    fn fetch_succeeded(&self, snapshot: &RateSnapshot);
    fn fetch_failed(&self, error: &FetchError);
}

/// Fetches the rates feed on a fixed cadence and keeps the store current.
///
/// One fetch is in flight at a time; the delay runs from fetch completion, so
/// a slow fetch pushes the next one out rather than overlapping it. A failed
/// fetch leaves the previous snapshot in place and is reported to the
/// observer; the loop tries again after the same fixed delay.
pub struct RatePoller {
    source: Arc<dyn RatesSource>,
    store: Arc<RateStore>,
    observer: Arc<dyn FetchObserver>,
    interval: Duration,
    refresh: Arc<Notify>,
}

impl RatePoller {
    pub fn new(
        source: Arc<dyn RatesSource>,
        store: Arc<RateStore>,
        observer: Arc<dyn FetchObserver>,
        interval: Duration,
        refresh: Arc<Notify>,
    ) -> Self {
        Self {
            source,
            store,
            observer,
            interval,
            refresh,
        }
    }

    /// Starts the loop on the current runtime. The first fetch fires
    /// immediately.
    pub fn spawn(self) -> PollerHandle {
        let task = tokio::spawn(self.run());
        PollerHandle { task }
    }

    async fn run(self) {
        loop {
            self.fetch_once().await;
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                // A manual refresh just shortens the wait; it never overlaps
                // an in-flight fetch
                _ = self.refresh.notified() => {
                    debug!("Refresh requested, fetching early");
                }
            }
        }
    }

    async fn fetch_once(&self) {
        self.observer.fetch_started();
        match self.source.fetch_rates().await {
            Ok(resp) => {
                let snapshot =
                    RateSnapshot::from_response(resp, chrono::Utc::now().timestamp_millis());
                self.store.replace(snapshot.clone());
                self.observer.fetch_succeeded(&snapshot);
            }
            Err(e) => {
                warn!(error = %e, "Rates fetch failed");
                self.observer.fetch_failed(&e);
            }
        }
    }
}

/// Owns the polling task. `stop` cancels it at its next suspension point and
/// may be called any number of times.
pub struct PollerHandle {
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RatesResponse;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    #[derive(Debug)]
    enum Event {
        Started,
        Succeeded(RateSnapshot),
        Failed(FetchError),
    }

    struct ChannelObserver {
        tx: mpsc::UnboundedSender<Event>,
    }

    impl FetchObserver for ChannelObserver {
        fn fetch_started(&self) {
            let _ = self.tx.send(Event::Started);
        }
        fn fetch_succeeded(&self, snapshot: &RateSnapshot) {
            let _ = self.tx.send(Event::Succeeded(snapshot.clone()));
        }
        fn fetch_failed(&self, error: &FetchError) {
            let _ = self.tx.send(Event::Failed(error.clone()));
        }
    }

    struct StaticSource {
        result: Result<RatesResponse, FetchError>,
    }

    #[async_trait]
    impl RatesSource for StaticSource {
        async fn fetch_rates(&self) -> Result<RatesResponse, FetchError> {
            self.result.clone()
        }
    }

    struct Harness {
        store: Arc<RateStore>,
        refresh: Arc<Notify>,
        rx: mpsc::UnboundedReceiver<Event>,
        handle: PollerHandle,
    }

    fn start_poller(result: Result<RatesResponse, FetchError>, interval: Duration) -> Harness {
        let store = Arc::new(RateStore::new(RateSnapshot::empty("EUR")));
        let refresh = Arc::new(Notify::new());
        let (tx, rx) = mpsc::unbounded_channel();

        let poller = RatePoller::new(
            Arc::new(StaticSource { result }),
            Arc::clone(&store),
            Arc::new(ChannelObserver { tx }),
            interval,
            Arc::clone(&refresh),
        );
        let handle = poller.spawn();

        Harness {
            store,
            refresh,
            rx,
            handle,
        }
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for poller event")
            .expect("poller event channel closed")
    }

    fn response(base: &str, rates: &[(&str, f64)]) -> RatesResponse {
        RatesResponse {
            base: base.to_string(),
            date: "2024-01-02".to_string(),
            rates: rates
                .iter()
                .map(|(code, rate)| (code.to_string(), *rate))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_success_replaces_store() {
        let mut harness = start_poller(
            Ok(response("EUR", &[("USD", 1.2)])),
            Duration::from_secs(3600),
        );

        assert!(matches!(next_event(&mut harness.rx).await, Event::Started));
        match next_event(&mut harness.rx).await {
            Event::Succeeded(snapshot) => {
                assert_eq!(snapshot.base, "EUR");
                assert_eq!(snapshot.quotes.get("USD"), Some(&1.2));
                assert!(snapshot.fetched_at_millis > 0);
            }
            other => panic!("expected success, got {other:?}"),
        }
        assert_eq!(harness.store.get().quotes.get("USD"), Some(&1.2));

        harness.handle.stop();
    }

    #[tokio::test]
    async fn test_failures_never_touch_store() {
        let mut harness = start_poller(
            Err(FetchError::Api("boom".to_string())),
            Duration::from_millis(5),
        );

        let mut failures = 0;
        while failures < 3 {
            if let Event::Failed(e) = next_event(&mut harness.rx).await {
                assert!(e.to_string().contains("boom"));
                failures += 1;
            }
        }

        let snapshot = harness.store.get();
        assert_eq!(snapshot, RateSnapshot::empty("EUR"));

        harness.handle.stop();
    }

    #[tokio::test]
    async fn test_refresh_shortens_the_wait() {
        let mut harness = start_poller(
            Ok(response("EUR", &[("USD", 1.2)])),
            Duration::from_secs(3600),
        );

        assert!(matches!(next_event(&mut harness.rx).await, Event::Started));
        assert!(matches!(
            next_event(&mut harness.rx).await,
            Event::Succeeded(_)
        ));

        // Without the nudge the next fetch would be an hour away
        harness.refresh.notify_one();
        assert!(matches!(next_event(&mut harness.rx).await, Event::Started));

        harness.handle.stop();
    }

    #[tokio::test]
    async fn test_stop_halts_the_loop() {
        let mut harness = start_poller(
            Ok(response("EUR", &[("USD", 1.2)])),
            Duration::from_millis(5),
        );

        assert!(matches!(next_event(&mut harness.rx).await, Event::Started));
        harness.handle.stop();
        // stop is idempotent
        harness.handle.stop();

        // Drain anything already in flight, then confirm silence
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(harness.handle.is_stopped());
        while harness.rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(harness.rx.try_recv().is_err());
    }
}
