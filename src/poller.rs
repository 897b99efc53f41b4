//! Periodic collection polling.
//!
//! A poll loop fetches one named collection immediately and then once per
//! interval until cancelled. Every tick is an independent request, so slow
//! responses may overlap and complete out of order:
//! - Each request carries a monotonic sequence number; a response older than
//!   the last applied one is dropped instead of overwriting newer data
//! - A failed tick is reported and the loop carries on
//! - Cancelling is synchronous: once `cancel()` returns, no callback runs,
//!   even for requests that were already in flight
//!
//! The transport sits behind [`CollectionSource`] so the loop does not care
//! whether rows come from HTTP, a push channel or a test double.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::table::Snapshot;

/// How long `shutdown` waits for in-flight requests before giving up on them
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Classified fetch failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The request never completed (DNS, connect, timeout, reset)
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status
    #[error("server returned HTTP {0}")]
    HttpStatus(u16),

    /// The body was not the expected JSON
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Short machine-readable classification (`network`, `http-status:404`, `decode`).
    #[must_use]
    pub fn kind(&self) -> String {
        match self {
            FetchError::Network(_) => "network".to_string(),
            FetchError::HttpStatus(code) => format!("http-status:{}", code),
            FetchError::Decode(_) => "decode".to_string(),
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, FetchError::HttpStatus(401))
    }
}

/// Something that can produce the current contents of a named collection.
pub trait CollectionSource: Send + Sync + 'static {
    type Row: Send + Sync + 'static;

    fn fetch(
        &self,
        collection: &str,
    ) -> impl Future<Output = Result<Vec<Self::Row>, FetchError>> + Send;
}

type SnapshotCallback<R> = Box<dyn FnMut(Snapshot<R>) + Send>;
type ErrorCallback = Box<dyn FnMut(FetchError) + Send>;

/// Delivery gate shared by all ticks of one poll loop.
struct Delivery<R> {
    cancelled: bool,
    /// Sequence number of the newest response handed to a callback
    last_delivered: u64,
    on_snapshot: SnapshotCallback<R>,
    on_error: ErrorCallback,
}

impl<R> Delivery<R> {
    fn deliver(&mut self, seq: u64, result: Result<Vec<R>, FetchError>) {
        if self.cancelled {
            tracing::debug!("Dropping tick {} response after cancel", seq);
            return;
        }
        if seq <= self.last_delivered {
            tracing::debug!(
                "Dropping stale tick {} response (tick {} already applied)",
                seq,
                self.last_delivered
            );
            return;
        }
        self.last_delivered = seq;

        match result {
            Ok(rows) => {
                tracing::debug!("Tick {} delivered {} rows", seq, rows.len());
                (self.on_snapshot)(Arc::<[R]>::from(rows));
            }
            Err(e) => {
                tracing::warn!("Tick {} failed: {}", seq, e);
                (self.on_error)(e);
            }
        }
    }
}

fn lock<R>(delivery: &Mutex<Delivery<R>>) -> MutexGuard<'_, Delivery<R>> {
    // A panicking callback must not wedge cancellation
    delivery.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a running poll loop. Dropping it cancels the loop.
pub struct PollHandle<R> {
    cancel: CancellationToken,
    refresh: Arc<Notify>,
    delivery: Arc<Mutex<Delivery<R>>>,
    tracker: TaskTracker,
}

impl<R> PollHandle<R> {
    /// Fetch now instead of waiting for the next tick (e.g. after a write).
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    /// Stop polling. No callback runs after this returns.
    ///
    /// Must not be called from inside a callback of the same loop.
    pub fn cancel(&self) {
        lock(&self.delivery).cancelled = true;
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel and wait briefly for the loop and in-flight requests to wind down.
    pub async fn shutdown(&self) {
        self.cancel();
        self.tracker.close();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::debug!("Poll tasks did not stop in time; they will be dropped");
        }
    }
}

impl<R> Drop for PollHandle<R> {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Start polling `collection` from `source` every `interval`.
///
/// The first fetch is issued immediately. `on_snapshot` receives every
/// successful result as a full replacement; `on_error` receives failures,
/// which never stop the loop. Must be called inside a tokio runtime.
pub fn poll<S, F, E>(
    source: Arc<S>,
    collection: &str,
    interval: Duration,
    on_snapshot: F,
    on_error: E,
) -> PollHandle<S::Row>
where
    S: CollectionSource,
    F: FnMut(Snapshot<S::Row>) + Send + 'static,
    E: FnMut(FetchError) + Send + 'static,
{
    let cancel = CancellationToken::new();
    let refresh = Arc::new(Notify::new());
    let tracker = TaskTracker::new();
    let delivery = Arc::new(Mutex::new(Delivery {
        cancelled: false,
        last_delivered: 0,
        on_snapshot: Box::new(on_snapshot),
        on_error: Box::new(on_error),
    }));

    // A zero period would panic inside tokio's interval
    let interval = interval.max(Duration::from_millis(1));

    tracker.spawn(run_loop(
        source,
        collection.to_string(),
        interval,
        cancel.clone(),
        refresh.clone(),
        delivery.clone(),
        tracker.clone(),
    ));

    PollHandle {
        cancel,
        refresh,
        delivery,
        tracker,
    }
}

async fn run_loop<S: CollectionSource>(
    source: Arc<S>,
    collection: String,
    interval: Duration,
    cancel: CancellationToken,
    refresh: Arc<Notify>,
    delivery: Arc<Mutex<Delivery<S::Row>>>,
    tracker: TaskTracker,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
            _ = refresh.notified() => {
                // Manual refresh restarts the period
                ticker.reset();
            }
        }

        seq += 1;
        tracing::debug!("Polling {} (tick {})", collection, seq);

        let source = source.clone();
        let collection = collection.clone();
        let cancel = cancel.clone();
        let delivery = delivery.clone();
        tracker.spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = source.fetch(&collection) => result,
            };
            lock(&delivery).deliver(seq, result);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// One scripted response: how long the request takes and what it returns.
    type Step = (Duration, Result<Vec<&'static str>, FetchError>);

    /// Plays back scripted responses in call order; calls past the end hang.
    struct ScriptedSource {
        calls: AtomicUsize,
        script: Vec<Step>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CollectionSource for ScriptedSource {
        type Row = &'static str;

        fn fetch(
            &self,
            _collection: &str,
        ) -> impl Future<Output = Result<Vec<Self::Row>, FetchError>> + Send {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.script.get(n).cloned();
            async move {
                match step {
                    Some((delay, result)) => {
                        tokio::time::sleep(delay).await;
                        result
                    }
                    None => std::future::pending().await,
                }
            }
        }
    }

    /// Always answers instantly with the call number.
    struct CountingSource {
        calls: AtomicUsize,
    }

    impl CollectionSource for CountingSource {
        type Row = usize;

        fn fetch(
            &self,
            _collection: &str,
        ) -> impl Future<Output = Result<Vec<usize>, FetchError>> + Send {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(vec![n]) }
        }
    }

    type Log<T> = Arc<Mutex<Vec<T>>>;

    fn recorders<R: Clone + Send + Sync + 'static>() -> (
        Log<Vec<R>>,
        Log<FetchError>,
        impl FnMut(Snapshot<R>) + Send + 'static,
        impl FnMut(FetchError) + Send + 'static,
    ) {
        let snapshots: Log<Vec<R>> = Arc::default();
        let errors: Log<FetchError> = Arc::default();
        let s = snapshots.clone();
        let e = errors.clone();
        (
            snapshots,
            errors,
            move |snap: Snapshot<R>| s.lock().unwrap().push(snap.to_vec()),
            move |err: FetchError| e.lock().unwrap().push(err),
        )
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_fetch_error_kinds() {
        assert_eq!(FetchError::Network("x".into()).kind(), "network");
        assert_eq!(FetchError::HttpStatus(404).kind(), "http-status:404");
        assert_eq!(FetchError::Decode("x".into()).kind(), "decode");
        assert!(FetchError::HttpStatus(401).is_unauthorized());
        assert!(!FetchError::HttpStatus(403).is_unauthorized());
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_fetch_then_every_interval() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let (snapshots, errors, on_snapshot, on_error) = recorders::<usize>();
        let handle = poll(source.clone(), "movimientos", ms(5000), on_snapshot, on_error);

        tokio::time::sleep(ms(100)).await;
        assert_eq!(*snapshots.lock().unwrap(), vec![vec![0usize]]);

        tokio::time::sleep(ms(10_000)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(snapshots.lock().unwrap().len(), 3);
        assert!(errors.lock().unwrap().is_empty());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_does_not_stop_loop() {
        let source = ScriptedSource::new(vec![
            (ms(10), Err(FetchError::HttpStatus(503))),
            (ms(10), Ok(vec!["a"])),
        ]);
        let (snapshots, errors, on_snapshot, on_error) = recorders::<&'static str>();
        let handle = poll(source.clone(), "vehiculos", ms(1000), on_snapshot, on_error);

        tokio::time::sleep(ms(1500)).await;
        assert_eq!(*errors.lock().unwrap(), vec![FetchError::HttpStatus(503)]);
        assert_eq!(*snapshots.lock().unwrap(), vec![vec!["a"]]);
        assert_eq!(source.calls(), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_in_flight_response() {
        let source = ScriptedSource::new(vec![(ms(10_000), Ok(vec!["late"]))]);
        let (snapshots, errors, on_snapshot, on_error) = recorders::<&'static str>();
        let handle = poll(source.clone(), "abonos", ms(60_000), on_snapshot, on_error);

        tokio::time::sleep(ms(1000)).await;
        assert_eq!(source.calls(), 1);
        handle.cancel();
        assert!(handle.is_cancelled());

        tokio::time::sleep(ms(20_000)).await;
        assert!(snapshots.lock().unwrap().is_empty());
        assert!(errors.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_does_not_overwrite_newer() {
        // Tick 1 is slow and resolves after tick 2
        let source = ScriptedSource::new(vec![
            (ms(8000), Ok(vec!["old"])),
            (ms(1000), Ok(vec!["new"])),
        ]);
        let (snapshots, _errors, on_snapshot, on_error) = recorders::<&'static str>();
        let handle = poll(source.clone(), "turnos", ms(5000), on_snapshot, on_error);

        tokio::time::sleep(ms(6500)).await;
        assert_eq!(*snapshots.lock().unwrap(), vec![vec!["new"]]);

        tokio::time::sleep(ms(2000)).await;
        assert_eq!(*snapshots.lock().unwrap(), vec![vec!["new"]]);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_refresh_fetches_immediately() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let (snapshots, _errors, on_snapshot, on_error) = recorders::<usize>();
        let handle = poll(source.clone(), "cierresdecaja", ms(60_000), on_snapshot, on_error);

        tokio::time::sleep(ms(100)).await;
        handle.refresh();
        tokio::time::sleep(ms(100)).await;

        assert_eq!(*snapshots.lock().unwrap(), vec![vec![0usize], vec![1usize]]);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let (snapshots, _errors, on_snapshot, on_error) = recorders::<usize>();
        let handle = poll(source.clone(), "auditorias", ms(1000), on_snapshot, on_error);
        tokio::time::sleep(ms(100)).await;
        drop(handle);

        tokio::time::sleep(ms(5000)).await;
        assert_eq!(snapshots.lock().unwrap().len(), 1);
    }
}
