//! Coalesces many callers' coordinate queries into bounded batches for
//! providers that expose a single *N-coordinates -> N-heights* endpoint.
//! See spec.md §4.6 and §4.9, grounded in
//! `TerrainAtCoordinateBatchManager`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::geodesy::Coordinate;
use crate::provider::FetchProvider;

/// Maximum coordinates per request to the provider
/// (`TerrainAtCoordinateBatchManager::_sendNextBatch`'s `count() > 50` guard).
const BATCH_CAP: usize = 50;

/// Result handed back to one contributor of a batch (spec.md §4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub success: bool,
    pub heights: Vec<f64>,
}

struct Contribution {
    coords: Vec<Coordinate>,
    respond_to: oneshot::Sender<BatchOutcome>,
}

enum BatchMessage {
    Submit { coords: Vec<Coordinate>, respond_to: oneshot::Sender<BatchOutcome> },
    TimerFired { generation: u64 },
    SendResult { result: Result<Vec<f64>, FetchError> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagerState {
    Idle,
    Collecting,
    Sending,
}

/// Cheaply-clonable front door to a running [`BatchManager`] dispatch task.
#[derive(Clone)]
pub struct BatchManagerHandle {
    tx: mpsc::UnboundedSender<BatchMessage>,
}

impl BatchManagerHandle {
    /// Submit `coords` for batching; resolves once this contribution's
    /// slice of a provider response (or failure) is known.
    pub async fn submit(&self, coords: Vec<Coordinate>) -> BatchOutcome {
        let (respond_to, rx) = oneshot::channel();
        if self.tx.send(BatchMessage::Submit { coords, respond_to }).is_err() {
            return BatchOutcome { success: false, heights: Vec::new() };
        }
        rx.await.unwrap_or(BatchOutcome { success: false, heights: Vec::new() })
    }

    fn timer_fired(&self, generation: u64) {
        let _ = self.tx.send(BatchMessage::TimerFired { generation });
    }

    fn send_result(&self, result: Result<Vec<f64>, FetchError>) {
        let _ = self.tx.send(BatchMessage::SendResult { result });
    }
}

/// The dispatch-task body. Construct with [`BatchManager::spawn`].
pub struct BatchManager {
    provider: Arc<dyn FetchProvider>,
    timeout: Duration,
    rx: mpsc::UnboundedReceiver<BatchMessage>,
    handle: BatchManagerHandle,
    state: ManagerState,
    collecting: Vec<Contribution>,
    collecting_count: usize,
    in_flight: Option<Vec<Contribution>>,
    generation: u64,
}

impl BatchManager {
    pub fn spawn(provider: Arc<dyn FetchProvider>, timeout: Duration) -> BatchManagerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = BatchManagerHandle { tx };
        let manager = BatchManager {
            provider,
            timeout,
            rx,
            handle: handle.clone(),
            state: ManagerState::Idle,
            collecting: Vec::new(),
            collecting_count: 0,
            in_flight: None,
            generation: 0,
        };
        tokio::spawn(manager.run());
        handle
    }

    async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                BatchMessage::Submit { coords, respond_to } => {
                    self.on_submit(Contribution { coords, respond_to });
                }
                BatchMessage::TimerFired { generation } => self.on_timer_fired(generation),
                BatchMessage::SendResult { result } => self.on_send_result(result),
            }
        }
    }

    fn on_submit(&mut self, contribution: Contribution) {
        let n = contribution.coords.len();
        match self.state {
            ManagerState::Idle => {
                self.state = ManagerState::Collecting;
                self.collecting.push(contribution);
                self.collecting_count = n;
                self.arm_timer();
            }
            ManagerState::Collecting => {
                if self.collecting_count + n > BATCH_CAP && !self.collecting.is_empty() {
                    debug!(count = self.collecting_count, "batch cap reached, flushing early");
                    self.send_batch();
                    self.state = ManagerState::Sending;
                    self.collecting.push(contribution);
                    self.collecting_count = n;
                    // The overflow contribution rides the "fresh Collecting
                    // queue" that flushes on the in-flight batch's response,
                    // not on its own timer.
                } else {
                    self.collecting.push(contribution);
                    self.collecting_count += n;
                    self.arm_timer();
                }
            }
            ManagerState::Sending => {
                // Accumulates into the "fresh Collecting queue" spec.md §4.9
                // describes; it sends the moment the in-flight batch replies.
                self.collecting.push(contribution);
                self.collecting_count += n;
            }
        }
    }

    fn arm_timer(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let handle = self.handle.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            handle.timer_fired(generation);
        });
    }

    fn on_timer_fired(&mut self, generation: u64) {
        if self.state != ManagerState::Collecting || generation != self.generation {
            return; // stale: superseded by a cap flush or another arrival
        }
        self.send_batch();
        self.state = ManagerState::Sending;
    }

    /// Moves `collecting` into flight and spawns the provider call. Caller
    /// is responsible for the state transition.
    fn send_batch(&mut self) {
        if self.collecting.is_empty() {
            self.state = ManagerState::Idle;
            return;
        }
        let contributions = std::mem::take(&mut self.collecting);
        self.collecting_count = 0;
        let flat: Vec<Coordinate> = contributions.iter().flat_map(|c| c.coords.iter().copied()).collect();
        debug!(count = flat.len(), contributors = contributions.len(), "sending batch");

        let provider = Arc::clone(&self.provider);
        let handle = self.handle.clone();
        tokio::spawn(async move {
            let result = provider.batch_heights(&flat).await;
            handle.send_result(result);
        });
        self.in_flight = Some(contributions);
    }

    fn on_send_result(&mut self, result: Result<Vec<f64>, FetchError>) {
        let contributions = self.in_flight.take().unwrap_or_default();
        match result {
            Ok(flat) => {
                let expected: usize = contributions.iter().map(|c| c.coords.len()).sum();
                if flat.len() != expected {
                    warn!(expected, got = flat.len(), "batch response length mismatch");
                    Self::fail_all(contributions);
                } else {
                    let mut offset = 0;
                    for contribution in contributions {
                        let n = contribution.coords.len();
                        let heights = flat[offset..offset + n].to_vec();
                        offset += n;
                        if !contribution.respond_to.is_closed() {
                            let _ = contribution.respond_to.send(BatchOutcome { success: true, heights });
                        }
                    }
                }
            }
            Err(kind) => {
                warn!(?kind, contributors = contributions.len(), "batch request failed");
                Self::fail_all(contributions);
            }
        }

        self.state = ManagerState::Idle;
        if !self.collecting.is_empty() {
            self.send_batch();
            self.state = ManagerState::Sending;
        }
    }

    fn fail_all(contributions: Vec<Contribution>) {
        for contribution in contributions {
            if !contribution.respond_to.is_closed() {
                let _ = contribution.respond_to.send(BatchOutcome { success: false, heights: Vec::new() });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::hash::TileHash;
    use crate::tile::Tile;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FlatProvider {
        calls: Arc<AtomicUsize>,
        sizes: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl FetchProvider for FlatProvider {
        fn tile_hash(&self, coord: Coordinate) -> TileHash {
            TileHash::for_file("unused", coord.lat as u16, coord.lon as u16, 1)
        }

        async fn fetch_tile(&self, _coord: Coordinate) -> Result<(Tile, TileHash)> {
            unreachable!("batch manager never calls fetch_tile directly")
        }

        async fn batch_heights(&self, coords: &[Coordinate]) -> Result<Vec<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sizes.lock().unwrap().push(coords.len());
            Ok(coords.iter().map(|c| c.lat as f64).collect())
        }

        fn supports_batch(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn sixty_rapid_submissions_split_into_fifty_and_ten() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let provider = Arc::new(FlatProvider { calls: calls.clone(), sizes: sizes.clone() });
        let handle = BatchManager::spawn(provider, Duration::from_millis(50));

        let mut tasks = Vec::new();
        for i in 0..60 {
            let handle = handle.clone();
            let coord = Coordinate::new(i, 0);
            tasks.push(tokio::spawn(async move { handle.submit(vec![coord]).await }));
        }
        for task in tasks {
            let outcome = task.await.unwrap();
            assert!(outcome.success);
            assert_eq!(outcome.heights.len(), 1);
        }

        let sizes = sizes.lock().unwrap().clone();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sizes, vec![50, 10]);
    }

    #[tokio::test]
    async fn idle_callers_share_one_batch_after_the_debounce_window() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let provider = Arc::new(FlatProvider { calls: calls.clone(), sizes });
        let handle = BatchManager::spawn(provider, Duration::from_millis(20));

        let a = handle.submit(vec![Coordinate::new(1, 0)]);
        let b = handle.submit(vec![Coordinate::new(2, 0)]);
        let (a, b) = tokio::join!(a, b);
        assert!(a.success && b.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn abandoned_contributor_is_skipped_without_panicking() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let provider = Arc::new(FlatProvider { calls, sizes });
        let handle = BatchManager::spawn(provider, Duration::from_millis(10));

        let dropped = tokio::spawn({
            let handle = handle.clone();
            async move { handle.submit(vec![Coordinate::new(3, 0)]).await }
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        dropped.abort();

        let outcome = handle.submit(vec![Coordinate::new(4, 0)]).await;
        assert!(outcome.success);
    }
}
