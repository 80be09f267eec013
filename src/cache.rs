//! Process-wide tile cache with at-most-one in-flight fetch. See
//! spec.md §4.5 and §4.9, grounded in `TerrainTileManager`.
//!
//! The cache is a single `tokio` task ("the dispatch thread" of spec.md
//! §5) that owns `tiles`/`state`/`queue` outright; every other piece of
//! code only ever talks to it through a cheaply-clonable
//! [`TileCacheHandle`] sending messages over an `mpsc` channel. This is
//! how spec.md §9's open question about racing the `Idle`/`Downloading`
//! transition against query arrival is resolved: mutation is serialized
//! by construction, so the `Mutex` spec.md §4.5 describes around `tiles`
//! is never needed.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::geodesy::Coordinate;
use crate::hash::TileHash;
use crate::provider::FetchProvider;
use crate::tile::Tile;

/// Result of a coordinate-list query (spec.md §4.7).
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateOutcome {
    pub success: bool,
    pub heights: Vec<f64>,
}

/// Result of a path query (spec.md §4.7).
#[derive(Debug, Clone, PartialEq)]
pub struct PathOutcome {
    pub success: bool,
    pub dist_between_m: f64,
    pub final_dist_between_m: f64,
    pub heights: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DownloadState {
    Idle,
    Downloading,
}

enum Responder {
    Coordinates(oneshot::Sender<CoordinateOutcome>),
    Path { dist_between_m: f64, final_dist_between_m: f64, tx: oneshot::Sender<PathOutcome> },
}

impl Responder {
    fn is_abandoned(&self) -> bool {
        match self {
            Responder::Coordinates(tx) => tx.is_closed(),
            Responder::Path { tx, .. } => tx.is_closed(),
        }
    }

    fn send_success(self, heights: Vec<f64>, internal_error: bool) {
        let success = !internal_error;
        let heights = if internal_error { Vec::new() } else { heights };
        match self {
            Responder::Coordinates(tx) => {
                let _ = tx.send(CoordinateOutcome { success, heights });
            }
            Responder::Path { dist_between_m, final_dist_between_m, tx } => {
                let _ = tx.send(PathOutcome { success, dist_between_m, final_dist_between_m, heights });
            }
        }
    }

    fn send_failure(self) {
        match self {
            Responder::Coordinates(tx) => {
                let _ = tx.send(CoordinateOutcome { success: false, heights: Vec::new() });
            }
            Responder::Path { dist_between_m, final_dist_between_m, tx } => {
                let _ = tx.send(PathOutcome {
                    success: false,
                    dist_between_m,
                    final_dist_between_m,
                    heights: Vec::new(),
                });
            }
        }
    }
}

struct PendingRequest {
    coords: Vec<Coordinate>,
    responder: Responder,
}

enum CacheMessage {
    CoordinateQuery { coords: Vec<Coordinate>, respond_to: oneshot::Sender<CoordinateOutcome> },
    PathQuery {
        coords: Vec<Coordinate>,
        dist_between_m: f64,
        final_dist_between_m: f64,
        respond_to: oneshot::Sender<PathOutcome>,
    },
    GetAltitudes { coords: Vec<Coordinate>, respond_to: oneshot::Sender<(Vec<f64>, bool, bool)> },
    FetchComplete { tile: Tile, hash: TileHash },
    FetchFailed { kind: FetchError },
}

enum Probe {
    Satisfied { heights: Vec<f64>, internal_error: bool },
    Miss { miss_coord: Coordinate },
}

/// Cheaply-clonable front door to a running [`TileCache`] dispatch task.
#[derive(Clone)]
pub struct TileCacheHandle {
    tx: mpsc::UnboundedSender<CacheMessage>,
}

impl TileCacheHandle {
    pub async fn add_coordinate_query(&self, coords: Vec<Coordinate>) -> CoordinateOutcome {
        let (respond_to, rx) = oneshot::channel();
        if self.tx.send(CacheMessage::CoordinateQuery { coords, respond_to }).is_err() {
            return CoordinateOutcome { success: false, heights: Vec::new() };
        }
        rx.await.unwrap_or(CoordinateOutcome { success: false, heights: Vec::new() })
    }

    pub async fn add_path_query(
        &self,
        coords: Vec<Coordinate>,
        dist_between_m: f64,
        final_dist_between_m: f64,
    ) -> PathOutcome {
        let (respond_to, rx) = oneshot::channel();
        let msg = CacheMessage::PathQuery { coords, dist_between_m, final_dist_between_m, respond_to };
        if self.tx.send(msg).is_err() {
            return PathOutcome { success: false, dist_between_m, final_dist_between_m, heights: Vec::new() };
        }
        rx.await.unwrap_or(PathOutcome { success: false, dist_between_m, final_dist_between_m, heights: Vec::new() })
    }

    /// Non-queueing cache probe: returns whatever is already cached plus
    /// whether anything missed, without waiting on any fetch (spec.md
    /// §4.5 item 3). Returns `(heights, missed, internal_error)`.
    pub async fn get_altitudes(&self, coords: Vec<Coordinate>) -> (Vec<f64>, bool, bool) {
        let (respond_to, rx) = oneshot::channel();
        if self.tx.send(CacheMessage::GetAltitudes { coords, respond_to }).is_err() {
            return (Vec::new(), true, true);
        }
        rx.await.unwrap_or((Vec::new(), true, true))
    }

    fn fetch_complete(&self, tile: Tile, hash: TileHash) {
        let _ = self.tx.send(CacheMessage::FetchComplete { tile, hash });
    }

    fn fetch_failed(&self, kind: FetchError) {
        let _ = self.tx.send(CacheMessage::FetchFailed { kind });
    }
}

/// The dispatch-task body. Construct with [`TileCache::spawn`].
pub struct TileCache {
    tiles: HashMap<TileHash, Arc<Tile>>,
    state: DownloadState,
    queue: Vec<PendingRequest>,
    provider: Arc<dyn FetchProvider>,
    rx: mpsc::UnboundedReceiver<CacheMessage>,
    handle: TileCacheHandle,
}

impl TileCache {
    /// Spawn the dispatch task and return a handle to it.
    pub fn spawn(provider: Arc<dyn FetchProvider>) -> TileCacheHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = TileCacheHandle { tx };
        let cache = TileCache {
            tiles: HashMap::new(),
            state: DownloadState::Idle,
            queue: Vec::new(),
            provider,
            rx,
            handle: handle.clone(),
        };
        tokio::spawn(cache.run());
        handle
    }

    async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                CacheMessage::CoordinateQuery { coords, respond_to } => {
                    self.handle_new_request(coords, Responder::Coordinates(respond_to));
                }
                CacheMessage::PathQuery { coords, dist_between_m, final_dist_between_m, respond_to } => {
                    self.handle_new_request(
                        coords,
                        Responder::Path { dist_between_m, final_dist_between_m, tx: respond_to },
                    );
                }
                CacheMessage::GetAltitudes { coords, respond_to } => {
                    let (heights, missed, internal_error) = match self.probe(&coords) {
                        Probe::Satisfied { heights, internal_error } => (heights, false, internal_error),
                        Probe::Miss { .. } => (Vec::new(), true, false),
                    };
                    let _ = respond_to.send((heights, missed, internal_error));
                }
                CacheMessage::FetchComplete { tile, hash } => self.on_fetch_complete(tile, hash),
                CacheMessage::FetchFailed { kind } => self.on_fetch_failed(kind),
            }
        }
    }

    fn probe(&self, coords: &[Coordinate]) -> Probe {
        let mut heights = Vec::with_capacity(coords.len());
        let mut internal_error = false;
        for &coord in coords {
            let hash = self.provider.tile_hash(coord);
            match self.tiles.get(&hash) {
                Some(tile) => {
                    let elevation = tile.elevation(coord);
                    if elevation.is_nan() {
                        warn!(%hash, "cached tile missing elevation for a coordinate its hash claims to cover");
                        internal_error = true;
                    }
                    heights.push(elevation);
                }
                None => return Probe::Miss { miss_coord: coord },
            }
        }
        Probe::Satisfied { heights, internal_error }
    }

    fn handle_new_request(&mut self, coords: Vec<Coordinate>, responder: Responder) {
        if coords.is_empty() {
            return;
        }
        match self.probe(&coords) {
            Probe::Satisfied { heights, internal_error } => {
                debug!(count = coords.len(), "request satisfied entirely from cache");
                responder.send_success(heights, internal_error);
            }
            Probe::Miss { miss_coord } => {
                if self.state == DownloadState::Idle {
                    self.start_fetch(miss_coord);
                }
                self.queue.push(PendingRequest { coords, responder });
            }
        }
    }

    fn start_fetch(&mut self, coord: Coordinate) {
        self.state = DownloadState::Downloading;
        let provider = Arc::clone(&self.provider);
        let handle = self.handle.clone();
        tokio::spawn(async move {
            match provider.fetch_tile(coord).await {
                Ok((tile, hash)) => handle.fetch_complete(tile, hash),
                Err(kind) => handle.fetch_failed(kind),
            }
        });
    }

    /// Walk the queue from newest to oldest, same order as
    /// `TerrainTileManager::_terrainDone`: the first still-missing
    /// request encountered (if any) gets to start the next fetch, and
    /// any entry whose caller went away is dropped without a callback.
    fn on_fetch_complete(&mut self, tile: Tile, hash: TileHash) {
        self.tiles.entry(hash.clone()).or_insert_with(|| Arc::new(tile));
        self.state = DownloadState::Idle;
        debug!(%hash, queue_len = self.queue.len(), "fetch complete, re-evaluating queue");

        let mut i = self.queue.len();
        while i > 0 {
            i -= 1;
            if self.queue[i].responder.is_abandoned() {
                self.queue.remove(i);
                continue;
            }

            match self.probe(&self.queue[i].coords) {
                Probe::Satisfied { heights, internal_error } => {
                    let request = self.queue.remove(i);
                    request.responder.send_success(heights, internal_error);
                }
                Probe::Miss { miss_coord } => {
                    if self.state == DownloadState::Idle {
                        self.start_fetch(miss_coord);
                    }
                }
            }
        }
    }

    fn on_fetch_failed(&mut self, kind: FetchError) {
        warn!(?kind, queue_len = self.queue.len(), "fetch failed, failing entire queue");
        self.state = DownloadState::Idle;
        for request in self.queue.drain(..) {
            if !request.responder.is_abandoned() {
                request.responder.send_failure();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FileProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct CountingProvider {
        inner: FileProvider,
        calls: Arc<AtomicUsize>,
        notify: Arc<Notify>,
    }

    #[async_trait]
    impl FetchProvider for CountingProvider {
        fn tile_hash(&self, coord: Coordinate) -> TileHash {
            self.inner.tile_hash(coord)
        }

        async fn fetch_tile(&self, coord: Coordinate) -> crate::error::Result<(Tile, TileHash)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.notify.notified().await;
            self.inner.fetch_tile(coord).await
        }
    }

    #[tokio::test]
    async fn concurrent_queries_for_same_tile_cause_one_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let notify = Arc::new(Notify::new());
        let provider = Arc::new(CountingProvider {
            inner: FileProvider::new(dir.path()),
            calls: calls.clone(),
            notify: notify.clone(),
        });
        let handle = TileCache::spawn(provider);

        let coord = Coordinate::from_degrees(-35.3, 149.1);
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move { handle.add_coordinate_query(vec![coord]).await }));
        }

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        notify.notify_waiters();
        for task in tasks {
            let outcome = task.await.unwrap();
            assert!(!outcome.success); // file does not exist -> FetchFailed -> failure
        }
    }

    #[tokio::test]
    async fn abandoned_query_receives_no_callback_and_does_not_poison_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let notify = Arc::new(Notify::new());
        let provider = Arc::new(CountingProvider {
            inner: FileProvider::new(dir.path()),
            calls,
            notify: notify.clone(),
        });
        let handle = TileCache::spawn(provider);

        let coord = Coordinate::from_degrees(1.0, 1.0);
        let task = tokio::spawn({
            let handle = handle.clone();
            async move { handle.add_coordinate_query(vec![coord]).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        task.abort(); // caller destroyed mid-flight

        notify.notify_waiters();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // A fresh query for the same tile still completes normally.
        let outcome = handle.add_coordinate_query(vec![coord]).await;
        assert!(!outcome.success);
    }
}
