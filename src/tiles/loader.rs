//! Asynchronous tile texture loading
//!
//! A priority queue of pending fetch requests drained under a fixed
//! concurrency cap. Fetches run on a tokio runtime: each downloads the
//! tile image, decodes it off the cooperative thread, and posts the
//! outcome to a channel the owner polls once per frame. Nothing here
//! mutates tile state directly.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use thiserror::Error;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::mpsc;

use crate::tiles::coord::TileCoord;
use crate::tiles::texture::{TileTexture, decode_texture};

/// Default cap on simultaneous outstanding fetches.
pub const DEFAULT_MAX_CONCURRENT: usize = 6;

// Priority weights: coarser levels dominate, then view alignment, then
// range. Lower score is served first.
const LEVEL_WEIGHT: f32 = 8.0;
const ANGLE_WEIGHT: f32 = 4.0;
const DISTANCE_WEIGHT: f32 = 1.0;

/// Why a tile fetch produced no texture.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("server returned HTTP {0}")]
    Status(u16),

    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("request timed out")]
    TimedOut,
}

/// Boxed future returned by [`TileFetcher::fetch`].
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>, FetchError>> + Send>>;

/// Source of raw tile image bytes.
pub trait TileFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> FetchFuture;
}

/// HTTP tile source backed by a pooled reqwest client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tellus/", env!("CARGO_PKG_VERSION")))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_max_idle_per_host(8)
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl TileFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> FetchFuture {
        let client = self.client.clone();
        let url = url.to_string();
        Box::pin(async move {
            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|e| FetchError::Request(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|e| FetchError::Request(e.to_string()))?;
            Ok(bytes.to_vec())
        })
    }
}

/// A pending texture fetch for one tile.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub coord: TileCoord,
    pub url: String,
    /// Tile center on the sphere, for priority scoring.
    pub center: Vec3,
}

/// Completion of one dispatched fetch.
#[derive(Debug)]
pub struct FetchOutcome {
    pub coord: TileCoord,
    pub url: String,
    pub result: Result<TileTexture, FetchError>,
}

/// Priority score for a request; lower is served first.
///
/// Coarse tiles establish full-planet coverage cheaply before detail is
/// fetched; off-axis and distant tiles wait without being starved.
pub fn priority_score(
    request: &LoadRequest,
    camera_pos: Vec3,
    camera_dir: Vec3,
    radius: f32,
) -> f32 {
    let to_tile = request.center - camera_pos;
    let distance = to_tile.length();
    let deviation = if distance > f32::EPSILON {
        camera_dir
            .normalize_or_zero()
            .dot(to_tile / distance)
            .clamp(-1.0, 1.0)
            .acos()
    } else {
        0.0
    };
    request.coord.level as f32 * LEVEL_WEIGHT
        + deviation * ANGLE_WEIGHT
        + distance / radius.max(f32::EPSILON) * DISTANCE_WEIGHT
}

/// Priority-ordered, concurrency-limited fetch scheduler.
///
/// Owned by one tile manager and driven from the cooperative thread:
/// `enqueue` then `reprioritize` + `drain` once per frame, `poll` to
/// collect completions. The concurrency cap is the single point where
/// otherwise independent per-tile fetches share a resource.
pub struct TextureLoader {
    /// Pending requests, head first; ordered by `reprioritize`.
    queue: Vec<LoadRequest>,
    queued: HashSet<TileCoord>,
    in_flight: HashSet<TileCoord>,
    active: usize,
    max_concurrent: usize,
    radius: f32,
    timeout: Duration,
    fetcher: Arc<dyn TileFetcher>,
    result_tx: mpsc::UnboundedSender<FetchOutcome>,
    result_rx: mpsc::UnboundedReceiver<FetchOutcome>,
    handle: Handle,
    /// Owned runtime when not embedding into a host runtime.
    _runtime: Option<Runtime>,
}

impl TextureLoader {
    /// Create a loader with its own tokio runtime.
    pub fn new(
        fetcher: Arc<dyn TileFetcher>,
        max_concurrent: usize,
        radius: f32,
        timeout: Duration,
    ) -> Self {
        let runtime = Runtime::new().expect("failed to create tokio runtime");
        let handle = runtime.handle().clone();
        Self::with_handle(fetcher, max_concurrent, radius, timeout, handle, Some(runtime))
    }

    /// Create a loader that spawns fetches onto the caller's runtime.
    ///
    /// Panics if called outside a tokio runtime context.
    pub fn new_with_current_runtime(
        fetcher: Arc<dyn TileFetcher>,
        max_concurrent: usize,
        radius: f32,
        timeout: Duration,
    ) -> Self {
        Self::with_handle(fetcher, max_concurrent, radius, timeout, Handle::current(), None)
    }

    fn with_handle(
        fetcher: Arc<dyn TileFetcher>,
        max_concurrent: usize,
        radius: f32,
        timeout: Duration,
        handle: Handle,
        runtime: Option<Runtime>,
    ) -> Self {
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        Self {
            queue: Vec::new(),
            queued: HashSet::new(),
            in_flight: HashSet::new(),
            active: 0,
            max_concurrent: max_concurrent.max(1),
            radius,
            timeout,
            fetcher,
            result_tx,
            result_rx,
            handle,
            _runtime: runtime,
        }
    }

    /// Queue a fetch unless the same tile is already queued or in
    /// flight. Returns whether the request was accepted.
    pub fn enqueue(&mut self, request: LoadRequest) -> bool {
        if self.queued.contains(&request.coord) || self.in_flight.contains(&request.coord) {
            return false;
        }
        self.queued.insert(request.coord);
        self.queue.push(request);
        true
    }

    /// Re-sort pending requests against the current viewpoint: coarser,
    /// camera-facing, nearer tiles move to the head. In-flight fetches
    /// are not reordered.
    pub fn reprioritize(&mut self, camera_pos: Vec3, camera_dir: Vec3) {
        let radius = self.radius;
        self.queue.sort_by(|a, b| {
            priority_score(a, camera_pos, camera_dir, radius)
                .total_cmp(&priority_score(b, camera_pos, camera_dir, radius))
        });
    }

    /// Dispatch queued requests while below the concurrency cap.
    ///
    /// Returns the coords dispatched by this call so the owner can mark
    /// their tiles requested.
    pub fn drain(&mut self) -> Vec<TileCoord> {
        let mut dispatched = Vec::new();
        while self.active < self.max_concurrent && !self.queue.is_empty() {
            let request = self.queue.remove(0);
            self.queued.remove(&request.coord);
            self.in_flight.insert(request.coord);
            self.active += 1;
            dispatched.push(request.coord);
            self.spawn_fetch(request);
        }
        dispatched
    }

    fn spawn_fetch(&self, request: LoadRequest) {
        let LoadRequest { coord, url, .. } = request;
        let future = self.fetcher.fetch(&url);
        let tx = self.result_tx.clone();
        let timeout = self.timeout;
        self.handle.spawn(async move {
            let result = match tokio::time::timeout(timeout, future).await {
                Ok(Ok(bytes)) => {
                    decode_texture(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
                }
                Ok(Err(e)) => Err(e),
                Err(_) => Err(FetchError::TimedOut),
            };
            // A closed receiver means the loader is gone; drop the result.
            let _ = tx.send(FetchOutcome { coord, url, result });
        });
    }

    /// Collect completions without blocking. Each completion frees one
    /// concurrency slot.
    pub fn poll(&mut self) -> Vec<FetchOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(outcome) = self.result_rx.try_recv() {
            self.active = self.active.saturating_sub(1);
            self.in_flight.remove(&outcome.coord);
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Drop a queued request. In-flight fetches are left to finish;
    /// their results still arrive through `poll` and the caller decides
    /// what to keep.
    pub fn cancel(&mut self, coord: TileCoord) {
        if self.queued.remove(&coord) {
            self.queue.retain(|r| r.coord != coord);
        }
    }

    /// Drop every queued request.
    pub fn clear_queue(&mut self) {
        self.queue.clear();
        self.queued.clear();
    }

    /// Fetches currently outstanding.
    pub fn active_count(&self) -> usize {
        self.active
    }

    /// Requests waiting for a concurrency slot.
    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// Whether a tile is queued or in flight.
    pub fn is_pending(&self, coord: TileCoord) -> bool {
        self.queued.contains(&coord) || self.in_flight.contains(&coord)
    }
}
