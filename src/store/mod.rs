//! Shared rate-limit counter store.
//!
//! # Data Flow
//! ```text
//! RateLimiter (per request, per tier)
//!     → CounterStore::sliding_window (one atomic round trip)
//!         → memory.rs (single process, dev/tests)
//!         → redis.rs  (shared across router instances)
//!     ← WindowCount { admitted, used, reset_at_ms }
//! ```
//!
//! # Design Decisions
//! - The store is the only state shared across requests and instances
//! - The check-and-increment is one atomic operation, never read-then-write
//! - Two-bucket sliding window: `current + floor(previous * (1 - elapsed))`
//! - Clients are constructed explicitly and injected; no process globals

pub mod clock;
pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// Result of one sliding-window check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Whether this request was admitted (and counted).
    pub admitted: bool,
    /// Weighted request count in the window, including this request if admitted.
    pub used: u64,
    /// Epoch milliseconds at which the current window slice ends.
    pub reset_at_ms: u64,
}

/// Errors raised by a counter store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
    #[error("counter store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("counter store error: {0}")]
    Backend(#[from] ::redis::RedisError),
    #[error("unexpected counter store reply: {0}")]
    Protocol(String),
}

/// Atomic increment-with-expiry counter store.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Check `key` against `limit` within a sliding window of `window_ms`
    /// ending at `now_ms`, counting the request only when it is admitted.
    async fn sliding_window(
        &self,
        key: &str,
        limit: u64,
        window_ms: u64,
        now_ms: u64,
    ) -> Result<WindowCount, StoreError>;

    /// Short backend name for logs and metrics.
    fn name(&self) -> &'static str;
}

/// Slice index, slice end and the fraction of the slice already elapsed.
pub(crate) fn window_position(now_ms: u64, window_ms: u64) -> (u64, u64, f64) {
    let slice = now_ms / window_ms;
    let reset_at_ms = (slice + 1) * window_ms;
    let elapsed = (now_ms % window_ms) as f64 / window_ms as f64;
    (slice, reset_at_ms, elapsed)
}

/// Previous-slice count weighted by how much of it still overlaps the window.
pub(crate) fn weighted_previous(previous: u64, elapsed: f64) -> u64 {
    (previous as f64 * (1.0 - elapsed)).floor() as u64
}

/// Expiry given to a slice bucket: long enough to serve as the next slice's
/// "previous" bucket.
pub(crate) fn bucket_ttl_ms(window_ms: u64) -> u64 {
    window_ms * 2 + 1000
}
