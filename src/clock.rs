//! Time Source Abstraction
//!
//! Window counters never call `Instant::now()` directly. They read time
//! through a [`Clock`], so the same bucket arithmetic runs against the
//! monotonic system clock in production and a hand-driven clock in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Monotonic timestamp in milliseconds since the clock's own origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_millis(ms: u64) -> Self {
        Timestamp(ms)
    }

    pub fn from_secs(secs: u64) -> Self {
        Timestamp(secs.saturating_mul(1000))
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Whole seconds elapsed since `origin`, zero if `origin` is in the future
    pub fn secs_since(&self, origin: Timestamp) -> u64 {
        self.0.saturating_sub(origin.0) / 1000
    }
}

/// Clock abstraction for time operations
pub trait Clock: Send + Sync + 'static {
    /// Get current time
    fn now(&self) -> Timestamp;
}

/// Monotonic clock backed by `std::time::Instant`
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Timestamp {
        Timestamp(self.origin.elapsed().as_millis() as u64)
    }
}

/// Hand-driven clock for deterministic tests.
///
/// Time only moves when a test calls [`ManualClock::advance`] or
/// [`ManualClock::set`]; clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, at: Timestamp) {
        self.millis.store(at.0, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, ms: u64) {
        self.millis.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance_millis(secs.saturating_mul(1000));
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> Timestamp {
        Timestamp(self.millis.load(Ordering::SeqCst))
    }
}

/// Arc wrapper for trait object usage
pub type SharedClock = Arc<dyn Clock>;

/// Create a shared monotonic system clock
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock::new())
}

/// Create a manual clock for testing, starting at zero
pub fn manual_clock() -> ManualClock {
    ManualClock::new()
}
