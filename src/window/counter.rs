//! Single sliding-window hit counter.
//!
//! A ring of one-second buckets. Bucket `i` holds the hits recorded during
//! the most recent elapsed second `s` with `s % window == i`. Writers advance
//! the ring to "now" before adding; readers only sum, masking buckets whose
//! second has already left the window.
//!
//! ```text
//!   window = 5, now = second 7, last touch = second 6
//!
//!   index:    0    1    2    3    4
//!   second:   5    6    2    3    4      <- second 2 is outside [3, 7]
//!   counted:  y    y    n    y    y         and is not summed
//! ```

use crate::clock::{system_clock, SharedClock, Timestamp};
use crate::error::{HitError, Result};
use parking_lot::Mutex;

/// Upper bound on a counter's window (one week of one-second buckets)
pub const MAX_WINDOW_SECONDS: u64 = 7 * 24 * 3600;

struct WindowState {
    buckets: Box<[u64]>,
    /// Elapsed second of the most recent touch (hit or forced eviction)
    last_tick: u64,
}

impl WindowState {
    fn new(window: u64) -> Self {
        WindowState {
            buckets: vec![0; window as usize].into_boxed_slice(),
            last_tick: 0,
        }
    }

    #[inline]
    fn slot(&self, second: u64) -> usize {
        (second % self.buckets.len() as u64) as usize
    }

    /// Zero every bucket whose second recurred between the last touch and
    /// `tick`. At most `window` buckets are cleared.
    fn advance(&mut self, tick: u64) {
        if tick <= self.last_tick {
            return;
        }

        let window = self.buckets.len() as u64;
        let skipped = (tick - self.last_tick).min(window);
        for second in (tick - skipped + 1)..=tick {
            let slot = self.slot(second);
            self.buckets[slot] = 0;
        }
        self.last_tick = tick;
    }

    /// Sum of hits whose second lies in `[tick - window + 1, tick]`.
    fn sum_at(&self, tick: u64) -> u64 {
        if tick <= self.last_tick {
            return self.buckets.iter().fold(0u64, |acc, b| acc.saturating_add(*b));
        }

        let window = self.buckets.len() as u64;
        let oldest = (tick + 1).saturating_sub(window);
        if oldest > self.last_tick {
            return 0;
        }

        (oldest..=self.last_tick)
            .map(|second| self.buckets[self.slot(second)])
            .fold(0u64, |acc, b| acc.saturating_add(b))
    }
}

/// Sliding-window count of hits over the trailing `window_seconds` seconds.
///
/// All mutation happens under a per-counter lock, so concurrent `hit`s never
/// lose increments and a concurrent reader never sees a half-cleared ring.
pub struct WindowCounter {
    window_seconds: u64,
    origin: Timestamp,
    clock: SharedClock,
    state: Mutex<WindowState>,
}

impl WindowCounter {
    /// Create a counter on the monotonic system clock
    pub fn new(window_seconds: u64) -> Result<Self> {
        Self::with_clock(window_seconds, system_clock())
    }

    /// Create a counter that reads time from `clock`.
    ///
    /// The counter's origin is the clock's current time; bucket indices are
    /// whole seconds elapsed since then.
    pub fn with_clock(window_seconds: u64, clock: SharedClock) -> Result<Self> {
        if window_seconds == 0 {
            return Err(HitError::invalid_argument(
                "window_seconds must be a positive integer",
            ));
        }
        if window_seconds > MAX_WINDOW_SECONDS {
            return Err(HitError::invalid_argument(format!(
                "window_seconds must not exceed {}, got {}",
                MAX_WINDOW_SECONDS, window_seconds
            )));
        }

        Ok(Self::new_unchecked(window_seconds, clock))
    }

    /// Caller guarantees `1 <= window_seconds <= MAX_WINDOW_SECONDS`
    pub(crate) fn new_unchecked(window_seconds: u64, clock: SharedClock) -> Self {
        debug_assert!(window_seconds >= 1 && window_seconds <= MAX_WINDOW_SECONDS);
        let origin = clock.now();
        WindowCounter {
            window_seconds,
            origin,
            clock,
            state: Mutex::new(WindowState::new(window_seconds)),
        }
    }

    pub fn window_seconds(&self) -> u64 {
        self.window_seconds
    }

    #[inline]
    fn current_tick(&self) -> u64 {
        self.clock.now().secs_since(self.origin)
    }

    /// Record a single hit
    #[inline]
    pub fn hit(&self) {
        self.hit_by(1);
    }

    /// Record `amount` hits in the bucket for the current second
    pub fn hit_by(&self, amount: u64) {
        let tick = self.current_tick();
        let mut state = self.state.lock();
        state.advance(tick);
        let slot = state.slot(tick);
        state.buckets[slot] = state.buckets[slot].saturating_add(amount);
    }

    /// Advance the ring to now without recording a hit.
    ///
    /// Idempotent within the same second.
    pub fn force_evict(&self) {
        let tick = self.current_tick();
        self.state.lock().advance(tick);
    }

    /// Hits recorded in the trailing window. Never mutates the ring.
    pub fn get_hits(&self) -> u64 {
        let tick = self.current_tick();
        self.state.lock().sum_at(tick)
    }
}

impl std::fmt::Debug for WindowCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowCounter")
            .field("window_seconds", &self.window_seconds)
            .field("origin", &self.origin)
            .field("hits", &self.get_hits())
            .finish()
    }
}

/// Parse a textual hit amount.
///
/// Amounts are unsigned; negative or non-numeric input is rejected.
pub fn parse_amount(raw: &str) -> Result<u64> {
    let trimmed = raw.trim();
    trimmed.parse::<u64>().map_err(|_| {
        HitError::invalid_argument(format!(
            "hit amount must be a non-negative integer, got {:?}",
            trimmed
        ))
    })
}
