//! Periodic Evictor
//!
//! Background task that advances every live counter to "now" on a fixed
//! sub-second tick, so quiet label tuples shed old buckets even when no
//! hits arrive. Owned explicitly through an [`EvictorHandle`] and stopped
//! with a cancellation token on shutdown.

use super::registry::WindowRegistry;
use crate::error::{HitError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Two ticks per second, so no second boundary goes unseen
pub const DEFAULT_EVICT_INTERVAL: Duration = Duration::from_millis(500);

/// Registries an evictor visits, re-read on every tick
pub trait EvictionSource: Send + Sync + 'static {
    fn registries(&self) -> Vec<Arc<WindowRegistry>>;
}

impl EvictionSource for Vec<Arc<WindowRegistry>> {
    fn registries(&self) -> Vec<Arc<WindowRegistry>> {
        self.clone()
    }
}

impl<T: EvictionSource + ?Sized> EvictionSource for Arc<T> {
    fn registries(&self) -> Vec<Arc<WindowRegistry>> {
        (**self).registries()
    }
}

pub struct Evictor {
    source: Box<dyn EvictionSource>,
    period: Duration,
}

impl Evictor {
    /// Create an evictor over `source` ticking every `period`.
    ///
    /// `period` must be non-zero and shorter than one second.
    pub fn new(source: impl EvictionSource, period: Duration) -> Result<Self> {
        if period.is_zero() || period >= Duration::from_secs(1) {
            return Err(HitError::invalid_argument(format!(
                "evict interval must be between 1ms and 999ms, got {:?}",
                period
            )));
        }
        Ok(Evictor {
            source: Box::new(source),
            period,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run one eviction pass over all registries, returning the number of
    /// counters touched
    pub fn tick(&self) -> usize {
        self.source
            .registries()
            .iter()
            .map(|r| r.evict_all())
            .sum()
    }

    /// Tick until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!("Evictor started, period {:?}", self.period);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let touched = self.tick();
                    trace!("Evictor advanced {} counters", touched);
                }
            }
        }

        debug!("Evictor stopped");
    }

    /// Spawn the tick loop on the current tokio runtime
    pub fn spawn(self) -> EvictorHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        EvictorHandle { cancel, task }
    }
}

/// Handle for stopping a spawned [`Evictor`]
pub struct EvictorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EvictorHandle {
    /// Token that stops the evictor when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the evictor to stop and wait for the task to exit.
    ///
    /// In-flight counts are not flushed anywhere; they simply stop aging.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Evictor task ended abnormally: {}", e);
        }
    }
}
