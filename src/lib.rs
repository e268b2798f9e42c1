//! Sliding-window labeled hit counters for pull-based metrics.
//!
//! Producers call [`WindowRegistry::hit`] with a tuple of label values;
//! a scrape-time collaborator asks a [`SnapshotExporter`] (or a
//! [`Collector`]) for the trailing-window totals of every tuple seen so far.

pub mod clock;
pub mod config;
pub mod error;
pub mod exposition;
pub mod ingest;
pub mod observability;
pub mod window;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock, Timestamp};
pub use config::{Config, MetricConfig};
pub use error::{HitError, Result};
pub use exposition::{Collector, WindowedGauge, CONTENT_TYPE};
pub use window::{
    EvictionSource, Evictor, EvictorHandle, LabelKey, SnapshotExporter, SnapshotRecord, WindowCounter,
    WindowRegistry,
};
