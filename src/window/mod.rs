//! Sliding-window labeled hit counting
//!
//! - [`WindowCounter`]: one ring of one-second buckets
//! - [`WindowRegistry`]: label tuple to counter, created on first hit
//! - [`SnapshotExporter`]: point-in-time records for a metrics sink
//! - [`Evictor`]: background tick that keeps quiet counters fresh

mod counter;
mod evictor;
mod exporter;
mod registry;

pub use counter::{parse_amount, WindowCounter, MAX_WINDOW_SECONDS};
pub use evictor::{EvictionSource, Evictor, EvictorHandle, DEFAULT_EVICT_INTERVAL};
pub use exporter::{SnapshotExporter, SnapshotRecord};
pub use registry::{LabelKey, WindowRegistry, DEFAULT_WINDOW_SECONDS};
