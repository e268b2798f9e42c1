//! Pull-metrics exposition
//!
//! Bridges window snapshots to the line-based text format a metrics
//! collector scrapes: `name{label="value",...} value`.

mod collector;
mod gauge;

pub use collector::Collector;
pub use gauge::{WindowedGauge, CONTENT_TYPE};
