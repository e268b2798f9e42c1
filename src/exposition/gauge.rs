//! Windowed gauges backed by `prometheus::IntGaugeVec`
//!
//! A gauge is reset and repopulated from a fresh snapshot on every scrape,
//! so label tuples that stop occurring drop out of the output instead of
//! freezing at their last value.

use crate::error::{HitError, Result};
use crate::window::{SnapshotExporter, SnapshotRecord, WindowRegistry};
use parking_lot::Mutex;
use prometheus::core::Collector as _;
use prometheus::{IntGaugeVec, Opts};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Content type of the text exposition format
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// A window registry published through one labelled gauge.
///
/// Every [`update`](WindowedGauge::update) resets the gauge and refills it
/// from a fresh snapshot. Label names are captured at construction.
pub struct WindowedGauge {
    name: String,
    label_names: Vec<String>,
    exporter: SnapshotExporter,
    gauge: IntGaugeVec,
    update_lock: Mutex<()>,
}

impl WindowedGauge {
    /// Gauge named `name` with the registry's declared label names.
    ///
    /// An empty `help` is replaced by the metric name.
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        registry: Arc<WindowRegistry>,
    ) -> Result<Self> {
        let name = name.into();
        let mut help = help.into();
        if help.is_empty() {
            help = name.clone();
        }

        let label_names = registry.label_names();
        let names: Vec<&str> = label_names.iter().map(String::as_str).collect();
        let gauge = IntGaugeVec::new(Opts::new(name.clone(), help), &names)?;

        Ok(WindowedGauge {
            name,
            label_names,
            exporter: SnapshotExporter::new(registry),
            gauge,
            update_lock: Mutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    pub fn registry(&self) -> &Arc<WindowRegistry> {
        self.exporter.registry()
    }

    /// The underlying vector, for registering with a `prometheus::Registry`
    pub fn vec(&self) -> &IntGaugeVec {
        &self.gauge
    }

    /// Reset the gauge and set one series per snapshot record.
    ///
    /// Every record is checked before the reset, so on error the gauge
    /// keeps the series from the previous update.
    pub fn update(&self) -> Result<()> {
        let _guard = self.update_lock.lock();

        let records = self.exporter.checked_snapshot()?;
        let rows = records
            .iter()
            .map(|record| Ok((self.label_values(record)?, record.hits)))
            .collect::<Result<Vec<_>>>()?;

        self.gauge.reset();
        for (values, hits) in rows {
            self.gauge
                .get_metric_with_label_values(&values)?
                .set(i64::try_from(hits).unwrap_or(i64::MAX));
        }
        Ok(())
    }

    /// Label values of `record` in declaration order
    fn label_values<'a>(&self, record: &'a SnapshotRecord) -> Result<Vec<&'a str>> {
        if record.labels.len() != self.label_names.len() {
            return Err(HitError::invalid_argument(format!(
                "labels {:?} do not match {:?} declared on {}",
                record.labels, self.label_names, self.name
            )));
        }
        self.label_names
            .iter()
            .map(|name| {
                record.labels.get(name).map(String::as_str).ok_or_else(|| {
                    HitError::invalid_argument(format!(
                        "labels {:?} do not match {:?} declared on {}",
                        record.labels, self.label_names, self.name
                    ))
                })
            })
            .collect()
    }

    /// Current series as of the last update, ordered by labels
    pub fn series(&self) -> Vec<(BTreeMap<String, String>, i64)> {
        let mut series: Vec<_> = self
            .gauge
            .collect()
            .iter()
            .flat_map(|family| family.get_metric())
            .map(|metric| {
                let labels = metric
                    .get_label()
                    .iter()
                    .map(|pair| (pair.get_name().to_string(), pair.get_value().to_string()))
                    .collect();
                (labels, metric.get_gauge().get_value() as i64)
            })
            .collect();
        series.sort();
        series
    }

    /// Value of the series with exactly these labels
    pub fn value(&self, labels: &BTreeMap<String, String>) -> Option<i64> {
        self.series()
            .into_iter()
            .find(|(l, _)| l == labels)
            .map(|(_, v)| v)
    }
}

impl std::fmt::Debug for WindowedGauge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowedGauge")
            .field("name", &self.name)
            .field("label_names", &self.label_names)
            .field("registry", self.exporter.registry())
            .finish()
    }
}
