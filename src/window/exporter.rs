//! Snapshot export of a window registry.
//!
//! Pure read: walks the registry's entries, zips every tuple against the
//! declared label names by position and reads each counter's window sum.

use super::registry::WindowRegistry;
use crate::error::{HitError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One label tuple's trailing-window total at export time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRecord {
    pub labels: BTreeMap<String, String>,
    pub hits: u64,
}

/// Converts a registry's current state into [`SnapshotRecord`]s
#[derive(Debug, Clone)]
pub struct SnapshotExporter {
    registry: Arc<WindowRegistry>,
}

impl SnapshotExporter {
    pub fn new(registry: Arc<WindowRegistry>) -> Self {
        SnapshotExporter { registry }
    }

    pub fn registry(&self) -> &Arc<WindowRegistry> {
        &self.registry
    }

    /// One record per known tuple, ordered by label tuple.
    ///
    /// Values beyond the declared label names are dropped; names beyond
    /// the tuple's length are left out of that record.
    pub fn snapshot(&self) -> Vec<SnapshotRecord> {
        let names = self.registry.label_names();

        self.registry
            .entries()
            .into_iter()
            .map(|(key, counter)| SnapshotRecord {
                labels: zip_labels(&names, key.values()),
                hits: counter.get_hits(),
            })
            .collect()
    }

    /// Like [`snapshot`](SnapshotExporter::snapshot), but every tuple must
    /// carry exactly one value per declared label name.
    ///
    /// Positional zipping maps `["general", "false"]` and
    /// `["general", "false", "extra"]` to the same labels, so a sink keyed
    /// by labels would merge them. Such tuples are rejected instead.
    pub fn checked_snapshot(&self) -> Result<Vec<SnapshotRecord>> {
        let names = self.registry.label_names();

        self.registry
            .entries()
            .into_iter()
            .map(|(key, counter)| {
                if key.len() != names.len() {
                    return Err(HitError::invalid_argument(format!(
                        "label tuple {:?} has {} values, expected {} ({:?})",
                        key.values(),
                        key.len(),
                        names.len(),
                        names
                    )));
                }
                Ok(SnapshotRecord {
                    labels: zip_labels(&names, key.values()),
                    hits: counter.get_hits(),
                })
            })
            .collect()
    }
}

fn zip_labels(names: &[String], values: &[String]) -> BTreeMap<String, String> {
    names.iter().cloned().zip(values.iter().cloned()).collect()
}
