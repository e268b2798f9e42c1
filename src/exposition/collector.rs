//! Scrape-time collection of windowed gauges, grouped by scope.
//!
//! A scope is one scrape target (one guild in a chat bot, one tenant in a
//! service) with its own `prometheus::Registry`. Rendering a scope updates
//! each of its gauges from its window registry, then gathers and encodes
//! the scope's registry in the text format.

use super::gauge::WindowedGauge;
use crate::error::Result;
use crate::window::{EvictionSource, WindowRegistry};
use parking_lot::{Mutex, RwLock};
use prometheus::{Encoder, Registry, TextEncoder};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone, Default)]
struct Scope {
    registry: Registry,
    gauges: Vec<Arc<WindowedGauge>>,
    // update-then-gather must not interleave with another render
    render_lock: Arc<Mutex<()>>,
}

#[derive(Default)]
pub struct Collector {
    scopes: RwLock<BTreeMap<String, Scope>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `gauge` to `scope`, creating the scope if needed.
    ///
    /// Metric names are unique within a scope.
    pub fn register(&self, scope: &str, gauge: WindowedGauge) -> Result<Arc<WindowedGauge>> {
        let mut scopes = self.scopes.write();
        let entry = scopes.entry(scope.to_string()).or_default();
        entry.registry.register(Box::new(gauge.vec().clone()))?;

        let gauge = Arc::new(gauge);
        entry.gauges.push(Arc::clone(&gauge));
        Ok(gauge)
    }

    pub fn scopes(&self) -> Vec<String> {
        self.scopes.read().keys().cloned().collect()
    }

    /// Registry behind metric `name` in `scope`
    pub fn registry(&self, scope: &str, name: &str) -> Option<Arc<WindowRegistry>> {
        self.scopes
            .read()
            .get(scope)?
            .gauges
            .iter()
            .find(|g| g.name() == name)
            .map(|g| Arc::clone(g.registry()))
    }

    /// Every registry in every scope
    pub fn registries(&self) -> Vec<Arc<WindowRegistry>> {
        self.scopes
            .read()
            .values()
            .flat_map(|scope| scope.gauges.iter())
            .map(|g| Arc::clone(g.registry()))
            .collect()
    }

    /// Update every gauge of `scope` and encode the scope's registry.
    /// `None` for unknown scopes.
    ///
    /// A gauge that fails to update keeps its previous series and is logged.
    /// Gauges with no series are left out of the output.
    pub fn render(&self, scope: &str) -> Option<String> {
        let state = self.scopes.read().get(scope)?.clone();
        let _guard = state.render_lock.lock();

        for gauge in &state.gauges {
            if let Err(e) = gauge.update() {
                warn!(scope = %scope, metric = %gauge.name(), "Failed to update gauge: {}", e);
            }
        }

        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&state.registry.gather(), &mut buffer) {
            warn!(scope = %scope, "Failed to encode metrics: {}", e);
        }
        Some(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl EvictionSource for Collector {
    fn registries(&self) -> Vec<Arc<WindowRegistry>> {
        Collector::registries(self)
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scopes = self.scopes.read();
        f.debug_map()
            .entries(scopes.iter().map(|(name, scope)| (name, &scope.gauges)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::manual_clock;

    fn gauge(name: &str, labels: &[&str]) -> WindowedGauge {
        let registry = Arc::new(WindowRegistry::with_clock(
            labels.iter().copied(),
            60,
            Arc::new(manual_clock()),
        ));
        WindowedGauge::new(name, format!("{} help", name), registry).unwrap()
    }

    #[test]
    fn test_duplicate_metric_rejected_per_scope() {
        let collector = Collector::new();
        collector.register("guild-1", gauge("events", &["event"])).unwrap();
        collector.register("guild-2", gauge("events", &["event"])).unwrap();

        let err = collector
            .register("guild-1", gauge("events", &["event"]))
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(collector.scopes(), vec!["guild-1", "guild-2"]);
        assert_eq!(collector.registries().len(), 2);
    }

    #[test]
    fn test_render_unknown_scope() {
        let collector = Collector::new();
        assert!(collector.render("missing").is_none());
    }

    #[test]
    fn test_render_text_format() {
        let collector = Collector::new();
        collector.register("default", gauge("b_events", &["event"])).unwrap();
        collector
            .register("default", gauge("a_messages", &["channel", "bot"]))
            .unwrap();
        collector.register("default", gauge("c_idle", &["event"])).unwrap();

        collector
            .registry("default", "b_events")
            .unwrap()
            .hit_by(&["message"], 2);
        collector
            .registry("default", "a_messages")
            .unwrap()
            .hit(&["say \"hi\"\\\n", "false"]);

        let out = collector.render("default").unwrap();
        assert_eq!(
            out,
            "# HELP a_messages a_messages help\n\
             # TYPE a_messages gauge\n\
             a_messages{bot=\"false\",channel=\"say \\\"hi\\\"\\\\\\n\"} 1\n\
             # HELP b_events b_events help\n\
             # TYPE b_events gauge\n\
             b_events{event=\"message\"} 2\n"
        );
    }

    #[test]
    fn test_render_logs_and_keeps_failed_gauge() {
        let collector = Collector::new();
        collector.register("default", gauge("events", &["event"])).unwrap();
        let registry = collector.registry("default", "events").unwrap();

        registry.hit(&["message"]);
        let before = collector.render("default").unwrap();
        assert!(before.contains("events{event=\"message\"} 1\n"));

        registry.hit(&["message", "extra"]);
        assert_eq!(collector.render("default").unwrap(), before);
    }

    #[test]
    fn test_evictor_sees_scopes_registered_later() {
        use crate::window::Evictor;
        use std::time::Duration;

        let collector = Arc::new(Collector::new());
        let evictor = Evictor::new(Arc::clone(&collector), Duration::from_millis(500)).unwrap();
        assert_eq!(evictor.tick(), 0);

        collector.register("guild-1", gauge("events", &["event"])).unwrap();
        collector
            .registry("guild-1", "events")
            .unwrap()
            .hit(&["message"]);
        assert_eq!(evictor.tick(), 1);
    }
}
