//! Label-keyed registry of window counters.
//!
//! Each distinct tuple of label values owns exactly one [`WindowCounter`],
//! created the first time the tuple is hit and kept for the registry's
//! lifetime. Keys are structural, so `["a", "b"]` and `["a|b"]` can never
//! resolve to the same counter whatever characters the values contain.

use super::counter::{WindowCounter, MAX_WINDOW_SECONDS};
use crate::clock::{system_clock, SharedClock};
use ahash::RandomState;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Window length used when a registry is built with a window below one second
pub const DEFAULT_WINDOW_SECONDS: u64 = 60;

/// Ordered tuple of label values identifying one counter
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelKey(Box<[String]>);

impl LabelKey {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LabelKey(values.into_iter().map(Into::into).collect())
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for LabelKey {
    fn from(values: Vec<String>) -> Self {
        LabelKey(values.into_boxed_slice())
    }
}

impl<S: AsRef<str>> From<&[S]> for LabelKey {
    fn from(values: &[S]) -> Self {
        LabelKey::new(values.iter().map(|v| v.as_ref().to_string()))
    }
}

type CounterMap = HashMap<LabelKey, Arc<WindowCounter>, RandomState>;

/// Mapping from label tuples to sliding-window counters
pub struct WindowRegistry {
    label_names: RwLock<Vec<String>>,
    window_seconds: u64,
    clock: SharedClock,
    entries: RwLock<CounterMap>,
}

impl WindowRegistry {
    /// Create a registry on the monotonic system clock.
    ///
    /// A `window_seconds` of zero falls back to [`DEFAULT_WINDOW_SECONDS`];
    /// windows above [`MAX_WINDOW_SECONDS`] are clamped.
    pub fn new<I, S>(label_names: I, window_seconds: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_clock(label_names, window_seconds, system_clock())
    }

    pub fn with_clock<I, S>(label_names: I, window_seconds: u64, clock: SharedClock) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let window_seconds = match window_seconds {
            0 => DEFAULT_WINDOW_SECONDS,
            w => w.min(MAX_WINDOW_SECONDS),
        };

        WindowRegistry {
            label_names: RwLock::new(label_names.into_iter().map(Into::into).collect()),
            window_seconds,
            clock,
            entries: RwLock::new(CounterMap::default()),
        }
    }

    pub fn window_seconds(&self) -> u64 {
        self.window_seconds
    }

    pub fn label_names(&self) -> Vec<String> {
        self.label_names.read().clone()
    }

    /// Replace the declared label names. Existing counters are untouched.
    pub fn set_label_names<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.label_names.write() = names.into_iter().map(Into::into).collect();
    }

    /// Record one hit for the given label values
    #[inline]
    pub fn hit<S: AsRef<str>>(&self, label_values: &[S]) {
        self.hit_by(label_values, 1);
    }

    /// Record `amount` hits for the given label values
    pub fn hit_by<S: AsRef<str>>(&self, label_values: &[S], amount: u64) {
        self.counter(LabelKey::from(label_values)).hit_by(amount);
    }

    /// Get the counter for `key`, creating it on first use.
    ///
    /// Two racing first hits on the same key observe the same counter.
    pub fn counter(&self, key: LabelKey) -> Arc<WindowCounter> {
        if let Some(counter) = self.entries.read().get(&key) {
            return Arc::clone(counter);
        }

        let mut entries = self.entries.write();
        let counter = entries.entry(key).or_insert_with(|| {
            Arc::new(WindowCounter::new_unchecked(
                self.window_seconds,
                Arc::clone(&self.clock),
            ))
        });
        Arc::clone(counter)
    }

    /// Counter for `label_values` if the tuple has been hit before
    pub fn get<S: AsRef<str>>(&self, label_values: &[S]) -> Option<Arc<WindowCounter>> {
        self.entries.read().get(&LabelKey::from(label_values)).cloned()
    }

    /// Point-in-time copy of every entry, sorted by key.
    ///
    /// The key set is captured under the map lock; tuples created after the
    /// call are not included. Counters are shared, so their hit totals keep
    /// moving after the copy is taken.
    pub fn entries(&self) -> Vec<(LabelKey, Arc<WindowCounter>)> {
        let mut entries: Vec<_> = self
            .entries
            .read()
            .iter()
            .map(|(key, counter)| (key.clone(), Arc::clone(counter)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Advance every live counter to now. Returns how many were touched.
    pub fn evict_all(&self) -> usize {
        let counters: Vec<Arc<WindowCounter>> = self.entries.read().values().cloned().collect();
        for counter in &counters {
            counter.force_evict();
        }
        counters.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for WindowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowRegistry")
            .field("label_names", &*self.label_names.read())
            .field("window_seconds", &self.window_seconds)
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{manual_clock, ManualClock};

    fn registry(labels: &[&str], window: u64) -> (WindowRegistry, ManualClock) {
        let clock = manual_clock();
        let registry =
            WindowRegistry::with_clock(labels.iter().copied(), window, Arc::new(clock.clone()));
        (registry, clock)
    }

    #[test]
    fn test_zero_window_normalized_to_default() {
        let registry = WindowRegistry::new(["event"], 0);
        assert_eq!(registry.window_seconds(), DEFAULT_WINDOW_SECONDS);
    }

    #[test]
    fn test_huge_window_clamped() {
        let registry = WindowRegistry::new(["event"], u64::MAX);
        assert_eq!(registry.window_seconds(), MAX_WINDOW_SECONDS);
    }

    #[test]
    fn test_lazy_creation_counts() {
        let (registry, _clock) = registry(&["channel", "bot"], 60);
        assert!(registry.is_empty());

        registry.hit(&["general", "false"]);
        assert_eq!(registry.len(), 1);

        registry.hit(&["general", "false"]);
        registry.hit_by(&["general", "false"], 5);
        assert_eq!(registry.len(), 1);

        registry.hit(&["general", "true"]);
        assert_eq!(registry.len(), 2);

        let counter = registry.get(&["general", "false"]).unwrap();
        assert_eq!(counter.get_hits(), 7);
        assert_eq!(counter.window_seconds(), 60);
    }

    #[test]
    fn test_key_isolation() {
        let (registry, _clock) = registry(&["a", "b"], 60);

        registry.hit(&["a", "b"]);
        registry.hit(&["ab"]);
        registry.hit(&["a||b"]);
        registry.hit(&["a", "", "b"]);
        registry.hit(&["a||", "b"]);
        registry.hit(&["a", "||b"]);

        assert_eq!(registry.len(), 6);
        for (_, counter) in registry.entries() {
            assert_eq!(counter.get_hits(), 1);
        }
    }

    #[test]
    fn test_same_tuple_same_counter() {
        let (registry, _clock) = registry(&["event"], 60);
        let a = registry.counter(LabelKey::new(["message"]));
        let b = registry.counter(LabelKey::from(vec!["message".to_string()]));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_entries_sorted() {
        let (registry, _clock) = registry(&["event"], 60);
        for event in ["presenceUpdate", "message", "guildMemberAdd"] {
            registry.hit(&[event]);
        }

        let keys: Vec<_> = registry
            .entries()
            .into_iter()
            .map(|(key, _)| key.values()[0].clone())
            .collect();
        assert_eq!(keys, vec!["guildMemberAdd", "message", "presenceUpdate"]);
    }

    #[test]
    fn test_set_label_names_keeps_counters() {
        let (registry, _clock) = registry(&["event"], 60);
        registry.hit(&["message"]);

        registry.set_label_names(["kind"]);
        assert_eq!(registry.label_names(), vec!["kind".to_string()]);
        assert_eq!(registry.get(&["message"]).unwrap().get_hits(), 1);
    }

    #[test]
    fn test_evict_all_touches_every_counter() {
        let (registry, clock) = registry(&["event"], 2);
        registry.hit(&["message"]);
        registry.hit(&["messageDelete"]);

        clock.advance_secs(2);
        assert_eq!(registry.evict_all(), 2);

        clock.set(crate::clock::Timestamp::ZERO);
        for (_, counter) in registry.entries() {
            assert_eq!(counter.get_hits(), 0);
        }
    }

    #[test]
    fn test_concurrent_first_hits_create_one_counter() {
        let (registry, _clock) = registry(&["event"], 60);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..500 {
                        registry.hit(&["message"]);
                    }
                });
            }
        });

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&["message"]).unwrap().get_hits(), 4000);
    }
}
