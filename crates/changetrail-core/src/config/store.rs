//! Process-wide cache of per-type tracking decisions.

use dashmap::DashMap;

/// Immutable tracked / not-tracked decision for one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingConfigurationValue {
    tracked: bool,
}

impl TrackingConfigurationValue {
    /// Create a decision.
    pub fn new(tracked: bool) -> Self {
        Self { tracked }
    }

    /// Whether the type is tracked.
    pub fn is_tracked(&self) -> bool {
        self.tracked
    }
}

/// Cache of tracking decisions keyed by fully qualified type name.
///
/// Entries are computed lazily and never invalidated, except by [`clear`]
/// or by an explicit fluent override through [`set`].
///
/// [`clear`]: TrackingConfigStore::clear
/// [`set`]: TrackingConfigStore::set
#[derive(Debug, Default)]
pub struct TrackingConfigStore {
    entries: DashMap<String, TrackingConfigurationValue>,
}

impl TrackingConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached decision for `key`, computing and storing it on a miss.
    ///
    /// `compute` runs outside the map's shard lock, so two racing callers may
    /// both compute; the first stored value wins and both callers observe it.
    pub fn get_or_compute<F>(&self, key: &str, compute: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        if let Some(entry) = self.entries.get(key) {
            return entry.is_tracked();
        }

        let computed = TrackingConfigurationValue::new(compute());
        self.entries
            .entry(key.to_string())
            .or_insert(computed)
            .is_tracked()
    }

    /// Store a decision, replacing any cached one.
    pub fn set(&self, key: &str, tracked: bool) {
        self.entries
            .insert(key.to_string(), TrackingConfigurationValue::new(tracked));
    }

    /// Get a cached decision without computing.
    pub fn get(&self, key: &str) -> Option<TrackingConfigurationValue> {
        self.entries.get(key).map(|entry| *entry)
    }

    /// Number of cached decisions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached decision.
    pub fn clear(&self) {
        self.entries.clear();
    }
}
