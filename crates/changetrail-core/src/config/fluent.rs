//! Fluent per-type property overrides.

use std::collections::BTreeSet;

use dashmap::DashMap;

use super::global::GlobalTrackingConfig;
use crate::error::Error;

/// Property selection override for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyTrackingOverride {
    /// Track every property except the listed ones.
    TrackAllExcept(BTreeSet<String>),
    /// Track only the listed properties.
    TrackOnly(BTreeSet<String>),
}

impl PropertyTrackingOverride {
    /// Whether the override lets `property` through.
    pub fn is_tracked(&self, property: &str) -> bool {
        match self {
            PropertyTrackingOverride::TrackAllExcept(excluded) => !excluded.contains(property),
            PropertyTrackingOverride::TrackOnly(included) => included.contains(property),
        }
    }

    fn mode(&self) -> &'static str {
        match self {
            PropertyTrackingOverride::TrackAllExcept(_) => "track-all-except",
            PropertyTrackingOverride::TrackOnly(_) => "track-only",
        }
    }
}

/// Store of fluent property overrides keyed by entity type name.
#[derive(Debug, Default)]
pub struct FluentConfiguration {
    overrides: DashMap<String, PropertyTrackingOverride>,
    // (type name, property) -> tracked
    properties: DashMap<(String, String), bool>,
}

impl FluentConfiguration {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or continue) a track-all-except override.
    ///
    /// Fails if the type already has a track-only override.
    pub fn begin_track_all(&self, type_name: &str) -> Result<(), Error> {
        let entry = self
            .overrides
            .entry(type_name.to_string())
            .or_insert_with(|| PropertyTrackingOverride::TrackAllExcept(BTreeSet::new()));

        match &*entry {
            PropertyTrackingOverride::TrackAllExcept(_) => Ok(()),
            other => Err(conflict(type_name, other)),
        }
    }

    /// Exclude a property under a track-all-except override.
    pub fn exclude(&self, type_name: &str, property: &str) -> Result<(), Error> {
        let mut entry = self
            .overrides
            .entry(type_name.to_string())
            .or_insert_with(|| PropertyTrackingOverride::TrackAllExcept(BTreeSet::new()));

        match &mut *entry {
            PropertyTrackingOverride::TrackAllExcept(excluded) => {
                excluded.insert(property.to_string());
                Ok(())
            }
            other => Err(conflict(type_name, other)),
        }
    }

    /// Install a track-only override with the given properties.
    ///
    /// Fails if the type already excludes properties under a track-all-except
    /// override.
    pub fn track_only<I, S>(&self, type_name: &str, properties: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let listed: BTreeSet<String> = properties.into_iter().map(Into::into).collect();
        let mut entry = self
            .overrides
            .entry(type_name.to_string())
            .or_insert_with(|| PropertyTrackingOverride::TrackOnly(BTreeSet::new()));

        if let PropertyTrackingOverride::TrackAllExcept(excluded) = &*entry {
            if !excluded.is_empty() {
                return Err(conflict(type_name, &entry));
            }
            *entry = PropertyTrackingOverride::TrackOnly(BTreeSet::new());
        }

        if let PropertyTrackingOverride::TrackOnly(included) = &mut *entry {
            included.extend(listed);
        }
        Ok(())
    }

    /// Stop tracking one property, whatever the type-level mode.
    pub fn disable_property(&self, type_name: &str, property: &str) {
        self.properties
            .insert((type_name.to_string(), property.to_string()), false);
    }

    /// Track one property, whatever the type-level mode or skip marker.
    pub fn enable_property(&self, type_name: &str, property: &str) {
        self.properties
            .insert((type_name.to_string(), property.to_string()), true);
    }

    /// Override decision for a property, or `None` if nothing overrides it.
    ///
    /// An explicit per-property override wins over the type-level mode.
    pub fn is_property_tracked(&self, type_name: &str, property: &str) -> Option<bool> {
        let key = (type_name.to_string(), property.to_string());
        if let Some(tracked) = self.properties.get(&key) {
            return Some(*tracked);
        }

        self.overrides
            .get(type_name)
            .map(|entry| entry.is_tracked(property))
    }

    /// Get the override for a type.
    pub fn get(&self, type_name: &str) -> Option<PropertyTrackingOverride> {
        self.overrides.get(type_name).map(|entry| entry.clone())
    }

    /// Drop every override.
    pub fn clear(&self) {
        self.overrides.clear();
        self.properties.clear();
    }
}

fn conflict(type_name: &str, existing: &PropertyTrackingOverride) -> Error {
    Error::Configuration(format!(
        "conflicting property overrides for {}: a {} override is already configured",
        type_name,
        existing.mode()
    ))
}

/// Handle returned by [`GlobalTrackingConfig::track_all_properties`].
pub struct TrackAllResponse<'a> {
    config: &'a GlobalTrackingConfig,
    type_name: String,
}

impl<'a> TrackAllResponse<'a> {
    pub(crate) fn new(config: &'a GlobalTrackingConfig, type_name: impl Into<String>) -> Self {
        Self {
            config,
            type_name: type_name.into(),
        }
    }

    /// Exclude a property from tracking.
    pub fn except(self, property: &str) -> Result<Self, Error> {
        self.config.fluent().exclude(&self.type_name, property)?;
        Ok(self)
    }
}

/// Handle returned by [`GlobalTrackingConfig::override_tracking`].
pub struct OverrideTrackingResponse<'a> {
    config: &'a GlobalTrackingConfig,
    type_name: String,
}

impl<'a> OverrideTrackingResponse<'a> {
    pub(crate) fn new(config: &'a GlobalTrackingConfig, type_name: impl Into<String>) -> Self {
        Self {
            config,
            type_name: type_name.into(),
        }
    }

    /// Track the type regardless of its declared marker.
    pub fn enable(self) -> Self {
        self.config.store().set(&self.type_name, true);
        self
    }

    /// Stop tracking the type regardless of its declared marker.
    pub fn disable(self) -> Self {
        self.config.store().set(&self.type_name, false);
        self
    }

    /// Resume tracking a property.
    pub fn enable_property(self, property: &str) -> Self {
        self.config.fluent().enable_property(&self.type_name, property);
        self
    }

    /// Stop tracking a property.
    pub fn disable_property(self, property: &str) -> Self {
        self.config.fluent().disable_property(&self.type_name, property);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclude_and_lookup() {
        let fluent = FluentConfiguration::new();
        fluent.exclude("app::User", "PasswordHash").unwrap();

        assert_eq!(fluent.is_property_tracked("app::User", "PasswordHash"), Some(false));
        assert_eq!(fluent.is_property_tracked("app::User", "Name"), Some(true));
        assert_eq!(fluent.is_property_tracked("app::Other", "Name"), None);
    }

    #[test]
    fn test_track_only() {
        let fluent = FluentConfiguration::new();
        fluent.track_only("app::User", ["Name", "Email"]).unwrap();

        assert_eq!(fluent.is_property_tracked("app::User", "Name"), Some(true));
        assert_eq!(fluent.is_property_tracked("app::User", "Age"), Some(false));
    }

    #[test]
    fn test_track_only_replaces_empty_track_all() {
        let fluent = FluentConfiguration::new();
        fluent.begin_track_all("app::User").unwrap();
        fluent.track_only("app::User", ["Name"]).unwrap();

        assert_eq!(fluent.is_property_tracked("app::User", "Age"), Some(false));
    }

    #[test]
    fn test_mixed_modes_conflict() {
        let fluent = FluentConfiguration::new();
        fluent.exclude("app::User", "Age").unwrap();
        assert!(matches!(
            fluent.track_only("app::User", ["Name"]),
            Err(Error::Configuration(_))
        ));

        fluent.track_only("app::Post", ["Title"]).unwrap();
        assert!(fluent.exclude("app::Post", "Body").is_err());
        assert!(fluent.begin_track_all("app::Post").is_err());
    }

    #[test]
    fn test_property_override_beats_type_mode() {
        let fluent = FluentConfiguration::new();

        fluent.disable_property("app::User", "Age");
        assert_eq!(fluent.is_property_tracked("app::User", "Age"), Some(false));
        assert_eq!(fluent.is_property_tracked("app::User", "Name"), None);
        assert!(fluent.get("app::User").is_none());
        fluent.enable_property("app::User", "Age");
        assert_eq!(fluent.is_property_tracked("app::User", "Age"), Some(true));

        fluent.track_only("app::Post", ["Title"]).unwrap();
        fluent.enable_property("app::Post", "Body");
        fluent.disable_property("app::Post", "Title");
        assert_eq!(fluent.is_property_tracked("app::Post", "Body"), Some(true));
        assert_eq!(fluent.is_property_tracked("app::Post", "Title"), Some(false));
    }

    #[test]
    fn test_clear() {
        let fluent = FluentConfiguration::new();
        fluent.exclude("app::User", "Age").unwrap();
        fluent.enable_property("app::User", "Name");
        fluent.clear();
        assert!(fluent.get("app::User").is_none());
        assert_eq!(fluent.is_property_tracked("app::User", "Name"), None);
    }
}
