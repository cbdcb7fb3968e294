//! Entity metadata definitions.

use crate::error::Error;

/// Declarative markers an entity type may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityAttribute {
    /// Changes to the type are audited.
    TrackChanges,
}

/// Audit metadata for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMetadata {
    /// Fully qualified type name.
    pub full_name: String,
    /// Key property names in declared order.
    pub key_properties: Vec<String>,
    /// Declared entity-level markers.
    pub attributes: Vec<EntityAttribute>,
    /// Properties marked to be skipped by auditing.
    pub skipped_properties: Vec<String>,
    /// Whether the type carries a soft-delete flag.
    pub soft_deletable: bool,
}

impl EntityMetadata {
    /// Create metadata with no keys and no markers.
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            key_properties: Vec::new(),
            attributes: Vec::new(),
            skipped_properties: Vec::new(),
            soft_deletable: false,
        }
    }

    /// Append a key property. Call order is the declared key order.
    pub fn with_key(mut self, property: impl Into<String>) -> Self {
        self.key_properties.push(property.into());
        self
    }

    /// Declare a marker.
    pub fn with_attribute(mut self, attribute: EntityAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Declare the track-changes marker.
    pub fn track_changes(self) -> Self {
        self.with_attribute(EntityAttribute::TrackChanges)
    }

    /// Mark a property to be skipped by auditing.
    pub fn skip_tracking(mut self, property: impl Into<String>) -> Self {
        self.skipped_properties.push(property.into());
        self
    }

    /// Declare the soft-delete capability.
    pub fn soft_deletable(mut self) -> Self {
        self.soft_deletable = true;
        self
    }

    /// Whether the track-changes marker is present.
    ///
    /// Fails if the marker is declared more than once.
    pub fn tracks_changes(&self) -> Result<bool, Error> {
        let count = self
            .attributes
            .iter()
            .filter(|a| **a == EntityAttribute::TrackChanges)
            .count();

        match count {
            0 => Ok(false),
            1 => Ok(true),
            n => Err(Error::Configuration(format!(
                "entity {} declares the track-changes marker {} times",
                self.full_name, n
            ))),
        }
    }

    /// Whether a property carries the skip-tracking marker.
    pub fn is_skipped(&self, property: &str) -> bool {
        self.skipped_properties.iter().any(|p| p == property)
    }

    /// Validate the metadata.
    pub fn validate(&self) -> Result<(), Error> {
        if self.full_name.is_empty() {
            return Err(Error::Configuration("entity type name is empty".into()));
        }

        self.tracks_changes()?;

        for (i, key) in self.key_properties.iter().enumerate() {
            if self.key_properties[..i].contains(key) {
                return Err(Error::Configuration(format!(
                    "entity {} declares key property {} twice",
                    self.full_name, key
                )));
            }
        }

        Ok(())
    }
}

/// An entity type known to the audit engine.
///
/// ```ignore
/// struct Invoice { id: i64, paid: bool }
///
/// impl EntityType for Invoice {
///     const FULL_NAME: &'static str = "billing::Invoice";
///
///     fn metadata() -> EntityMetadata {
///         EntityMetadata::new(Self::FULL_NAME).with_key("Id").track_changes()
///     }
/// }
/// ```
pub trait EntityType: 'static {
    /// Fully qualified type name, used as the audit identity.
    const FULL_NAME: &'static str;

    /// Audit metadata for the type.
    fn metadata() -> EntityMetadata {
        EntityMetadata::new(Self::FULL_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_builder() {
        let meta = EntityMetadata::new("app::Order")
            .with_key("TenantId")
            .with_key("OrderNo")
            .track_changes()
            .skip_tracking("Checksum")
            .soft_deletable();

        assert_eq!(meta.key_properties, vec!["TenantId", "OrderNo"]);
        assert!(meta.tracks_changes().unwrap());
        assert!(meta.is_skipped("Checksum"));
        assert!(!meta.is_skipped("OrderNo"));
        assert!(meta.soft_deletable);
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn test_missing_marker_is_not_tracked() {
        let meta = EntityMetadata::new("app::Poco");
        assert!(!meta.tracks_changes().unwrap());
    }

    #[test]
    fn test_duplicate_marker_is_configuration_error() {
        let meta = EntityMetadata::new("app::Twice").track_changes().track_changes();
        assert!(matches!(meta.tracks_changes(), Err(Error::Configuration(_))));
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_duplicate_key_is_configuration_error() {
        let meta = EntityMetadata::new("app::Dup").with_key("Id").with_key("Id");
        assert!(meta.validate().is_err());
    }
}
