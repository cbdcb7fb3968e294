//! Catalog of registered entity metadata.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use super::entity::{EntityMetadata, EntityType};
use crate::error::Error;

/// Registry of entity metadata, keyed by fully qualified type name.
///
/// Registration happens at startup; lookups are concurrent reads.
#[derive(Debug, Default)]
pub struct EntityCatalog {
    entities: RwLock<HashMap<String, EntityMetadata>>,
}

impl EntityCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the metadata declared by an entity type.
    pub fn register<T: EntityType>(&self) -> Result<(), Error> {
        self.register_metadata(T::metadata())
    }

    /// Register metadata directly.
    ///
    /// Invalid metadata (duplicate markers, duplicate keys) is rejected here,
    /// at configuration time. Registering a type again replaces its metadata.
    pub fn register_metadata(&self, metadata: EntityMetadata) -> Result<(), Error> {
        metadata.validate()?;

        debug!(
            entity = %metadata.full_name,
            keys = metadata.key_properties.len(),
            soft_deletable = metadata.soft_deletable,
            "Registered entity metadata"
        );

        self.entities
            .write()
            .insert(metadata.full_name.clone(), metadata);
        Ok(())
    }

    /// Get metadata for a type.
    pub fn get(&self, full_name: &str) -> Option<EntityMetadata> {
        self.entities.read().get(full_name).cloned()
    }

    /// Whether the type carries the track-changes marker.
    ///
    /// Unregistered types are not tracked.
    pub fn tracks_changes(&self, full_name: &str) -> bool {
        self.entities
            .read()
            .get(full_name)
            .map(|m| m.tracks_changes().unwrap_or(false))
            .unwrap_or(false)
    }

    /// Whether a property of the type carries the skip-tracking marker.
    pub fn is_property_skipped(&self, full_name: &str, property: &str) -> bool {
        self.entities
            .read()
            .get(full_name)
            .map(|m| m.is_skipped(property))
            .unwrap_or(false)
    }

    /// Whether the type declares the soft-delete capability.
    pub fn is_soft_deletable(&self, full_name: &str) -> bool {
        self.entities
            .read()
            .get(full_name)
            .map(|m| m.soft_deletable)
            .unwrap_or(false)
    }

    /// Declared key order for the type, if registered.
    pub fn key_properties(&self, full_name: &str) -> Option<Vec<String>> {
        self.entities
            .read()
            .get(full_name)
            .map(|m| m.key_properties.clone())
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    /// Check if no types are registered.
    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    /// Remove every registration.
    pub fn clear(&self) {
        self.entities.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Invoice;

    impl EntityType for Invoice {
        const FULL_NAME: &'static str = "billing::Invoice";

        fn metadata() -> EntityMetadata {
            EntityMetadata::new(Self::FULL_NAME)
                .with_key("Id")
                .track_changes()
                .skip_tracking("Pdf")
        }
    }

    struct Untracked;

    impl EntityType for Untracked {
        const FULL_NAME: &'static str = "billing::Untracked";
    }

    #[test]
    fn test_register_and_lookup() {
        let catalog = EntityCatalog::new();
        catalog.register::<Invoice>().unwrap();
        catalog.register::<Untracked>().unwrap();

        assert_eq!(catalog.len(), 2);
        assert!(catalog.tracks_changes(Invoice::FULL_NAME));
        assert!(!catalog.tracks_changes(Untracked::FULL_NAME));
        assert!(catalog.is_property_skipped(Invoice::FULL_NAME, "Pdf"));
        assert_eq!(
            catalog.key_properties(Invoice::FULL_NAME),
            Some(vec!["Id".to_string()])
        );
    }

    #[test]
    fn test_unregistered_type_is_not_tracked() {
        let catalog = EntityCatalog::new();
        assert!(!catalog.tracks_changes("nowhere::Nothing"));
        assert!(catalog.get("nowhere::Nothing").is_none());
    }

    #[test]
    fn test_invalid_metadata_rejected_at_registration() {
        let catalog = EntityCatalog::new();
        let result = catalog.register_metadata(
            EntityMetadata::new("app::Twice").track_changes().track_changes(),
        );

        assert!(matches!(result, Err(Error::Configuration(_))));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_clear() {
        let catalog = EntityCatalog::new();
        catalog.register::<Invoice>().unwrap();
        catalog.clear();
        assert!(catalog.is_empty());
    }
}
