//! The tracking configuration object shared by the engine and its host.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use super::fluent::{FluentConfiguration, OverrideTrackingResponse, TrackAllResponse};
use super::settings::TrackingSettings;
use super::soft_delete::SoftDeleteCriteria;
use super::store::TrackingConfigStore;
use super::username::UsernameProvider;
use crate::catalog::{EntityCatalog, EntityType};
use crate::error::Error;

/// All tracking policy for one host.
///
/// Configure it once at startup, share it through an `Arc`, and call
/// [`reset`](Self::reset) between isolated test runs. Concurrent reads of a
/// settled configuration are safe; concurrent writers are not coordinated.
#[derive(Debug)]
pub struct GlobalTrackingConfig {
    enabled: AtomicBool,
    track_empty_properties: AtomicBool,
    disconnected_context: AtomicBool,
    catalog: EntityCatalog,
    store: TrackingConfigStore,
    fluent: FluentConfiguration,
    soft_delete: RwLock<Option<SoftDeleteCriteria>>,
    username: RwLock<UsernameProvider>,
}

impl Default for GlobalTrackingConfig {
    fn default() -> Self {
        Self::from_settings(&TrackingSettings::default())
    }
}

impl GlobalTrackingConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration from loaded settings.
    pub fn from_settings(settings: &TrackingSettings) -> Self {
        let mut username = UsernameProvider::new();
        if let Some(name) = &settings.default_username {
            username.set_constant(name.clone());
        }

        Self {
            enabled: AtomicBool::new(settings.enabled),
            track_empty_properties: AtomicBool::new(
                settings.track_empty_properties_on_addition_and_deletion,
            ),
            disconnected_context: AtomicBool::new(settings.disconnected_context),
            catalog: EntityCatalog::new(),
            store: TrackingConfigStore::new(),
            fluent: FluentConfiguration::new(),
            soft_delete: RwLock::new(None),
            username: RwLock::new(username),
        }
    }

    /// Whether audit drafting is enabled at all.
    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable audit drafting globally.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether add/delete logs list every included property, even empty ones.
    pub fn track_empty_properties_on_addition_and_deletion(&self) -> bool {
        self.track_empty_properties.load(Ordering::SeqCst)
    }

    /// Set the add/delete empty-property flag.
    pub fn set_track_empty_properties_on_addition_and_deletion(&self, value: bool) {
        self.track_empty_properties.store(value, Ordering::SeqCst);
    }

    /// Whether original values are read back from the store.
    pub fn disconnected_context(&self) -> bool {
        self.disconnected_context.load(Ordering::SeqCst)
    }

    /// Set the disconnected-context flag.
    pub fn set_disconnected_context(&self, value: bool) {
        self.disconnected_context.store(value, Ordering::SeqCst);
    }

    /// The entity metadata catalog.
    pub fn catalog(&self) -> &EntityCatalog {
        &self.catalog
    }

    /// The tracking decision cache.
    pub fn store(&self) -> &TrackingConfigStore {
        &self.store
    }

    /// The fluent override store.
    pub fn fluent(&self) -> &FluentConfiguration {
        &self.fluent
    }

    /// Register an entity type's metadata.
    pub fn register<T: EntityType>(&self) -> Result<(), Error> {
        self.catalog.register::<T>()
    }

    /// Whether changes to the type are drafted into audit logs.
    ///
    /// A disabled configuration tracks nothing. Otherwise the cached decision
    /// is used, computed from the declarative marker on first lookup.
    pub fn is_tracking_enabled(&self, type_name: &str) -> bool {
        if !self.enabled() {
            return false;
        }
        self.store
            .get_or_compute(type_name, || self.catalog.tracks_changes(type_name))
    }

    /// Whether a property of a tracked type is recorded.
    ///
    /// Resolution order: explicit per-property override, then the type-level
    /// fluent mode, then the declarative skip marker. Anything else is tracked.
    pub fn is_property_tracked(&self, type_name: &str, property: &str) -> bool {
        match self.fluent.is_property_tracked(type_name, property) {
            Some(tracked) => tracked,
            None => !self.catalog.is_property_skipped(type_name, property),
        }
    }

    /// Track every property of `T`, regardless of its declared marker.
    pub fn track_all_properties<T: EntityType>(&self) -> Result<TrackAllResponse<'_>, Error> {
        self.track_all_properties_of(T::FULL_NAME)
    }

    /// Track every property of the named type.
    pub fn track_all_properties_of(&self, type_name: &str) -> Result<TrackAllResponse<'_>, Error> {
        self.fluent.begin_track_all(type_name)?;
        self.store.set(type_name, true);
        debug!(entity = type_name, "Tracking all properties");
        Ok(TrackAllResponse::new(self, type_name))
    }

    /// Track only the listed properties of `T`.
    pub fn track_only_properties<T, I, S>(&self, properties: I) -> Result<(), Error>
    where
        T: EntityType,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fluent.track_only(T::FULL_NAME, properties)?;
        self.store.set(T::FULL_NAME, true);
        Ok(())
    }

    /// Override tracking for `T`.
    pub fn override_tracking<T: EntityType>(&self) -> OverrideTrackingResponse<'_> {
        OverrideTrackingResponse::new(self, T::FULL_NAME)
    }

    /// Override tracking for the named type.
    pub fn override_tracking_of(&self, type_name: &str) -> OverrideTrackingResponse<'_> {
        OverrideTrackingResponse::new(self, type_name)
    }

    /// Register the soft-delete criteria, replacing any previous one.
    pub fn set_soft_deletable_criteria(&self, criteria: SoftDeleteCriteria) {
        debug!(flag = criteria.flag_property(), "Soft-delete criteria registered");
        *self.soft_delete.write() = Some(criteria);
    }

    /// The registered soft-delete criteria.
    pub fn soft_delete_criteria(&self) -> Option<SoftDeleteCriteria> {
        self.soft_delete.read().clone()
    }

    /// Soft-delete criteria applicable to the type, if it declares the capability.
    pub fn soft_delete_criteria_for(&self, type_name: &str) -> Option<SoftDeleteCriteria> {
        if !self.catalog.is_soft_deletable(type_name) {
            return None;
        }
        self.soft_delete_criteria()
    }

    /// Use a constant user name.
    pub fn configure_username(&self, username: impl Into<String>) {
        self.username.write().set_constant(username);
    }

    /// Use a user name factory.
    pub fn configure_username_factory<F>(&self, factory: F)
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        self.username.write().set_factory(factory);
    }

    /// Resolve the current user name.
    pub fn current_username(&self) -> Option<String> {
        self.username.read().resolve()
    }

    /// Drop every fluent override and the decisions they forced.
    pub fn clear_fluent_configuration(&self) {
        self.fluent.clear();
        self.store.clear();
    }

    /// Restore default settings and drop all registrations, caches, and overrides.
    pub fn reset(&self) {
        let defaults = TrackingSettings::default();
        self.set_enabled(defaults.enabled);
        self.set_track_empty_properties_on_addition_and_deletion(
            defaults.track_empty_properties_on_addition_and_deletion,
        );
        self.set_disconnected_context(defaults.disconnected_context);
        self.catalog.clear();
        self.store.clear();
        self.fluent.clear();
        *self.soft_delete.write() = None;
        *self.username.write() = UsernameProvider::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EntityMetadata;

    struct Marked;

    impl EntityType for Marked {
        const FULL_NAME: &'static str = "app::Marked";

        fn metadata() -> EntityMetadata {
            EntityMetadata::new(Self::FULL_NAME)
                .with_key("Id")
                .track_changes()
                .skip_tracking("Secret")
                .soft_deletable()
        }
    }

    struct Plain;

    impl EntityType for Plain {
        const FULL_NAME: &'static str = "app::Plain";
    }

    fn config() -> GlobalTrackingConfig {
        let config = GlobalTrackingConfig::new();
        config.register::<Marked>().unwrap();
        config.register::<Plain>().unwrap();
        config
    }

    #[test]
    fn test_marker_drives_tracking() {
        let config = config();
        assert!(config.is_tracking_enabled(Marked::FULL_NAME));
        assert!(!config.is_tracking_enabled(Plain::FULL_NAME));
        assert!(!config.is_tracking_enabled("app::Unknown"));
    }

    #[test]
    fn test_global_switch_wins() {
        let config = config();
        config.track_all_properties::<Plain>().unwrap();
        config.set_enabled(false);

        assert!(!config.is_tracking_enabled(Marked::FULL_NAME));
        assert!(!config.is_tracking_enabled(Plain::FULL_NAME));
    }

    #[test]
    fn test_track_all_properties_forces_inclusion() {
        let config = config();
        config
            .track_all_properties::<Plain>()
            .unwrap()
            .except("Internal")
            .unwrap();

        assert!(config.is_tracking_enabled(Plain::FULL_NAME));
        assert!(!config.is_property_tracked(Plain::FULL_NAME, "Internal"));
        assert!(config.is_property_tracked(Plain::FULL_NAME, "Name"));
    }

    #[test]
    fn test_skip_marker_and_fluent_precedence() {
        let config = config();
        assert!(!config.is_property_tracked(Marked::FULL_NAME, "Secret"));

        config.track_all_properties::<Marked>().unwrap();
        assert!(config.is_property_tracked(Marked::FULL_NAME, "Secret"));
    }

    #[test]
    fn test_disable_other_property_keeps_marker_skip() {
        let config = config();
        config.override_tracking::<Marked>().disable_property("Name");

        assert!(!config.is_property_tracked(Marked::FULL_NAME, "Name"));
        assert!(!config.is_property_tracked(Marked::FULL_NAME, "Secret"));
        assert!(config.is_property_tracked(Marked::FULL_NAME, "Email"));
    }

    #[test]
    fn test_enable_property_overrides_marker() {
        let config = config();
        config.override_tracking::<Marked>().enable_property("Secret");
        assert!(config.is_property_tracked(Marked::FULL_NAME, "Secret"));

        config.clear_fluent_configuration();
        assert!(!config.is_property_tracked(Marked::FULL_NAME, "Secret"));
    }

    #[test]
    fn test_property_override_beats_type_mode() {
        let config = config();
        config
            .track_all_properties::<Plain>()
            .unwrap()
            .except("Internal")
            .unwrap();
        config.override_tracking::<Plain>().enable_property("Internal");
        assert!(config.is_property_tracked(Plain::FULL_NAME, "Internal"));

        config.track_only_properties::<Marked, _, _>(["Name"]).unwrap();
        config.override_tracking::<Marked>().disable_property("Name");
        assert!(!config.is_property_tracked(Marked::FULL_NAME, "Name"));
    }

    #[test]
    fn test_override_disable_type() {
        let config = config();
        config.override_tracking::<Marked>().disable();
        assert!(!config.is_tracking_enabled(Marked::FULL_NAME));

        config.override_tracking_of(Marked::FULL_NAME).enable();
        assert!(config.is_tracking_enabled(Marked::FULL_NAME));
    }

    #[test]
    fn test_soft_delete_criteria_requires_capability() {
        let config = config();
        config.set_soft_deletable_criteria(SoftDeleteCriteria::new("IsDeleted"));

        assert!(config.soft_delete_criteria_for(Marked::FULL_NAME).is_some());
        assert!(config.soft_delete_criteria_for(Plain::FULL_NAME).is_none());

        config.set_soft_deletable_criteria(SoftDeleteCriteria::new("Removed"));
        assert_eq!(
            config.soft_delete_criteria().unwrap().flag_property(),
            "Removed"
        );
    }

    #[test]
    fn test_clear_fluent_configuration() {
        let config = config();
        config.track_all_properties::<Plain>().unwrap();
        config.clear_fluent_configuration();

        assert!(!config.is_tracking_enabled(Plain::FULL_NAME));
        assert!(config.fluent().get(Plain::FULL_NAME).is_none());
    }

    #[test]
    fn test_reset() {
        let config = config();
        config.set_enabled(false);
        config.set_disconnected_context(true);
        config.configure_username("rahul");
        config.set_soft_deletable_criteria(SoftDeleteCriteria::new("IsDeleted"));

        config.reset();

        assert!(config.enabled());
        assert!(!config.disconnected_context());
        assert!(config.current_username().is_none());
        assert!(config.soft_delete_criteria().is_none());
        assert!(config.catalog().is_empty());
    }

    #[test]
    fn test_from_settings() {
        let settings = TrackingSettings {
            enabled: false,
            track_empty_properties_on_addition_and_deletion: true,
            disconnected_context: true,
            default_username: Some("system".into()),
        };
        let config = GlobalTrackingConfig::from_settings(&settings);

        assert!(!config.enabled());
        assert!(config.track_empty_properties_on_addition_and_deletion());
        assert!(config.disconnected_context());
        assert_eq!(config.current_username().as_deref(), Some("system"));
    }
}
