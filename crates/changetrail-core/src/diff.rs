//! Change snapshot diffing.
//!
//! Turns one entity's before/after state into an audit log draft:
//!
//! ```text
//! ChangeSnapshot ──► tracked? ──► event type ──► details ──► AuditLog draft
//!                      │            │               │
//!                      │            │               └─ fluent/skip filters, flatten,
//!                      │            │                  invariant text, value diff
//!                      │            └─ soft-delete flag transition on update
//!                      └─ GlobalTrackingConfig::is_tracking_enabled
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use changetrail_proto::{
    AuditLog, AuditLogDetail, ChangeSnapshot, EntityState, EventType, PropertyChange,
    RECORD_ID_SEPARATOR,
};

use crate::config::GlobalTrackingConfig;
use crate::error::Error;

/// Drafts audit logs from change snapshots.
#[derive(Debug, Clone)]
pub struct DiffEngine {
    config: Arc<GlobalTrackingConfig>,
}

impl DiffEngine {
    /// Create an engine over a shared configuration.
    pub fn new(config: Arc<GlobalTrackingConfig>) -> Self {
        Self { config }
    }

    /// The configuration the engine consults.
    pub fn config(&self) -> &Arc<GlobalTrackingConfig> {
        &self.config
    }

    /// Draft an audit log stamped with the current time.
    pub fn draft(&self, snapshot: &ChangeSnapshot) -> Result<Option<AuditLog>, Error> {
        self.draft_at(snapshot, Utc::now())
    }

    /// Draft an audit log stamped with `now`.
    ///
    /// Returns `None` when the type is not tracked, or when an insert yields
    /// no details and empty add/delete payloads are not enabled. Update-class
    /// drafts are returned even with zero details; discarding them is the
    /// caller's decision.
    pub fn draft_at(
        &self,
        snapshot: &ChangeSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Option<AuditLog>, Error> {
        let type_name = snapshot.type_full_name.as_str();
        if !self.config.is_tracking_enabled(type_name) {
            return Ok(None);
        }

        let event_type = self.event_type(snapshot);
        let details = self.details(snapshot, event_type)?;

        if event_type == EventType::Added
            && details.is_empty()
            && !self.config.track_empty_properties_on_addition_and_deletion()
        {
            debug!(entity = type_name, "Insert produced no details, no draft");
            return Ok(None);
        }

        let record_id = self.record_id(snapshot)?;
        let mut log = AuditLog::new(
            type_name,
            record_id,
            event_type,
            now,
            self.config.current_username(),
        );
        log.details = details;

        debug!(
            entity = type_name,
            record_id = %log.record_id,
            event = %log.event_type,
            details = log.details.len(),
            "Drafted audit log"
        );

        Ok(Some(log))
    }

    /// Effective event type for the snapshot.
    pub fn event_type(&self, snapshot: &ChangeSnapshot) -> EventType {
        match snapshot.state {
            EntityState::Added => EventType::Added,
            EntityState::Deleted => EventType::Deleted,
            EntityState::Modified => self.soft_delete_transition(snapshot),
        }
    }

    fn soft_delete_transition(&self, snapshot: &ChangeSnapshot) -> EventType {
        let criteria = match self.config.soft_delete_criteria_for(&snapshot.type_full_name) {
            Some(criteria) => criteria,
            None => return EventType::Modified,
        };

        let flag = match snapshot.property(criteria.flag_property()) {
            Some(flag) => flag,
            None => return EventType::Modified,
        };

        match (
            criteria.is_deleted(&flag.original),
            criteria.is_deleted(&flag.current),
        ) {
            (false, true) => EventType::SoftDeleted,
            (true, false) => EventType::UnDeleted,
            _ => EventType::Modified,
        }
    }

    /// Serialize the snapshot's key in declared key order.
    ///
    /// Registered types use the catalog's key order; unregistered types use
    /// the snapshot's own order. Null key parts render as empty strings.
    pub fn record_id(&self, snapshot: &ChangeSnapshot) -> Result<String, Error> {
        let declared = self
            .config
            .catalog()
            .key_properties(&snapshot.type_full_name)
            .filter(|keys| !keys.is_empty());

        let mut parts = Vec::new();
        match declared {
            Some(keys) => {
                for key in &keys {
                    let value = snapshot.key_value(key).ok_or_else(|| {
                        Error::Configuration(format!(
                            "snapshot of {} lacks key property {}",
                            snapshot.type_full_name, key
                        ))
                    })?;
                    parts.push(value.to_audit_string(key)?.unwrap_or_default());
                }
            }
            None => {
                for (key, value) in &snapshot.key_values {
                    parts.push(value.to_audit_string(key)?.unwrap_or_default());
                }
            }
        }

        if parts.is_empty() {
            return Err(Error::Configuration(format!(
                "snapshot of {} carries no key values",
                snapshot.type_full_name
            )));
        }

        Ok(parts.join(RECORD_ID_SEPARATOR))
    }

    fn details(
        &self,
        snapshot: &ChangeSnapshot,
        event_type: EventType,
    ) -> Result<Vec<AuditLogDetail>, Error> {
        let type_name = snapshot.type_full_name.as_str();
        let track_empty = self.config.track_empty_properties_on_addition_and_deletion();

        let leaves = snapshot
            .properties
            .iter()
            .filter(|p| self.config.is_property_tracked(type_name, &p.name))
            .cloned()
            .flat_map(PropertyChange::flatten);

        let mut details = Vec::new();
        for leaf in leaves {
            let original = leaf.original.to_audit_string(&leaf.name)?;
            let current = leaf.current.to_audit_string(&leaf.name)?;

            let detail = match event_type {
                EventType::Added => {
                    if !track_empty && !has_text(&current) {
                        continue;
                    }
                    AuditLogDetail::new(leaf.name, None, current)
                }
                EventType::Deleted => {
                    if !track_empty && !has_text(&original) {
                        continue;
                    }
                    AuditLogDetail::new(leaf.name, original, None)
                }
                EventType::Modified | EventType::SoftDeleted | EventType::UnDeleted => {
                    if !leaf.is_modified || original == current {
                        continue;
                    }
                    AuditLogDetail::new(leaf.name, original, current)
                }
            };
            details.push(detail);
        }

        Ok(details)
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EntityMetadata;
    use crate::config::SoftDeleteCriteria;
    use changetrail_proto::Value;

    const TRACKED: &str = "app::Tracked";
    const COMPOSITE: &str = "app::Composite";
    const SOFT: &str = "app::Soft";
    const PLAIN: &str = "app::Plain";

    fn engine() -> DiffEngine {
        let config = GlobalTrackingConfig::new();
        let catalog = config.catalog();
        catalog
            .register_metadata(EntityMetadata::new(TRACKED).with_key("Id").track_changes())
            .unwrap();
        catalog
            .register_metadata(
                EntityMetadata::new(COMPOSITE)
                    .with_key("Key1")
                    .with_key("Key2")
                    .track_changes(),
            )
            .unwrap();
        catalog
            .register_metadata(
                EntityMetadata::new(SOFT)
                    .with_key("Id")
                    .track_changes()
                    .soft_deletable(),
            )
            .unwrap();
        catalog
            .register_metadata(EntityMetadata::new(PLAIN).with_key("Id"))
            .unwrap();
        config.set_soft_deletable_criteria(SoftDeleteCriteria::new("IsDeleted"));
        DiffEngine::new(Arc::new(config))
    }

    #[test]
    fn test_untracked_type_yields_nothing() {
        let engine = engine();
        let snapshot = ChangeSnapshot::added(PLAIN)
            .with_key("Id", 1)
            .with_value("Name", "x");
        assert!(engine.draft(&snapshot).unwrap().is_none());
    }

    #[test]
    fn test_added_skips_empty_values() {
        let engine = engine();
        let snapshot = ChangeSnapshot::added(TRACKED)
            .with_key("Id", 1)
            .with_value("Id", 1)
            .with_value("Name", "Ann")
            .with_value("Nickname", Value::Null)
            .with_value("Bio", "");

        let log = engine.draft(&snapshot).unwrap().unwrap();
        assert_eq!(log.event_type, EventType::Added);
        assert_eq!(log.record_id, "1");
        assert_eq!(log.details.len(), 2);
        for detail in &log.details {
            assert!(detail.original_value.is_none());
            assert!(detail.new_value.as_deref().is_some_and(|v| !v.is_empty()));
        }
    }

    #[test]
    fn test_added_with_track_empty_includes_everything() {
        let engine = engine();
        engine
            .config()
            .set_track_empty_properties_on_addition_and_deletion(true);
        let snapshot = ChangeSnapshot::added(TRACKED)
            .with_key("Id", 1)
            .with_value("Name", "Ann")
            .with_value("Nickname", Value::Null);

        let log = engine.draft(&snapshot).unwrap().unwrap();
        assert_eq!(log.details.len(), 2);
        assert!(log.detail("Nickname").unwrap().new_value.is_none());
    }

    #[test]
    fn test_added_with_no_values_is_dropped_unless_track_empty() {
        let engine = engine();
        let snapshot = ChangeSnapshot::added(TRACKED)
            .with_key("Id", 1)
            .with_value("Name", Value::Null);
        assert!(engine.draft(&snapshot).unwrap().is_none());

        engine
            .config()
            .set_track_empty_properties_on_addition_and_deletion(true);
        assert!(engine.draft(&snapshot).unwrap().is_some());
    }

    #[test]
    fn test_deleted_records_original_values() {
        let engine = engine();
        let snapshot = ChangeSnapshot::deleted(TRACKED)
            .with_key("Id", 4)
            .with_value("Name", "Ann");

        let log = engine.draft(&snapshot).unwrap().unwrap();
        assert_eq!(log.event_type, EventType::Deleted);
        let name = log.detail("Name").unwrap();
        assert_eq!(name.original_value.as_deref(), Some("Ann"));
        assert!(name.new_value.is_none());
    }

    #[test]
    fn test_deleted_skips_empty_originals() {
        let engine = engine();
        let snapshot = ChangeSnapshot::deleted(TRACKED)
            .with_key("Id", 4)
            .with_value("Name", "Ann")
            .with_value("Nickname", Value::Null)
            .with_value("Bio", "");

        let log = engine.draft(&snapshot).unwrap().unwrap();
        assert_eq!(log.details.len(), 1);
        assert!(log.detail("Nickname").is_none());
        assert!(log.detail("Bio").is_none());
    }

    #[test]
    fn test_deleted_with_track_empty_includes_everything() {
        let engine = engine();
        engine
            .config()
            .set_track_empty_properties_on_addition_and_deletion(true);
        let snapshot = ChangeSnapshot::deleted(TRACKED)
            .with_key("Id", 4)
            .with_value("Name", "Ann")
            .with_value("Nickname", Value::Null)
            .with_value("Bio", "");

        let log = engine.draft(&snapshot).unwrap().unwrap();
        assert_eq!(log.details.len(), 3);
        assert!(log.detail("Nickname").unwrap().original_value.is_none());
        assert_eq!(log.detail("Bio").unwrap().original_value.as_deref(), Some(""));
        assert!(log.details.iter().all(|d| d.new_value.is_none()));
    }

    #[test]
    fn test_deleted_with_only_empty_values_is_still_drafted() {
        let engine = engine();
        let snapshot = ChangeSnapshot::deleted(TRACKED)
            .with_key("Id", 4)
            .with_value("Nickname", Value::Null)
            .with_value("Bio", "");

        let log = engine.draft(&snapshot).unwrap().unwrap();
        assert_eq!(log.event_type, EventType::Deleted);
        assert_eq!(log.record_id, "4");
        assert!(log.details.is_empty());
    }

    #[test]
    fn test_modified_lists_only_changed_properties() {
        let engine = engine();
        let snapshot = ChangeSnapshot::modified(TRACKED)
            .with_key("Id", 1)
            .with_property(PropertyChange::new("Name", "Ann", "Anna"))
            .with_property(PropertyChange::unchanged("Age", 30))
            // flagged modified but written back with the same value
            .with_property(PropertyChange::unchanged("City", "Oslo").with_modified(true));

        let log = engine.draft(&snapshot).unwrap().unwrap();
        assert_eq!(log.event_type, EventType::Modified);
        assert_eq!(log.details.len(), 1);
        let name = log.detail("Name").unwrap();
        assert_eq!(name.original_value.as_deref(), Some("Ann"));
        assert_eq!(name.new_value.as_deref(), Some("Anna"));
    }

    #[test]
    fn test_null_and_empty_string_differ() {
        let engine = engine();
        let snapshot = ChangeSnapshot::modified(TRACKED)
            .with_key("Id", 1)
            .with_property(PropertyChange::new("Note", Value::Null, ""));

        let log = engine.draft(&snapshot).unwrap().unwrap();
        let note = log.detail("Note").unwrap();
        assert!(note.original_value.is_none());
        assert_eq!(note.new_value.as_deref(), Some(""));
    }

    #[test]
    fn test_modified_without_changes_has_no_details() {
        let engine = engine();
        let snapshot = ChangeSnapshot::modified(TRACKED)
            .with_key("Id", 1)
            .with_property(PropertyChange::unchanged("Name", "Ann"));

        let log = engine.draft(&snapshot).unwrap().unwrap();
        assert_eq!(log.event_type, EventType::Modified);
        assert!(log.details.is_empty());
    }

    #[test]
    fn test_soft_delete_and_undelete() {
        let engine = engine();
        let delete = ChangeSnapshot::modified(SOFT)
            .with_key("Id", 9)
            .with_property(PropertyChange::new("IsDeleted", false, true))
            .with_property(PropertyChange::unchanged("Name", "x"));

        let log = engine.draft(&delete).unwrap().unwrap();
        assert_eq!(log.event_type, EventType::SoftDeleted);
        assert_eq!(log.details.len(), 1);
        let flag = log.detail("IsDeleted").unwrap();
        assert_eq!(flag.original_value.as_deref(), Some("False"));
        assert_eq!(flag.new_value.as_deref(), Some("True"));

        let undelete = ChangeSnapshot::modified(SOFT)
            .with_key("Id", 9)
            .with_property(PropertyChange::new("IsDeleted", true, false));

        let log = engine.draft(&undelete).unwrap().unwrap();
        assert_eq!(log.event_type, EventType::UnDeleted);
        let flag = log.detail("IsDeleted").unwrap();
        assert_eq!(flag.original_value.as_deref(), Some("True"));
        assert_eq!(flag.new_value.as_deref(), Some("False"));
    }

    #[test]
    fn test_soft_delete_requires_capability() {
        let engine = engine();
        let snapshot = ChangeSnapshot::modified(TRACKED)
            .with_key("Id", 1)
            .with_property(PropertyChange::new("IsDeleted", false, true));

        let log = engine.draft(&snapshot).unwrap().unwrap();
        assert_eq!(log.event_type, EventType::Modified);
    }

    #[test]
    fn test_composite_key_uses_declared_order() {
        let engine = engine();
        let snapshot = ChangeSnapshot::added(COMPOSITE)
            .with_key("Key2", "B")
            .with_key("Key1", "A")
            .with_value("Description", "d");

        let log = engine.draft(&snapshot).unwrap().unwrap();
        assert_eq!(log.record_id, "A_B");
    }

    #[test]
    fn test_missing_declared_key_is_error() {
        let engine = engine();
        let snapshot = ChangeSnapshot::added(COMPOSITE)
            .with_key("Key1", "A")
            .with_value("Description", "d");

        assert!(matches!(
            engine.draft(&snapshot),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_fluent_exclusion() {
        let engine = engine();
        engine
            .config()
            .track_all_properties_of(TRACKED)
            .unwrap()
            .except("Secret")
            .unwrap();

        let snapshot = ChangeSnapshot::added(TRACKED)
            .with_key("Id", 1)
            .with_value("Name", "Ann")
            .with_value("Secret", "s3cr3t");

        let log = engine.draft(&snapshot).unwrap().unwrap();
        assert!(log.detail("Secret").is_none());
        assert!(log.detail("Name").is_some());
    }

    #[test]
    fn test_complex_property_is_flattened() {
        let engine = engine();
        let snapshot = ChangeSnapshot::modified(TRACKED)
            .with_key("Id", 1)
            .with_property(PropertyChange::new(
                "Address",
                Value::Complex(vec![
                    ("City".into(), Value::from("Oslo")),
                    ("Zip".into(), Value::from("0150")),
                ]),
                Value::Complex(vec![
                    ("City".into(), Value::from("Bergen")),
                    ("Zip".into(), Value::from("0150")),
                ]),
            ));

        let log = engine.draft(&snapshot).unwrap().unwrap();
        assert_eq!(log.details.len(), 1);
        assert_eq!(log.details[0].property_name, "Address.City");
    }

    #[test]
    fn test_unsupported_value_fails_the_draft() {
        let engine = engine();
        let snapshot = ChangeSnapshot::added(TRACKED)
            .with_key("Id", 1)
            .with_value("Shape", Value::Opaque("Polygon".into()));

        assert!(matches!(engine.draft(&snapshot), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_username_and_timestamp_are_stamped() {
        let engine = engine();
        engine.config().configure_username("rahul");
        let now = Utc::now();
        let snapshot = ChangeSnapshot::added(TRACKED)
            .with_key("Id", 1)
            .with_value("Name", "Ann");

        let log = engine.draft_at(&snapshot, now).unwrap().unwrap();
        assert_eq!(log.user_name.as_deref(), Some("rahul"));
        assert_eq!(log.event_date_utc, now);
    }
}
