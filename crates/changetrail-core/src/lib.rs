//! changetrail core - tracking configuration, diffing, interception, and
//! legacy log migration.
//!
//! This crate turns the change snapshots of a persistence-layer save into
//! audit log records and keeps previously written records readable after
//! entity and property renames.

pub mod catalog;
pub mod config;
pub mod diff;
pub mod error;
pub mod migration;
pub mod pipeline;
pub mod storage;
pub mod tracker;

pub use catalog::{EntityAttribute, EntityCatalog, EntityMetadata, EntityType};
pub use config::{
    FluentConfiguration, GlobalTrackingConfig, OverrideTrackingResponse, PropertyTrackingOverride,
    SoftDeleteCriteria, TrackAllResponse, TrackingConfigStore, TrackingConfigurationValue,
    TrackingSettings, UsernameProvider,
};
pub use diff::DiffEngine;
pub use error::Error;
pub use migration::{
    LegacyRenames, LogDataMigration, MigrationConfig, MigrationError, MigrationJobStatus,
    MigrationSummary, MigrationTask, RenameEvent, RenameKind, RenameMap, RenameMapBuilder,
};
pub use pipeline::{AuditLogGeneratedEvent, AuditLogObserverFn, InterceptionPipeline, ObserverError};
pub use storage::{AuditStore, MemoryAuditStore, RenameBatch, SledAuditStore};
pub use tracker::{AuditTracker, SaveSummary, TrackedSession};

/// Re-export protocol types.
pub use changetrail_proto as proto;
