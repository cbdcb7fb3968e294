//! Legacy audit log migration.
//!
//! Rewrites entity type names and property names recorded under retired
//! identifiers, driven by a [`RenameMap`]. [`LogDataMigration`] runs either
//! as one atomic batch or, asynchronously, one entity type per chunk with
//! progress reports and cancellation between chunks.

mod error;
mod executor;
mod rename;

pub use error::MigrationError;
pub use executor::{
    LogDataMigration, MigrationConfig, MigrationJobStatus, MigrationSummary, MigrationTask,
    RenameEvent, RenameHookFn,
};
pub use rename::{LegacyRenames, RenameKind, RenameMap, RenameMapBuilder};
