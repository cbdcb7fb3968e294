//! Migration errors.

use thiserror::Error;

use super::rename::RenameKind;

/// Legacy log migration errors.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// One old name maps to several new names.
    #[error("ambiguous {kind} rename for {old_name}: candidates {candidates:?}")]
    AmbiguousRename {
        kind: RenameKind,
        old_name: String,
        candidates: Vec<String>,
    },

    /// Renames chain back to a name already on the chain.
    #[error("cyclic {kind} rename: {}", .names.join(" -> "))]
    CyclicRename { kind: RenameKind, names: Vec<String> },

    /// The run was cancelled between entity types.
    #[error("migration cancelled after {completed_types} entity types")]
    Cancelled { completed_types: usize },

    /// Rewriting one entity type's logs failed; earlier types stay migrated.
    #[error("migration of {entity} failed: {source}")]
    ChunkFailed {
        entity: String,
        #[source]
        source: crate::error::Error,
    },

    /// Reading or writing the audit store failed.
    #[error(transparent)]
    Storage(#[from] crate::error::Error),
}
