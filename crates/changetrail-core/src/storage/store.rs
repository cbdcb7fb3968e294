//! The audit store contract.

use changetrail_proto::AuditLog;

use crate::error::Error;

/// Rewrite of one audit log's entity type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRename {
    pub log_id: u64,
    pub new_type_full_name: String,
}

/// Rewrite of one audit log detail's property name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRename {
    pub audit_log_id: u64,
    pub detail_id: u64,
    pub new_property_name: String,
}

/// Renames applied together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameBatch {
    pub logs: Vec<LogRename>,
    pub details: Vec<DetailRename>,
}

impl RenameBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of row rewrites.
    pub fn len(&self) -> usize {
        self.logs.len() + self.details.len()
    }

    /// Check if the batch rewrites nothing.
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty() && self.details.is_empty()
    }
}

/// Persistent home of audit logs and their details.
pub trait AuditStore: Send + Sync {
    /// Persist drafts atomically, assigning row ids.
    ///
    /// Returns the stored records with their ids filled in.
    fn insert_logs(&self, logs: Vec<AuditLog>) -> Result<Vec<AuditLog>, Error>;

    /// Every audit log with its details, in id order.
    fn logs(&self) -> Result<Vec<AuditLog>, Error>;

    /// Audit logs recorded for one entity type name, in id order.
    fn logs_for_type(&self, type_full_name: &str) -> Result<Vec<AuditLog>, Error>;

    /// Distinct entity type names across all logs, sorted.
    fn type_names(&self) -> Result<Vec<String>, Error>;

    /// Apply a rename batch atomically.
    fn apply_renames(&self, batch: &RenameBatch) -> Result<(), Error>;

    /// Number of stored audit logs.
    fn len(&self) -> Result<usize, Error>;

    /// Check if the store holds no audit log.
    fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }
}
