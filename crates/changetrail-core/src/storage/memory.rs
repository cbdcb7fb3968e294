//! In-memory audit store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use changetrail_proto::AuditLog;

use super::store::{AuditStore, RenameBatch};
use crate::error::Error;

/// Audit store backed by a process-local map.
#[derive(Debug)]
pub struct MemoryAuditStore {
    next_id: AtomicU64,
    logs: RwLock<BTreeMap<u64, AuditLog>>,
}

impl Default for MemoryAuditStore {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            logs: RwLock::new(BTreeMap::new()),
        }
    }
}

impl MemoryAuditStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl AuditStore for MemoryAuditStore {
    fn insert_logs(&self, logs: Vec<AuditLog>) -> Result<Vec<AuditLog>, Error> {
        let mut stored = Vec::with_capacity(logs.len());
        for mut log in logs {
            log.id = self.next_id();
            for detail in &mut log.details {
                detail.id = self.next_id();
                detail.audit_log_id = log.id;
            }
            stored.push(log);
        }

        let mut map = self.logs.write();
        for log in &stored {
            map.insert(log.id, log.clone());
        }
        Ok(stored)
    }

    fn logs(&self) -> Result<Vec<AuditLog>, Error> {
        Ok(self.logs.read().values().cloned().collect())
    }

    fn logs_for_type(&self, type_full_name: &str) -> Result<Vec<AuditLog>, Error> {
        Ok(self
            .logs
            .read()
            .values()
            .filter(|log| log.type_full_name == type_full_name)
            .cloned()
            .collect())
    }

    fn type_names(&self) -> Result<Vec<String>, Error> {
        let names: BTreeSet<String> = self
            .logs
            .read()
            .values()
            .map(|log| log.type_full_name.clone())
            .collect();
        Ok(names.into_iter().collect())
    }

    fn apply_renames(&self, batch: &RenameBatch) -> Result<(), Error> {
        let mut map = self.logs.write();

        // Validate every target first so a bad batch changes nothing.
        for rename in &batch.logs {
            if !map.contains_key(&rename.log_id) {
                return Err(Error::NotFound);
            }
        }
        for rename in &batch.details {
            let found = map
                .get(&rename.audit_log_id)
                .is_some_and(|log| log.details.iter().any(|d| d.id == rename.detail_id));
            if !found {
                return Err(Error::NotFound);
            }
        }

        for rename in &batch.logs {
            if let Some(log) = map.get_mut(&rename.log_id) {
                log.type_full_name = rename.new_type_full_name.clone();
            }
        }
        for rename in &batch.details {
            if let Some(detail) = map
                .get_mut(&rename.audit_log_id)
                .and_then(|log| log.details.iter_mut().find(|d| d.id == rename.detail_id))
            {
                detail.property_name = rename.new_property_name.clone();
            }
        }
        Ok(())
    }

    fn len(&self) -> Result<usize, Error> {
        Ok(self.logs.read().len())
    }
}
