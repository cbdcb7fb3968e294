//! Sled-backed audit store.

use std::collections::BTreeSet;
use std::path::Path;

use sled::transaction::{TransactionError, Transactional};
use sled::{Db, Tree};
use tracing::debug;

use changetrail_proto::{AuditLog, AuditLogDetail};

use super::record::{StoredDetail, StoredLog};
use super::store::{AuditStore, RenameBatch};
use crate::error::Error;

/// Tree for audit log rows (log id -> StoredLog).
const LOGS_TREE: &str = "audit:logs";

/// Tree for detail rows (log id + detail id -> StoredDetail).
const DETAILS_TREE: &str = "audit:details";

/// Tree indexing logs by entity type (type name + 0x00 + log id -> empty).
const TYPE_INDEX_TREE: &str = "index:audit_type";

/// Audit store persisted in sled trees.
pub struct SledAuditStore {
    db: Db,
    logs: Tree,
    details: Tree,
    type_index: Tree,
}

impl SledAuditStore {
    /// Open or create a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a store that is deleted on drop.
    pub fn temporary() -> Result<Self, Error> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    /// Use trees in an already open database.
    pub fn from_db(db: Db) -> Result<Self, Error> {
        let logs = db.open_tree(LOGS_TREE)?;
        let details = db.open_tree(DETAILS_TREE)?;
        let type_index = db.open_tree(TYPE_INDEX_TREE)?;

        Ok(Self {
            db,
            logs,
            details,
            type_index,
        })
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    fn next_id(&self) -> Result<u64, Error> {
        // sled ids start at zero, which marks a draft
        Ok(self.db.generate_id()? + 1)
    }

    fn read_log(&self, id: u64) -> Result<Option<AuditLog>, Error> {
        let Some(bytes) = self.logs.get(id.to_be_bytes())? else {
            return Ok(None);
        };
        let row = StoredLog::from_bytes(&bytes)?;
        let details = self.read_details(id)?;
        Ok(Some(row.into_log(details)?))
    }

    fn read_details(&self, log_id: u64) -> Result<Vec<AuditLogDetail>, Error> {
        let mut details = Vec::new();
        for item in self.details.scan_prefix(log_id.to_be_bytes()) {
            let (_, bytes) = item?;
            details.push(StoredDetail::from_bytes(&bytes)?.into_detail());
        }
        Ok(details)
    }

    fn write_batch(
        &self,
        log_rows: &[(Vec<u8>, Vec<u8>)],
        detail_rows: &[(Vec<u8>, Vec<u8>)],
        index_removals: &[Vec<u8>],
        index_inserts: &[Vec<u8>],
    ) -> Result<(), Error> {
        let result: Result<(), TransactionError<Error>> = (&self.logs, &self.details, &self.type_index)
            .transaction(|(logs_tx, details_tx, index_tx)| {
                for (key, value) in log_rows {
                    logs_tx.insert(key.as_slice(), value.as_slice())?;
                }
                for (key, value) in detail_rows {
                    details_tx.insert(key.as_slice(), value.as_slice())?;
                }
                for key in index_removals {
                    index_tx.remove(key.as_slice())?;
                }
                for key in index_inserts {
                    index_tx.insert(key.as_slice(), &[] as &[u8])?;
                }
                Ok(())
            });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(Error::Storage(e)),
        }
    }
}

fn detail_key(log_id: u64, detail_id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&log_id.to_be_bytes());
    key.extend_from_slice(&detail_id.to_be_bytes());
    key
}

fn type_index_key(type_full_name: &str, log_id: u64) -> Vec<u8> {
    let mut key = type_prefix(type_full_name);
    key.extend_from_slice(&log_id.to_be_bytes());
    key
}

fn type_prefix(type_full_name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(type_full_name.len() + 9);
    key.extend_from_slice(type_full_name.as_bytes());
    key.push(0);
    key
}

fn log_id_from_index_key(key: &[u8]) -> Result<u64, Error> {
    let split = key.len().checked_sub(8).ok_or_else(|| {
        Error::Deserialization("type index key too short".to_string())
    })?;
    let mut id = [0u8; 8];
    id.copy_from_slice(&key[split..]);
    Ok(u64::from_be_bytes(id))
}

impl AuditStore for SledAuditStore {
    fn insert_logs(&self, logs: Vec<AuditLog>) -> Result<Vec<AuditLog>, Error> {
        let mut stored = Vec::with_capacity(logs.len());
        let mut log_rows = Vec::with_capacity(logs.len());
        let mut detail_rows = Vec::new();
        let mut index_inserts = Vec::with_capacity(logs.len());

        for mut log in logs {
            log.id = self.next_id()?;
            for detail in &mut log.details {
                detail.id = self.next_id()?;
                detail.audit_log_id = log.id;
                detail_rows.push((
                    detail_key(log.id, detail.id),
                    StoredDetail::from_detail(detail).to_bytes()?,
                ));
            }
            log_rows.push((log.id.to_be_bytes().to_vec(), StoredLog::from_log(&log).to_bytes()?));
            index_inserts.push(type_index_key(&log.type_full_name, log.id));
            stored.push(log);
        }

        self.write_batch(&log_rows, &detail_rows, &[], &index_inserts)?;
        debug!(logs = stored.len(), details = detail_rows.len(), "Inserted audit logs");
        Ok(stored)
    }

    fn logs(&self) -> Result<Vec<AuditLog>, Error> {
        let mut logs = Vec::new();
        for item in self.logs.iter() {
            let (_, bytes) = item?;
            let row = StoredLog::from_bytes(&bytes)?;
            let details = self.read_details(row.id)?;
            logs.push(row.into_log(details)?);
        }
        Ok(logs)
    }

    fn logs_for_type(&self, type_full_name: &str) -> Result<Vec<AuditLog>, Error> {
        let prefix = type_prefix(type_full_name);
        let mut logs = Vec::new();
        for item in self.type_index.scan_prefix(&prefix) {
            let (key, _) = item?;
            // a longer key belongs to a type name that merely starts with this one
            if key.len() != prefix.len() + 8 {
                continue;
            }
            let id = log_id_from_index_key(&key)?;
            if let Some(log) = self.read_log(id)? {
                logs.push(log);
            }
        }
        logs.sort_by_key(|log| log.id);
        Ok(logs)
    }

    fn type_names(&self) -> Result<Vec<String>, Error> {
        let mut names = BTreeSet::new();
        for item in self.type_index.iter() {
            let (key, _) = item?;
            let end = key.len().checked_sub(9).ok_or_else(|| {
                Error::Deserialization("type index key too short".to_string())
            })?;
            let name = String::from_utf8(key[..end].to_vec())
                .map_err(|e| Error::Deserialization(e.to_string()))?;
            names.insert(name);
        }
        Ok(names.into_iter().collect())
    }

    fn apply_renames(&self, batch: &RenameBatch) -> Result<(), Error> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut log_rows = Vec::with_capacity(batch.logs.len());
        let mut index_removals = Vec::with_capacity(batch.logs.len());
        let mut index_inserts = Vec::with_capacity(batch.logs.len());
        for rename in &batch.logs {
            let bytes = self
                .logs
                .get(rename.log_id.to_be_bytes())?
                .ok_or(Error::NotFound)?;
            let mut row = StoredLog::from_bytes(&bytes)?;
            index_removals.push(type_index_key(&row.type_full_name, row.id));
            row.type_full_name = rename.new_type_full_name.clone();
            index_inserts.push(type_index_key(&row.type_full_name, row.id));
            log_rows.push((row.id.to_be_bytes().to_vec(), row.to_bytes()?));
        }

        let mut detail_rows = Vec::with_capacity(batch.details.len());
        for rename in &batch.details {
            let key = detail_key(rename.audit_log_id, rename.detail_id);
            let bytes = self.details.get(&key)?.ok_or(Error::NotFound)?;
            let mut row = StoredDetail::from_bytes(&bytes)?;
            row.property_name = rename.new_property_name.clone();
            detail_rows.push((key, row.to_bytes()?));
        }

        self.write_batch(&log_rows, &detail_rows, &index_removals, &index_inserts)
    }

    fn len(&self) -> Result<usize, Error> {
        Ok(self.logs.len())
    }
}

impl std::fmt::Debug for SledAuditStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledAuditStore")
            .field("logs", &self.logs.len())
            .field("details", &self.details.len())
            .finish()
    }
}
