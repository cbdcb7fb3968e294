//! On-disk row shapes for the sled audit store.

use chrono::DateTime;
use rkyv::{Archive, Deserialize, Serialize};

use changetrail_proto::{AuditLog, AuditLogDetail, EventType};

use crate::error::Error;

/// Stored audit log row, without its details.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct StoredLog {
    pub id: u64,
    pub type_full_name: String,
    pub record_id: String,
    /// [`EventType::code`].
    pub event_type: u8,
    /// Microseconds since the Unix epoch, UTC.
    pub event_date_micros: i64,
    pub user_name: Option<String>,
}

impl StoredLog {
    /// Row for a persisted log.
    pub fn from_log(log: &AuditLog) -> Self {
        Self {
            id: log.id,
            type_full_name: log.type_full_name.clone(),
            record_id: log.record_id.clone(),
            event_type: log.event_type.code(),
            event_date_micros: log.event_date_utc.timestamp_micros(),
            user_name: log.user_name.clone(),
        }
    }

    /// Rebuild the log around its details.
    pub fn into_log(self, details: Vec<AuditLogDetail>) -> Result<AuditLog, Error> {
        let event_type = EventType::from_code(self.event_type)?;
        let event_date_utc = DateTime::from_timestamp_micros(self.event_date_micros)
            .ok_or_else(|| {
                Error::Deserialization(format!(
                    "event date {} out of range",
                    self.event_date_micros
                ))
            })?;

        Ok(AuditLog {
            id: self.id,
            type_full_name: self.type_full_name,
            record_id: self.record_id,
            event_type,
            event_date_utc,
            user_name: self.user_name,
            details,
        })
    }

    /// Serialize the row to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a row from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// Stored audit log detail row.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct StoredDetail {
    pub id: u64,
    pub audit_log_id: u64,
    pub property_name: String,
    pub original_value: Option<String>,
    pub new_value: Option<String>,
}

impl StoredDetail {
    /// Build the row for a detail.
    pub fn from_detail(detail: &AuditLogDetail) -> Self {
        Self {
            id: detail.id,
            audit_log_id: detail.audit_log_id,
            property_name: detail.property_name.clone(),
            original_value: detail.original_value.clone(),
            new_value: detail.new_value.clone(),
        }
    }

    /// Convert the row back into a detail.
    pub fn into_detail(self) -> AuditLogDetail {
        AuditLogDetail {
            id: self.id,
            audit_log_id: self.audit_log_id,
            property_name: self.property_name,
            original_value: self.original_value,
            new_value: self.new_value,
        }
    }

    /// Serialize the row to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a row from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}
