//! Audit log records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Kind of entity-level event recorded by an audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Entity was inserted.
    Added,
    /// Entity was removed.
    Deleted,
    /// Entity was updated.
    Modified,
    /// Entity's delete flag flipped from false to true.
    SoftDeleted,
    /// Entity's delete flag flipped from true to false.
    UnDeleted,
}

impl EventType {
    /// Whether the event stems from an update (and so only lists changed properties).
    pub fn is_modification(&self) -> bool {
        matches!(
            self,
            EventType::Modified | EventType::SoftDeleted | EventType::UnDeleted
        )
    }

    /// Stable storage code.
    pub fn code(&self) -> u8 {
        match self {
            EventType::Added => 0,
            EventType::Deleted => 1,
            EventType::Modified => 2,
            EventType::SoftDeleted => 3,
            EventType::UnDeleted => 4,
        }
    }

    /// Decode a storage code.
    pub fn from_code(code: u8) -> Result<Self, Error> {
        match code {
            0 => Ok(EventType::Added),
            1 => Ok(EventType::Deleted),
            2 => Ok(EventType::Modified),
            3 => Ok(EventType::SoftDeleted),
            4 => Ok(EventType::UnDeleted),
            other => Err(Error::Deserialization(format!("unknown event type code {other}"))),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Added => write!(f, "Added"),
            EventType::Deleted => write!(f, "Deleted"),
            EventType::Modified => write!(f, "Modified"),
            EventType::SoftDeleted => write!(f, "SoftDeleted"),
            EventType::UnDeleted => write!(f, "UnDeleted"),
        }
    }
}

/// One entity-level audit record.
///
/// `id` is zero while the record is a draft and is assigned by the audit
/// store on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    /// Row id (zero until persisted).
    pub id: u64,
    /// Entity type identity.
    pub type_full_name: String,
    /// Serialized primary key.
    pub record_id: String,
    /// Event kind.
    pub event_type: EventType,
    /// When the change was drafted.
    pub event_date_utc: DateTime<Utc>,
    /// User responsible for the change, if known.
    pub user_name: Option<String>,
    /// Field-level details.
    pub details: Vec<AuditLogDetail>,
}

impl AuditLog {
    /// Create a draft with no details.
    pub fn new(
        type_full_name: impl Into<String>,
        record_id: impl Into<String>,
        event_type: EventType,
        event_date_utc: DateTime<Utc>,
        user_name: Option<String>,
    ) -> Self {
        Self {
            id: 0,
            type_full_name: type_full_name.into(),
            record_id: record_id.into(),
            event_type,
            event_date_utc,
            user_name,
            details: Vec::new(),
        }
    }

    /// Add a detail.
    pub fn with_detail(mut self, detail: AuditLogDetail) -> Self {
        self.details.push(detail);
        self
    }

    /// Get a detail by property name.
    pub fn detail(&self, property_name: &str) -> Option<&AuditLogDetail> {
        self.details
            .iter()
            .find(|d| d.property_name == property_name)
    }

    /// Whether the record has been persisted.
    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }
}

/// One changed property within an audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogDetail {
    /// Row id (zero until persisted).
    pub id: u64,
    /// Owning audit log row id (zero until persisted).
    pub audit_log_id: u64,
    /// Property name.
    pub property_name: String,
    /// Value before the change.
    pub original_value: Option<String>,
    /// Value after the change.
    pub new_value: Option<String>,
}

impl AuditLogDetail {
    /// Create a draft detail.
    pub fn new(
        property_name: impl Into<String>,
        original_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        Self {
            id: 0,
            audit_log_id: 0,
            property_name: property_name.into(),
            original_value,
            new_value,
        }
    }
}
