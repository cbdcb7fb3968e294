//! changetrail protocol types.
//!
//! This crate defines the values and records exchanged between a persistence
//! layer and the change-audit engine:
//!
//! - [`value`] - Runtime property values and their invariant text form
//! - [`snapshot`] - Per-entity change snapshots handed over by a save
//! - [`audit`] - Audit log records and their field-level details
//! - [`error`] - Protocol error types

pub mod audit;
pub mod error;
pub mod snapshot;
pub mod value;

pub use audit::{AuditLog, AuditLogDetail, EventType};
pub use error::Error;
pub use snapshot::{ChangeSnapshot, EntityState, PropertyChange};
pub use value::Value;

/// Separator placed between the values of a composite key in a record id.
pub const RECORD_ID_SEPARATOR: &str = "_";

/// Separator placed between an owning property and a leaf property of an
/// owned sub-object.
pub const NESTED_PROPERTY_SEPARATOR: &str = ".";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_to_detail_values() {
        let snapshot = ChangeSnapshot::modified("app::Invoice")
            .with_key("Id", 7)
            .with_property(PropertyChange::new("Paid", false, true));

        let change = snapshot.property("Paid").unwrap();
        assert_eq!(change.original.to_audit_string("Paid").unwrap().as_deref(), Some("False"));
        assert_eq!(change.current.to_audit_string("Paid").unwrap().as_deref(), Some("True"));
    }
}
