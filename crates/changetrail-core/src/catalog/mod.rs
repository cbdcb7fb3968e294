//! Entity metadata catalog.
//!
//! Entity types declare their audit-relevant metadata once (key order,
//! tracking marker, skipped properties, soft-delete capability) and register
//! it here at startup. Nothing is discovered at runtime.

mod catalog;
mod entity;

pub use catalog::EntityCatalog;
pub use entity::{EntityAttribute, EntityMetadata, EntityType};
