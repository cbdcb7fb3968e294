//! Audit log storage.
//!
//! [`AuditStore`] is the seam between the engine and whatever holds the
//! audit rows. Two implementations ship with the crate:
//!
//! - [`MemoryAuditStore`] - process-local, for tests and embedding
//! - [`SledAuditStore`] - sled trees with rkyv-encoded rows

mod memory;
mod record;
mod sled_store;
mod store;

pub use memory::MemoryAuditStore;
pub use record::{StoredDetail, StoredLog};
pub use sled_store::SledAuditStore;
pub use store::{AuditStore, DetailRename, LogRename, RenameBatch};
