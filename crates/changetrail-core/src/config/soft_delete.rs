//! Soft-delete criteria.

use std::sync::Arc;

use changetrail_proto::Value;

type DeletedPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// How to tell whether a soft-deletable entity is currently deleted.
///
/// The criteria names the delete-flag property shared by every type that
/// declares the soft-delete capability, plus a predicate over that
/// property's value. The default predicate is "the flag is `true`".
#[derive(Clone)]
pub struct SoftDeleteCriteria {
    flag_property: String,
    deleted_when: DeletedPredicate,
}

impl SoftDeleteCriteria {
    /// Criteria for a boolean delete flag.
    pub fn new(flag_property: impl Into<String>) -> Self {
        Self {
            flag_property: flag_property.into(),
            deleted_when: Arc::new(|value| value.as_bool() == Some(true)),
        }
    }

    /// Replace the predicate deciding whether a flag value means "deleted".
    pub fn deleted_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.deleted_when = Arc::new(predicate);
        self
    }

    /// Name of the delete-flag property.
    pub fn flag_property(&self) -> &str {
        &self.flag_property
    }

    /// Whether a flag value means "deleted".
    pub fn is_deleted(&self, flag_value: &Value) -> bool {
        (self.deleted_when)(flag_value)
    }
}

impl std::fmt::Debug for SoftDeleteCriteria {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftDeleteCriteria")
            .field("flag_property", &self.flag_property)
            .finish_non_exhaustive()
    }
}
