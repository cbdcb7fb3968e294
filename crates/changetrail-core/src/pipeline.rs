//! Interception pipeline for drafted audit logs.

use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use changetrail_proto::AuditLog;

use crate::error::Error;

/// Error type observers may return.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Callback invoked for every drafted audit log.
pub type AuditLogObserverFn =
    Arc<dyn Fn(&mut AuditLogGeneratedEvent<'_>) -> Result<(), ObserverError> + Send + Sync>;

/// What an observer sees for one draft.
pub struct AuditLogGeneratedEvent<'a> {
    /// The draft about to be persisted.
    pub audit_log: &'a mut AuditLog,
    /// The entity instance the draft describes, if the session exposes it.
    pub entity: Option<&'a mut dyn Any>,
    /// Set to suppress persistence of this draft.
    pub skip_saving_log: bool,
}

impl AuditLogGeneratedEvent<'_> {
    /// Downcast the originating entity.
    pub fn entity_as<T: Any>(&mut self) -> Option<&mut T> {
        self.entity.as_deref_mut()?.downcast_mut::<T>()
    }
}

/// Ordered list of audit log observers.
///
/// Observers run synchronously in registration order. Each sees the skip
/// flag as accumulated so far; a draft is skipped if any observer set it.
#[derive(Default)]
pub struct InterceptionPipeline {
    observers: RwLock<Vec<AuditLogObserverFn>>,
}

impl InterceptionPipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    pub fn on_audit_log_generated<F>(&self, observer: F)
    where
        F: Fn(&mut AuditLogGeneratedEvent<'_>) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        self.observers.write().push(Arc::new(observer));
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    /// Check if no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Remove every observer.
    pub fn clear(&self) {
        self.observers.write().clear();
    }

    /// Run every observer over one draft.
    ///
    /// Returns `true` if the draft must not be persisted. The first observer
    /// error stops dispatch and is returned as [`Error::Observer`].
    pub fn dispatch(
        &self,
        audit_log: &mut AuditLog,
        mut entity: Option<&mut dyn Any>,
    ) -> Result<bool, Error> {
        // Observers may register further observers; don't hold the lock.
        let observers = self.observers.read().clone();

        let mut skip = false;
        for observer in &observers {
            let mut event = AuditLogGeneratedEvent {
                audit_log: &mut *audit_log,
                entity: entity.as_deref_mut(),
                skip_saving_log: skip,
            };
            if let Err(source) = observer(&mut event) {
                return Err(Error::Observer {
                    type_full_name: event.audit_log.type_full_name.clone(),
                    source,
                });
            }
            skip |= event.skip_saving_log;
        }

        if skip {
            debug!(
                entity = %audit_log.type_full_name,
                record_id = %audit_log.record_id,
                "Observer suppressed audit log"
            );
        }

        Ok(skip)
    }
}

impl std::fmt::Debug for InterceptionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionPipeline")
            .field("observers", &self.len())
            .finish()
    }
}
