//! Save orchestration.
//!
//! [`AuditTracker`] wraps one save of a [`TrackedSession`]: it collects the
//! session's change snapshots, drafts audit logs through the
//! [`DiffEngine`], runs the [`InterceptionPipeline`], and hands the data
//! change plus the surviving drafts to the session in a single commit.
//! Any failure before the commit leaves the session untouched.

use std::any::Any;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use changetrail_proto::{AuditLog, ChangeSnapshot, EntityState, EventType, Value};

use crate::config::GlobalTrackingConfig;
use crate::diff::DiffEngine;
use crate::error::Error;
use crate::pipeline::{AuditLogGeneratedEvent, InterceptionPipeline, ObserverError};

/// The persistence-layer unit of work the tracker audits.
pub trait TrackedSession {
    /// Change snapshots for every entity about to be saved, in save order.
    fn change_snapshots(&self) -> Result<Vec<ChangeSnapshot>, Error>;

    /// Mutable access to the entity behind the snapshot at `index`.
    fn entity_mut(&mut self, index: usize) -> Option<&mut dyn Any>;

    /// Values currently stored for the snapshot's entity, used as originals
    /// in disconnected mode. `None` if the row is not found.
    fn stored_values(&self, snapshot: &ChangeSnapshot)
        -> Result<Option<Vec<(String, Value)>>, Error>;

    /// Persist the pending data change together with `logs`, atomically.
    ///
    /// Returns the number of entities written.
    fn commit(&mut self, logs: Vec<AuditLog>) -> Result<usize, Error>;
}

/// Result of one audited save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    /// Entities written by the session.
    pub entities_saved: usize,
    /// Audit logs handed to the session for persistence.
    pub logs_written: usize,
    /// Drafts suppressed by an observer.
    pub logs_skipped: usize,
}

/// Audits saves of tracked sessions.
#[derive(Debug)]
pub struct AuditTracker {
    config: Arc<GlobalTrackingConfig>,
    diff: DiffEngine,
    pipeline: InterceptionPipeline,
}

impl AuditTracker {
    /// Create a tracker over a shared configuration.
    pub fn new(config: Arc<GlobalTrackingConfig>) -> Self {
        Self {
            diff: DiffEngine::new(Arc::clone(&config)),
            config,
            pipeline: InterceptionPipeline::new(),
        }
    }

    /// The shared tracking configuration.
    pub fn config(&self) -> &Arc<GlobalTrackingConfig> {
        &self.config
    }

    /// The engine drafting audit logs from snapshots.
    pub fn diff_engine(&self) -> &DiffEngine {
        &self.diff
    }

    /// The observers run over every draft.
    pub fn pipeline(&self) -> &InterceptionPipeline {
        &self.pipeline
    }

    /// Register an observer for drafted audit logs.
    pub fn on_audit_log_generated<F>(&self, observer: F)
    where
        F: Fn(&mut AuditLogGeneratedEvent<'_>) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        self.pipeline.on_audit_log_generated(observer);
    }

    /// Save the session and record audit logs for its tracked changes.
    #[instrument(skip(self, session))]
    pub fn save_changes<S>(&self, session: &mut S) -> Result<SaveSummary, Error>
    where
        S: TrackedSession + ?Sized,
    {
        if !self.config.enabled() {
            return self.save_changes_without_logging(session);
        }

        let snapshots = session.change_snapshots()?;
        let disconnected = self.config.disconnected_context();

        let mut drafts = Vec::new();
        for (index, mut snapshot) in snapshots.into_iter().enumerate() {
            if disconnected
                && snapshot.state != EntityState::Added
                && self.config.is_tracking_enabled(&snapshot.type_full_name)
            {
                if let Some(stored) = session.stored_values(&snapshot)? {
                    snapshot.apply_stored_values(&stored);
                }
            }

            let Some(draft) = self.diff.draft(&snapshot)? else {
                continue;
            };

            if draft.event_type == EventType::Modified && draft.details.is_empty() {
                debug!(
                    entity = %draft.type_full_name,
                    record_id = %draft.record_id,
                    "Update changed no tracked property, no audit log"
                );
                continue;
            }

            drafts.push((index, draft));
        }

        let mut logs = Vec::with_capacity(drafts.len());
        let mut logs_skipped = 0;
        for (index, mut draft) in drafts {
            let skip = self.pipeline.dispatch(&mut draft, session.entity_mut(index))?;
            if skip {
                logs_skipped += 1;
            } else {
                logs.push(draft);
            }
        }

        let logs_written = logs.len();
        let entities_saved = session.commit(logs)?;

        info!(
            entities_saved,
            logs_written, logs_skipped, "Saved changes with audit logs"
        );

        Ok(SaveSummary {
            entities_saved,
            logs_written,
            logs_skipped,
        })
    }

    /// Save the session without drafting any audit log.
    pub fn save_changes_without_logging<S>(&self, session: &mut S) -> Result<SaveSummary, Error>
    where
        S: TrackedSession + ?Sized,
    {
        let entities_saved = session.commit(Vec::new())?;
        Ok(SaveSummary {
            entities_saved,
            ..SaveSummary::default()
        })
    }
}
