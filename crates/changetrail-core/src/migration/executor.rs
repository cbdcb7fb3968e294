//! Legacy log migration runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use changetrail_proto::AuditLog;

use super::error::MigrationError;
use super::rename::RenameMap;
use crate::storage::{AuditStore, DetailRename, LogRename, RenameBatch};

/// One renamed audit row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameEvent {
    /// Row id of the renamed log or detail.
    pub record_id: u64,
    pub old_name: String,
    pub new_name: String,
}

/// Callback fired once per renamed row, after the rename is persisted.
pub type RenameHookFn = Arc<dyn Fn(&RenameEvent) + Send + Sync>;

/// Progress report of an asynchronous run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationJobStatus {
    /// Entity type whose chunk just completed; empty when there was no work.
    pub entity_full_name: String,
    /// Share of entity types processed, 0 to 100.
    pub percent: u8,
}

/// Tuning for asynchronous runs.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Yield to the runtime after every chunk.
    pub yield_between_chunks: bool,
    /// Pause between chunks, in milliseconds. Zero disables the pause.
    pub chunk_delay_ms: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            yield_between_chunks: true,
            chunk_delay_ms: 0,
        }
    }
}

impl MigrationConfig {
    /// Set whether to yield between chunks.
    pub fn yield_between_chunks(mut self, yield_between_chunks: bool) -> Self {
        self.yield_between_chunks = yield_between_chunks;
        self
    }

    /// Set the pause between chunks.
    pub fn chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

/// Outcome of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    /// Audit logs whose type name was rewritten.
    pub logs_renamed: usize,
    /// Details whose property name was rewritten.
    pub details_renamed: usize,
    /// Entity type chunks processed (one for a synchronous run).
    pub chunks: usize,
    /// Time taken.
    pub duration: Duration,
}

impl MigrationSummary {
    /// Total rows rewritten.
    pub fn total_renamed(&self) -> usize {
        self.logs_renamed + self.details_renamed
    }
}

/// A migration running on the tokio runtime.
pub struct MigrationTask {
    /// Resolves to the run's outcome.
    pub handle: JoinHandle<Result<MigrationSummary, MigrationError>>,
    /// Progress reports, closed when the run ends.
    pub progress: mpsc::UnboundedReceiver<MigrationJobStatus>,
}

/// Renames planned for a set of logs.
#[derive(Default)]
struct RenamePlan {
    batch: RenameBatch,
    log_events: Vec<RenameEvent>,
    detail_events: Vec<RenameEvent>,
}

/// Rewrites audit rows recorded under retired names.
pub struct LogDataMigration<S: AuditStore + ?Sized> {
    store: Arc<S>,
    renames: RenameMap,
    config: MigrationConfig,
    log_hooks: RwLock<Vec<RenameHookFn>>,
    detail_hooks: RwLock<Vec<RenameHookFn>>,
}

impl<S: AuditStore + ?Sized> LogDataMigration<S> {
    /// Create a migration over a store with the given renames.
    pub fn new(store: Arc<S>, renames: RenameMap) -> Self {
        Self {
            store,
            renames,
            config: MigrationConfig::default(),
            log_hooks: RwLock::new(Vec::new()),
            detail_hooks: RwLock::new(Vec::new()),
        }
    }

    /// Use custom tuning for asynchronous runs.
    pub fn with_config(mut self, config: MigrationConfig) -> Self {
        self.config = config;
        self
    }

    /// The closed rename map this migration applies.
    pub fn renames(&self) -> &RenameMap {
        &self.renames
    }

    /// Called for every audit log whose type name is rewritten.
    pub fn on_audit_log_updated<F>(&self, hook: F)
    where
        F: Fn(&RenameEvent) + Send + Sync + 'static,
    {
        self.log_hooks.write().push(Arc::new(hook));
    }

    /// Called for every detail whose property name is rewritten.
    pub fn on_audit_log_detail_updated<F>(&self, hook: F)
    where
        F: Fn(&RenameEvent) + Send + Sync + 'static,
    {
        self.detail_hooks.write().push(Arc::new(hook));
    }

    /// Rewrite every stored audit row in one atomic batch.
    #[instrument(skip(self))]
    pub fn migrate_legacy_log_data(&self) -> Result<MigrationSummary, MigrationError> {
        let start = Instant::now();

        let logs = self.store.logs()?;
        let plan = self.plan(&logs);
        self.store.apply_renames(&plan.batch)?;
        self.notify(&plan);

        let summary = MigrationSummary {
            logs_renamed: plan.log_events.len(),
            details_renamed: plan.detail_events.len(),
            chunks: 1,
            duration: start.elapsed(),
        };

        info!(
            logs_scanned = logs.len(),
            logs_renamed = summary.logs_renamed,
            details_renamed = summary.details_renamed,
            duration_ms = summary.duration.as_millis() as u64,
            "Legacy log migration completed"
        );

        Ok(summary)
    }

    /// Rewrite stored audit rows one entity type at a time.
    ///
    /// A status is sent after each type; the last one, and only the last
    /// one, reports 100. Each chunk commits on its own, so a failure or a
    /// cancellation leaves earlier chunks migrated. Progress send failures
    /// are ignored.
    #[instrument(skip(self, progress, cancel))]
    pub async fn migrate_legacy_log_data_async(
        &self,
        progress: mpsc::UnboundedSender<MigrationJobStatus>,
        cancel: CancellationToken,
    ) -> Result<MigrationSummary, MigrationError> {
        let start = Instant::now();
        let type_names = self.store.type_names()?;
        let total = type_names.len();
        let mut summary = MigrationSummary::default();

        if total == 0 {
            let _ = progress.send(MigrationJobStatus {
                entity_full_name: String::new(),
                percent: 100,
            });
            summary.duration = start.elapsed();
            debug!("No audit logs to migrate");
            return Ok(summary);
        }

        for (index, type_name) in type_names.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(completed_types = index, "Legacy log migration cancelled");
                return Err(MigrationError::Cancelled {
                    completed_types: index,
                });
            }

            let plan = self
                .migrate_chunk(type_name)
                .map_err(|source| MigrationError::ChunkFailed {
                    entity: type_name.clone(),
                    source,
                })?;
            self.notify(&plan);

            summary.logs_renamed += plan.log_events.len();
            summary.details_renamed += plan.detail_events.len();
            summary.chunks += 1;

            let done = index + 1;
            let _ = progress.send(MigrationJobStatus {
                entity_full_name: type_name.clone(),
                percent: (done * 100 / total) as u8,
            });

            debug!(
                entity = %type_name,
                logs_renamed = plan.log_events.len(),
                details_renamed = plan.detail_events.len(),
                "Migrated entity type"
            );

            if done < total {
                self.pause().await;
            }
        }

        summary.duration = start.elapsed();
        info!(
            chunks = summary.chunks,
            logs_renamed = summary.logs_renamed,
            details_renamed = summary.details_renamed,
            duration_ms = summary.duration.as_millis() as u64,
            "Legacy log migration completed"
        );

        Ok(summary)
    }

    fn migrate_chunk(&self, type_name: &str) -> Result<RenamePlan, crate::error::Error> {
        let logs = self.store.logs_for_type(type_name)?;
        let plan = self.plan(&logs);
        self.store.apply_renames(&plan.batch)?;
        Ok(plan)
    }

    async fn pause(&self) {
        if self.config.chunk_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.chunk_delay_ms)).await;
        } else if self.config.yield_between_chunks {
            tokio::task::yield_now().await;
        }
    }

    fn plan(&self, logs: &[AuditLog]) -> RenamePlan {
        let mut plan = RenamePlan::default();

        for log in logs {
            let current = match self.renames.resolve_entity(&log.type_full_name) {
                Some(new) if new != log.type_full_name => {
                    plan.batch.logs.push(LogRename {
                        log_id: log.id,
                        new_type_full_name: new.to_string(),
                    });
                    plan.log_events.push(RenameEvent {
                        record_id: log.id,
                        old_name: log.type_full_name.clone(),
                        new_name: new.to_string(),
                    });
                    new
                }
                _ => log.type_full_name.as_str(),
            };

            for detail in &log.details {
                let renamed = self
                    .renames
                    .resolve_property(current, &detail.property_name)
                    .or_else(|| {
                        self.renames
                            .resolve_property(&log.type_full_name, &detail.property_name)
                    });

                if let Some(new) = renamed.filter(|new| *new != detail.property_name) {
                    plan.batch.details.push(DetailRename {
                        audit_log_id: log.id,
                        detail_id: detail.id,
                        new_property_name: new.to_string(),
                    });
                    plan.detail_events.push(RenameEvent {
                        record_id: detail.id,
                        old_name: detail.property_name.clone(),
                        new_name: new.to_string(),
                    });
                }
            }
        }

        plan
    }

    fn notify(&self, plan: &RenamePlan) {
        if !plan.log_events.is_empty() {
            let hooks = self.log_hooks.read().clone();
            for event in &plan.log_events {
                for hook in &hooks {
                    hook(event);
                }
            }
        }

        if !plan.detail_events.is_empty() {
            let hooks = self.detail_hooks.read().clone();
            for event in &plan.detail_events {
                for hook in &hooks {
                    hook(event);
                }
            }
        }
    }
}

impl<S: AuditStore + ?Sized + 'static> LogDataMigration<S> {
    /// Run the asynchronous migration on the tokio runtime.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> MigrationTask {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle =
            tokio::spawn(async move { self.migrate_legacy_log_data_async(tx, cancel).await });
        MigrationTask {
            handle,
            progress: rx,
        }
    }
}

impl<S: AuditStore + ?Sized> std::fmt::Debug for LogDataMigration<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogDataMigration")
            .field("renames", &self.renames)
            .field("config", &self.config)
            .finish()
    }
}
