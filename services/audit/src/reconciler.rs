//! Diffing the database snapshot against the filesystem snapshot.
//!
//! Trust is asymmetric. A monitor directory without a monitor row is always
//! removed, while a monitor row without a directory is fine (the recorder
//! creates directories on the first event). Event-level discrepancies on
//! either side must be older than the minimum age before anything happens,
//! which keeps in-flight recordings out of reach. Orphaned frame and stat rows
//! have no age gate since their event can never come back.

use std::time::Duration;
use tracing::{debug, instrument};

use crate::archive_db::ArchiveDatabase;
use crate::archive_fs::{self, EventTree};
use crate::confirm::ConfirmationPolicy;
use crate::db_state::DatabaseSnapshot;
use crate::error::Result;
use crate::finding::Finding;
use crate::fs_state::FilesystemSnapshot;
use crate::summary::PassSummary;

/// Applies the consistency rules between the two snapshots
pub struct Reconciler<'a> {
    db: &'a dyn ArchiveDatabase,
    tree: &'a EventTree,
    min_age: Duration,
}

impl<'a> Reconciler<'a> {
    pub fn new(db: &'a dyn ArchiveDatabase, tree: &'a EventTree, min_age: Duration) -> Self {
        Self { db, tree, min_age }
    }

    /// Run every reconciliation step for one pass
    pub async fn reconcile(
        &self,
        db_state: &DatabaseSnapshot,
        fs_state: &FilesystemSnapshot,
        policy: &mut ConfirmationPolicy,
        summary: &mut PassSummary,
    ) -> Result<()> {
        self.remove_filesystem_only(db_state, fs_state, policy, summary)
            .await?;
        self.remove_database_only(db_state, fs_state, policy, summary)
            .await?;
        self.remove_orphan_frames(policy, summary).await?;
        self.remove_orphan_stats(policy, summary).await?;
        Ok(())
    }

    /// Directories on disk with no matching database row
    #[instrument(skip_all)]
    async fn remove_filesystem_only(
        &self,
        db_state: &DatabaseSnapshot,
        fs_state: &FilesystemSnapshot,
        policy: &mut ConfirmationPolicy,
        summary: &mut PassSummary,
    ) -> Result<()> {
        for (monitor_id, fs_events) in fs_state.monitors() {
            let Some(db_events) = db_state.events(monitor_id) else {
                let path = self.tree.monitor_dir(monitor_id);
                let finding = Finding::UnknownMonitor {
                    monitor_id,
                    path: path.clone(),
                };
                summary.unknown_monitors += 1;

                if policy.confirm(&finding).await? {
                    self.remove_tree(&path, summary).await;
                }
                continue;
            };

            for (&event_id, &age) in fs_events {
                if db_events.contains_key(&event_id) {
                    continue;
                }
                if !age.exceeds(self.min_age) {
                    debug!(monitor_id = %monitor_id, event_id = %event_id, age = %age,
                        "Filesystem event too recent to judge");
                    continue;
                }

                let path = self.tree.event_dir(monitor_id, event_id);
                let finding = Finding::FilesystemOnlyEvent {
                    monitor_id,
                    event_id,
                    age,
                    path: path.clone(),
                };
                summary.filesystem_only_events += 1;

                if policy.confirm(&finding).await? {
                    self.remove_tree(&path, summary).await;
                }
            }
        }

        Ok(())
    }

    /// Event rows with no directory, for monitors that have a directory
    #[instrument(skip_all)]
    async fn remove_database_only(
        &self,
        db_state: &DatabaseSnapshot,
        fs_state: &FilesystemSnapshot,
        policy: &mut ConfirmationPolicy,
        summary: &mut PassSummary,
    ) -> Result<()> {
        for (monitor_id, db_events) in db_state.monitors() {
            let Some(fs_events) = fs_state.events(monitor_id) else {
                continue;
            };

            for (&event_id, &age) in db_events {
                if fs_events.contains_key(&event_id) || !age.exceeds(self.min_age) {
                    continue;
                }

                let finding = Finding::DatabaseOnlyEvent {
                    monitor_id,
                    event_id,
                    age,
                };
                summary.database_only_events += 1;

                if policy.confirm(&finding).await? {
                    self.db.delete_event(event_id).await?;
                    summary.events_deleted += 1;
                    metrics::counter!("audit.events.deleted").increment(1);
                }
            }
        }

        Ok(())
    }

    #[instrument(skip_all)]
    async fn remove_orphan_frames(
        &self,
        policy: &mut ConfirmationPolicy,
        summary: &mut PassSummary,
    ) -> Result<()> {
        for event_id in self.db.orphan_frame_event_ids().await? {
            summary.orphan_frame_events += 1;

            if policy.confirm(&Finding::OrphanFrames { event_id }).await? {
                let removed = self.db.delete_frames(event_id).await?;
                debug!(event_id = %event_id, removed, "Deleted orphaned frames");
                summary.orphans_deleted += 1;
                metrics::counter!("audit.orphans.deleted").increment(1);
            }
        }

        Ok(())
    }

    #[instrument(skip_all)]
    async fn remove_orphan_stats(
        &self,
        policy: &mut ConfirmationPolicy,
        summary: &mut PassSummary,
    ) -> Result<()> {
        for event_id in self.db.orphan_stat_event_ids().await? {
            summary.orphan_stat_events += 1;

            if policy.confirm(&Finding::OrphanStats { event_id }).await? {
                let removed = self.db.delete_stats(event_id).await?;
                debug!(event_id = %event_id, removed, "Deleted orphaned stats");
                summary.orphans_deleted += 1;
                metrics::counter!("audit.orphans.deleted").increment(1);
            }
        }

        Ok(())
    }

    async fn remove_tree(&self, path: &std::path::Path, summary: &mut PassSummary) {
        if archive_fs::remove_dir(path).await {
            summary.directories_deleted += 1;
            metrics::counter!("audit.directories.deleted").increment(1);
        } else {
            summary.deletions_failed += 1;
        }
    }
}
