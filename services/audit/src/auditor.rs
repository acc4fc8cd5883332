use tracing::{debug, error, info};

use crate::age::PassClock;
use crate::archive_db::ArchiveDatabase;
use crate::archive_fs::EventTree;
use crate::closer;
use crate::config::AuditSettings;
use crate::confirm::ConfirmationPolicy;
use crate::db_state::DatabaseSnapshot;
use crate::error::Result;
use crate::fs_state::FilesystemSnapshot;
use crate::reconciler::Reconciler;
use crate::summary::PassSummary;
use crate::sweeper;

/// Runs audit passes over the event archive
pub struct Auditor {
    db: Box<dyn ArchiveDatabase>,
    tree: EventTree,
    settings: AuditSettings,
    policy: ConfirmationPolicy,
}

impl Auditor {
    pub fn new(
        db: Box<dyn ArchiveDatabase>,
        settings: AuditSettings,
        policy: ConfirmationPolicy,
    ) -> Self {
        Self {
            db,
            tree: EventTree::new(settings.events_path.clone()),
            settings,
            policy,
        }
    }

    /// Run one pass, or keep running passes when a delay is configured
    ///
    /// In continuous mode a failed pass is logged and retried after the
    /// delay. An operator quit always ends the run.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            match self.run_pass().await {
                Ok(_) => {}
                Err(e) if e.is_quit() => return Err(e),
                Err(e) if self.settings.is_continuous() => {
                    error!(error = %e, "Audit pass failed");
                }
                Err(e) => return Err(e),
            }

            if !self.settings.is_continuous() {
                return Ok(());
            }

            debug!(delay_secs = self.settings.delay.as_secs(), "Waiting for next pass");
            tokio::time::sleep(self.settings.delay).await;
        }
    }

    /// Run a single pass with ages measured from now
    pub async fn run_pass(&mut self) -> Result<PassSummary> {
        self.run_pass_at(PassClock::start()).await
    }

    /// Run a single pass with ages measured from `clock`
    pub async fn run_pass_at(&mut self, clock: PassClock) -> Result<PassSummary> {
        info!(mode = ?self.policy.mode(), "Starting audit pass");

        let db_state = DatabaseSnapshot::load(self.db.as_ref()).await?;
        let fs_state =
            FilesystemSnapshot::load(&self.tree, &clock, self.settings.recent_window).await?;
        debug!(
            database_events = db_state.event_count(),
            filesystem_events = fs_state.event_count(),
            "Loaded archive state"
        );

        let mut summary = PassSummary::default();

        Reconciler::new(self.db.as_ref(), &self.tree, self.settings.min_age)
            .reconcile(&db_state, &fs_state, &mut self.policy, &mut summary)
            .await?;

        closer::close_stale_events(
            self.db.as_ref(),
            self.settings.min_age,
            &mut self.policy,
            &mut summary,
        )
        .await?;

        sweeper::sweep_loose_images(
            &self.settings.images_path,
            &self.settings.image_extensions,
            self.settings.image_retention,
            &clock,
            &mut self.policy,
            &mut summary,
        )
        .await?;

        if self.settings.optimize_tables && summary.deleted_rows() {
            self.db.optimize_tables().await?;
        }

        summary.log();
        Ok(summary)
    }
}
