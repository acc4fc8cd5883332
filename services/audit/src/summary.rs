use tracing::info;

/// What one audit pass found and did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub unknown_monitors: usize,
    pub filesystem_only_events: usize,
    pub database_only_events: usize,
    pub orphan_frame_events: usize,
    pub orphan_stat_events: usize,
    pub open_events: usize,
    pub loose_images: usize,

    pub directories_deleted: usize,
    pub events_deleted: usize,
    pub orphans_deleted: usize,
    pub events_closed: usize,
    pub images_deleted: usize,
    pub deletions_failed: usize,
}

impl PassSummary {
    /// Discrepancies found between the database and the archive
    pub fn discrepancies(&self) -> usize {
        self.unknown_monitors
            + self.filesystem_only_events
            + self.database_only_events
            + self.orphan_frame_events
            + self.orphan_stat_events
            + self.open_events
    }

    /// Whether any database rows were removed
    pub fn deleted_rows(&self) -> bool {
        self.events_deleted > 0 || self.orphans_deleted > 0
    }

    pub fn log(&self) {
        info!(
            discrepancies = self.discrepancies(),
            unknown_monitors = self.unknown_monitors,
            filesystem_only_events = self.filesystem_only_events,
            database_only_events = self.database_only_events,
            orphan_frame_events = self.orphan_frame_events,
            orphan_stat_events = self.orphan_stat_events,
            open_events = self.open_events,
            loose_images = self.loose_images,
            directories_deleted = self.directories_deleted,
            events_deleted = self.events_deleted,
            orphans_deleted = self.orphans_deleted,
            events_closed = self.events_closed,
            images_deleted = self.images_deleted,
            deletions_failed = self.deletions_failed,
            "Audit pass complete"
        );
    }
}
