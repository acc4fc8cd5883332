//! Discrepancies found during a pass, and how they are reported.
//!
//! Every component describes what it found as a [`Finding`] and emits it
//! through `tracing`; whether that ends up on the console or in a log file is
//! decided once when the subscriber is installed.

use std::fmt;
use std::path::PathBuf;

use crate::age::Age;
use crate::model::{EventId, MonitorId};

/// How serious a finding is when reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Inconsistency that will be repaired or removed
    Warning,
    /// Routine cleanup of transient data
    Notice,
}

/// The correction a finding calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Delete,
    Close,
}

impl Action {
    /// Imperative wording used in prompts
    pub fn verb(&self) -> &'static str {
        match self {
            Action::Delete => "delete",
            Action::Close => "close",
        }
    }

    /// Progressive wording used once confirmed
    pub fn progressive(&self) -> &'static str {
        match self {
            Action::Delete => "deleting",
            Action::Close => "closing",
        }
    }
}

/// A single discrepancy between the database and the archive on disk
#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    /// Monitor directory with no monitor row
    UnknownMonitor { monitor_id: MonitorId, path: PathBuf },
    /// Event directory with no event row
    FilesystemOnlyEvent {
        monitor_id: MonitorId,
        event_id: EventId,
        age: Age,
        path: PathBuf,
    },
    /// Event row with no event directory
    DatabaseOnlyEvent {
        monitor_id: MonitorId,
        event_id: EventId,
        age: Age,
    },
    /// Frame rows whose event row is gone
    OrphanFrames { event_id: EventId },
    /// Stat rows whose event row is gone
    OrphanStats { event_id: EventId },
    /// Event that was never closed by the recorder
    OpenEvent { event_id: EventId },
    /// Batch of expired loose images
    LooseImages { count: usize, path: PathBuf },
}

impl Finding {
    pub fn action(&self) -> Action {
        match self {
            Finding::OpenEvent { .. } => Action::Close,
            _ => Action::Delete,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Finding::LooseImages { .. } => Severity::Notice,
            _ => Severity::Warning,
        }
    }

    /// Short machine-friendly name for log fields and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Finding::UnknownMonitor { .. } => "unknown_monitor",
            Finding::FilesystemOnlyEvent { .. } => "filesystem_only_event",
            Finding::DatabaseOnlyEvent { .. } => "database_only_event",
            Finding::OrphanFrames { .. } => "orphan_frames",
            Finding::OrphanStats { .. } => "orphan_stats",
            Finding::OpenEvent { .. } => "open_event",
            Finding::LooseImages { .. } => "loose_images",
        }
    }

    /// Report the finding through the configured log sink
    pub fn emit(&self) {
        match self.severity() {
            Severity::Warning => tracing::warn!(kind = self.kind(), "{}", self),
            Severity::Notice => tracing::info!(kind = self.kind(), "{}", self),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::UnknownMonitor { monitor_id, path } => write!(
                f,
                "Filesystem monitor '{}' ({}) does not exist in database",
                monitor_id,
                path.display()
            ),
            Finding::FilesystemOnlyEvent {
                monitor_id,
                event_id,
                age,
                ..
            } => write!(
                f,
                "Filesystem event '{}/{}' does not exist in database (age {})",
                monitor_id, event_id, age
            ),
            Finding::DatabaseOnlyEvent {
                monitor_id,
                event_id,
                age,
            } => write!(
                f,
                "Database event '{}/{}' does not exist in filesystem (age {})",
                monitor_id, event_id, age
            ),
            Finding::OrphanFrames { event_id } => {
                write!(f, "Found orphaned frame records for event '{}'", event_id)
            }
            Finding::OrphanStats { event_id } => {
                write!(f, "Found orphaned statistic records for event '{}'", event_id)
            }
            Finding::OpenEvent { event_id } => write!(f, "Found open event '{}'", event_id),
            Finding::LooseImages { count, path } => write!(
                f,
                "Found {} expired image file(s) in {}",
                count,
                path.display()
            ),
        }
    }
}
