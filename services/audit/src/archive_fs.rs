use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error};

use crate::model::{EventId, MonitorId};

/// Layout of the on-disk event tree: `<root>/<monitor>/<event>/`
#[derive(Debug, Clone)]
pub struct EventTree {
    root: PathBuf,
}

impl EventTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn monitor_dir(&self, monitor_id: MonitorId) -> PathBuf {
        self.root.join(monitor_id.to_string())
    }

    pub fn event_dir(&self, monitor_id: MonitorId, event_id: EventId) -> PathBuf {
        self.monitor_dir(monitor_id).join(event_id.to_string())
    }
}

/// Recursively remove a directory, logging the outcome
///
/// Returns false when the directory could not be removed. A directory that
/// is already gone counts as removed.
pub async fn remove_dir(path: &Path) -> bool {
    match fs::remove_dir_all(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Removed directory");
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "Directory already removed");
            true
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to remove directory");
            metrics::counter!("audit.deletions.failed").increment(1);
            false
        }
    }
}

/// Remove a single file, logging the outcome
pub async fn remove_file(path: &Path) -> bool {
    match fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to remove file");
            metrics::counter!("audit.deletions.failed").increment(1);
            false
        }
    }
}
