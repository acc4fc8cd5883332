use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

use crate::age::{Age, PassClock};
use crate::archive_fs::EventTree;
use crate::error::{AuditError, Result};
use crate::model::{EventId, MonitorId};

/// Events present on disk, per monitor directory
#[derive(Debug, Clone, Default)]
pub struct FilesystemSnapshot {
    monitors: BTreeMap<MonitorId, BTreeMap<EventId, Age>>,
}

impl FilesystemSnapshot {
    /// Walk the event tree
    ///
    /// Only numeric directory names are considered, at both levels. Within a
    /// monitor the `recent_window` highest event ids get their age measured
    /// from the directory mtime; every older one is [`Age::AlwaysEligible`].
    #[instrument(skip_all, fields(root = %tree.root().display()))]
    pub async fn load(tree: &EventTree, clock: &PassClock, recent_window: usize) -> Result<Self> {
        let root = tree.root();
        let mut entries = fs::read_dir(root)
            .await
            .map_err(|e| AuditError::environment(root, e))?;

        let mut monitors = BTreeMap::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AuditError::environment(root, e))?
        {
            let Some(monitor_id) = entry.file_name().to_str().and_then(MonitorId::from_dir_name)
            else {
                continue;
            };
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| AuditError::environment(entry.path(), e))?;
            if !file_type.is_dir() {
                continue;
            }

            let events = load_monitor(&tree.monitor_dir(monitor_id), clock, recent_window).await?;
            debug!(monitor_id = %monitor_id, count = events.len(), "Loaded filesystem events");
            monitors.insert(monitor_id, events);
        }

        Ok(Self { monitors })
    }

    pub fn monitors(&self) -> impl Iterator<Item = (MonitorId, &BTreeMap<EventId, Age>)> {
        self.monitors.iter().map(|(id, events)| (*id, events))
    }

    pub fn contains_monitor(&self, monitor_id: MonitorId) -> bool {
        self.monitors.contains_key(&monitor_id)
    }

    pub fn events(&self, monitor_id: MonitorId) -> Option<&BTreeMap<EventId, Age>> {
        self.monitors.get(&monitor_id)
    }

    pub fn event_count(&self) -> usize {
        self.monitors.values().map(BTreeMap::len).sum()
    }
}

async fn load_monitor(
    dir: &Path,
    clock: &PassClock,
    recent_window: usize,
) -> Result<BTreeMap<EventId, Age>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| AuditError::environment(dir, e))?;

    let mut found = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AuditError::environment(dir, e))?
    {
        let Some(event_id) = entry.file_name().to_str().and_then(EventId::from_dir_name) else {
            continue;
        };
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| AuditError::environment(entry.path(), e))?;
        if file_type.is_dir() {
            found.push((event_id, entry));
        }
    }

    // Newest first; only the head of the list is worth a stat call
    found.sort_by(|a, b| b.0.cmp(&a.0));

    let mut events = BTreeMap::new();
    for (rank, (event_id, entry)) in found.into_iter().enumerate() {
        let age = if rank < recent_window {
            let modified = entry
                .metadata()
                .await
                .and_then(|meta| meta.modified())
                .map_err(|e| AuditError::environment(entry.path(), e))?;
            clock.age_of(modified)
        } else {
            Age::AlwaysEligible
        };
        events.insert(event_id, age);
    }

    Ok(events)
}
