use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::age::Age;
use crate::archive_db::ArchiveDatabase;
use crate::error::Result;
use crate::model::{EventId, MonitorId};

/// Monitors and events as recorded in the database
#[derive(Debug, Clone, Default)]
pub struct DatabaseSnapshot {
    monitors: BTreeMap<MonitorId, BTreeMap<EventId, Age>>,
}

impl DatabaseSnapshot {
    /// Read every monitor, then each monitor's events with one query apiece
    ///
    /// Any failing query fails the whole load.
    #[instrument(skip_all)]
    pub async fn load(db: &dyn ArchiveDatabase) -> Result<Self> {
        let mut monitors = BTreeMap::new();

        for monitor_id in db.monitor_ids().await? {
            let events: BTreeMap<EventId, Age> =
                db.event_ages(monitor_id).await?.into_iter().collect();
            monitors.insert(monitor_id, events);
        }

        debug!(monitors = monitors.len(), "Loaded database state");

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
