//! In-memory event database for exercising the audit without MySQL.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::age::Age;
use crate::archive_db::{ArchiveDatabase, EventClosure, OpenEvent};
use crate::confirm::{ConfirmationPolicy, MockPrompter, RunMode};
use crate::error::{AuditError, Result};
use crate::model::{EventId, MonitorId};

/// Policy whose prompter fails the test if it is ever asked anything
pub fn policy(mode: RunMode) -> ConfirmationPolicy {
    let mut prompter = MockPrompter::new();
    prompter.expect_ask().never();
    ConfirmationPolicy::new(mode, Box::new(prompter))
}

struct MemoryEvent {
    monitor_id: u64,
    start_time: NaiveDateTime,
    notes: Option<String>,
    closure: Option<EventClosure>,
}

struct MemoryFrame {
    event_id: u64,
    timestamp: NaiveDateTime,
    score: i64,
}

#[derive(Default)]
struct State {
    monitors: BTreeSet<u64>,
    events: BTreeMap<u64, MemoryEvent>,
    frames: Vec<MemoryFrame>,
    stats: Vec<u64>,
    failing: bool,
    optimized: usize,
}

/// Event database held in memory, with "now" fixed at construction
///
/// Clones share the same state, so a test can keep a handle after giving one
/// to the auditor.
#[derive(Clone)]
pub struct MemoryArchive {
    now: NaiveDateTime,
    state: Arc<Mutex<State>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self {
            now: Utc::now().naive_utc(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    fn ago(&self, secs: i64) -> NaiveDateTime {
        self.now - chrono::Duration::seconds(secs)
    }

    pub fn add_monitor(&self, id: u64) {
        self.state.lock().unwrap().monitors.insert(id);
    }

    /// Closed event that started `age` seconds ago
    pub fn add_event(&self, monitor_id: u64, id: u64, age: i64) {
        let event = MemoryEvent {
            monitor_id,
            start_time: self.ago(age),
            notes: None,
            closure: Some(EventClosure {
                event_id: EventId(id),
                name: format!("Event-{}", id),
                end_time: self.ago(age),
                length: 0,
                frames: 0,
                alarm_frames: 0,
                tot_score: 0,
                avg_score: 0,
                max_score: 0,
                note: String::new(),
            }),
        };
        self.state.lock().unwrap().events.insert(id, event);
    }

    /// Event never closed by the recorder
    pub fn add_open_event(&self, monitor_id: u64, id: u64, age: i64, notes: Option<&str>) {
        let event = MemoryEvent {
            monitor_id,
            start_time: self.ago(age),
            notes: notes.map(str::to_string),
            closure: None,
        };
        self.state.lock().unwrap().events.insert(id, event);
    }

    pub fn add_frame(&self, event_id: u64, age: i64, score: i64) {
        let frame = MemoryFrame {
            event_id,
            timestamp: self.ago(age),
            score,
        };
        self.state.lock().unwrap().frames.push(frame);
    }

    pub fn add_stat(&self, event_id: u64) {
        self.state.lock().unwrap().stats.push(event_id);
    }

    /// Make every subsequent query fail
    pub fn fail_queries(&self) {
        self.state.lock().unwrap().failing = true;
    }

    pub fn has_event(&self, id: u64) -> bool {
        self.state.lock().unwrap().events.contains_key(&id)
    }

    pub fn frame_count(&self, event_id: u64) -> usize {
        let state = self.state.lock().unwrap();
        state.frames.iter().filter(|f| f.event_id == event_id).count()
    }

    pub fn stat_count(&self, event_id: u64) -> usize {
        let state = self.state.lock().unwrap();
        state.stats.iter().filter(|s| **s == event_id).count()
    }

    pub fn closure(&self, id: u64) -> Option<EventClosure> {
        let state = self.state.lock().unwrap();
        state.events.get(&id).and_then(|e| e.closure.clone())
    }

    pub fn notes(&self, id: u64) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.events.get(&id).and_then(|e| e.notes.clone())
    }

    pub fn optimize_count(&self) -> usize {
        self.state.lock().unwrap().optimized
    }

    fn check(&self) -> Result<std::sync::MutexGuard<'_, State>> {
        let state = self.state.lock().unwrap();
        if state.failing {
            return Err(AuditError::Database(sqlx::Error::Protocol(
                "simulated failure".to_string(),
            )));
        }
        Ok(state)
    }
}

#[async_trait]
impl ArchiveDatabase for MemoryArchive {
    async fn monitor_ids(&self) -> Result<Vec<MonitorId>> {
        let state = self.check()?;
        Ok(state.monitors.iter().map(|id| MonitorId(*id)).collect())
    }

    async fn event_ages(&self, monitor_id: MonitorId) -> Result<Vec<(EventId, Age)>> {
        let state = self.check()?;
        Ok(state
            .events
            .iter()
            .filter(|(_, e)| e.monitor_id == monitor_id.0)
            .map(|(id, e)| {
                let age = (self.now - e.start_time).num_seconds();
                (EventId(*id), Age::from_db_seconds(age))
            })
            .collect())
    }

    async fn delete_event(&self, event_id: EventId) -> Result<()> {
        let mut state = self.check()?;
        state.events.remove(&event_id.0);
        state.frames.retain(|f| f.event_id != event_id.0);
        state.stats.retain(|s| *s != event_id.0);
        Ok(())
    }

    async fn orphan_frame_event_ids(&self) -> Result<Vec<EventId>> {
        let state = self.check()?;
        let ids: BTreeSet<u64> = state
            .frames
            .iter()
            .map(|f| f.event_id)
            .filter(|id| !state.events.contains_key(id))
            .collect();
        Ok(ids.into_iter().map(EventId).collect())
    }

    async fn delete_frames(&self, event_id: EventId) -> Result<u64> {
        let mut state = self.check()?;
        let before = state.frames.len();
        state.frames.retain(|f| f.event_id != event_id.0);
        Ok((before - state.frames.len()) as u64)
    }

    async fn orphan_stat_event_ids(&self) -> Result<Vec<EventId>> {
        let state = self.check()?;
        let ids: BTreeSet<u64> = state
            .stats
            .iter()
            .copied()
            .filter(|id| !state.events.contains_key(id))
            .collect();
        Ok(ids.into_iter().map(EventId).collect())
    }

    async fn delete_stats(&self, event_id: EventId) -> Result<u64> {
        let mut state = self.check()?;
        let before = state.stats.len();
        state.stats.retain(|s| *s != event_id.0);
        Ok((before - state.stats.len()) as u64)
    }

    async fn open_events(&self, min_age: Duration) -> Result<Vec<OpenEvent>> {
        let state = self.check()?;
        let cutoff = self.now - chrono::Duration::seconds(min_age.as_secs() as i64);

        let mut open = Vec::new();
        for (id, event) in state.events.iter().filter(|(_, e)| e.closure.is_none()) {
            let frames: Vec<&MemoryFrame> =
                state.frames.iter().filter(|f| f.event_id == *id).collect();
            let Some(end_time) = frames.iter().map(|f| f.timestamp).max() else {
                continue;
            };
            if end_time >= cutoff {
                continue;
            }

            open.push(OpenEvent {
                event_id: EventId(*id),
                event_prefix: "Event-".to_string(),
                end_time,
                length: (end_time - event.start_time).num_seconds(),
                frames: frames.len() as i64,
                alarm_frames: frames.iter().filter(|f| f.score > 0).count() as i64,
                tot_score: frames.iter().map(|f| f.score).sum(),
                max_score: frames.iter().map(|f| f.score).max().unwrap_or(0),
            });
        }
        Ok(open)
    }

    async fn close_event(&self, closure: &EventClosure) -> Result<()> {
        let mut state = self.check()?;
        if let Some(event) = state.events.get_mut(&closure.event_id.0) {
            event.notes = match event.notes.take() {
                Some(notes) if !notes.is_empty() => Some(format!("{} {}", notes, closure.note)),
                _ => Some(closure.note.clone()),
            };
            event.closure = Some(closure.clone());
        }
        Ok(())
    }

    async fn optimize_tables(&self) -> Result<()> {
        let mut state = self.check()?;
        state.optimized += 1;
        Ok(())
    }
}
