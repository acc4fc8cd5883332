use std::time::Duration;
use tracing::{info, instrument};

use crate::archive_db::{ArchiveDatabase, EventClosure, OpenEvent};
use crate::confirm::ConfirmationPolicy;
use crate::error::Result;
use crate::finding::Finding;
use crate::summary::PassSummary;

/// Appended to the name of every event closed by the audit
pub const RECOVERED_TAG: &str = "(r)";

/// Appended to the notes of every event closed by the audit
pub const RECOVERY_NOTE: &str = "Closed by archive audit";

/// Aggregates to write for an open event
pub fn closure_for(event: &OpenEvent) -> EventClosure {
    let avg_score = if event.alarm_frames > 0 {
        event.tot_score / event.alarm_frames
    } else {
        0
    };

    EventClosure {
        event_id: event.event_id,
        name: format!("{}{}{}", event.event_prefix, event.event_id, RECOVERED_TAG),
        end_time: event.end_time,
        length: event.length,
        frames: event.frames,
        alarm_frames: event.alarm_frames,
        tot_score: event.tot_score,
        avg_score,
        max_score: event.max_score,
        note: RECOVERY_NOTE.to_string(),
    }
}

/// Close events the recorder left open
///
/// Only events whose newest frame is older than `min_age` are candidates, so
/// an event still being written is never closed under the recorder.
#[instrument(skip_all)]
pub async fn close_stale_events(
    db: &dyn ArchiveDatabase,
    min_age: Duration,
    policy: &mut ConfirmationPolicy,
    summary: &mut PassSummary,
) -> Result<()> {
    for event in db.open_events(min_age).await? {
        summary.open_events += 1;

        let finding = Finding::OpenEvent {
            event_id: event.event_id,
        };
        if !policy.confirm(&finding).await? {
            continue;
        }

        let closure = closure_for(&event);
        db.close_event(&closure).await?;

        info!(
            event_id = %closure.event_id,
            name = %closure.name,
            frames = closure.frames,
            length = closure.length,
            "Closed open event"
        );
        summary.events_closed += 1;
        metrics::counter!("audit.events.closed").increment(1);
    }

    Ok(())
}
