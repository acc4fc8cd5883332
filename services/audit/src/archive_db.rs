use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::age::Age;
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::model::{EventId, MonitorId};

/// Open event with the aggregates its frames imply
#[derive(Debug, Clone, PartialEq)]
pub struct OpenEvent {
    pub event_id: EventId,
    /// Name prefix of the owning monitor
    pub event_prefix: String,
    /// Timestamp of the newest frame
    pub end_time: NaiveDateTime,
    /// Seconds between start and the newest frame
    pub length: i64,
    pub frames: i64,
    /// Frames with a positive score
    pub alarm_frames: i64,
    pub tot_score: i64,
    pub max_score: i64,
}

/// Values written to an event row to close it
#[derive(Debug, Clone, PartialEq)]
pub struct EventClosure {
    pub event_id: EventId,
    pub name: String,
    pub end_time: NaiveDateTime,
    pub length: i64,
    pub frames: i64,
    pub alarm_frames: i64,
    pub tot_score: i64,
    pub avg_score: i64,
    pub max_score: i64,
    /// Appended to whatever notes the event already has
    pub note: String,
}

/// Queries and corrections the audit needs from the event database
#[async_trait]
pub trait ArchiveDatabase: Send + Sync {
    /// All monitor ids, ascending
    async fn monitor_ids(&self) -> Result<Vec<MonitorId>>;

    /// Every event of one monitor with its age
    async fn event_ages(&self, monitor_id: MonitorId) -> Result<Vec<(EventId, Age)>>;

    /// Delete an event row together with its frames and stats
    async fn delete_event(&self, event_id: EventId) -> Result<()>;

    /// Event ids referenced by frames whose event row is missing
    async fn orphan_frame_event_ids(&self) -> Result<Vec<EventId>>;

    /// Delete all frames of an event, returning the number removed
    async fn delete_frames(&self, event_id: EventId) -> Result<u64>;

    /// Event ids referenced by stats whose event row is missing
    async fn orphan_stat_event_ids(&self) -> Result<Vec<EventId>>;

    /// Delete all stats of an event, returning the number removed
    async fn delete_stats(&self, event_id: EventId) -> Result<u64>;

    /// Unclosed events whose newest frame is older than `min_age`
    async fn open_events(&self, min_age: Duration) -> Result<Vec<OpenEvent>>;

    /// Write closing aggregates to an event row
    async fn close_event(&self, closure: &EventClosure) -> Result<()>;

    /// Reclaim space after deletions
    async fn optimize_tables(&self) -> Result<()>;
}

#[derive(FromRow)]
struct IdRow {
    id: u64,
}

#[derive(FromRow)]
struct EventAgeRow {
    id: u64,
    age: i64,
}

#[derive(FromRow)]
struct OpenEventRow {
    id: u64,
    event_prefix: String,
    end_time: NaiveDateTime,
    length: i64,
    frames: i64,
    alarm_frames: i64,
    tot_score: i64,
    max_score: i64,
}

impl From<OpenEventRow> for OpenEvent {
    fn from(row: OpenEventRow) -> Self {
        Self {
            event_id: EventId(row.id),
            event_prefix: row.event_prefix,
            end_time: row.end_time,
            length: row.length,
            frames: row.frames,
            alarm_frames: row.alarm_frames,
            tot_score: row.tot_score,
            max_score: row.max_score,
        }
    }
}

/// Aggregates of open events whose newest frame is older than the bound
/// number of seconds. `Frames.TimeStamp` is a TIMESTAMP column, so the end
/// time is cast to DATETIME to decode as `NaiveDateTime`.
const OPEN_EVENTS_SQL: &str = r#"
    SELECT CAST(E.Id AS UNSIGNED) AS id,
           COALESCE(M.EventPrefix, '') AS event_prefix,
           CAST(MAX(F.TimeStamp) AS DATETIME) AS end_time,
           CAST(COALESCE(UNIX_TIMESTAMP(MAX(F.TimeStamp))
                         - UNIX_TIMESTAMP(E.StartTime), 0) AS SIGNED) AS length,
           COUNT(F.Id) AS frames,
           CAST(COALESCE(SUM(F.Score > 0), 0) AS SIGNED) AS alarm_frames,
           CAST(COALESCE(SUM(F.Score), 0) AS SIGNED) AS tot_score,
           CAST(COALESCE(MAX(F.Score), 0) AS SIGNED) AS max_score
    FROM Events AS E
    INNER JOIN Monitors AS M ON M.Id = E.MonitorId
    INNER JOIN Frames AS F ON F.EventId = E.Id
    WHERE E.Frames IS NULL
    GROUP BY E.Id, M.EventPrefix, E.StartTime
    HAVING MAX(F.TimeStamp) < NOW() - INTERVAL ? SECOND
    "#;

/// Event database backed by a MySQL connection pool
pub struct MysqlArchive {
    pool: MySqlPool,
}

impl MysqlArchive {
    /// Connect to the event database
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout())
            .connect(&config.url)
            .await?;

        info!("Connected to event database");

        Ok(Self { pool })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl ArchiveDatabase for MysqlArchive {
    #[instrument(skip(self))]
    async fn monitor_ids(&self) -> Result<Vec<MonitorId>> {
        let rows = sqlx::query_as::<_, IdRow>(
            r#"
            SELECT CAST(Id AS UNSIGNED) AS id
            FROM Monitors
            ORDER BY Id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| MonitorId(row.id)).collect())
    }

    #[instrument(skip_all, fields(monitor_id = %monitor_id))]
    async fn event_ages(&self, monitor_id: MonitorId) -> Result<Vec<(EventId, Age)>> {
        let rows = sqlx::query_as::<_, EventAgeRow>(
            r#"
            SELECT CAST(Id AS UNSIGNED) AS id,
                   CAST(COALESCE(UNIX_TIMESTAMP(NOW()) - UNIX_TIMESTAMP(StartTime), 0)
                        AS SIGNED) AS age
            FROM Events
            WHERE MonitorId = ?
            "#,
        )
        .bind(monitor_id.0)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Loaded database events");

        Ok(rows
            .into_iter()
            .map(|row| (EventId(row.id), Age::from_db_seconds(row.age)))
            .collect())
    }

    #[instrument(skip_all, fields(event_id = %event_id))]
    async fn delete_event(&self, event_id: EventId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM Events WHERE Id = ?")
            .bind(event_id.0)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM Frames WHERE EventId = ?")
            .bind(event_id.0)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM Stats WHERE EventId = ?")
            .bind(event_id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn orphan_frame_event_ids(&self) -> Result<Vec<EventId>> {
        let rows = sqlx::query_as::<_, IdRow>(
            r#"
            SELECT DISTINCT CAST(F.EventId AS UNSIGNED) AS id
            FROM Frames AS F
            LEFT JOIN Events AS E ON F.EventId = E.Id
            WHERE E.Id IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| EventId(row.id)).collect())
    }

    #[instrument(skip_all, fields(event_id = %event_id))]
    async fn delete_frames(&self, event_id: EventId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM Frames WHERE EventId = ?")
            .bind(event_id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn orphan_stat_event_ids(&self) -> Result<Vec<EventId>> {
        let rows = sqlx::query_as::<_, IdRow>(
            r#"
            SELECT DISTINCT CAST(S.EventId AS UNSIGNED) AS id
            FROM Stats AS S
            LEFT JOIN Events AS E ON S.EventId = E.Id
            WHERE E.Id IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| EventId(row.id)).collect())
    }

    #[instrument(skip_all, fields(event_id = %event_id))]
    async fn delete_stats(&self, event_id: EventId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM Stats WHERE EventId = ?")
            .bind(event_id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn open_events(&self, min_age: Duration) -> Result<Vec<OpenEvent>> {
        let rows = sqlx::query_as::<_, OpenEventRow>(OPEN_EVENTS_SQL)
            .bind(min_age.as_secs())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(OpenEvent::from).collect())
    }

    #[instrument(skip_all, fields(event_id = %closure.event_id))]
    async fn close_event(&self, closure: &EventClosure) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE Events
            SET Name = ?,
                EndTime = ?,
                Length = ?,
                Frames = ?,
                AlarmFrames = ?,
                TotScore = ?,
                AvgScore = ?,
                MaxScore = ?,
                Notes = CONCAT_WS(' ', NULLIF(Notes, ''), ?)
            WHERE Id = ?
            "#,
        )
        .bind(&closure.name)
        .bind(closure.end_time)
        .bind(closure.length)
        .bind(closure.frames)
        .bind(closure.alarm_frames)
        .bind(closure.tot_score)
        .bind(closure.avg_score)
        .bind(closure.max_score)
        .bind(&closure.note)
        .bind(closure.event_id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn optimize_tables(&self) -> Result<()> {
        info!("Optimising event tables");

        sqlx::query("OPTIMIZE TABLE Events, Frames, Stats")
            .fetch_all(&self.pool)
            .await?;

        Ok(())
    }
}
