//! Nier Archive Audit
//!
//! Maintenance service for the surveillance event archive. It reconciles the
//! event database against the `<monitor>/<event>` directory tree on disk,
//! removes whichever side is inconsistent, closes events the recorder left
//! open, and sweeps expired loose images.
//!
//! ## Features
//!
//! - **Two independent snapshots**: database and filesystem state are loaded
//!   fresh every pass and never mixed
//! - **Grace window**: nothing younger than the minimum age is touched, so
//!   recordings in flight are left alone
//! - **Operator control**: report-only, auto-confirm or interactive
//!   confirmation of every destructive action
//! - **Stale event recovery**: open events get their aggregates recomputed
//!   from frame records and are tagged as recovered
//!
//! ## Architecture
//!
//! ```text
//!   MySQL                    Event tree                Image root
//! ┌──────────────┐         ┌──────────────┐         ┌──────────────┐
//! │ Monitors     │         │ {monitor}/   │         │ *.jpg *.gif  │
//! │ Events       │         │   {event}/   │         │ *.wbmp       │
//! │ Frames Stats │         └──────────────┘         └──────────────┘
//! └──────────────┘                │                        │
//!        │                        ▼                        │
//!        ▼                 ┌──────────────┐                │
//! ┌──────────────┐         │ Filesystem   │                │
//! │ Database     │         │ Snapshot     │                │
//! │ Snapshot     │         └──────────────┘                │
//! └──────────────┘                │                        │
//!        │                        │                        │
//!        └──────────┬─────────────┘                        │
//!                   ▼                                      ▼
//!            ┌──────────────┐  ┌──────────────┐     ┌──────────────┐
//!            │ Reconciler   │  │ Stale Event  │     │ Loose Image  │
//!            │              │  │ Closer       │     │ Sweeper      │
//!            └──────────────┘  └──────────────┘     └──────────────┘
//!                   │                 │                    │
//!                   └────────┬────────┴────────────────────┘
//!                            ▼
//!                   ┌──────────────────┐
//!                   │ Confirmation     │
//!                   │ Policy           │
//!                   └──────────────────┘
//! ```

pub mod age;
pub mod archive_db;
pub mod archive_fs;
pub mod auditor;
pub mod closer;
pub mod config;
pub mod confirm;
pub mod db_state;
pub mod error;
pub mod finding;
pub mod fs_state;
pub mod model;
pub mod reconciler;
pub mod summary;
pub mod sweeper;

#[cfg(test)]
mod testing;

pub use age::{Age, PassClock};
pub use archive_db::{ArchiveDatabase, EventClosure, MysqlArchive, OpenEvent};
pub use archive_fs::EventTree;
pub use auditor::Auditor;
pub use self::config::{AuditSettings, Config, ConfigError};
pub use confirm::{ConfirmationPolicy, PromptOutcome, Prompter, RunMode, StdinPrompter};
pub use db_state::DatabaseSnapshot;
pub use error::AuditError;
pub use finding::{Action, Finding, Severity};
pub use fs_state::FilesystemSnapshot;
pub use model::{EventId, MonitorId};
pub use reconciler::Reconciler;
pub use summary::PassSummary;
