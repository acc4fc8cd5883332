use std::path::PathBuf;
use thiserror::Error;

/// Errors that end an audit pass (or the whole run)
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Cannot read {}: {source}", path.display())]
    Environment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to read operator response: {0}")]
    Prompt(#[source] std::io::Error),

    #[error("Audit stopped by operator")]
    Quit,
}

impl AuditError {
    pub(crate) fn environment(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AuditError::Environment {
            path: path.into(),
            source,
        }
    }

    /// Whether the operator asked to stop rather than something going wrong
    pub fn is_quit(&self) -> bool {
        matches!(self, AuditError::Quit)
    }
}

pub type Result<T, E = AuditError> = std::result::Result<T, E>;
