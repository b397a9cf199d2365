use drivescope_scanner::ApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Unauthorized: {user} is not on the allow-list")]
    Unauthorized { user: String },

    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Drive API error: {0}")]
    Api(#[from] ApiError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Checkpoint belongs to drive {found}, not {expected}")]
    CheckpointMismatch { expected: String, found: String },

    #[error("Drive {live} has a walk in progress; finish it before walking {requested}")]
    CheckpointBusy { live: String, requested: String },

    #[error("Checkpoint is unreadable: {reason}")]
    CorruptCheckpoint {
        drive_id: Option<String>,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, AuditError>;
