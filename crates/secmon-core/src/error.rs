use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("record decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("timestamp parse error: {0}")]
    Timestamp(String),
    #[error("status probe failed for {field}: {reason}")]
    StatusProbe { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, MonitorError>;
