use thiserror::Error;

/// Engine-level error taxonomy. Commands wrap these in `anyhow` for display;
/// the variants matter to callers deciding whether a mutation happened
/// (gate/lookup/argument failures never mutate anything).
#[derive(Debug, Error)]
pub enum LockerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("analysis provider failure: {0}")]
    ProviderFailure(String),
    #[error("storage failure: {0}")]
    StorageIo(String),
}

impl From<std::io::Error> for LockerError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageIo(err.to_string())
    }
}

impl From<serde_json::Error> for LockerError {
    fn from(err: serde_json::Error) -> Self {
        Self::StorageIo(err.to_string())
    }
}
