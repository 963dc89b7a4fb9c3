use thiserror::Error;

/// Failure taxonomy for the control surface and the periodic tasks.
///
/// Control-surface operations hand these back to the caller; the tick tasks
/// catch them at the tick boundary, log, and resume on the next cadence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no active scenario")]
    NotActive,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<crate::storage::StorageError> for ControlError {
    fn from(err: crate::storage::StorageError) -> Self {
        ControlError::Storage(err.to_string())
    }
}
