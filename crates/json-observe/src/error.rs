use json_observe_scheduler::DrainError;
use thiserror::Error;

/// Errors from the lookup and scripting surfaces. Writes into observed nodes
/// never fail.
#[derive(Debug, Error)]
pub enum ObserveError {
    #[error("invalid JSON pointer: {0:?}")]
    InvalidPointer(String),
    #[error("path not found: {0}")]
    PathNotFound(String),
    #[error("path does not point to a sequence: {0}")]
    NotSequence(String),
    #[error("path does not point to an observed node: {0}")]
    NotObserved(String),
    #[error("unknown sequence method: {0}")]
    UnknownMethod(String),
    #[error("invalid arguments for {method}: {reason}")]
    InvalidArgs { method: String, reason: String },
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("scheduler drain failed: {0}")]
    Drain(#[from] DrainError),
}
