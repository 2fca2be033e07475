use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrainError {
    #[error("queue still busy after {turns} turns ({pending} tasks pending)")]
    TurnLimit { turns: usize, pending: usize },
}
