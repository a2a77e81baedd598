//! High-level error types

use std::time::Duration;

use neptun_core::Command;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] neptun_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] neptun_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] neptun_types::Error),

    #[error("Unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse { expected: Command, actual: Command },

    #[error("Command failed after {attempts} attempts: {last}")]
    Exhausted { attempts: usize, last: Box<Error> },

    #[error("Command did not complete within {0:?}")]
    DeadlineElapsed(Duration),

    #[error("Valve is still moving, retry in {remaining:?}")]
    OperationInProgress { remaining: Duration },
}

impl Error {
    /// Whether resending the same command could succeed
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Core(e) => e.is_transient(),
            Self::Transport(neptun_transport::Error::Frame(e)) => e.is_transient(),
            Self::Transport(neptun_transport::Error::ReconnectSpent) => false,
            Self::Transport(_) => true,
            Self::UnexpectedResponse { .. } => true,
            Self::Types(_)
            | Self::Exhausted { .. }
            | Self::DeadlineElapsed(_)
            | Self::OperationInProgress { .. } => false,
        }
    }
}
