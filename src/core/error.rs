//! Error taxonomy for the preflight pipeline

use crate::api::ApiError;
use crate::persistence::StoreError;
use thiserror::Error;

/// Errors surfaced by the validation pipeline and its collaborators
#[derive(Debug, Error)]
pub enum PreflightError {
    /// Credential exchange failed; fatal, never retried
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Connectivity or TLS failure talking to the remote system
    #[error(transparent)]
    Transport(#[from] ApiError),

    /// Remote call returned a non-success status with a server message
    #[error("{context}: {message}")]
    Remote { context: String, message: String },

    /// A discovered fact violates a migration precondition
    #[error("{0}")]
    Validation(String),

    /// An asynchronous task reported an error state
    #[error("task {task} failed: {detail}")]
    TaskFailed { task: String, detail: String },

    /// An asynchronous task did not reach a terminal state within the deadline
    #[error("task {task} could not complete within {secs}s")]
    TaskTimeout { task: String, secs: u64 },

    /// The shared fact document could not be read or written
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Driver annotation naming the pipeline step that raised the error
    #[error("step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<PreflightError>,
    },
}

impl PreflightError {
    /// Wrap an error with the name of the pipeline step it surfaced from
    pub fn at_step(self, step: &str) -> Self {
        match self {
            // Already annotated by an inner driver call; keep the innermost step
            PreflightError::Step { .. } => self,
            other => PreflightError::Step {
                step: step.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Build a remote-rejection error from a context and server message
    pub fn remote(context: impl Into<String>, message: impl Into<String>) -> Self {
        PreflightError::Remote {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Build a validation failure naming the offending entity
    pub fn validation(message: impl Into<String>) -> Self {
        PreflightError::Validation(message.into())
    }
}
