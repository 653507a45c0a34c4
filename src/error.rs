//! Error types used by the connvisor runtime and the external connection contract.
//!
//! This module defines two main error types:
//!
//! - [`ContainerError`] — errors raised by container lifecycle operations.
//! - [`ConnectionError`] — errors surfaced by the external [`Connection`](crate::Connection)
//!   collaborator when opening or closing the underlying session.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//!
//! Reconnect exhaustion and stale heartbeats are deliberately **not** errors:
//! they are health states reported through [`StatusSnapshot`](crate::StatusSnapshot).

use thiserror::Error;

use crate::core::ContainerState;

/// # Errors surfaced by the external connection collaborator.
///
/// The protocol client behind a [`Connection`](crate::Connection) is opaque to
/// this crate; its failures are carried as a message plus an optional
/// protocol-level code.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ConnectionError {
    /// Human-readable failure description.
    pub message: String,
    /// Optional protocol-level error code.
    pub code: Option<String>,
}

impl ConnectionError {
    /// Creates a new error with the given message and no code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Attaches a protocol-level error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// # Errors produced by container lifecycle operations.
///
/// These represent failures of the supervision layer itself. Failures inside a
/// container's own control flow (reconnect attempts, event delivery) are
/// contained: recorded as `Error`-kind events and logged, never surfaced
/// through this type.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ContainerError {
    /// The connection could not be opened. Fatal to this start attempt;
    /// the container finalizes at `Stopped` and the caller decides whether
    /// to retry the cold start.
    #[error("connection start failed: {source}")]
    Start {
        #[source]
        source: ConnectionError,
    },

    /// The connection did not close cleanly. Best-effort: the container
    /// state still finalizes at `Stopped`; a stuck connection is reported,
    /// not hidden.
    #[error("connection stop failed: {source}")]
    Stop {
        #[source]
        source: ConnectionError,
    },

    /// A lifecycle precondition was violated (e.g. `start()` on a container
    /// that is already running).
    #[error("invalid lifecycle state: expected {expected}, container is {actual}")]
    InvalidState {
        /// States the operation accepts.
        expected: &'static str,
        /// State the container was actually in.
        actual: ContainerState,
    },

    /// The container's owning task is gone (torn down by the registry);
    /// no further commands can be served.
    #[error("container actor terminated")]
    Terminated,
}

impl ContainerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use connvisor::ContainerError;
    ///
    /// assert_eq!(ContainerError::Terminated.as_label(), "container_terminated");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ContainerError::Start { .. } => "container_start_failed",
            ContainerError::Stop { .. } => "container_stop_failed",
            ContainerError::InvalidState { .. } => "container_invalid_state",
            ContainerError::Terminated => "container_terminated",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ContainerError::Start { source } => format!("start failed: {source}"),
            ContainerError::Stop { source } => format!("stop failed: {source}"),
            ContainerError::InvalidState { expected, actual } => {
                format!("invalid state: expected {expected}, got {actual}")
            }
            ContainerError::Terminated => "actor terminated".to_string(),
        }
    }
}
