// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for Alter Ego.

use std::time::Duration;

use thiserror::Error;

/// Classification of a failed generation request.
///
/// Every variant describes a failure scoped to a single query. None of them
/// leave persona state modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// The request did not complete within its deadline.
    Timeout,
    /// Network failure before a response was received.
    Transport,
    /// The remote endpoint answered with a non-2xx status.
    Status(u16),
    /// The response body could not be interpreted.
    MalformedResponse,
    /// A backend subprocess exited unsuccessfully. `None` when killed by a signal.
    ProcessExit(Option<i32>),
    /// A backend subprocess wrote to its error stream.
    ProcessStderr,
    /// Dispatch was attempted before the backend reached `Ready`.
    NotReady,
    /// The backend was disabled at initialization (missing credentials, etc.).
    Disabled,
}

impl std::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Transport => write!(f, "transport"),
            Self::Status(code) => write!(f, "status {code}"),
            Self::MalformedResponse => write!(f, "malformed response"),
            Self::ProcessExit(Some(code)) => write!(f, "process exit {code}"),
            Self::ProcessExit(None) => write!(f, "process killed"),
            Self::ProcessStderr => write!(f, "process stderr"),
            Self::NotReady => write!(f, "not ready"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// The primary error type used across all Alter Ego crates.
#[derive(Debug, Error)]
pub enum AlterEgoError {
    /// Configuration errors (invalid TOML, missing credentials, out-of-range values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistent storage errors (database connection, query failure, file I/O).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The embedding model failed to load or to embed an input.
    #[error("embedding error: {message}")]
    Embedding { message: String },

    /// A text-generation backend failed to serve a single query.
    #[error("backend error ({kind}): {message}")]
    Backend {
        kind: BackendErrorKind,
        message: String,
    },

    /// A managed backend process failed to become ready.
    #[error("backend startup failed: {message}")]
    Startup { message: String },

    /// The persona instructions plus the bare query exceed the prompt budget.
    #[error("context too large: {required} exceeds budget of {budget}")]
    ContextTooLarge { required: usize, budget: usize },

    /// Caller supplied an unusable value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AlterEgoError {
    /// Shorthand for a backend error.
    pub fn backend(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self::Backend {
            kind,
            message: message.into(),
        }
    }

    /// Wraps any error as a storage failure.
    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage {
            source: Box::new(source),
        }
    }

    /// Whether retrying the same request might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Backend { kind, .. } => matches!(
                kind,
                BackendErrorKind::Timeout
                    | BackendErrorKind::Transport
                    | BackendErrorKind::Status(429 | 500 | 502 | 503)
            ),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}
