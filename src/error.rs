//! Error types for the testsnap library.
//!
//! The split mirrors how far a failure reaches:
//!
//! * [`ValidationError`]: the selected file was rejected before
//!   any request was made. The task cycle is untouched.
//!
//! * [`TransportError`]: a single request failed (server unreachable,
//!   non-2xx status, body that is not the expected JSON). Whether it ends the
//!   cycle depends on where it happened: a failed upload or process-start is
//!   fatal, a failed progress tick is only logged.
//!
//! * [`TaskError`]: everything that can end a task cycle. Stored in the
//!   orchestrator's state and surfaced as the single user-visible message.
//!
//! * [`LoadError`] / [`RenderError`]: the Markdown preview pane. These never
//!   escalate to a cycle-level error.
//!
//! * [`ConfigError`]: a builder setting or a model selection was rejected
//!   before any client was built.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The selected file cannot be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    /// MIME type is neither a PDF nor an image.
    #[error("Unsupported file type '{mime_type}': please select a PDF or image file")]
    UnsupportedType { mime_type: String },

    /// File exceeds the upload size limit.
    #[error("File is {size} bytes; please select a file smaller than {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
}

/// A single request to the conversion service failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TransportError {
    /// Connection refused, DNS failure, request timeout.
    #[error("Server unreachable: {detail}")]
    Unreachable { detail: String },

    /// The server answered with a non-2xx status.
    ///
    /// `message` carries the `message`/`error` field of the body when the
    /// server sent one.
    #[error("Server returned HTTP {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    HttpStatus {
        status: u16,
        message: Option<String>,
    },

    /// 2xx status but the body could not be decoded.
    #[error("Server returned an unexpected response: {detail}")]
    Malformed { detail: String },

    /// The local upload source could not be read.
    #[error("Could not read upload source: {detail}")]
    Source { detail: String },
}

/// Errors that end (or never start) a task cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TaskError {
    /// Rejected locally; no request was made and the state did not change.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Upload / process-start request failed, or a progress tick returned a
    /// body the orchestrator could not act on.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered `success: false` (or `status: failed`).
    #[error("{message}")]
    ServerReported { message: String },

    /// Processing did not reach a terminal status within the budget.
    #[error("Processing timed out after {secs}s")]
    Timeout { secs: u64 },

    /// A newer cycle (or a reset) started while this operation was in flight;
    /// its outcome was discarded.
    #[error("Operation superseded by a newer task cycle")]
    Superseded,
}

impl TaskError {
    /// `true` when this error forces the orchestrator into the `error` state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskError::Validation(_) | TaskError::Superseded)
    }

    pub(crate) fn server(message: Option<&str>, fallback: &str) -> Self {
        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(fallback);
        TaskError::ServerReported {
            message: message.to_string(),
        }
    }
}

/// Loading a Markdown document into the preview failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Empty or whitespace-only path; nothing was requested.
    #[error("Please enter a file path")]
    BlankPath,

    /// The server answered `success: false`.
    #[error("Load failed: {message}")]
    ServerReported { message: String },

    /// The server could not be reached at all.
    #[error("Cannot connect to server: make sure the backend is running ({detail})")]
    Unreachable { detail: String },

    /// The server answered with an error status.
    #[error("Server returned HTTP {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    HttpStatus {
        status: u16,
        message: Option<String>,
    },

    /// The server answered but not with the expected JSON document.
    #[error("Server returned an unexpected response (is it serving an HTML error page?): {detail}")]
    MalformedResponse { detail: String },

    /// A later load was started before this one finished; its result was
    /// discarded.
    #[error("Load superseded by a newer request")]
    Superseded,
}

impl From<TransportError> for LoadError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Unreachable { detail } | TransportError::Source { detail } => {
                LoadError::Unreachable { detail }
            }
            TransportError::HttpStatus { status, message } => LoadError::HttpStatus { status, message },
            TransportError::Malformed { detail } => LoadError::MalformedResponse { detail },
        }
    }
}

/// Invalid client configuration or model selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A builder setting failed validation.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// A model name that is not in the catalog.
    #[error("Unknown {kind} model '{name}' (known: {known})")]
    UnknownModel {
        kind: &'static str,
        name: String,
        known: String,
    },

    /// The catalog has no entry of this kind to default to.
    #[error("No {kind} models are configured")]
    EmptyCatalog { kind: &'static str },
}

/// Math typesetting failed. Only ever logged; the untypeset HTML is kept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("Math typesetting failed: {0}")]
    Typeset(String),
}
