//! Error types for the Bloomloop engine.
//!
//! All fallibility lives at the I/O boundary: oracle calls, persistence,
//! registry lookups, and configuration loading. Level computation and the
//! retry/advance decision are total functions and never appear here.

use std::path::PathBuf;

use uuid::Uuid;

/// A specialized `Result` type for Bloomloop engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while serving a learning session.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your bloomloop.json with a JSON linter")]
    ConfigParse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// No session exists for the given identifier.
    #[error("Unknown session '{id}'\n\nSuggestion: Create a session first with POST /api/session")]
    SessionNotFound {
        /// The identifier that was looked up.
        id: Uuid,
    },

    /// A chunk or answer was requested after the last chunk was completed.
    #[error("Session is already complete: all {total_chunks} chunks have been answered")]
    SessionComplete {
        /// Number of chunks in the completed session.
        total_chunks: usize,
    },

    /// An answer arrived before a question was generated for the step.
    #[error("No question is pending for step {step}\n\nSuggestion: Request the chunk before submitting an answer")]
    NoPendingQuestion {
        /// The step the answer was submitted for.
        step: usize,
    },

    // ========================================================================
    // Oracle Errors
    // ========================================================================
    /// The oracle returned a payload that failed shape validation.
    ///
    /// Recovered locally by regeneration; surfaces only through
    /// `GenerationExhausted` once the retry budget is spent.
    #[error("Oracle returned a malformed payload: {detail}")]
    MalformedPayload {
        /// What the validation gate rejected.
        detail: String,
    },

    /// Every generation attempt produced a malformed payload.
    ///
    /// Fatal to the current request, not to the session: progress is
    /// unchanged and the request may be retried.
    #[error("Question generation failed after {attempts} attempts\n\nSuggestion: Retry the request; if this persists, check the oracle model configuration")]
    GenerationExhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// The oracle could not be reached or answered with a transport error.
    #[error("Oracle unavailable: {message}\n\nSuggestion: Check network connectivity and the oracle base URL")]
    OracleUnavailable {
        /// Description of the transport failure.
        message: String,
    },

    // ========================================================================
    // Grading Errors
    // ========================================================================
    /// A multiple-choice answer was not one of the four choice letters.
    #[error("Invalid choice '{answer}': expected one of A, B, C, D")]
    InvalidChoice {
        /// The submitted answer.
        answer: String,
    },

    // ========================================================================
    // Persistence Errors
    // ========================================================================
    /// A log flush was requested but no persistence sink is attached.
    #[error("No persistence sink is configured\n\nSuggestion: Attach a log sink before exporting session logs")]
    SinkNotConfigured,

    /// The persistence sink rejected an upsert.
    #[error("Persistence sink error: {message}")]
    SinkFailure {
        /// Description of the sink failure.
        message: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Creates a new `ConfigParse` error.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidation` error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `MalformedPayload` error.
    #[must_use]
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedPayload {
            detail: detail.into(),
        }
    }

    /// Creates a new `OracleUnavailable` error.
    #[must_use]
    pub fn oracle_unavailable(message: impl Into<String>) -> Self {
        Self::OracleUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidChoice` error.
    #[must_use]
    pub fn invalid_choice(answer: impl Into<String>) -> Self {
        Self::InvalidChoice {
            answer: answer.into(),
        }
    }

    /// Creates a new `SinkFailure` error.
    #[must_use]
    pub fn sink_failure(message: impl Into<String>) -> Self {
        Self::SinkFailure {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is transient and the request may be
    /// retried without any state change.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::MalformedPayload { .. }
                | Self::GenerationExhausted { .. }
                | Self::OracleUnavailable { .. }
                | Self::SinkFailure { .. }
        )
    }

    /// Returns `true` if this error is fatal at construction time.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse { .. } | Self::ConfigValidation { .. }
        )
    }
}
