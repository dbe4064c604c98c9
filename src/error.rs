use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Result alias carrying [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// One failed decode strategy, kept for diagnostics on total load failure.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeAttempt {
    pub hint: String,
    pub reason: String,
}

impl fmt::Display for DecodeAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.hint, self.reason)
    }
}

/// Errors surfaced by the extraction engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("could not load {}: no reader succeeded [{}]", path.display(), join_attempts(attempts))]
    Load {
        path: PathBuf,
        attempts: Vec<DecodeAttempt>,
    },

    #[error("signal index {index} out of range for {} ({count} signals)", path.display())]
    Index {
        path: PathBuf,
        index: usize,
        count: usize,
    },

    #[error("{0}")]
    OutOfRange(String),

    #[error("{operation} requires {expected}, got shape {shape:?}")]
    Shape {
        operation: &'static str,
        expected: &'static str,
        shape: Vec<usize>,
    },

    #[error("axis '{axis}' has zero scale, calibration undefined")]
    Calibration { axis: String },

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("unsupported file: {0}")]
    UnsupportedFile(String),

    #[error("invalid user id: {0}")]
    InvalidUser(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn join_attempts(attempts: &[DecodeAttempt]) -> String {
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl EngineError {
    pub fn shape(operation: &'static str, expected: &'static str, shape: &[usize]) -> Self {
        Self::Shape {
            operation,
            expected,
            shape: shape.to_vec(),
        }
    }

    /// Stable snake_case name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Load { .. } => "load_error",
            EngineError::Index { .. } => "index_error",
            EngineError::OutOfRange(_) => "out_of_range",
            EngineError::Shape { .. } => "shape_error",
            EngineError::Calibration { .. } => "calibration_error",
            EngineError::NotFound(_) => "not_found",
            EngineError::UnsupportedFile(_) => "unsupported_file",
            EngineError::InvalidUser(_) => "invalid_user",
            EngineError::Io(_) => "io_error",
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

/// Structured failure handed to the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub kind: String,
    pub message: String,
}

impl From<&EngineError> for ErrorPayload {
    fn from(err: &EngineError) -> Self {
        err.to_payload()
    }
}
