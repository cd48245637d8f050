use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the fitting pipeline and its collaborators.
///
/// File-level variants (`MissingColumn`, `Parse`) are absorbed when the file
/// set is built; fit-level variants are absorbed at the site boundary.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("No samples remain after cleaning ({context}).")]
    EmptyResult { context: String },

    #[error("Column `{column}` not found in {file}.")]
    MissingColumn { file: String, column: String },

    #[error("Fit did not converge after {iterations} iterations: {reason}")]
    FitDiverged { iterations: usize, reason: String },

    #[error("Insufficient data: need {needed} samples, have {available}.")]
    InsufficientData { needed: usize, available: usize },

    #[error("Sample arrays differ in length: x={x_len}, y={y_len}.")]
    LengthMismatch { x_len: usize, y_len: usize },

    #[error("Non-finite value in fit input at index {index}.")]
    NonFiniteInput { index: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cannot derive a housing from file name '{0}'.")]
    UnknownHousing(String),

    #[error("No current column matching `Icoil<N>` in {0}.")]
    NoCurrentColumn(String),

    #[error("Failed to parse {file} (line {line}): {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid parameter JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Plot rendering failed: {0}")]
    Plot(String),
}

impl FlowError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code used when this error reaches the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            FlowError::EmptyResult { .. }
            | FlowError::InsufficientData { .. }
            | FlowError::MissingColumn { .. }
            | FlowError::NoCurrentColumn(_) => 3,
            FlowError::FitDiverged { .. }
            | FlowError::NonFiniteInput { .. }
            | FlowError::LengthMismatch { .. } => 4,
            _ => 2,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<FlowError> for AppError {
    fn from(err: FlowError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
