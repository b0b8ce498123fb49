//! Error type shared by every stage of the pipeline.

use std::io;

use crate::parameter::SolverType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while parsing data, building problems, validating
/// configuration, training or loading models.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing required option `solver`")]
    MissingSolver,

    #[error("unknown option(s): {}", .0.join(", "))]
    UnknownOptions(Vec<String>),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("feature indices must be positive, got {0}")]
    InvalidIndex(i64),

    #[error("feature index {index} exceeds the maximum feature index {max}")]
    IndexOutOfRange { index: u32, max: u32 },

    #[error("samples and labels were of different length ({labels}, {samples})")]
    Shape { labels: usize, samples: usize },

    #[error("sample {index} out of range for a problem with {len} samples")]
    SampleOutOfRange { index: usize, len: usize },

    #[error("problem contains no samples")]
    EmptyProblem,

    #[error("problem has been destroyed")]
    UseAfterRelease,

    #[error("problem was already destroyed")]
    DoubleRelease,

    #[error("solver {0} is not supported by this trainer")]
    UnsupportedSolver(SolverType),

    #[error("probability estimates are only available for logistic regression, not {0}")]
    NotProbabilistic(SolverType),

    #[error("invalid model: {0}")]
    ModelFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether the error was caused by the training configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingSolver | Self::UnknownOptions(_) | Self::InvalidOption(_)
        )
    }

    pub(crate) fn format(line: usize, message: impl Into<String>) -> Self {
        Self::Format {
            line,
            message: message.into(),
        }
    }
}
