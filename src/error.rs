//! Error types.
//!
//! - `FitError` is returned by every library operation (cost evaluation, profiling,
//!   fitting). Variants follow the cost-function error taxonomy.
//! - `AppError` is what the `fitprof` binary reports: a message plus a process exit code.

use thiserror::Error;

/// Library error type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// Data, model, error array or matrix dimensions disagree.
    #[error("shape mismatch: '{what}' has shape {got}, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        got: String,
    },

    /// A required (inverse) covariance matrix is singular or missing.
    #[error("singular matrix: {0}")]
    SingularMatrix(String),

    /// A pointwise error array contains an exact zero.
    #[error("'err' must not contain any zero values")]
    ZeroError,

    /// Unrecognized configuration string.
    #[error("unknown value '{value}' for '{option}': must be one of ({expected})")]
    InvalidOption {
        option: &'static str,
        value: String,
        expected: &'static str,
    },

    /// Unsupported error configuration (e.g. only fully correlated errors for a
    /// nuisance chi-square).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A cost function was evaluated without one of the inputs it requires.
    #[error("missing cost function input '{0}'")]
    MissingInput(&'static str),

    /// A function signature failed validation.
    #[error("invalid function signature: {0}")]
    InvalidSignature(String),

    /// Degrees of freedom must be a positive integer.
    #[error("number of degrees of freedom must be positive, got {0}")]
    InvalidNdf(usize),

    /// A parameter name is not known to the fit.
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    /// Invalid profiler / fitter / sample configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Numerical failure inside a fitter.
    #[error("computation error: {0}")]
    Computation(String),
}

impl FitError {
    pub(crate) fn shape(what: &'static str, expected: impl std::fmt::Debug, got: impl std::fmt::Debug) -> Self {
        FitError::ShapeMismatch {
            what,
            expected: format!("{expected:?}"),
            got: format!("{got:?}"),
        }
    }
}

/// Binary-level error: a human-readable message plus an exit code.
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

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let exit_code = match &err {
            FitError::InvalidOption { .. }
            | FitError::InvalidConfig(_)
            | FitError::InvalidSignature(_)
            | FitError::InvalidNdf(_)
            | FitError::UnknownParameter(_) => 2,
            FitError::ShapeMismatch { .. }
            | FitError::ZeroError
            | FitError::MissingInput(_)
            | FitError::Configuration(_) => 3,
            FitError::SingularMatrix(_) | FitError::Computation(_) => 4,
        };
        AppError::new(exit_code, err.to_string())
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
