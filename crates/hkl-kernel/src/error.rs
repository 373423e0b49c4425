//! Error types for the kinematics core.

use hkl_math::MathError;
use hkl_solver::SolverError;
use thiserror::Error;

/// Errors that can occur while building or driving a diffractometer.
///
/// Every failure is recoverable: configuration errors are reported by
/// constructors, the others by `get`/`set` without touching the caller's
/// geometry.
#[derive(Error, Debug)]
pub enum HklError {
    /// Malformed geometry, mode or engine definition.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Physically impossible lattice parameters.
    #[error("invalid lattice: {0}")]
    InvalidLattice(String),

    /// A parameter value or range was rejected.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No axis with this name in the geometry.
    #[error("unknown axis: {0}")]
    UnknownAxis(String),

    /// No engine with this name in the list.
    #[error("unknown engine: {0}")]
    UnknownEngine(String),

    /// No mode with this name in the engine.
    #[error("unknown mode: {0}")]
    UnknownMode(String),

    /// No diffractometer with this name in the registry.
    #[error("unknown diffractometer: {0}")]
    UnknownDiffractometer(String),

    /// The requested pseudo-axis values cannot be realized.
    #[error("{0}")]
    Unreachable(String),

    /// The root finder exhausted its iteration budget.
    #[error("unreachable: no solution found after {iterations} iterations")]
    NonConvergence {
        /// Iterations spent, restarts included.
        iterations: u32,
    },

    /// A matrix or a pair of vectors is degenerate.
    #[error("singular configuration: {0}")]
    Singular(String),

    /// An initializable engine or mode was used before being initialized.
    #[error("{0} must be initialized first")]
    NotInitialized(String),

    /// The engine only computes values, it cannot move axes.
    #[error("engine {0} is read-only")]
    ReadOnly(String),

    /// Session configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Solver misuse (dimensions, configuration).
    #[error(transparent)]
    Solver(SolverError),

    /// Geometric primitive failure.
    #[error(transparent)]
    Math(#[from] MathError),
}

impl From<SolverError> for HklError {
    fn from(err: SolverError) -> Self {
        match err {
            SolverError::NonConvergence { iterations, .. } => HklError::NonConvergence { iterations },
            other => HklError::Solver(other),
        }
    }
}

/// Result type for kinematics operations.
pub type Result<T> = std::result::Result<T, HklError>;
