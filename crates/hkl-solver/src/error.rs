//! Error types for the nonlinear solvers.

use thiserror::Error;

/// Errors that can occur while solving a nonlinear system.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// The initial guess, the bounds and the residual disagree on sizes.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Invalid solver configuration.
    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),

    /// The iteration budget was exhausted without reaching the tolerance.
    #[error("no convergence after {iterations} iterations (residual {residual:e})")]
    NonConvergence {
        /// Iterations spent, restarts included.
        iterations: u32,
        /// Best L1 residual reached before giving up.
        residual: f64,
    },
}

/// Result type for solver operations.
pub type Result<T> = std::result::Result<T, SolverError>;
