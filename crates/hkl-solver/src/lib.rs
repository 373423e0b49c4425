#![warn(missing_docs)]

//! Nonlinear root finding for diffractometer modes.
//!
//! The kinematics core only needs one thing from a numerical backend:
//! given a residual function `F: ℝⁿ → ℝᵏ`, an initial guess and the
//! allowed range of every unknown, return a point where `Σ|Fᵢ| < ε`
//! or report failure. [`NonlinearSolver`] is that interface;
//! [`HybridSolver`] is the default backend, a damped Gauss–Newton
//! iteration with random restarts and a hard iteration cap.
//!
//! # Example
//!
//! ```
//! use hkl_solver::{Bounds, HybridSolver, NonlinearSolver, ResidualFn, SolverConfig};
//!
//! let mut solver = HybridSolver::new(SolverConfig::default());
//! let mut circle = ResidualFn::new(2, |x: &[f64], f: &mut [f64]| {
//!     f[0] = x[0] * x[0] + x[1] * x[1] - 1.0;
//!     f[1] = x[0] - x[1];
//! });
//! let bounds = [Bounds::new(-2.0, 2.0); 2];
//! let solution = solver.solve(&mut circle, &[1.0, 0.5], &bounds).unwrap();
//! assert!((solution.x[0] - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
//! ```

pub mod error;
mod hybrid;

pub use error::{Result, SolverError};
pub use hybrid::{HybridSolver, SolverConfig};

use serde::{Deserialize, Serialize};

/// A residual function `F: ℝⁿ → ℝᵏ`.
pub trait Residual {
    /// Number of residual rows `k`.
    fn size(&self) -> usize;

    /// Evaluate `F(x)` into `f` (`f.len() == self.size()`).
    fn evaluate(&mut self, x: &[f64], f: &mut [f64]);
}

/// Adapter turning a closure into a [`Residual`].
pub struct ResidualFn<F> {
    size: usize,
    f: F,
}

impl<F> ResidualFn<F>
where
    F: FnMut(&[f64], &mut [f64]),
{
    /// Wrap a closure producing `size` residual rows.
    pub fn new(size: usize, f: F) -> Self {
        Self { size, f }
    }
}

impl<F> Residual for ResidualFn<F>
where
    F: FnMut(&[f64], &mut [f64]),
{
    fn size(&self) -> usize {
        self.size
    }

    fn evaluate(&mut self, x: &[f64], f: &mut [f64]) {
        (self.f)(x, f)
    }
}

/// Closed interval an unknown is allowed to be drawn from on restart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl Bounds {
    /// Create new bounds.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `value` lies inside the interval.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Counters describing how a solve went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SolveStats {
    /// Iterations performed, across all restarts.
    pub iterations: u32,
    /// Number of restarts from a random point.
    pub restarts: u32,
    /// Final L1 norm of the residual vector.
    pub residual: f64,
}

/// A converged point.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// The unknowns at convergence.
    pub x: Vec<f64>,
    /// How the solve went.
    pub stats: SolveStats,
}

/// Anything able to find a root of a [`Residual`] inside bounds.
pub trait NonlinearSolver {
    /// Find `x` with `Σ|F(x)ᵢ|` below the solver tolerance, starting at `x0`.
    fn solve(
        &mut self,
        problem: &mut dyn Residual,
        x0: &[f64],
        bounds: &[Bounds],
    ) -> Result<Solution>;
}
