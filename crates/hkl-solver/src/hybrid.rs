//! Damped Gauss–Newton (Levenberg–Marquardt) root finder with random restarts.
//!
//! Each iteration takes one damped step from a forward-difference
//! Jacobian. A step that cannot make progress (NaN residual, singular
//! normal equations, damping blow-up) restarts the search from a random
//! point inside the bounds, as does every `restart_every`-th iteration.
//! The total iteration count is capped, so a solve always terminates.

use nalgebra::{DMatrix, DVector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Bounds, NonlinearSolver, Residual, Result, Solution, SolveStats, SolverError};

/// Configuration for [`HybridSolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Convergence threshold on the L1 norm of the residual.
    pub tolerance: f64,
    /// Iteration cap across all restarts.
    pub max_iterations: u32,
    /// Restart from a random point every this many iterations.
    pub restart_every: u32,
    /// Initial damping factor (lambda).
    pub damping: f64,
    /// Relative step for the forward-difference Jacobian.
    pub finite_difference_step: f64,
    /// Seed of the restart generator.
    pub seed: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 1000,
            restart_every: 100,
            damping: 1e-3,
            finite_difference_step: 1e-8,
            seed: 0,
        }
    }
}

impl SolverConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.tolerance.is_nan() || self.tolerance <= 0.0 {
            return Err(SolverError::InvalidConfig(
                "tolerance must be positive".into(),
            ));
        }
        if self.max_iterations == 0 || self.restart_every == 0 {
            return Err(SolverError::InvalidConfig(
                "max_iterations and restart_every must be non-zero".into(),
            ));
        }
        if self.damping.is_nan()
            || self.damping <= 0.0
            || self.finite_difference_step.is_nan()
            || self.finite_difference_step <= 0.0
        {
            return Err(SolverError::InvalidConfig(
                "damping and finite_difference_step must be positive".into(),
            ));
        }
        Ok(())
    }
}

const MAX_DAMPING: f64 = 1e12;
const MIN_DAMPING: f64 = 1e-12;

/// Default backend of [`NonlinearSolver`].
pub struct HybridSolver {
    config: SolverConfig,
    rng: ChaCha8Rng,
}

impl HybridSolver {
    /// Create a solver; the restart generator is seeded from the config.
    pub fn new(config: SolverConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self { config, rng }
    }

    /// Create a solver with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(SolverConfig::default())
    }

    /// The configuration in use.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn evaluate(problem: &mut dyn Residual, x: &DVector<f64>) -> DVector<f64> {
        let mut f = DVector::zeros(problem.size());
        problem.evaluate(x.as_slice(), f.as_mut_slice());
        f
    }

    fn jacobian(&self, problem: &mut dyn Residual, x: &DVector<f64>, f: &DVector<f64>) -> DMatrix<f64> {
        let n = x.len();
        let m = f.len();
        let mut jac = DMatrix::zeros(m, n);
        let mut xh = x.clone();
        for j in 0..n {
            let h = self.config.finite_difference_step * x[j].abs().max(1.0);
            xh[j] = x[j] + h;
            let fh = Self::evaluate(problem, &xh);
            xh[j] = x[j];
            jac.set_column(j, &((fh - f) / h));
        }
        jac
    }

    /// One damped step. Returns false when no progress can be made from `x`.
    fn step(
        &self,
        problem: &mut dyn Residual,
        x: &mut DVector<f64>,
        f: &mut DVector<f64>,
        lambda: &mut f64,
    ) -> bool {
        if f.iter().any(|v| !v.is_finite()) {
            return false;
        }
        let jac = self.jacobian(problem, x, f);
        if jac.iter().any(|v| !v.is_finite()) {
            return false;
        }
        let jt = jac.transpose();
        let jtj = &jt * &jac;
        let gradient = &jt * &*f;
        let scale = jtj.diagonal().map(|d| d.max(1e-9));
        let cost = f.norm_squared();

        while *lambda < MAX_DAMPING {
            let damped = &jtj + DMatrix::from_diagonal(&(&scale * *lambda));
            let Some(inverse) = damped.try_inverse() else {
                *lambda *= 10.0;
                continue;
            };
            let candidate = &*x - inverse * &gradient;
            let fc = Self::evaluate(problem, &candidate);
            if fc.iter().all(|v| v.is_finite()) && fc.norm_squared() < cost {
                *x = candidate;
                *f = fc;
                *lambda = (*lambda / 10.0).max(MIN_DAMPING);
                return true;
            }
            *lambda *= 10.0;
        }
        false
    }

    fn random_point(&mut self, bounds: &[Bounds]) -> DVector<f64> {
        DVector::from_iterator(
            bounds.len(),
            bounds.iter().map(|b| {
                if b.min.is_finite() && b.max.is_finite() && b.min < b.max {
                    self.rng.gen_range(b.min..=b.max)
                } else if b.min.is_finite() && b.min == b.max {
                    b.min
                } else {
                    self.rng
                        .gen_range(-std::f64::consts::PI..=std::f64::consts::PI)
                }
            }),
        )
    }
}

fn l1(f: &DVector<f64>) -> f64 {
    f.iter().map(|v| v.abs()).sum()
}

impl NonlinearSolver for HybridSolver {
    fn solve(
        &mut self,
        problem: &mut dyn Residual,
        x0: &[f64],
        bounds: &[Bounds],
    ) -> Result<Solution> {
        if x0.is_empty() || bounds.len() != x0.len() || problem.size() == 0 {
            return Err(SolverError::DimensionMismatch(format!(
                "{} unknowns, {} bounds, {} residuals",
                x0.len(),
                bounds.len(),
                problem.size()
            )));
        }

        let mut x = DVector::from_column_slice(x0);
        let mut f = Self::evaluate(problem, &x);
        let mut lambda = self.config.damping;
        let mut stats = SolveStats::default();
        let mut best = f64::INFINITY;

        loop {
            let residual = l1(&f);
            if residual.is_finite() {
                best = best.min(residual);
            }
            if residual < self.config.tolerance {
                stats.residual = residual;
                debug!(
                    iterations = stats.iterations,
                    restarts = stats.restarts,
                    residual,
                    "solver converged"
                );
                return Ok(Solution {
                    x: x.iter().copied().collect(),
                    stats,
                });
            }
            if stats.iterations >= self.config.max_iterations {
                debug!(iterations = stats.iterations, best, "solver gave up");
                return Err(SolverError::NonConvergence {
                    iterations: stats.iterations,
                    residual: best,
                });
            }

            stats.iterations += 1;
            let progressed = self.step(problem, &mut x, &mut f, &mut lambda);
            if progressed && l1(&f) < self.config.tolerance {
                continue;
            }
            if !progressed || stats.iterations % self.config.restart_every == 0 {
                x = self.random_point(bounds);
                f = Self::evaluate(problem, &x);
                lambda = self.config.damping;
                stats.restarts += 1;
                debug!(
                    iteration = stats.iterations,
                    progressed, "solver restarted from a random point"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResidualFn;
    use approx::assert_relative_eq;

    #[test]
    fn test_converged_start_needs_no_iteration() {
        let mut solver = HybridSolver::with_defaults();
        let mut p = ResidualFn::new(1, |x: &[f64], f: &mut [f64]| f[0] = x[0] - 2.0);
        let s = solver.solve(&mut p, &[2.0], &[Bounds::new(-5.0, 5.0)]).unwrap();
        assert_eq!(s.stats.iterations, 0);
        assert_eq!(s.stats.restarts, 0);
    }

    #[test]
    fn test_square_root() {
        let mut solver = HybridSolver::with_defaults();
        let mut p = ResidualFn::new(1, |x: &[f64], f: &mut [f64]| f[0] = x[0] * x[0] - 2.0);
        let s = solver.solve(&mut p, &[1.0], &[Bounds::new(0.0, 3.0)]).unwrap();
        assert_relative_eq!(s.x[0], 2f64.sqrt(), epsilon = 1e-6);
        assert!(s.stats.residual < 1e-6);
    }

    #[test]
    fn test_overdetermined_system() {
        // three rows, two unknowns, consistent at (1, -2)
        let mut solver = HybridSolver::with_defaults();
        let mut p = ResidualFn::new(3, |x: &[f64], f: &mut [f64]| {
            f[0] = x[0] - 1.0;
            f[1] = x[1] + 2.0;
            f[2] = x[0] * x[1] + 2.0;
        });
        let s = solver
            .solve(&mut p, &[0.0, 0.0], &[Bounds::new(-3.0, 3.0); 2])
            .unwrap();
        assert_relative_eq!(s.x[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(s.x[1], -2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_trigonometric_system() {
        let mut solver = HybridSolver::with_defaults();
        let mut p = ResidualFn::new(2, |x: &[f64], f: &mut [f64]| {
            f[0] = x[0].sin() + x[1].cos() - 1.0;
            f[1] = x[0] - 2.0 * x[1];
        });
        let s = solver
            .solve(&mut p, &[0.1, 0.1], &[Bounds::new(-3.2, 3.2); 2])
            .unwrap();
        let mut f = [0.0; 2];
        p.evaluate(&s.x, &mut f);
        assert!(f[0].abs() + f[1].abs() < 1e-6);
    }

    #[test]
    fn test_nan_triggers_restart() {
        // undefined for x < 0, the start point is in the undefined region
        let mut solver = HybridSolver::with_defaults();
        let mut p = ResidualFn::new(1, |x: &[f64], f: &mut [f64]| f[0] = x[0].sqrt() - 1.5);
        let s = solver.solve(&mut p, &[-4.0], &[Bounds::new(0.0, 5.0)]).unwrap();
        assert!(s.stats.restarts >= 1);
        assert_relative_eq!(s.x[0], 2.25, epsilon = 1e-5);
    }

    #[test]
    fn test_rootless_system_hits_the_cap() {
        let config = SolverConfig {
            max_iterations: 250,
            ..Default::default()
        };
        let mut solver = HybridSolver::new(config);
        let mut p = ResidualFn::new(1, |x: &[f64], f: &mut [f64]| f[0] = x[0] * x[0] + 1.0);
        let err = solver.solve(&mut p, &[0.5], &[Bounds::new(-2.0, 2.0)]).unwrap_err();
        match err {
            SolverError::NonConvergence { iterations, residual } => {
                assert_eq!(iterations, 250);
                assert!(residual >= 1.0 - 1e-9);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_same_seed_same_answer() {
        let run = || {
            let mut solver = HybridSolver::with_defaults();
            let mut p = ResidualFn::new(1, |x: &[f64], f: &mut [f64]| {
                f[0] = if x[0] < 0.0 { f64::NAN } else { x[0].sin() - 0.5 }
            });
            solver.solve(&mut p, &[-1.0], &[Bounds::new(-3.0, 3.0)]).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut solver = HybridSolver::with_defaults();
        let mut p = ResidualFn::new(1, |_: &[f64], f: &mut [f64]| f[0] = 0.0);
        assert!(matches!(
            solver.solve(&mut p, &[0.0, 1.0], &[Bounds::new(0.0, 1.0)]),
            Err(SolverError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_config_validation() {
        assert!(SolverConfig::default().validate().is_ok());
        let bad = SolverConfig {
            restart_every: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
