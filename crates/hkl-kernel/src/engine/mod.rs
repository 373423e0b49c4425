//! Pseudo-axis engines.
//!
//! An engine converts between the real axes of a geometry and a small set
//! of derived coordinates (hkl, q, psi...). `get` is a closed-form forward
//! computation; `set` solves the inverse problem for the current mode and
//! returns every solution found, closest to the current geometry first.

mod eulerians;
mod hkl;
mod list;
mod psi;
mod q;
mod readonly;

pub use list::EngineList;

use tracing::debug;

use hkl_math::Vec3;
use hkl_solver::{Bounds, NonlinearSolver, ResidualFn, SolveStats, SolverError};

use crate::error::{HklError, Result};
use crate::geometry::Geometry;
use crate::geometry_list::GeometryList;
use crate::kinematics::Kinematics;
use crate::mode::Mode;
use crate::parameter::Parameter;

/// The computation behind an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Miller indices h, k, l.
    Hkl,
    /// Norm of the scattering vector from a single detector axis.
    Q,
    /// Norm and azimuth of the scattering vector.
    Q2,
    /// Azimuth of a reference reflection about Q.
    Psi,
    /// Angle between the incident beam and the sample surface.
    Incidence,
    /// Angle between the scattered beam and the sample surface.
    Emergence,
    /// Eulerian angles of a kappa goniometer.
    Eulerians,
}

impl EngineKind {
    /// Default engine name.
    pub fn name(self) -> &'static str {
        match self {
            EngineKind::Hkl => "hkl",
            EngineKind::Q => "q",
            EngineKind::Q2 => "q2",
            EngineKind::Psi => "psi",
            EngineKind::Incidence => "incidence",
            EngineKind::Emergence => "emergence",
            EngineKind::Eulerians => "eulerians",
        }
    }

    /// Whether `set` is supported.
    pub fn is_writable(self) -> bool {
        !matches!(self, EngineKind::Incidence | EngineKind::Emergence)
    }

    fn pseudo_axes(self) -> Vec<Parameter> {
        match self {
            EngineKind::Hkl => vec![
                Parameter::scalar("h", 0.0, -1.0, 1.0),
                Parameter::scalar("k", 0.0, -1.0, 1.0),
                Parameter::scalar("l", 0.0, -1.0, 1.0),
            ],
            EngineKind::Q => vec![Parameter::scalar("q", 0.0, -1.0, 1.0)],
            EngineKind::Q2 => vec![
                Parameter::scalar("q", 0.0, 0.0, 1.0),
                Parameter::angle("alpha", 0.0),
            ],
            EngineKind::Psi => vec![Parameter::angle("psi", 0.0)],
            EngineKind::Incidence => vec![Parameter::angle("incidence", 0.0)],
            EngineKind::Emergence => vec![Parameter::angle("emergence", 0.0)],
            EngineKind::Eulerians => vec![
                Parameter::angle("omega", 0.0),
                Parameter::angle("chi", 0.0),
                Parameter::angle("phi", 0.0),
            ],
        }
    }
}

/// A pseudo-axis engine with its modes.
#[derive(Debug, Clone, PartialEq)]
pub struct Engine {
    name: String,
    kind: EngineKind,
    pseudo_axes: Vec<Parameter>,
    modes: Vec<Mode>,
    current: usize,
    hkl0: Option<Vec3>,
    last_stats: SolveStats,
}

impl Engine {
    /// An engine of `kind` with no mode yet.
    pub fn new(kind: EngineKind) -> Self {
        Self {
            name: kind.name().to_string(),
            kind,
            pseudo_axes: kind.pseudo_axes(),
            modes: Vec::new(),
            current: 0,
            hkl0: None,
            last_stats: SolveStats::default(),
        }
    }

    /// Append a mode. The first mode added is the default one.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.modes.push(mode);
        self
    }

    /// Engine name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Engine kind.
    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Pseudo-axes with the values of the last `get` or `set`.
    pub fn pseudo_axes(&self) -> &[Parameter] {
        &self.pseudo_axes
    }

    /// Pseudo-axis names.
    pub fn pseudo_axis_names(&self) -> Vec<&str> {
        self.pseudo_axes.iter().map(Parameter::name).collect()
    }

    /// Available modes.
    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }

    /// The current mode.
    pub fn mode(&self) -> &Mode {
        &self.modes[self.current]
    }

    /// Select the mode called `name`.
    pub fn select_mode(&mut self, name: &str) -> Result<()> {
        self.current = self
            .modes
            .iter()
            .position(|m| m.name() == name)
            .ok_or_else(|| HklError::UnknownMode(format!("{name} (engine {})", self.name)))?;
        Ok(())
    }

    /// Set a parameter of the current mode.
    pub fn set_mode_parameter(&mut self, name: &str, value: f64) -> Result<()> {
        self.modes[self.current].set_parameter(name, value)
    }

    /// Counters of the last `set`.
    pub fn last_stats(&self) -> SolveStats {
        self.last_stats
    }

    /// Whether `set` is supported.
    pub fn is_writable(&self) -> bool {
        self.kind.is_writable()
    }

    /// False until [`EngineList::initialize`] ran for an engine or mode that
    /// needs it.
    pub fn is_initialized(&self) -> bool {
        match self.kind {
            EngineKind::Psi => self.hkl0.is_some(),
            _ => self.mode().is_initialized(),
        }
    }

    pub(crate) fn validate(&self, geometry: &Geometry) -> Result<()> {
        if self.modes.is_empty() {
            return Err(HklError::InvalidConfiguration(format!("engine {} has no mode", self.name)));
        }
        for mode in &self.modes {
            mode.validate(geometry)?;
            if self.kind.is_writable() && self.kind != EngineKind::Eulerians {
                let rows = self.rows(mode);
                let unknowns = mode.axes_write().len();
                if rows != unknowns {
                    return Err(HklError::InvalidConfiguration(format!(
                        "mode {} of engine {} has {rows} equations for {unknowns} axes",
                        mode.name(),
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn rows(&self, mode: &Mode) -> usize {
        match self.kind {
            EngineKind::Hkl => 3 + mode.constraints().len(),
            EngineKind::Psi => 4,
            _ => self.pseudo_axes.len(),
        }
    }

    /// Capture the reference state of the engine and of its current mode.
    pub(crate) fn initialize(&mut self, kin: &Kinematics) -> Result<()> {
        if self.kind == EngineKind::Psi {
            self.hkl0 = Some(psi::initialize(kin)?);
        }
        self.modes[self.current].initialize(kin)
    }

    /// Compute the pseudo-axis values of the geometry in `kin`.
    pub(crate) fn get(&mut self, kin: &Kinematics) -> Result<Vec<f64>> {
        let mode = &self.modes[self.current];
        let values = match self.kind {
            EngineKind::Hkl => {
                let hkl = kin.hkl()?;
                vec![hkl.x, hkl.y, hkl.z]
            }
            EngineKind::Q => vec![q::get_q(kin, mode)?],
            EngineKind::Q2 => q::get_q2(kin).to_vec(),
            EngineKind::Psi => vec![psi::get(kin, mode)?],
            EngineKind::Incidence => vec![readonly::incidence(kin, mode)?],
            EngineKind::Emergence => vec![readonly::emergence(kin, mode)?],
            EngineKind::Eulerians => eulerians::get(kin, mode)?.to_vec(),
        };
        for (p, &v) in self.pseudo_axes.iter_mut().zip(&values) {
            p.set_value(v)?;
        }
        Ok(values)
    }

    /// Solve for the axis values realizing `values` in the current mode.
    ///
    /// The geometry in `kin` is never modified; the solutions are returned
    /// sorted by distance to it.
    pub(crate) fn set(
        &mut self,
        values: &[f64],
        kin: &Kinematics,
        solver: &mut dyn NonlinearSolver,
    ) -> Result<GeometryList> {
        self.last_stats = SolveStats::default();
        if !self.kind.is_writable() {
            return Err(HklError::ReadOnly(self.name.clone()));
        }
        if values.len() != self.pseudo_axes.len() {
            return Err(HklError::InvalidParameter(format!(
                "engine {} expects {} values, got {}",
                self.name,
                self.pseudo_axes.len(),
                values.len()
            )));
        }
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(HklError::InvalidParameter(format!("{v} is not a finite value")));
        }
        if !self.is_initialized() {
            return Err(HklError::NotInitialized(format!(
                "{}/{}",
                self.name,
                self.mode().name()
            )));
        }
        for (p, &v) in self.pseudo_axes.iter_mut().zip(values) {
            p.set_value(v)?;
        }

        let mode = &self.modes[self.current];
        let mut stats = SolveStats::default();
        let result = match self.kind {
            EngineKind::Hkl => hkl::set(values, kin, mode, solver, &mut stats),
            EngineKind::Q => q::set_q(values[0], kin, mode, solver, &mut stats),
            EngineKind::Q2 => q::set_q2(values, kin, mode, solver, &mut stats),
            EngineKind::Psi => match self.hkl0 {
                Some(hkl0) => psi::set(values[0], &hkl0, kin, mode, solver, &mut stats),
                None => Err(HklError::NotInitialized(self.name.clone())),
            },
            EngineKind::Eulerians => eulerians::set(values, kin, mode),
            EngineKind::Incidence | EngineKind::Emergence => Err(HklError::ReadOnly(self.name.clone())),
        };
        self.last_stats = stats;
        let mut solutions = result?;

        solutions.multiply_from_range();
        solutions.remove_invalid();
        solutions.sort(kin.geometry);
        debug!(
            engine = %self.name,
            mode = %self.modes[self.current].name(),
            solutions = solutions.len(),
            iterations = stats.iterations,
            "set"
        );
        if solutions.is_empty() {
            return Err(HklError::Unreachable("no solution within the axes ranges".into()));
        }
        Ok(solutions)
    }
}

/// Solve `rows(x) = 0` over the axes at `indices`, starting from the
/// geometry of `kin`, and return the solved geometry with its write axes
/// normalized.
pub(crate) fn auto_solve<F>(
    kin: &Kinematics,
    indices: &[usize],
    size: usize,
    solver: &mut dyn NonlinearSolver,
    stats: &mut SolveStats,
    mut rows: F,
) -> Result<Geometry>
where
    F: FnMut(&Kinematics<'_>, &mut [f64]),
{
    let mut scratch = kin.geometry.clone();
    let axes = scratch.axes();
    let x0: Vec<f64> = indices.iter().map(|&i| axes[i].value()).collect();
    let bounds: Vec<Bounds> = indices.iter().map(|&i| axes[i].parameter().bounds()).collect();

    let outcome = {
        let mut problem = ResidualFn::new(size, |x: &[f64], f: &mut [f64]| {
            if scratch.set_values_at(indices, x).is_err() {
                f.fill(f64::NAN);
                return;
            }
            let k = Kinematics::new(&scratch, kin.detector, kin.sample);
            rows(&k, f);
        });
        solver.solve(&mut problem, &x0, &bounds)
    };

    let solution = match outcome {
        Ok(solution) => solution,
        Err(err) => {
            if let SolverError::NonConvergence { iterations, residual } = err {
                stats.iterations += iterations;
                stats.residual = residual;
            }
            return Err(err.into());
        }
    };
    stats.iterations += solution.stats.iterations;
    stats.restarts += solution.stats.restarts;
    stats.residual = solution.stats.residual;

    scratch.set_values_at(indices, &solution.x)?;
    scratch.normalize_axes(indices)?;
    Ok(scratch)
}
