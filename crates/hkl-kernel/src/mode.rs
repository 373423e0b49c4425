//! Modes: which axes an engine may move and which extra equations fix the
//! remaining degrees of freedom.

use std::f64::consts::PI;

use hkl_math::{vector, Vec3};

use crate::axis::Axis;
use crate::error::{HklError, Result};
use crate::geometry::Geometry;
use crate::kappa::{kappa_to_eulerian, KappaSolution, KAPPA_ALPHA};
use crate::kinematics::Kinematics;
use crate::parameter::{value_of, Parameter};

/// One of the three eulerian angles of a kappa goniometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EulerianAngle {
    /// Eulerian omega.
    Omega,
    /// Eulerian chi.
    Chi,
    /// Eulerian phi.
    Phi,
}

impl EulerianAngle {
    /// Name of the mode parameter holding the fixed value.
    pub fn name(self) -> &'static str {
        match self {
            EulerianAngle::Omega => "omega",
            EulerianAngle::Chi => "chi",
            EulerianAngle::Phi => "phi",
        }
    }
}

/// An extra equation of a mode. Each constraint adds one residual row
/// after the three `R·UB·hkl = kf − ki` rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// `doubled = 2·half` (modulo π on `half`).
    Bissector {
        /// Sample axis.
        half: String,
        /// Detector axis.
        doubled: String,
    },
    /// Two axes move together.
    Equal {
        /// First axis.
        a: String,
        /// Second axis.
        b: String,
    },
    /// An axis stays at zero.
    Zero {
        /// The axis.
        axis: String,
    },
    /// Bissector on the eulerian omega computed from the kappa axes.
    KappaBissector {
        /// Kappa omega axis.
        komega: String,
        /// Kappa axis.
        kappa: String,
        /// Detector axis.
        tth: String,
    },
    /// An eulerian angle computed from the kappa axes equals a parameter.
    KappaEulerian {
        /// Which angle is held.
        angle: EulerianAngle,
        /// Kappa omega axis.
        komega: String,
        /// Kappa axis.
        kappa: String,
        /// Kappa phi axis.
        kphi: String,
    },
    /// A second reflection (h2, k2, l2) lies on the Ewald sphere too.
    DoubleDiffraction,
    /// The azimuth of (h2, k2, l2) about Q stays at `psi`.
    PsiConstant,
    /// The emergence angle on the surface (n_x, n_y, n_z) stays fixed.
    EmergenceFixed {
        /// Default surface normal in the sample frame.
        surface: Vec3,
    },
}

impl Constraint {
    fn parameters(&self) -> Vec<Parameter> {
        match self {
            Constraint::KappaEulerian { angle, .. } => vec![Parameter::angle(angle.name(), 0.0)],
            Constraint::DoubleDiffraction => reference_hkl("h2", "k2", "l2", [1.0, 1.0, 1.0]),
            Constraint::PsiConstant => {
                let mut p = reference_hkl("h2", "k2", "l2", [1.0, 1.0, 1.0]);
                p.push(Parameter::angle("psi", 0.0));
                p
            }
            Constraint::EmergenceFixed { surface } => {
                let mut p = surface_parameters(surface);
                p.push(Parameter::angle("emergence", 0.0));
                p
            }
            _ => Vec::new(),
        }
    }

    fn axes(&self) -> Vec<&str> {
        match self {
            Constraint::Bissector { half, doubled } => vec![half.as_str(), doubled.as_str()],
            Constraint::Equal { a, b } => vec![a.as_str(), b.as_str()],
            Constraint::Zero { axis } => vec![axis.as_str()],
            Constraint::KappaBissector { komega, kappa, tth } => {
                vec![komega.as_str(), kappa.as_str(), tth.as_str()]
            }
            Constraint::KappaEulerian { komega, kappa, kphi, .. } => {
                vec![komega.as_str(), kappa.as_str(), kphi.as_str()]
            }
            _ => Vec::new(),
        }
    }

    fn is_initializable(&self) -> bool {
        matches!(self, Constraint::PsiConstant | Constraint::EmergenceFixed { .. })
    }

    /// Residual row of this constraint at the geometry of `kin`.
    pub(crate) fn residual(&self, kin: &Kinematics, parameters: &[Parameter]) -> f64 {
        let value = |name: &str| axis_value(kin.geometry, name);
        let param = |name: &str| value_of(parameters, name).unwrap_or(f64::NAN);
        match self {
            Constraint::Bissector { half, doubled } => value(doubled) - 2.0 * (value(half) % PI),
            Constraint::Equal { a, b } => value(a) - value(b),
            Constraint::Zero { axis } => value(axis),
            Constraint::KappaBissector { komega, kappa, tth } => {
                let (omega, _, _) = kappa_to_eulerian(
                    value(komega),
                    value(kappa),
                    0.0,
                    KAPPA_ALPHA,
                    KappaSolution::One,
                );
                value(tth) - 2.0 * (omega % PI)
            }
            Constraint::KappaEulerian { angle, komega, kappa, kphi } => {
                let (omega, chi, phi) = kappa_to_eulerian(
                    value(komega),
                    value(kappa),
                    value(kphi),
                    KAPPA_ALPHA,
                    KappaSolution::One,
                );
                let current = match angle {
                    EulerianAngle::Omega => omega,
                    EulerianAngle::Chi => chi,
                    EulerianAngle::Phi => phi,
                };
                current - param(angle.name())
            }
            Constraint::DoubleDiffraction => {
                let hkl2 = Vec3::new(param("h2"), param("k2"), param("l2"));
                let ki = kin.ki();
                (kin.lab_hkl(&hkl2) + ki).norm() - ki.norm()
            }
            Constraint::PsiConstant => {
                let hkl2 = Vec3::new(param("h2"), param("k2"), param("l2"));
                param("psi") - kin.psi(&hkl2).unwrap_or(0.0)
            }
            Constraint::EmergenceFixed { .. } => {
                let n = Vec3::new(param("n_x"), param("n_y"), param("n_z"));
                param("emergence") - kin.emergence(&n)
            }
        }
    }
}

/// Value of axis `name`, NaN when missing (modes are validated against the
/// geometry before solving, so NaN only shows up on misuse).
fn axis_value(geometry: &Geometry, name: &str) -> f64 {
    geometry.axis(name).map(Axis::value).unwrap_or(f64::NAN)
}

/// `(h, k, l)`-like scalar parameters of a reference reflection.
pub(crate) fn reference_hkl(h: &str, k: &str, l: &str, values: [f64; 3]) -> Vec<Parameter> {
    vec![
        Parameter::scalar(h, values[0], -1.0, 1.0),
        Parameter::scalar(k, values[1], -1.0, 1.0),
        Parameter::scalar(l, values[2], -1.0, 1.0),
    ]
}

/// `n_x`, `n_y`, `n_z` parameters describing a surface normal.
pub(crate) fn surface_parameters(surface: &Vec3) -> Vec<Parameter> {
    vec![
        Parameter::scalar("n_x", surface.x, -1.0, 1.0),
        Parameter::scalar("n_y", surface.y, -1.0, 1.0),
        Parameter::scalar("n_z", surface.z, -1.0, 1.0),
    ]
}

/// A named way of driving an engine.
///
/// ```
/// use hkl_kernel::{Constraint, Mode};
///
/// let mode = Mode::new("bissector", &["omega", "chi", "phi", "tth"]).with_constraint(
///     Constraint::Bissector {
///         half: "omega".into(),
///         doubled: "tth".into(),
///     },
/// );
/// assert_eq!(mode.axes_write(), ["omega", "chi", "phi", "tth"]);
/// assert!(mode.is_initialized());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Mode {
    name: String,
    axes_read: Vec<String>,
    axes_write: Vec<String>,
    constraints: Vec<Constraint>,
    parameters: Vec<Parameter>,
    secondary_solutions: bool,
    initializable: bool,
    initialized: bool,
}

impl Mode {
    /// A mode moving `axes_write`. The read axes default to the same list.
    pub fn new(name: impl Into<String>, axes_write: &[&str]) -> Self {
        let axes: Vec<String> = axes_write.iter().map(|s| s.to_string()).collect();
        Self {
            name: name.into(),
            axes_read: axes.clone(),
            axes_write: axes,
            constraints: Vec::new(),
            parameters: Vec::new(),
            secondary_solutions: false,
            initializable: false,
            initialized: true,
        }
    }

    /// Axes the mode depends on without moving them.
    pub fn with_read_axes(mut self, axes_read: &[&str]) -> Self {
        self.axes_read = axes_read.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Add a constraint and the parameters it reads.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        if constraint.is_initializable() {
            self.initializable = true;
            self.initialized = false;
        }
        for p in constraint.parameters() {
            if value_of(&self.parameters, p.name()).is_none() {
                self.parameters.push(p);
            }
        }
        self.constraints.push(constraint);
        self
    }

    /// Add a free parameter.
    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Generate extra solutions by the Ewald construction.
    pub fn with_secondary_solutions(mut self) -> Self {
        self.secondary_solutions = true;
        self
    }

    /// The mode must be initialized from a geometry before use.
    pub fn initializable(mut self) -> Self {
        self.initializable = true;
        self.initialized = false;
        self
    }

    /// Mode name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Axes the mode reads.
    pub fn axes_read(&self) -> &[String] {
        &self.axes_read
    }

    /// Axes the mode moves.
    pub fn axes_write(&self) -> &[String] {
        &self.axes_write
    }

    /// Extra equations.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Mode parameters.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Value of parameter `name`.
    pub fn parameter(&self, name: &str) -> Result<f64> {
        value_of(&self.parameters, name)
            .ok_or_else(|| HklError::InvalidParameter(format!("mode {} has no parameter {name}", self.name)))
    }

    /// Set parameter `name`. Marks an initializable mode as initialized.
    pub fn set_parameter(&mut self, name: &str, value: f64) -> Result<()> {
        let mode = &self.name;
        let p = self
            .parameters
            .iter_mut()
            .find(|p| p.name() == name)
            .ok_or_else(|| HklError::InvalidParameter(format!("mode {mode} has no parameter {name}")))?;
        p.set_value(value)?;
        if self.initializable {
            self.initialized = true;
        }
        Ok(())
    }

    /// Whether the Ewald construction adds solutions.
    pub fn has_secondary_solutions(&self) -> bool {
        self.secondary_solutions
    }

    /// Whether the mode captures reference values from a geometry.
    pub fn is_initializable(&self) -> bool {
        self.initializable
    }

    /// False for an initializable mode that never captured its reference.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Capture the reference values of the constraints from the geometry.
    pub(crate) fn initialize(&mut self, kin: &Kinematics) -> Result<()> {
        for constraint in &self.constraints {
            match constraint {
                Constraint::PsiConstant => {
                    let hkl2 = Vec3::new(
                        self.parameter("h2")?,
                        self.parameter("k2")?,
                        self.parameter("l2")?,
                    );
                    let psi = kin.psi(&hkl2).ok_or_else(|| {
                        HklError::Unreachable(format!(
                            "can not initialize the \"{}\" mode when Q is null or colinear with <h2, k2, l2>",
                            self.name
                        ))
                    })?;
                    set(&mut self.parameters, "psi", psi)?;
                }
                Constraint::EmergenceFixed { .. } => {
                    let n = self.surface()?;
                    set(&mut self.parameters, "emergence", kin.emergence(&n))?;
                }
                _ => {}
            }
        }
        self.initialized = true;
        Ok(())
    }

    /// Surface normal from the `n_x`, `n_y`, `n_z` parameters.
    pub(crate) fn surface(&self) -> Result<Vec3> {
        let n = Vec3::new(self.parameter("n_x")?, self.parameter("n_y")?, self.parameter("n_z")?);
        if vector::is_null(&n) {
            return Err(HklError::InvalidParameter(format!(
                "{}: the surface vector is null",
                self.name
            )));
        }
        Ok(n)
    }

    /// Check the mode against a geometry.
    pub(crate) fn validate(&self, geometry: &Geometry) -> Result<()> {
        let constraint_axes = self.constraints.iter().flat_map(Constraint::axes);
        for name in self
            .axes_read
            .iter()
            .chain(&self.axes_write)
            .map(String::as_str)
            .chain(constraint_axes)
        {
            if geometry.axis(name).is_err() {
                return Err(HklError::InvalidConfiguration(format!(
                    "mode {} uses axis {name} missing from {}",
                    self.name,
                    geometry.name()
                )));
            }
        }
        let emergence = self
            .constraints
            .iter()
            .any(|c| matches!(c, Constraint::EmergenceFixed { .. }));
        if emergence && self.axes_write.len() != 4 {
            return Err(HklError::InvalidConfiguration(format!(
                "mode {} needs exactly 4 write axes",
                self.name
            )));
        }
        Ok(())
    }

    /// Geometry indices of the write axes.
    pub(crate) fn write_indices(&self, geometry: &Geometry) -> Result<Vec<usize>> {
        self.axes_write.iter().map(|name| geometry.axis_index(name)).collect()
    }
}

fn set(parameters: &mut [Parameter], name: &str, value: f64) -> Result<()> {
    match parameters.iter_mut().find(|p| p.name() == name) {
        Some(p) => p.set_value(value),
        None => Err(HklError::InvalidParameter(format!("no parameter {name}"))),
    }
}
