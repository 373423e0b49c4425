//! Session description loaded from TOML.
//!
//! ```toml
//! diffractometer = "E4CV"
//! wavelength = 1.54
//!
//! [sample]
//! name = "silicon"
//! lattice = { a = 5.431, b = 5.431, c = 5.431, alpha = 90.0, beta = 90.0, gamma = 90.0 }
//!
//! [[sample.reflections]]
//! hkl = [0.0, 0.0, 4.0]
//! axes = { omega = 34.6, chi = 0.0, phi = 0.0, tth = 69.2 }
//!
//! [axes]
//! omega = 30.0
//! tth = 60.0
//!
//! [modes]
//! hkl = "constant_phi"
//! ```
//!
//! Angles are in degrees. Mode parameters are in internal units.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use hkl_math::Vec3;
use hkl_solver::SolverConfig;

use crate::engine::EngineList;
use crate::error::{HklError, Result};
use crate::factory::Registry;
use crate::geometry::Geometry;
use crate::lattice::Lattice;
use crate::sample::Sample;
use crate::source::DEFAULT_WAVELENGTH;

/// Unit cell in Å and degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatticeConfig {
    /// a (Å).
    pub a: f64,
    /// b (Å).
    pub b: f64,
    /// c (Å).
    pub c: f64,
    /// alpha (degrees).
    pub alpha: f64,
    /// beta (degrees).
    pub beta: f64,
    /// gamma (degrees).
    pub gamma: f64,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            a: DEFAULT_WAVELENGTH,
            b: DEFAULT_WAVELENGTH,
            c: DEFAULT_WAVELENGTH,
            alpha: 90.0,
            beta: 90.0,
            gamma: 90.0,
        }
    }
}

/// A measured reflection: its indices and the axis values in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionConfig {
    /// Miller indices.
    pub hkl: [f64; 3],
    /// Axis values; missing axes are at zero.
    #[serde(default)]
    pub axes: BTreeMap<String, f64>,
}

/// Sample description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    /// Sample name.
    pub name: String,
    /// Unit cell.
    pub lattice: LatticeConfig,
    /// U as Euler angles in degrees. Ignored when two reflections are given.
    pub u_euler: Option<[f64; 3]>,
    /// Reflections; the first two orient the sample.
    pub reflections: Vec<ReflectionConfig>,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            name: "default".into(),
            lattice: LatticeConfig::default(),
            u_euler: None,
            reflections: Vec::new(),
        }
    }
}

/// A whole session: diffractometer, sample, axis values and modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Registry name of the diffractometer.
    pub diffractometer: String,
    /// Wavelength (Å).
    pub wavelength: f64,
    /// The sample.
    pub sample: SampleConfig,
    /// Current axis values in degrees.
    pub axes: BTreeMap<String, f64>,
    /// Selected mode per engine.
    pub modes: BTreeMap<String, String>,
    /// Mode parameters per engine, applied after the mode selection.
    pub parameters: BTreeMap<String, BTreeMap<String, f64>>,
    /// Root finder settings.
    pub solver: SolverConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            diffractometer: "E4CV".into(),
            wavelength: DEFAULT_WAVELENGTH,
            sample: SampleConfig::default(),
            axes: BTreeMap::new(),
            modes: BTreeMap::new(),
            parameters: BTreeMap::new(),
            solver: SolverConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| HklError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| HklError::Config(e.to_string()))
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.diffractometer.is_empty() {
            return Err(HklError::Config("diffractometer must be named".into()));
        }
        if !self.wavelength.is_finite() || self.wavelength <= 0.0 {
            return Err(HklError::Config("wavelength must be positive".into()));
        }
        if !all_finite(self.axes.values())
            || !self
                .sample
                .reflections
                .iter()
                .all(|r| all_finite(r.hkl.iter()) && all_finite(r.axes.values()))
        {
            return Err(HklError::Config("axis values and hkl must be finite".into()));
        }
        self.solver.validate()?;
        Ok(())
    }

    /// Build the session described by this configuration.
    pub fn build(&self, registry: &Registry) -> Result<EngineList> {
        self.validate()?;
        let factory = registry.get(&self.diffractometer)?;
        let l = &self.sample.lattice;
        let lattice = Lattice::from_degrees(l.a, l.b, l.c, l.alpha, l.beta, l.gamma)?;
        let mut sample = Sample::new(self.sample.name.clone(), lattice);
        if let Some([x, y, z]) = self.sample.u_euler {
            sample.set_u_from_euler(x.to_radians(), y.to_radians(), z.to_radians())?;
        }

        let mut list = factory.engine_list(sample, self.solver.clone())?;
        list.geometry_mut().set_wavelength(self.wavelength)?;

        let detector = *list.detector();
        for reflection in &self.sample.reflections {
            let mut geometry = list.geometry().clone();
            geometry.set_axis_values(&vec![0.0; geometry.axes().len()])?;
            set_axes_in_user_unit(&mut geometry, &reflection.axes)?;
            let [h, k, l] = reflection.hkl;
            list.sample_mut()
                .add_reflection(&geometry, &detector, Vec3::new(h, k, l))?;
        }
        if self.sample.reflections.len() >= 2 {
            list.sample_mut().compute_ub_busing_levy(0, 1)?;
        }

        set_axes_in_user_unit(list.geometry_mut(), &self.axes)?;
        for (engine, mode) in &self.modes {
            list.select_mode(engine, mode)?;
        }
        for (engine, parameters) in &self.parameters {
            for (name, &value) in parameters {
                list.set_mode_parameter(engine, name, value)?;
            }
        }
        debug!(
            diffractometer = %self.diffractometer,
            reflections = self.sample.reflections.len(),
            "session built"
        );
        Ok(list)
    }
}

fn all_finite<'a>(mut values: impl Iterator<Item = &'a f64>) -> bool {
    values.all(|v| v.is_finite())
}

fn set_axes_in_user_unit(geometry: &mut Geometry, axes: &BTreeMap<String, f64>) -> Result<()> {
    let mut values: Vec<f64> = geometry
        .axes()
        .iter()
        .map(|a| a.parameter().value_in_user_unit())
        .collect();
    for (name, &value) in axes {
        values[geometry.axis_index(name)?] = value;
    }
    geometry.set_axis_values_in_user_unit(&values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SESSION: &str = r#"
diffractometer = "E4CV"
wavelength = 1.54

[sample]
name = "cubic"
lattice = { a = 1.54, b = 1.54, c = 1.54, alpha = 90.0, beta = 90.0, gamma = 90.0 }

[[sample.reflections]]
hkl = [0.0, 0.0, 1.0]
axes = { omega = 30.0, tth = 60.0 }

[[sample.reflections]]
hkl = [-1.0, 0.0, 0.0]
axes = { omega = 30.0, phi = -90.0, tth = 60.0 }

[axes]
omega = 30.0
tth = 60.0

[modes]
hkl = "constant_phi"
"#;

    #[test]
    fn test_parse_and_build() {
        let config = SessionConfig::from_toml_str(SESSION).unwrap();
        assert_eq!(config.sample.reflections.len(), 2);
        assert_eq!(config.solver.max_iterations, 1000);

        let mut list = config.build(&Registry::builtin()).unwrap();
        assert!((list.sample().u() - hkl_math::Mat3::identity()).norm() < 1e-9);
        assert_eq!(list.engine("hkl").unwrap().mode().name(), "constant_phi");
        let hkl = list.get("hkl").unwrap();
        assert_relative_eq!(hkl[2], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::from_toml_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
        config.build(&Registry::builtin()).unwrap();
    }

    #[test]
    fn test_invalid() {
        assert!(matches!(
            SessionConfig::from_toml_str("wavelength = -1.0"),
            Err(HklError::Config(_))
        ));
        assert!(matches!(
            SessionConfig::from_toml_str("wavelength = ["),
            Err(HklError::Config(_))
        ));
        let config = SessionConfig {
            diffractometer: "nope".into(),
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.build(&Registry::builtin()),
            Err(HklError::UnknownDiffractometer(_))
        ));
        let mut config = SessionConfig::default();
        config.axes.insert("delta".into(), 1.0);
        assert!(config.build(&Registry::builtin()).is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = SessionConfig::from_toml_str(SESSION).unwrap();
        let text = config.to_toml_string().unwrap();
        assert_eq!(SessionConfig::from_toml_str(&text).unwrap(), config);
    }
}
