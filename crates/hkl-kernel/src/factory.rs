//! Built-in diffractometers.
//!
//! A [`Factory`] knows how to build the geometry of one diffractometer and
//! the engines that drive it. [`Registry::builtin`] holds the catalog.

use hkl_math::Vec3;
use hkl_solver::SolverConfig;

use crate::detector::Detector;
use crate::engine::{Engine, EngineKind, EngineList};
use crate::error::{HklError, Result};
use crate::geometry::{Geometry, GeometryBuilder};
use crate::kappa::KAPPA_ALPHA;
use crate::mode::{reference_hkl, surface_parameters, Constraint, EulerianAngle, Mode};
use crate::parameter::Parameter;
use crate::sample::Sample;

/// Recipe for one diffractometer.
#[derive(Debug, Clone)]
pub struct Factory {
    name: &'static str,
    description: &'static str,
    geometry: fn() -> Result<Geometry>,
    engines: fn() -> Vec<Engine>,
}

impl Factory {
    /// A factory from its builders.
    pub fn new(
        name: &'static str,
        description: &'static str,
        geometry: fn() -> Result<Geometry>,
        engines: fn() -> Vec<Engine>,
    ) -> Self {
        Self {
            name,
            description,
            geometry,
            engines,
        }
    }

    /// Diffractometer name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// One-line description.
    pub fn description(&self) -> &'static str {
        self.description
    }

    /// A new geometry with every axis at zero.
    pub fn geometry(&self) -> Result<Geometry> {
        (self.geometry)()
    }

    /// New engines in their default mode.
    pub fn engines(&self) -> Vec<Engine> {
        (self.engines)()
    }

    /// A session for `sample` on this diffractometer.
    pub fn engine_list(&self, sample: Sample, solver: SolverConfig) -> Result<EngineList> {
        EngineList::new(
            self.geometry()?,
            Detector::default(),
            sample,
            self.engines(),
            solver,
        )
    }
}

/// A catalog of factories, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    factories: Vec<Factory>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in diffractometers.
    pub fn builtin() -> Self {
        Self {
            factories: vec![
                Factory::new("E4CV", "eulerian 4-circle, vertical scattering", e4cv, e4cv_engines),
                Factory::new("E4CH", "eulerian 4-circle, horizontal scattering", e4ch, e4ch_engines),
                Factory::new("K4CV", "kappa 4-circle, vertical scattering", k4cv, k4cv_engines),
                Factory::new("E6C", "eulerian 6-circle", e6c, e6c_engines),
                Factory::new("K6C", "kappa 6-circle", k6c, k6c_engines),
                Factory::new("ZAXIS", "z-axis surface diffractometer", zaxis, zaxis_engines),
            ],
        }
    }

    /// Add a factory. Names must be unique.
    pub fn register(&mut self, factory: Factory) -> Result<()> {
        if self.factories.iter().any(|f| f.name == factory.name) {
            return Err(HklError::InvalidConfiguration(format!(
                "diffractometer {} is already registered",
                factory.name
            )));
        }
        self.factories.push(factory);
        Ok(())
    }

    /// Factory `name`.
    pub fn get(&self, name: &str) -> Result<&Factory> {
        self.factories
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| HklError::UnknownDiffractometer(name.to_string()))
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|f| f.name).collect()
    }

    /// Iterate over the factories.
    pub fn iter(&self) -> std::slice::Iter<'_, Factory> {
        self.factories.iter()
    }
}

fn kappa_direction() -> Vec3 {
    let (s, c) = KAPPA_ALPHA.sin_cos();
    Vec3::new(0.0, -c, -s)
}

fn e4cv() -> Result<Geometry> {
    GeometryBuilder::new("E4CV")
        .holder(&[("omega", -Vec3::y()), ("chi", Vec3::x()), ("phi", -Vec3::y())])
        .holder(&[("tth", -Vec3::y())])
        .build()
}

fn e4ch() -> Result<Geometry> {
    GeometryBuilder::new("E4CH")
        .holder(&[("omega", Vec3::z()), ("chi", Vec3::x()), ("phi", Vec3::z())])
        .holder(&[("tth", Vec3::z())])
        .build()
}

fn k4cv() -> Result<Geometry> {
    GeometryBuilder::new("K4CV")
        .holder(&[
            ("komega", -Vec3::y()),
            ("kappa", kappa_direction()),
            ("kphi", -Vec3::y()),
        ])
        .holder(&[("tth", -Vec3::y())])
        .build()
}

fn e6c() -> Result<Geometry> {
    GeometryBuilder::new("E6C")
        .holder(&[
            ("mu", Vec3::z()),
            ("omega", -Vec3::y()),
            ("chi", Vec3::x()),
            ("phi", -Vec3::y()),
        ])
        .holder(&[("mu", Vec3::z()), ("gamma", Vec3::z()), ("delta", -Vec3::y())])
        .build()
}

fn k6c() -> Result<Geometry> {
    GeometryBuilder::new("K6C")
        .holder(&[
            ("mu", Vec3::z()),
            ("komega", -Vec3::y()),
            ("kappa", kappa_direction()),
            ("kphi", -Vec3::y()),
        ])
        .holder(&[("mu", Vec3::z()), ("gamma", Vec3::z()), ("delta", -Vec3::y())])
        .build()
}

fn zaxis() -> Result<Geometry> {
    GeometryBuilder::new("ZAXIS")
        .holder(&[("mu", Vec3::z()), ("omega", -Vec3::y())])
        .holder(&[("mu", Vec3::z()), ("delta", -Vec3::y()), ("gamma", Vec3::z())])
        .build()
}

fn hkl_mode(name: &str, write: &[&str]) -> Mode {
    Mode::new(name, write).with_secondary_solutions()
}

fn bissector(name: &str, write: &[&str], half: &str, doubled: &str) -> Mode {
    hkl_mode(name, write).with_constraint(Constraint::Bissector {
        half: half.into(),
        doubled: doubled.into(),
    })
}

/// A mode holding one axis of `axes` still by leaving it out of the write axes.
fn constant(name: &str, axes: &[&str], fixed: &str) -> Mode {
    let write: Vec<&str> = axes.iter().copied().filter(|&a| a != fixed).collect();
    hkl_mode(name, &write).with_read_axes(axes)
}

fn kappa_bissector(name: &str, write: &[&str], tth: &str) -> Mode {
    hkl_mode(name, write).with_constraint(Constraint::KappaBissector {
        komega: "komega".into(),
        kappa: "kappa".into(),
        tth: tth.into(),
    })
}

fn kappa_constant(name: &str, write: &[&str], angle: EulerianAngle) -> Mode {
    hkl_mode(name, write).with_constraint(Constraint::KappaEulerian {
        angle,
        komega: "komega".into(),
        kappa: "kappa".into(),
        kphi: "kphi".into(),
    })
}

fn psi_engine(write: &[&str]) -> Engine {
    let mode = reference_hkl("h1", "k1", "l1", [1.0, 0.0, 0.0])
        .into_iter()
        .fold(Mode::new("psi", write), Mode::with_parameter);
    Engine::new(EngineKind::Psi).with_mode(mode)
}

fn q_engine(kind: EngineKind, write: &[&str]) -> Engine {
    Engine::new(kind).with_mode(Mode::new(kind.name(), write))
}

/// Incidence and emergence engines on the surface `n`.
fn surface_engines(sample_axes: &[&str], all_axes: &[&str], n: Vec3) -> [Engine; 2] {
    let mode = |name: &str, read: &[&str]| {
        surface_parameters(&n)
            .into_iter()
            .fold(Mode::new(name, &[]).with_read_axes(read), Mode::with_parameter)
    };
    [
        Engine::new(EngineKind::Incidence).with_mode(mode("incidence", sample_axes)),
        Engine::new(EngineKind::Emergence).with_mode(mode("emergence", all_axes)),
    ]
}

fn eulerians_engine() -> Engine {
    Engine::new(EngineKind::Eulerians).with_mode(
        Mode::new("eulerians", &["komega", "kappa", "kphi"])
            .with_parameter(Parameter::scalar("solution", 1.0, 0.0, 1.0)),
    )
}

fn e4c_engines(n: Vec3) -> Vec<Engine> {
    const AXES: [&str; 4] = ["omega", "chi", "phi", "tth"];
    let hkl = Engine::new(EngineKind::Hkl)
        .with_mode(bissector("bissector", &AXES, "omega", "tth"))
        .with_mode(constant("constant_omega", &AXES, "omega"))
        .with_mode(constant("constant_chi", &AXES, "chi"))
        .with_mode(constant("constant_phi", &AXES, "phi"))
        .with_mode(hkl_mode("double_diffraction", &AXES).with_constraint(Constraint::DoubleDiffraction))
        .with_mode(hkl_mode("psi_constant", &AXES).with_constraint(Constraint::PsiConstant));
    let [incidence, emergence] = surface_engines(&AXES[..3], &AXES, n);
    vec![
        hkl,
        psi_engine(&AXES),
        q_engine(EngineKind::Q, &["tth"]),
        incidence,
        emergence,
    ]
}

fn e4cv_engines() -> Vec<Engine> {
    e4c_engines(Vec3::z())
}

fn e4ch_engines() -> Vec<Engine> {
    e4c_engines(Vec3::y())
}

fn k4cv_engines() -> Vec<Engine> {
    const AXES: [&str; 4] = ["komega", "kappa", "kphi", "tth"];
    let hkl = Engine::new(EngineKind::Hkl)
        .with_mode(kappa_bissector("bissector", &AXES, "tth"))
        .with_mode(kappa_constant("constant_omega", &AXES, EulerianAngle::Omega))
        .with_mode(kappa_constant("constant_chi", &AXES, EulerianAngle::Chi))
        .with_mode(kappa_constant("constant_phi", &AXES, EulerianAngle::Phi))
        .with_mode(hkl_mode("double_diffraction", &AXES).with_constraint(Constraint::DoubleDiffraction))
        .with_mode(hkl_mode("psi_constant", &AXES).with_constraint(Constraint::PsiConstant));
    let [incidence, emergence] = surface_engines(&AXES[..3], &AXES, Vec3::z());
    vec![
        hkl,
        eulerians_engine(),
        psi_engine(&AXES),
        q_engine(EngineKind::Q, &["tth"]),
        incidence,
        emergence,
    ]
}

fn e6c_engines() -> Vec<Engine> {
    const VERTICAL: [&str; 4] = ["omega", "chi", "phi", "delta"];
    const SAMPLE: [&str; 4] = ["mu", "omega", "chi", "phi"];
    const ALL: [&str; 6] = ["mu", "omega", "chi", "phi", "gamma", "delta"];
    let hkl = Engine::new(EngineKind::Hkl)
        .with_mode(bissector("bissector_vertical", &VERTICAL, "omega", "delta"))
        .with_mode(constant("constant_omega_vertical", &VERTICAL, "omega"))
        .with_mode(constant("constant_chi_vertical", &VERTICAL, "chi"))
        .with_mode(constant("constant_phi_vertical", &VERTICAL, "phi"))
        .with_mode(hkl_mode("lifting_detector_phi", &["phi", "gamma", "delta"]))
        .with_mode(hkl_mode("lifting_detector_omega", &["omega", "gamma", "delta"]))
        .with_mode(hkl_mode("lifting_detector_mu", &["mu", "gamma", "delta"]))
        .with_mode(
            hkl_mode("double_diffraction_vertical", &VERTICAL)
                .with_constraint(Constraint::DoubleDiffraction),
        )
        .with_mode(
            bissector("bissector_horizontal", &["mu", "omega", "chi", "phi", "gamma"], "mu", "gamma")
                .with_constraint(Constraint::Zero { axis: "omega".into() }),
        )
        .with_mode(hkl_mode("psi_constant_vertical", &VERTICAL).with_constraint(Constraint::PsiConstant));
    let [incidence, emergence] = surface_engines(&SAMPLE, &ALL, Vec3::z());
    vec![
        hkl,
        psi_engine(&VERTICAL),
        q_engine(EngineKind::Q2, &["gamma", "delta"]),
        incidence,
        emergence,
    ]
}

fn k6c_engines() -> Vec<Engine> {
    const VERTICAL: [&str; 4] = ["komega", "kappa", "kphi", "delta"];
    const SAMPLE: [&str; 4] = ["mu", "komega", "kappa", "kphi"];
    const ALL: [&str; 6] = ["mu", "komega", "kappa", "kphi", "gamma", "delta"];
    let hkl = Engine::new(EngineKind::Hkl)
        .with_mode(kappa_bissector("bissector_vertical", &VERTICAL, "delta"))
        .with_mode(kappa_constant("constant_omega_vertical", &VERTICAL, EulerianAngle::Omega))
        .with_mode(kappa_constant("constant_chi_vertical", &VERTICAL, EulerianAngle::Chi))
        .with_mode(kappa_constant("constant_phi_vertical", &VERTICAL, EulerianAngle::Phi))
        .with_mode(hkl_mode("lifting_detector_kphi", &["kphi", "gamma", "delta"]))
        .with_mode(hkl_mode("lifting_detector_komega", &["komega", "gamma", "delta"]))
        .with_mode(hkl_mode("lifting_detector_mu", &["mu", "gamma", "delta"]))
        .with_mode(
            hkl_mode("double_diffraction_vertical", &VERTICAL)
                .with_constraint(Constraint::DoubleDiffraction),
        )
        .with_mode(hkl_mode("psi_constant_vertical", &VERTICAL).with_constraint(Constraint::PsiConstant));
    let [incidence, emergence] = surface_engines(&SAMPLE, &ALL, Vec3::z());
    vec![
        hkl,
        eulerians_engine(),
        psi_engine(&VERTICAL),
        q_engine(EngineKind::Q2, &["gamma", "delta"]),
        incidence,
        emergence,
    ]
}

fn zaxis_engines() -> Vec<Engine> {
    const AXES: [&str; 4] = ["mu", "omega", "delta", "gamma"];
    let hkl = Engine::new(EngineKind::Hkl)
        .with_mode(hkl_mode("zaxis", &["omega", "delta", "gamma"]).with_read_axes(&AXES))
        .with_mode(hkl_mode("reflectivity", &AXES).with_constraint(Constraint::Equal {
            a: "mu".into(),
            b: "gamma".into(),
        }))
        .with_mode(
            hkl_mode("emergence_fixed", &AXES).with_constraint(Constraint::EmergenceFixed { surface: Vec3::y() }),
        );
    let [incidence, emergence] = surface_engines(&AXES[..2], &AXES, Vec3::y());
    vec![hkl, q_engine(EngineKind::Q2, &["gamma", "delta"]), incidence, emergence]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_is_consistent() {
        let registry = Registry::builtin();
        assert_eq!(registry.names(), vec!["E4CV", "E4CH", "K4CV", "E6C", "K6C", "ZAXIS"]);
        for factory in registry.iter() {
            let list = factory
                .engine_list(Sample::default(), SolverConfig::default())
                .unwrap();
            assert_eq!(list.geometry().name(), factory.name());
            assert!(list.engine("hkl").is_ok());
        }
    }

    #[test]
    fn test_engine_sets() {
        let registry = Registry::builtin();
        let names = |d: &str| -> Vec<String> {
            registry
                .get(d)
                .unwrap()
                .engines()
                .iter()
                .map(|e| e.name().to_string())
                .collect()
        };
        assert_eq!(names("E4CV"), ["hkl", "psi", "q", "incidence", "emergence"]);
        assert_eq!(names("K6C"), ["hkl", "eulerians", "psi", "q2", "incidence", "emergence"]);
        assert_eq!(names("ZAXIS"), ["hkl", "q2", "incidence", "emergence"]);
    }

    #[test]
    fn test_axes() {
        let registry = Registry::builtin();
        let g = registry.get("E6C").unwrap().geometry().unwrap();
        assert_eq!(g.axis_names(), ["mu", "omega", "chi", "phi", "gamma", "delta"]);
        let g = registry.get("ZAXIS").unwrap().geometry().unwrap();
        assert_eq!(g.axis_names(), ["mu", "omega", "delta", "gamma"]);
        assert!(g.detector_holder().contains(g.axis_index("mu").unwrap()));
    }

    #[test]
    fn test_unknown_and_duplicate() {
        let mut registry = Registry::builtin();
        assert!(matches!(
            registry.get("nope"),
            Err(HklError::UnknownDiffractometer(_))
        ));
        let e4cv = registry.get("E4CV").unwrap().clone();
        assert!(registry.register(e4cv).is_err());
    }

    #[test]
    fn test_mode_on_missing_axis_is_rejected() {
        let geometry = e4cv().unwrap();
        let engine = Engine::new(EngineKind::Hkl).with_mode(hkl_mode("broken", &["omega", "delta", "tth"]));
        let err = EngineList::new(
            geometry,
            Detector::default(),
            Sample::default(),
            vec![engine],
            SolverConfig::default(),
        );
        assert!(matches!(err, Err(HklError::InvalidConfiguration(_))));
    }
}
