//! The engine list: a diffractometer session and its engines.

use tracing::debug;

use hkl_math::Vec3;
use hkl_solver::{HybridSolver, SolverConfig};

use super::Engine;
use crate::detector::Detector;
use crate::error::{HklError, Result};
use crate::geometry::Geometry;
use crate::geometry_list::GeometryList;
use crate::kinematics::Kinematics;
use crate::sample::Sample;

/// A diffractometer session: the geometry, detector and sample together
/// with every engine able to drive them.
///
/// `set` never moves the owned geometry. The solutions are kept until the
/// next `set` and one of them can be applied with
/// [`apply_solution`](Self::apply_solution).
pub struct EngineList {
    geometry: Geometry,
    detector: Detector,
    sample: Sample,
    engines: Vec<Engine>,
    solver: HybridSolver,
    solutions: GeometryList,
}

impl EngineList {
    /// Assemble a session. Every engine mode is checked against `geometry`.
    pub fn new(
        geometry: Geometry,
        detector: Detector,
        sample: Sample,
        engines: Vec<Engine>,
        solver: SolverConfig,
    ) -> Result<Self> {
        solver.validate()?;
        detector.validate(&geometry)?;
        for (i, engine) in engines.iter().enumerate() {
            if engines[..i].iter().any(|e| e.name() == engine.name()) {
                return Err(HklError::InvalidConfiguration(format!(
                    "duplicate engine {}",
                    engine.name()
                )));
            }
            engine.validate(&geometry)?;
        }
        Ok(Self {
            geometry,
            detector,
            sample,
            engines,
            solver: HybridSolver::new(solver),
            solutions: GeometryList::new(),
        })
    }

    /// Current geometry.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Mutable access to the current geometry.
    pub fn geometry_mut(&mut self) -> &mut Geometry {
        &mut self.geometry
    }

    /// Replace the geometry by one with the same axes, e.g. a solution.
    pub fn set_geometry(&mut self, geometry: Geometry) -> Result<()> {
        if geometry.axis_names() != self.geometry.axis_names() {
            return Err(HklError::InvalidConfiguration(format!(
                "geometry {} does not match {}",
                geometry.name(),
                self.geometry.name()
            )));
        }
        self.geometry = geometry;
        Ok(())
    }

    /// The detector.
    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    /// The sample.
    pub fn sample(&self) -> &Sample {
        &self.sample
    }

    /// Mutable access to the sample.
    pub fn sample_mut(&mut self) -> &mut Sample {
        &mut self.sample
    }

    /// Record reflection `hkl` at the current geometry.
    pub fn add_reflection(&mut self, hkl: Vec3) -> Result<usize> {
        self.sample.add_reflection(&self.geometry, &self.detector, hkl)
    }

    /// Solver configuration.
    pub fn solver_config(&self) -> &SolverConfig {
        self.solver.config()
    }

    /// All engines.
    pub fn engines(&self) -> &[Engine] {
        &self.engines
    }

    /// Engine `name`.
    pub fn engine(&self, name: &str) -> Result<&Engine> {
        self.engines
            .iter()
            .find(|e| e.name() == name)
            .ok_or_else(|| HklError::UnknownEngine(name.to_string()))
    }

    /// Select mode `mode` of engine `engine`.
    pub fn select_mode(&mut self, engine: &str, mode: &str) -> Result<()> {
        find_mut(&mut self.engines, engine)?.select_mode(mode)
    }

    /// Set a parameter of the current mode of `engine`.
    pub fn set_mode_parameter(&mut self, engine: &str, name: &str, value: f64) -> Result<()> {
        find_mut(&mut self.engines, engine)?.set_mode_parameter(name, value)
    }

    /// Capture the reference state of `engine` from the current geometry.
    pub fn initialize(&mut self, engine: &str) -> Result<()> {
        let kin = Kinematics::new(&self.geometry, &self.detector, &self.sample);
        find_mut(&mut self.engines, engine)?.initialize(&kin)
    }

    /// Pseudo-axis values of `engine` at the current geometry.
    pub fn get(&mut self, engine: &str) -> Result<Vec<f64>> {
        let kin = Kinematics::new(&self.geometry, &self.detector, &self.sample);
        find_mut(&mut self.engines, engine)?.get(&kin)
    }

    /// Pseudo-axis values of every engine able to compute them.
    pub fn get_all(&mut self) -> Vec<(String, Vec<f64>)> {
        let kin = Kinematics::new(&self.geometry, &self.detector, &self.sample);
        let mut values = Vec::with_capacity(self.engines.len());
        for engine in &mut self.engines {
            match engine.get(&kin) {
                Ok(v) => values.push((engine.name().to_string(), v)),
                Err(err) => debug!(engine = %engine.name(), %err, "get failed"),
            }
        }
        values
    }

    /// Solve `engine` for `values` in its current mode.
    ///
    /// On success the solutions, closest to the current geometry first,
    /// replace the previous ones. On failure the previous solutions are
    /// cleared.
    pub fn set(&mut self, engine: &str, values: &[f64]) -> Result<&GeometryList> {
        self.solutions.clear();
        let kin = Kinematics::new(&self.geometry, &self.detector, &self.sample);
        let engine = find_mut(&mut self.engines, engine)?;
        self.solutions = engine.set(values, &kin, &mut self.solver)?;
        Ok(&self.solutions)
    }

    /// Solutions of the last successful `set`.
    pub fn solutions(&self) -> &GeometryList {
        &self.solutions
    }

    /// Make solution `index` the current geometry.
    pub fn apply_solution(&mut self, index: usize) -> Result<()> {
        let solution = self.solutions.get(index).cloned().ok_or_else(|| {
            HklError::InvalidParameter(format!(
                "no solution #{index}, {} available",
                self.solutions.len()
            ))
        })?;
        self.set_geometry(solution)
    }
}

fn find_mut<'a>(engines: &'a mut [Engine], name: &str) -> Result<&'a mut Engine> {
    engines
        .iter_mut()
        .find(|e| e.name() == name)
        .ok_or_else(|| HklError::UnknownEngine(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::Registry;
    use crate::lattice::Lattice;
    use approx::assert_relative_eq;

    fn session(name: &str) -> EngineList {
        let sample = Sample::new("cubic", Lattice::cubic(1.54).unwrap());
        Registry::builtin()
            .get(name)
            .unwrap()
            .engine_list(sample, SolverConfig::default())
            .unwrap()
    }

    fn degrees(geometry: &Geometry) -> Vec<f64> {
        geometry.axis_values().iter().map(|v| v.to_degrees()).collect()
    }

    fn assert_hkl(list: &mut EngineList, target: &[f64]) {
        let hkl = list.get("hkl").unwrap();
        for (a, b) in hkl.iter().zip(target) {
            assert_relative_eq!(*a, *b, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_e4cv_bissector_set() {
        let mut list = session("E4CV");
        list.geometry_mut()
            .set_axis_values_in_user_unit(&[30.0, 0.0, 0.0, 60.0])
            .unwrap();
        let before = list.geometry().clone();

        let solutions = list.set("hkl", &[0.0, 0.0, 1.0]).unwrap().clone();
        assert_eq!(solutions.len(), 2);
        let omega = solutions.get(0).unwrap().axis("omega").unwrap().value();
        let tth = solutions.get(0).unwrap().axis("tth").unwrap().value();
        assert_relative_eq!(tth, 2.0 * omega, epsilon = 1e-6);
        assert_eq!(list.geometry(), &before);

        // the second one comes from the Ewald construction around phi
        let expected = [[30.0, 0.0, 0.0, 60.0], [30.0, 0.0, 120.0, -60.0]];
        for (solution, expected) in solutions.iter().zip(&expected) {
            for (a, b) in degrees(solution).iter().zip(expected) {
                assert_relative_eq!(*a, *b, epsilon = 1e-6);
            }
        }

        list.apply_solution(1).unwrap();
        assert_hkl(&mut list, &[0.0, 0.0, 1.0]);
        list.apply_solution(0).unwrap();
        assert_hkl(&mut list, &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_no_secondary_solution_when_ki_is_colinear() {
        // with omega at 0, chi (the last moving sample axis) lies along the beam
        let mut list = session("E4CV");
        list.geometry_mut()
            .set_axis_values_in_user_unit(&[0.0, 0.0, 0.0, 60.0])
            .unwrap();
        list.select_mode("hkl", "constant_phi").unwrap();
        let target = [-0.5, 0.0, 3f64.sqrt() / 2.0];
        let solutions = list.set("hkl", &target).unwrap();
        assert_eq!(solutions.len(), 1);
        for (a, b) in degrees(solutions.get(0).unwrap()).iter().zip(&[0.0, 0.0, 0.0, 60.0]) {
            assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_e6c_lifting_detector_fits_two_detector_axes() {
        let mut list = session("E6C");
        list.geometry_mut()
            .set_axis_values_in_user_unit(&[0.0, 30.0, 0.0, 0.0, 0.0, 60.0])
            .unwrap();
        list.select_mode("hkl", "lifting_detector_phi").unwrap();
        let solutions = list.set("hkl", &[0.0, 0.0, 1.0]).unwrap().clone();
        assert!(solutions.len() >= 2);
        let phi = |g: &Geometry| g.axis("phi").unwrap().value().to_degrees();
        assert!(solutions.iter().any(|g| (phi(g) - 120.0).abs() < 1e-6));
        for solution in &solutions {
            list.set_geometry(solution.clone()).unwrap();
            assert_hkl(&mut list, &[0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn test_double_diffraction_set() {
        let mut list = session("E4CV");
        list.geometry_mut()
            .set_axis_values_in_user_unit(&[30.0, 0.0, 0.0, 60.0])
            .unwrap();
        list.select_mode("hkl", "double_diffraction").unwrap();
        let hkl2 = Vec3::new(1.0, 1.0, 1.0);
        let solutions = list.set("hkl", &[0.0, 0.0, 1.0]).unwrap().clone();
        assert!(!solutions.is_empty());
        let on_sphere = |g: &Geometry| {
            let kin = Kinematics::new(g, list.detector(), list.sample());
            ((kin.lab_hkl(&hkl2) + kin.ki()).norm() - kin.k()).abs() < 1e-5
        };
        assert!(solutions.iter().any(on_sphere));
        for solution in &solutions {
            list.set_geometry(solution.clone()).unwrap();
            assert_hkl(&mut list, &[0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn test_zaxis_reflectivity_set() {
        let mut list = session("ZAXIS");
        list.geometry_mut()
            .set_axis_values_in_user_unit(&[0.0, 20.0, 50.0, 0.0])
            .unwrap();
        list.select_mode("hkl", "reflectivity").unwrap();
        let solutions = list.set("hkl", &[0.0, 0.0, 1.0]).unwrap().clone();
        let mu_is_gamma = |g: &Geometry| {
            (g.axis("mu").unwrap().value() - g.axis("gamma").unwrap().value()).abs() < 1e-6
        };
        assert!(solutions.iter().any(mu_is_gamma));
        for solution in &solutions {
            list.set_geometry(solution.clone()).unwrap();
            assert_hkl(&mut list, &[0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn test_zaxis_emergence_fixed_set() {
        let mut list = session("ZAXIS");
        list.geometry_mut()
            .set_axis_values_in_user_unit(&[0.0, 20.0, 50.0, 0.0])
            .unwrap();
        list.select_mode("hkl", "emergence_fixed").unwrap();
        assert!(matches!(
            list.set("hkl", &[0.0, 0.0, 1.0]),
            Err(HklError::NotInitialized(_))
        ));
        list.initialize("hkl").unwrap();
        let emergence = list.get("emergence").unwrap()[0];

        let solutions = list.set("hkl", &[0.0, 0.0, 1.0]).unwrap().clone();
        let mut kept = 0;
        for solution in &solutions {
            list.set_geometry(solution.clone()).unwrap();
            assert_hkl(&mut list, &[0.0, 0.0, 1.0]);
            if (list.get("emergence").unwrap()[0] - emergence).abs() < 1e-5 {
                kept += 1;
            }
        }
        assert!(kept >= 1);
    }

    #[test]
    fn test_zaxis_q2_set() {
        let mut list = session("ZAXIS");
        list.geometry_mut()
            .set_axis_values_in_user_unit(&[0.0, 0.0, 60.0, 20.0])
            .unwrap();
        let target = list.get("q2").unwrap();
        list.geometry_mut()
            .set_axis_values_in_user_unit(&[0.0, 0.0, 30.0, 10.0])
            .unwrap();

        let solutions = list.set("q2", &target).unwrap().clone();
        for solution in &solutions {
            list.set_geometry(solution.clone()).unwrap();
            let values = list.get("q2").unwrap();
            assert_relative_eq!(values[0], target[0], epsilon = 1e-6);
            assert_relative_eq!(values[1], target[1], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_set_get_round_trip() {
        let mut list = session("E4CV");
        list.geometry_mut()
            .set_axis_values_in_user_unit(&[30.0, 0.0, 0.0, 60.0])
            .unwrap();
        let target = [1.0, 0.0, 1.0];
        let solutions = list.set("hkl", &target).unwrap().clone();
        for solution in &solutions {
            list.set_geometry(solution.clone()).unwrap();
            let hkl = list.get("hkl").unwrap();
            for (a, b) in hkl.iter().zip(&target) {
                assert_relative_eq!(*a, *b, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_unreachable_before_solving() {
        let mut list = session("E4CV");
        let before = list.geometry().clone();
        let err = list.set("hkl", &[10.0, 10.0, 10.0]).unwrap_err();
        assert!(matches!(err, HklError::Unreachable(_)));
        assert_eq!(list.engine("hkl").unwrap().last_stats().iterations, 0);
        assert_eq!(list.geometry(), &before);
        assert!(list.solutions().is_empty());
    }

    #[test]
    fn test_read_only_and_unknown_engines() {
        let mut list = session("E4CV");
        assert!(matches!(
            list.set("incidence", &[0.1]),
            Err(HklError::ReadOnly(_))
        ));
        assert!(matches!(list.get("nope"), Err(HklError::UnknownEngine(_))));
        assert!(matches!(
            list.select_mode("hkl", "nope"),
            Err(HklError::UnknownMode(_))
        ));
        assert!(matches!(
            list.set("hkl", &[1.0, 0.0]),
            Err(HklError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_psi_needs_initialization() {
        let mut list = session("E4CV");
        list.geometry_mut()
            .set_axis_values_in_user_unit(&[30.0, 0.0, 0.0, 60.0])
            .unwrap();
        assert!(matches!(
            list.set("psi", &[0.3]),
            Err(HklError::NotInitialized(_))
        ));
        list.initialize("psi").unwrap();
        let solutions = list.set("psi", &[0.3]).unwrap().clone();
        list.set_geometry(solutions.get(0).unwrap().clone()).unwrap();
        assert_relative_eq!(list.get("psi").unwrap()[0], 0.3, epsilon = 1e-5);
        let hkl = list.get("hkl").unwrap();
        assert_relative_eq!(hkl[2], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_psi_constant_mode_needs_initialization() {
        let mut list = session("E4CV");
        list.geometry_mut()
            .set_axis_values_in_user_unit(&[30.0, 0.0, 0.0, 60.0])
            .unwrap();
        list.select_mode("hkl", "psi_constant").unwrap();
        assert!(matches!(
            list.set("hkl", &[0.0, 0.0, 1.0]),
            Err(HklError::NotInitialized(_))
        ));
        list.set_mode_parameter("hkl", "h2", 1.0).unwrap();
        list.set_mode_parameter("hkl", "k2", 0.0).unwrap();
        list.set_mode_parameter("hkl", "l2", 0.0).unwrap();
        list.initialize("hkl").unwrap();
        assert!(list.engine("hkl").unwrap().is_initialized());
    }

    #[test]
    fn test_kappa_eulerians() {
        let mut list = session("K4CV");
        let solutions = list.set("eulerians", &[0.1, 0.5, -0.2]).unwrap().clone();
        list.set_geometry(solutions.get(0).unwrap().clone()).unwrap();
        let values = list.get("eulerians").unwrap();
        assert_relative_eq!(values[0], 0.1, epsilon = 1e-9);
        assert_relative_eq!(values[1], 0.5, epsilon = 1e-9);
        assert_relative_eq!(values[2], -0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_get_all_skips_failures() {
        let mut list = session("E4CV");
        let values = list.get_all();
        let names: Vec<&str> = values.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"hkl"));
        assert!(!names.contains(&"psi"));
    }

    #[test]
    fn test_apply_solution_out_of_range() {
        let mut list = session("E4CV");
        assert!(list.apply_solution(0).is_err());
    }
}
