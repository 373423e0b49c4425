//! Norm (and azimuth) of the scattering vector.

use hkl_math::{normalize_angle, vector};
use hkl_solver::{NonlinearSolver, SolveStats};

use super::auto_solve;
use crate::error::{HklError, Result};
use crate::geometry_list::GeometryList;
use crate::kinematics::Kinematics;
use crate::mode::Mode;

fn q_of(k: f64, tth: f64) -> f64 {
    2.0 * k * (tth / 2.0).sin()
}

fn detector_axis(kin: &Kinematics, mode: &Mode) -> Result<usize> {
    match mode.write_indices(kin.geometry)?.as_slice() {
        [index] => Ok(*index),
        axes => Err(HklError::InvalidConfiguration(format!(
            "mode {} must move a single axis, not {}",
            mode.name(),
            axes.len()
        ))),
    }
}

pub(super) fn get_q(kin: &Kinematics, mode: &Mode) -> Result<f64> {
    let index = detector_axis(kin, mode)?;
    Ok(q_of(kin.k(), kin.geometry.axes()[index].value()))
}

pub(super) fn set_q(
    q: f64,
    kin: &Kinematics,
    mode: &Mode,
    solver: &mut dyn NonlinearSolver,
    stats: &mut SolveStats,
) -> Result<GeometryList> {
    let index = detector_axis(kin, mode)?;
    let solved = auto_solve(kin, &[index], 1, solver, stats, |k, f| {
        f[0] = q - q_of(k.k(), k.geometry.axes()[index].value());
    })?;
    let mut solutions = GeometryList::new();
    solutions.add(solved);
    Ok(solutions)
}

/// `[q, alpha]`: the norm of Q and the azimuth of kf about the beam.
pub(super) fn get_q2(kin: &Kinematics) -> [f64; 2] {
    let kf = kin.kf();
    let q = q_of(kin.k(), vector::angle(&kin.ki(), &kf));
    [q, kf.z.atan2(kf.y)]
}

pub(super) fn set_q2(
    values: &[f64],
    kin: &Kinematics,
    mode: &Mode,
    solver: &mut dyn NonlinearSolver,
    stats: &mut SolveStats,
) -> Result<GeometryList> {
    let (q, alpha) = (values[0], values[1]);
    let indices = mode.write_indices(kin.geometry)?;
    let solved = auto_solve(kin, &indices, 2, solver, stats, |k, f| {
        let [q_now, alpha_now] = get_q2(k);
        f[0] = q - q_now;
        f[1] = normalize_angle(alpha - alpha_now);
    })?;
    let mut solutions = GeometryList::new();
    solutions.add(solved);
    Ok(solutions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Detector;
    use crate::geometry::{Geometry, GeometryBuilder};
    use crate::sample::Sample;
    use approx::assert_relative_eq;
    use hkl_math::{Vec3, TAU};
    use hkl_solver::HybridSolver;

    fn six_circle() -> Geometry {
        GeometryBuilder::new("E6C")
            .holder(&[
                ("mu", Vec3::z()),
                ("omega", -Vec3::y()),
                ("chi", Vec3::x()),
                ("phi", -Vec3::y()),
            ])
            .holder(&[("mu", Vec3::z()), ("gamma", Vec3::z()), ("delta", -Vec3::y())])
            .build()
            .unwrap()
    }

    #[test]
    fn test_q_get_set() {
        let mut g = GeometryBuilder::new("E4CV")
            .holder(&[("omega", -Vec3::y()), ("chi", Vec3::x()), ("phi", -Vec3::y())])
            .holder(&[("tth", -Vec3::y())])
            .build()
            .unwrap();
        g.set_axis_value("tth", 60f64.to_radians()).unwrap();
        let detector = Detector::default();
        let sample = Sample::default();
        let mode = Mode::new("q", &["tth"]);
        let kin = Kinematics::new(&g, &detector, &sample);

        let q = get_q(&kin, &mode).unwrap();
        assert_relative_eq!(q, TAU / 1.54, epsilon = 1e-12);

        let mut solver = HybridSolver::with_defaults();
        let mut stats = SolveStats::default();
        let solutions = set_q(2.0, &kin, &mode, &mut solver, &mut stats).unwrap();
        let k = Kinematics::new(solutions.get(0).unwrap(), &detector, &sample);
        assert_relative_eq!(get_q(&k, &mode).unwrap(), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_q2_get_set() {
        let mut g = six_circle();
        g.set_axis_value("gamma", 0.2).unwrap();
        g.set_axis_value("delta", 0.5).unwrap();
        let detector = Detector::default();
        let sample = Sample::default();
        let mode = Mode::new("q2", &["gamma", "delta"]);
        let kin = Kinematics::new(&g, &detector, &sample);
        let [q, alpha] = get_q2(&kin);
        assert!(q > 0.0);

        g.set_axis_values(&[0.0; 6]).unwrap();
        g.set_axis_value("gamma", 0.1).unwrap();
        g.set_axis_value("delta", 0.3).unwrap();
        let start = Kinematics::new(&g, &detector, &sample);
        let mut solver = HybridSolver::with_defaults();
        let mut stats = SolveStats::default();
        let solutions = set_q2(&[q, alpha], &start, &mode, &mut solver, &mut stats).unwrap();
        let k = Kinematics::new(solutions.get(0).unwrap(), &detector, &sample);
        let [q_found, alpha_found] = get_q2(&k);
        assert_relative_eq!(q_found, q, epsilon = 1e-6);
        assert_relative_eq!(alpha_found, alpha, epsilon = 1e-6);
    }
}
