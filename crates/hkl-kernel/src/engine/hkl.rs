//! The hkl engine: Miller indices from and to axis positions.

use std::f64::consts::PI;

use tracing::debug;

use hkl_math::{vector, Vec3, TAU};
use hkl_solver::{NonlinearSolver, SolveStats};

use super::auto_solve;
use crate::error::{HklError, Result};
use crate::geometry::Geometry;
use crate::geometry_list::GeometryList;
use crate::kinematics::Kinematics;
use crate::mode::{Constraint, Mode};

/// `R·UB·hkl − (kf − ki)` followed by one row per constraint.
pub(super) fn residual(kin: &Kinematics, mode: &Mode, hkl: &Vec3, f: &mut [f64]) {
    let d = kin.lab_hkl(hkl) - kin.q();
    f[0] = d.x;
    f[1] = d.y;
    f[2] = d.z;
    for (row, constraint) in f[3..].iter_mut().zip(mode.constraints()) {
        *row = constraint.residual(kin, mode.parameters());
    }
}

/// Reject `hkl` when its scattering vector leaves the Ewald sphere.
pub(super) fn check_reachable(kin: &Kinematics, hkl: &Vec3) -> Result<()> {
    let q = (kin.sample.ub() * hkl).norm();
    let qmax = 2.0 * TAU / kin.geometry.wavelength();
    if q > qmax {
        debug!(?hkl, q, qmax, "hkl out of the Ewald sphere");
        return Err(HklError::Unreachable(
            "unreachable hkl, try to change the wavelength".into(),
        ));
    }
    Ok(())
}

pub(super) fn set(
    values: &[f64],
    kin: &Kinematics,
    mode: &Mode,
    solver: &mut dyn NonlinearSolver,
    stats: &mut SolveStats,
) -> Result<GeometryList> {
    let hkl = Vec3::new(values[0], values[1], values[2]);
    check_reachable(kin, &hkl)?;
    if mode
        .constraints()
        .iter()
        .any(|c| matches!(c, Constraint::EmergenceFixed { .. }))
    {
        mode.surface()?;
    }

    let indices = mode.write_indices(kin.geometry)?;
    let size = 3 + mode.constraints().len();
    let solved = auto_solve(kin, &indices, size, solver, stats, |k, f| {
        residual(k, mode, &hkl, f)
    })?;

    let mut solutions = GeometryList::new();
    solutions.add(solved);
    if mode.has_secondary_solutions() {
        add_secondary_solutions(&mut solutions, kin, mode, solver)?;
    }
    Ok(solutions)
}

/// For every solution, rotate Q by π about the last sample axis of the
/// mode until it meets the Ewald sphere again, then move the detector onto
/// the new kf.
fn add_secondary_solutions(
    solutions: &mut GeometryList,
    kin: &Kinematics,
    mode: &Mode,
    solver: &mut dyn NonlinearSolver,
) -> Result<()> {
    let geometry = kin.geometry;
    let sample_holder = geometry.sample_holder();
    let last = mode
        .axes_write()
        .iter()
        .filter_map(|name| geometry.axis_index(name).ok())
        .filter_map(|index| sample_holder.position(index))
        .max();
    let Some(last) = last else {
        return Ok(());
    };
    let fit = detector_unknowns(geometry, mode)?;

    let primaries: Vec<Geometry> = solutions.iter().cloned().collect();
    for primary in primaries {
        if let Some(candidate) = ewald_candidate(primary, kin, last, &fit, solver)? {
            if solutions.add(candidate) {
                debug!(mode = %mode.name(), "secondary solution added");
            }
        }
    }
    Ok(())
}

fn ewald_candidate(
    mut geometry: Geometry,
    kin: &Kinematics,
    last: usize,
    fit: &[usize],
    solver: &mut dyn NonlinearSolver,
) -> Result<Option<Geometry>> {
    let holder = geometry.sample_holder();
    let index = holder.axes()[last];
    let axis = &geometry.axes()[index];
    let direction = holder
        .partial_quaternion(geometry.axes(), last)
        .rotate(axis.direction());

    let (ki, q) = {
        let k = Kinematics::new(&geometry, kin.detector, kin.sample);
        (k.ki(), k.q())
    };
    if vector::is_colinear(&ki, &direction) {
        debug!(axis = %axis.name(), "ki colinear with the rotation axis, no secondary solution");
        return Ok(None);
    }

    let center = vector::project_on_plane_with_point(&(-ki), &direction, &q);
    let origin = vector::project_on_plane_with_point(&Vec3::zeros(), &direction, &q);
    let q2 = vector::rotated_around_line(&q, PI, &center, &origin);
    let angle = vector::oriented_angle_points(&q, &origin, &q2, &direction);
    let value = axis.value() + angle;

    geometry.set_values_at(&[index], &[value])?;
    geometry.normalize_axes(&[index])?;
    fit_detector(geometry, kin, fit, &(q2 + ki), solver)
}

/// Write axes of the mode carried by the detector holder only.
fn detector_unknowns(geometry: &Geometry, mode: &Mode) -> Result<Vec<usize>> {
    let sample = geometry.sample_holder();
    let detector = geometry.detector_holder();
    Ok(mode
        .write_indices(geometry)?
        .into_iter()
        .filter(|&i| detector.contains(i) && !sample.contains(i))
        .collect())
}

/// Move the detector axes in `fit` until `kf` reaches `target`, the sample
/// axes staying still.
fn fit_detector(
    geometry: Geometry,
    kin: &Kinematics,
    fit: &[usize],
    target: &Vec3,
    solver: &mut dyn NonlinearSolver,
) -> Result<Option<Geometry>> {
    if fit.is_empty() || fit.len() > 2 {
        debug!(unknowns = fit.len(), "detector fit skipped");
        return Ok(None);
    }
    let k = Kinematics::new(&geometry, kin.detector, kin.sample);
    let mut stats = SolveStats::default();
    let fitted = auto_solve(&k, fit, fit.len(), solver, &mut stats, |k, f| {
        let d = target - k.kf();
        f[0] = d.x.abs() + d.y.abs() + d.z.abs();
        if f.len() > 1 {
            f[1] = d.y.abs();
        }
    });
    match fitted {
        Ok(g) => Ok(Some(g)),
        Err(HklError::NonConvergence { iterations }) => {
            debug!(iterations, "detector fit failed, secondary solution rejected");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
