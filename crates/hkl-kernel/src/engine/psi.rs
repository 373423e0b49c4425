//! Azimuth of a reference reflection about the scattering vector.
//!
//! `set` keeps the hkl captured by [`initialize`] in diffraction condition
//! while turning the sample about Q.

use hkl_math::{vector, Vec3};
use hkl_solver::{NonlinearSolver, SolveStats};

use super::auto_solve;
use crate::error::{HklError, Result};
use crate::geometry_list::GeometryList;
use crate::kinematics::Kinematics;
use crate::mode::Mode;

fn reference(mode: &Mode) -> Result<Vec3> {
    Ok(Vec3::new(
        mode.parameter("h1")?,
        mode.parameter("k1")?,
        mode.parameter("l1")?,
    ))
}

/// The hkl in diffraction condition, which `set` will preserve.
pub(super) fn initialize(kin: &Kinematics) -> Result<Vec3> {
    if vector::is_null(&kin.q()) {
        return Err(HklError::Unreachable(
            "can not initialize the psi engine when Q is null".into(),
        ));
    }
    kin.hkl()
}

pub(super) fn get(kin: &Kinematics, mode: &Mode) -> Result<f64> {
    let hkl1 = reference(mode)?;
    kin.psi(&hkl1).ok_or_else(|| {
        HklError::Unreachable("psi is undefined when Q is null or colinear with <h1, k1, l1>".into())
    })
}

/// `hkl(x) − hkl0` and `psi − psi(x)`, all ones where undefined.
fn residual(kin: &Kinematics, hkl0: &Vec3, hkl1: &Vec3, psi: f64, f: &mut [f64]) {
    let q = kin.q();
    if vector::is_null(&q) {
        f.fill(1.0);
        return;
    }
    match kin.hkl() {
        Ok(hkl) => {
            let d = hkl - hkl0;
            f[0] = d.x;
            f[1] = d.y;
            f[2] = d.z;
        }
        Err(_) => f[..3].fill(f64::NAN),
    }
    f[3] = match kin.psi(hkl1) {
        Some(current) => psi - current,
        None => 1.0,
    };
}

pub(super) fn set(
    psi: f64,
    hkl0: &Vec3,
    kin: &Kinematics,
    mode: &Mode,
    solver: &mut dyn NonlinearSolver,
    stats: &mut SolveStats,
) -> Result<GeometryList> {
    let hkl1 = reference(mode)?;
    let indices = mode.write_indices(kin.geometry)?;
    let solved = auto_solve(kin, &indices, 4, solver, stats, |k, f| {
        residual(k, hkl0, &hkl1, psi, f)
    })?;
    let mut solutions = GeometryList::new();
    solutions.add(solved);
    Ok(solutions)
}
