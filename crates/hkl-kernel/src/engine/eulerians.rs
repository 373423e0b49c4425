//! Eulerian omega, chi, phi of a kappa goniometer.

use crate::error::{HklError, Result};
use crate::geometry_list::GeometryList;
use crate::kappa::{eulerian_to_kappa, kappa_to_eulerian, KappaSolution, KAPPA_ALPHA};
use crate::kinematics::Kinematics;
use crate::mode::Mode;

fn kappa_axes(kin: &Kinematics, mode: &Mode) -> Result<[usize; 3]> {
    let indices = mode.write_indices(kin.geometry)?;
    <[usize; 3]>::try_from(indices.as_slice()).map_err(|_| {
        HklError::InvalidConfiguration(format!(
            "mode {} must move komega, kappa and kphi",
            mode.name()
        ))
    })
}

fn solution(mode: &Mode) -> Result<KappaSolution> {
    Ok(KappaSolution::from_value(mode.parameter("solution")?))
}

pub(super) fn get(kin: &Kinematics, mode: &Mode) -> Result<[f64; 3]> {
    let [komega, kappa, kphi] = kappa_axes(kin, mode)?.map(|i| kin.geometry.axes()[i].value());
    let (omega, chi, phi) = kappa_to_eulerian(komega, kappa, kphi, KAPPA_ALPHA, solution(mode)?);
    Ok([omega, chi, phi])
}

pub(super) fn set(values: &[f64], kin: &Kinematics, mode: &Mode) -> Result<GeometryList> {
    let indices = kappa_axes(kin, mode)?;
    let (komega, kappa, kphi) =
        eulerian_to_kappa(values[0], values[1], values[2], KAPPA_ALPHA, solution(mode)?)?;

    let mut geometry = kin.geometry.clone();
    geometry.set_values_at(&indices, &[komega, kappa, kphi])?;
    geometry.normalize_axes(&indices)?;
    let mut solutions = GeometryList::new();
    solutions.add(geometry);
    Ok(solutions)
}
