//! Conversions between kappa and eulerian angles.
//!
//! A kappa goniometer replaces the chi circle by an axis tilted by α from
//! the omega axis. Every kappa setting has two eulerian equivalents
//! (solutions 0 and 1); an eulerian setting is reachable only when
//! `|χ| ≤ 2α`.

use std::f64::consts::FRAC_PI_2;

use crate::error::{HklError, Result};

/// Tilt of the kappa axis used by the built-in kappa geometries.
pub const KAPPA_ALPHA: f64 = 50.0 * std::f64::consts::PI / 180.0;

/// Which of the two equivalent eulerian settings to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KappaSolution {
    /// Negative chi for positive kappa.
    Zero,
    /// Positive chi for positive kappa.
    #[default]
    One,
}

impl KappaSolution {
    /// Solution selected by a numeric parameter value (0 or 1).
    pub fn from_value(value: f64) -> Self {
        if value < 0.5 {
            KappaSolution::Zero
        } else {
            KappaSolution::One
        }
    }
}

/// `(omega, chi, phi)` equivalent to `(komega, kappa, kphi)`.
pub fn kappa_to_eulerian(
    komega: f64,
    kappa: f64,
    kphi: f64,
    alpha: f64,
    solution: KappaSolution,
) -> (f64, f64, f64) {
    let p = ((kappa / 2.0).tan() * alpha.cos()).atan();
    let chi = 2.0 * ((kappa / 2.0).sin() * alpha.sin()).asin();
    match solution {
        KappaSolution::One => (komega + p - FRAC_PI_2, chi, kphi + p + FRAC_PI_2),
        KappaSolution::Zero => (komega + p + FRAC_PI_2, -chi, kphi + p - FRAC_PI_2),
    }
}

/// `(komega, kappa, kphi)` equivalent to `(omega, chi, phi)`.
pub fn eulerian_to_kappa(
    omega: f64,
    chi: f64,
    phi: f64,
    alpha: f64,
    solution: KappaSolution,
) -> Result<(f64, f64, f64)> {
    if chi.abs() > 2.0 * alpha + hkl_math::EPSILON {
        return Err(HklError::Unreachable(format!(
            "chi {:.4}° is out of the kappa range ±{:.4}°",
            chi.to_degrees(),
            (2.0 * alpha).to_degrees()
        )));
    }
    let ratio = ((chi / 2.0).sin() / alpha.sin()).clamp(-1.0, 1.0);
    let p = ((chi / 2.0).tan() / alpha.tan()).clamp(-1.0, 1.0).asin();
    let kappa = 2.0 * ratio.asin();
    Ok(match solution {
        KappaSolution::One => (omega - p + FRAC_PI_2, kappa, phi - p - FRAC_PI_2),
        KappaSolution::Zero => (omega + p - FRAC_PI_2, -kappa, phi + p + FRAC_PI_2),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geometry, GeometryBuilder};
    use approx::assert_relative_eq;
    use hkl_math::Vec3;

    fn sample_matrix(geometry: &Geometry) -> hkl_math::Mat3 {
        geometry.sample_holder().quaternion().to_matrix()
    }

    #[test]
    fn test_round_trip() {
        for solution in [KappaSolution::Zero, KappaSolution::One] {
            for &(komega, kappa, kphi) in &[(0.3, 0.7, -0.4), (1.0, -1.2, 2.0), (0.1, 2.5, 0.3)] {
                let (omega, chi, phi) = kappa_to_eulerian(komega, kappa, kphi, KAPPA_ALPHA, solution);
                let (ko, k, kp) = eulerian_to_kappa(omega, chi, phi, KAPPA_ALPHA, solution).unwrap();
                assert_relative_eq!(ko, komega, epsilon = 1e-9);
                assert_relative_eq!(k, kappa, epsilon = 1e-9);
                assert_relative_eq!(kp, kphi, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_chi_out_of_range() {
        let err = eulerian_to_kappa(0.0, 101f64.to_radians(), 0.0, KAPPA_ALPHA, KappaSolution::One);
        assert!(matches!(err, Err(HklError::Unreachable(_))));
        assert!(eulerian_to_kappa(0.0, 99f64.to_radians(), 0.0, KAPPA_ALPHA, KappaSolution::One).is_ok());
    }

    #[test]
    fn test_same_sample_orientation() {
        let (s, c) = KAPPA_ALPHA.sin_cos();
        let mut kappa = GeometryBuilder::new("K")
            .holder(&[
                ("komega", -Vec3::y()),
                ("kappa", Vec3::new(0.0, -c, -s)),
                ("kphi", -Vec3::y()),
            ])
            .holder(&[("tth", -Vec3::y())])
            .build()
            .unwrap();
        let mut eulerian = GeometryBuilder::new("E")
            .holder(&[("omega", -Vec3::y()), ("chi", Vec3::x()), ("phi", -Vec3::y())])
            .holder(&[("tth", -Vec3::y())])
            .build()
            .unwrap();

        for solution in [KappaSolution::Zero, KappaSolution::One] {
            let (komega, k, kphi) = (0.3, -1.2, 2.0);
            kappa.set_axis_values(&[komega, k, kphi, 0.0]).unwrap();
            let (omega, chi, phi) = kappa_to_eulerian(komega, k, kphi, KAPPA_ALPHA, solution);
            eulerian.set_axis_values(&[omega, chi, phi, 0.0]).unwrap();
            assert!((sample_matrix(&kappa) - sample_matrix(&eulerian)).norm() < 1e-9);
        }
    }
}
