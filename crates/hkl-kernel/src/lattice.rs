//! Crystal lattices and the B matrix.

use hkl_math::{Mat3, EPSILON, TAU};

use crate::error::{HklError, Result};

/// Unit cell: lengths in ångströms, angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lattice {
    a: f64,
    b: f64,
    c: f64,
    alpha: f64,
    beta: f64,
    gamma: f64,
}

impl Lattice {
    /// Create a lattice. Lengths must be positive and the angles must close
    /// a cell (`D > 0`).
    pub fn new(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Result<Self> {
        for (name, length) in [("a", a), ("b", b), ("c", c)] {
            if !(length.is_finite() && length > 0.0) {
                return Err(HklError::InvalidLattice(format!(
                    "{name} must be a positive length, got {length}"
                )));
            }
        }
        if ![alpha, beta, gamma].iter().all(|x| x.is_finite()) {
            return Err(HklError::InvalidLattice("angles must be finite".into()));
        }
        let lattice = Self { a, b, c, alpha, beta, gamma };
        if lattice.d() < EPSILON {
            return Err(HklError::InvalidLattice(
                "these lattice parameters are not valid, check alpha, beta and gamma".into(),
            ));
        }
        Ok(lattice)
    }

    /// Same as [`new`](Self::new) with angles in degrees.
    pub fn from_degrees(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Result<Self> {
        Self::new(a, b, c, alpha.to_radians(), beta.to_radians(), gamma.to_radians())
    }

    /// Cubic cell of side `a`.
    pub fn cubic(a: f64) -> Result<Self> {
        use std::f64::consts::FRAC_PI_2;
        Self::new(a, a, a, FRAC_PI_2, FRAC_PI_2, FRAC_PI_2)
    }

    /// `(a, b, c)` in ångströms.
    pub fn lengths(&self) -> (f64, f64, f64) {
        (self.a, self.b, self.c)
    }

    /// `(α, β, γ)` in radians.
    pub fn angles(&self) -> (f64, f64, f64) {
        (self.alpha, self.beta, self.gamma)
    }

    fn d(&self) -> f64 {
        let (ca, cb, cg) = (self.alpha.cos(), self.beta.cos(), self.gamma.cos());
        1.0 - ca * ca - cb * cb - cg * cg + 2.0 * ca * cb * cg
    }

    /// Upper-triangular matrix mapping Miller indices to the crystal
    /// orthonormal frame (scaled by TAU).
    pub fn b_matrix(&self) -> Mat3 {
        let d = self.d().sqrt();
        let (sa, ca) = self.alpha.sin_cos();
        let (sb, cb) = self.beta.sin_cos();
        let (sg, cg) = self.gamma.sin_cos();

        let b11 = TAU / (self.b * sa);
        let b22 = TAU / self.c;
        let tmp = b22 / sa;

        Mat3::new(
            TAU * sa / (self.a * d),
            b11 / d * (ca * cb - cg),
            tmp / d * (cg * ca - cb),
            0.0,
            b11,
            tmp / (sb * sg) * (cb * cg - ca),
            0.0,
            0.0,
            b22,
        )
    }

    /// Reciprocal lattice (lengths scaled by TAU).
    pub fn reciprocal(&self) -> Lattice {
        let d = self.d().sqrt();
        let (sa, ca) = self.alpha.sin_cos();
        let (sb, cb) = self.beta.sin_cos();
        let (sg, cg) = self.gamma.sin_cos();

        let (sbsg, sgsa, sasb) = (sb * sg, sg * sa, sa * sb);
        Lattice {
            a: TAU * sa / (self.a * d),
            b: TAU * sb / (self.b * d),
            c: TAU * sg / (self.c * d),
            alpha: (d / sbsg).atan2((cb * cg - ca) / sbsg),
            beta: (d / sgsa).atan2((cg * ca - cb) / sgsa),
            gamma: (d / sasb).atan2((ca * cb - cg) / sasb),
        }
    }

    /// Cell volume in Å³.
    pub fn volume(&self) -> f64 {
        self.a * self.b * self.c * self.d().sqrt()
    }
}

impl Default for Lattice {
    fn default() -> Self {
        use std::f64::consts::FRAC_PI_2;
        Self {
            a: 1.54,
            b: 1.54,
            c: 1.54,
            alpha: FRAC_PI_2,
            beta: FRAC_PI_2,
            gamma: FRAC_PI_2,
        }
    }
}
