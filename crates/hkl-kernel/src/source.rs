//! The incident beam.

use hkl_math::{Vec3, EPSILON, TAU};

use crate::error::{HklError, Result};

/// Default wavelength in ångströms (Cu Kα).
pub const DEFAULT_WAVELENGTH: f64 = 1.54;

/// A monochromatic source.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    wavelength: f64,
    direction: Vec3,
}

impl Source {
    /// Create a source. The wavelength is in ångströms and must be positive.
    pub fn new(wavelength: f64, direction: Vec3) -> Result<Self> {
        check_wavelength(wavelength)?;
        let norm = direction.norm();
        if norm < EPSILON || !norm.is_finite() {
            return Err(HklError::InvalidConfiguration(
                "source direction is null".into(),
            ));
        }
        Ok(Self {
            wavelength,
            direction: direction / norm,
        })
    }

    /// Wavelength in ångströms.
    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }

    /// Change the wavelength.
    pub fn set_wavelength(&mut self, wavelength: f64) -> Result<()> {
        check_wavelength(wavelength)?;
        self.wavelength = wavelength;
        Ok(())
    }

    /// Unit beam direction.
    pub fn direction(&self) -> &Vec3 {
        &self.direction
    }

    /// Wave number `TAU / λ`.
    pub fn k(&self) -> f64 {
        TAU / self.wavelength
    }

    /// Incident wave vector.
    pub fn ki(&self) -> Vec3 {
        self.direction * self.k()
    }
}

impl Default for Source {
    fn default() -> Self {
        Self {
            wavelength: DEFAULT_WAVELENGTH,
            direction: Vec3::x(),
        }
    }
}

fn check_wavelength(wavelength: f64) -> Result<()> {
    if wavelength.is_finite() && wavelength > 0.0 {
        Ok(())
    } else {
        Err(HklError::InvalidConfiguration(format!(
            "wavelength must be positive, got {wavelength}"
        )))
    }
}
