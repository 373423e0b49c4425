//! Physical motors of a diffractometer.

use hkl_math::{Quaternion, Vec3, EPSILON};

use crate::error::{HklError, Result};
use crate::parameter::{Parameter, Unit};

/// What an axis does to the frames it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisKind {
    /// Rotation about the axis direction (value in radians).
    Rotation,
    /// Translation along the axis direction (value in millimeters).
    Translation,
}

/// A motor: a [`Parameter`] plus a kind and a unit direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    parameter: Parameter,
    kind: AxisKind,
    direction: Vec3,
}

impl Axis {
    /// A rotation axis about `direction`, range [−π, π].
    pub fn rotation(name: &str, direction: Vec3) -> Result<Self> {
        Self::with_kind(Parameter::angle(name, 0.0), AxisKind::Rotation, direction)
    }

    /// A translation axis along `direction`, range [−1000, 1000] mm.
    pub fn translation(name: &str, direction: Vec3) -> Result<Self> {
        let parameter = Parameter::new(name, 0.0, -1000.0, 1000.0, Unit::Millimeter, Unit::Millimeter);
        Self::with_kind(parameter, AxisKind::Translation, direction)
    }

    fn with_kind(parameter: Parameter, kind: AxisKind, direction: Vec3) -> Result<Self> {
        let norm = direction.norm();
        if norm < EPSILON || !norm.is_finite() {
            return Err(HklError::InvalidConfiguration(format!(
                "axis {} has a null direction",
                parameter.name()
            )));
        }
        Ok(Self {
            parameter,
            kind,
            direction: direction / norm,
        })
    }

    /// Axis name.
    pub fn name(&self) -> &str {
        self.parameter.name()
    }

    /// Rotation or translation.
    pub fn kind(&self) -> AxisKind {
        self.kind
    }

    /// Unit direction.
    pub fn direction(&self) -> &Vec3 {
        &self.direction
    }

    /// Current value (radians or millimeters).
    pub fn value(&self) -> f64 {
        self.parameter.value()
    }

    /// Underlying parameter.
    pub fn parameter(&self) -> &Parameter {
        &self.parameter
    }

    /// Mutable access to the underlying parameter.
    pub(crate) fn parameter_mut(&mut self) -> &mut Parameter {
        &mut self.parameter
    }

    /// Rotation applied by this axis. Identity for translations.
    pub fn quaternion(&self) -> Quaternion {
        match self.kind {
            AxisKind::Rotation => {
                let (s, c) = (self.value() / 2.0).sin_cos();
                let d = self.direction * s;
                Quaternion::new(c, d.x, d.y, d.z)
            }
            AxisKind::Translation => Quaternion::identity(),
        }
    }

    /// Displacement applied by this axis. Zero for rotations.
    pub fn translation_vector(&self) -> Vec3 {
        match self.kind {
            AxisKind::Rotation => Vec3::zeros(),
            AxisKind::Translation => self.direction * self.value(),
        }
    }
}
