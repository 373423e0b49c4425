//! Named, bounded scalar degrees of freedom.

use serde::{Deserialize, Serialize};

use hkl_solver::Bounds;

use crate::error::{HklError, Result};

/// Physical unit of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Dimensionless (Miller indices, vector components).
    None,
    /// Angle in radians.
    Radian,
    /// Angle in degrees.
    Degree,
    /// Length in nanometers.
    Nanometer,
    /// Length in ångströms.
    Angstrom,
    /// Length in millimeters.
    Millimeter,
}

impl Unit {
    /// Factor converting a value in this unit to the base unit of its
    /// dimension (radian for angles, ångström for lengths).
    fn factor(self) -> f64 {
        match self {
            Unit::None | Unit::Radian | Unit::Angstrom => 1.0,
            Unit::Degree => std::f64::consts::PI / 180.0,
            Unit::Nanometer => 10.0,
            Unit::Millimeter => 1e7,
        }
    }

    /// Short symbol for display.
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::None => "",
            Unit::Radian => "rad",
            Unit::Degree => "°",
            Unit::Nanometer => "nm",
            Unit::Angstrom => "Å",
            Unit::Millimeter => "mm",
        }
    }
}

/// A named scalar with a range, a fit flag, a unit pair and a changed flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    value: f64,
    min: f64,
    max: f64,
    fit: bool,
    #[serde(skip)]
    changed: bool,
    unit: Unit,
    user_unit: Unit,
}

impl Parameter {
    /// Create a parameter. `value`, `min` and `max` are in `unit`.
    pub fn new(name: impl Into<String>, value: f64, min: f64, max: f64, unit: Unit, user_unit: Unit) -> Self {
        Self {
            name: name.into(),
            value,
            min,
            max,
            fit: true,
            changed: true,
            unit,
            user_unit,
        }
    }

    /// An angle stored in radians, shown in degrees, range [−π, π].
    pub fn angle(name: impl Into<String>, value: f64) -> Self {
        use std::f64::consts::PI;
        Self::new(name, value, -PI, PI, Unit::Radian, Unit::Degree)
    }

    /// A dimensionless value with the given range.
    pub fn scalar(name: impl Into<String>, value: f64, min: f64, max: f64) -> Self {
        Self::new(name, value, min, max, Unit::None, Unit::None)
    }

    /// Name of the parameter.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value in the internal unit.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the value (internal unit). Non-finite values are rejected.
    ///
    /// The range is not enforced here: solvers may wander outside it and
    /// out-of-range solutions are filtered afterwards.
    pub fn set_value(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(HklError::InvalidParameter(format!(
                "{}: {value} is not a finite value",
                self.name
            )));
        }
        self.value = value;
        self.changed = true;
        Ok(())
    }

    /// Current value converted to the user unit.
    pub fn value_in_user_unit(&self) -> f64 {
        self.value * self.unit.factor() / self.user_unit.factor()
    }

    /// Set the value from the user unit.
    pub fn set_value_in_user_unit(&mut self, value: f64) -> Result<()> {
        self.set_value(value * self.user_unit.factor() / self.unit.factor())
    }

    /// `(min, max)` in the internal unit.
    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Range as solver bounds.
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.min, self.max)
    }

    /// Change the range (internal unit).
    pub fn set_range(&mut self, min: f64, max: f64) -> Result<()> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(HklError::InvalidParameter(format!(
                "{}: invalid range [{min}, {max}]",
                self.name
            )));
        }
        self.min = min;
        self.max = max;
        Ok(())
    }

    /// Change the range from values in the user unit.
    pub fn set_range_in_user_unit(&mut self, min: f64, max: f64) -> Result<()> {
        let f = self.user_unit.factor() / self.unit.factor();
        self.set_range(min * f, max * f)
    }

    /// Whether the value lies within the range.
    pub fn is_in_range(&self) -> bool {
        self.value >= self.min && self.value <= self.max
    }

    /// Whether refinement procedures may vary this parameter.
    pub fn is_fit(&self) -> bool {
        self.fit
    }

    /// Set the fit flag.
    pub fn set_fit(&mut self, fit: bool) {
        self.fit = fit;
    }

    /// Whether the value changed since the owner last consumed it.
    pub fn changed(&self) -> bool {
        self.changed
    }

    pub(crate) fn clear_changed(&mut self) {
        self.changed = false;
    }

    /// Internal unit.
    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Unit used for display and user input.
    pub fn user_unit(&self) -> Unit {
        self.user_unit
    }
}

/// Value of the parameter called `name`, if present.
pub(crate) fn value_of(parameters: &[Parameter], name: &str) -> Option<f64> {
    parameters.iter().find(|p| p.name == name).map(|p| p.value)
}
