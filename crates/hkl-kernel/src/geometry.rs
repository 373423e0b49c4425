//! Axes, holders and source of a diffractometer.
//!
//! Holder 0 carries the sample, holder 1 carries the detector. Holders
//! refer to axes by index, so an axis listed in several holders (the `mu`
//! circle of a six-circle) is one shared value.

use serde::{Deserialize, Serialize};
use tracing::trace;

use hkl_math::{normalize_angle, Vec3, EPSILON, TAU};

use crate::axis::{Axis, AxisKind};
use crate::error::{HklError, Result};
use crate::holder::Holder;
use crate::source::Source;

/// Builder for a [`Geometry`].
///
/// ```
/// use hkl_kernel::GeometryBuilder;
/// use hkl_math::Vec3;
///
/// let geometry = GeometryBuilder::new("TWOC")
///     .holder(&[("omega", Vec3::new(0.0, -1.0, 0.0))])
///     .holder(&[("tth", Vec3::new(0.0, -1.0, 0.0))])
///     .build()
///     .unwrap();
/// assert_eq!(geometry.axis_names(), vec!["omega", "tth"]);
/// ```
#[derive(Debug, Clone)]
pub struct GeometryBuilder {
    name: String,
    source: Source,
    holders: Vec<Vec<(String, Vec3, AxisKind)>>,
}

impl GeometryBuilder {
    /// Start a geometry with the default source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: Source::default(),
            holders: Vec::new(),
        }
    }

    /// Replace the source.
    pub fn source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    /// Append a holder made of rotation axes, outermost first.
    pub fn holder(mut self, axes: &[(&str, Vec3)]) -> Self {
        self.holders.push(
            axes.iter()
                .map(|(name, dir)| (name.to_string(), *dir, AxisKind::Rotation))
                .collect(),
        );
        self
    }

    /// Append a holder with explicit axis kinds.
    pub fn holder_with_kinds(mut self, axes: &[(&str, Vec3, AxisKind)]) -> Self {
        self.holders.push(
            axes.iter()
                .map(|(name, dir, kind)| (name.to_string(), *dir, *kind))
                .collect(),
        );
        self
    }

    /// Build the geometry. Needs a sample holder and a detector holder.
    pub fn build(self) -> Result<Geometry> {
        if self.holders.len() < 2 {
            return Err(HklError::InvalidConfiguration(format!(
                "{}: a geometry needs a sample holder and a detector holder",
                self.name
            )));
        }

        let mut axes: Vec<Axis> = Vec::new();
        let mut holders = Vec::with_capacity(self.holders.len());
        for holder_axes in &self.holders {
            let mut indices = Vec::with_capacity(holder_axes.len());
            for (name, direction, kind) in holder_axes {
                let axis = match kind {
                    AxisKind::Rotation => Axis::rotation(name, *direction)?,
                    AxisKind::Translation => Axis::translation(name, *direction)?,
                };
                let index = match axes.iter().position(|a| a.name() == name) {
                    Some(i) => {
                        let existing = &axes[i];
                        if existing.kind() != axis.kind()
                            || (existing.direction() - axis.direction()).norm() > EPSILON
                        {
                            return Err(HklError::InvalidConfiguration(format!(
                                "{}: axis {name} is shared with a different direction",
                                self.name
                            )));
                        }
                        i
                    }
                    None => {
                        axes.push(axis);
                        axes.len() - 1
                    }
                };
                indices.push(index);
            }
            holders.push(Holder::new(indices));
        }

        let mut geometry = Geometry {
            name: self.name,
            source: self.source,
            axes,
            holders,
            generation: 0,
        };
        for holder in &mut geometry.holders {
            holder.recompute(&geometry.axes);
        }
        geometry.clear_changed();
        Ok(geometry)
    }
}

/// A configured diffractometer: axes, holders and source.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    name: String,
    source: Source,
    axes: Vec<Axis>,
    holders: Vec<Holder>,
    generation: u64,
}

impl Geometry {
    /// Diffractometer type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The incident beam.
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Wavelength in ångströms.
    pub fn wavelength(&self) -> f64 {
        self.source.wavelength()
    }

    /// Change the wavelength.
    pub fn set_wavelength(&mut self, wavelength: f64) -> Result<()> {
        self.source.set_wavelength(wavelength)?;
        self.generation += 1;
        Ok(())
    }

    /// Incident wave vector.
    pub fn ki(&self) -> Vec3 {
        self.source.ki()
    }

    /// All axes, in declaration order.
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Axis names, in declaration order.
    pub fn axis_names(&self) -> Vec<&str> {
        self.axes.iter().map(Axis::name).collect()
    }

    /// Axis values (radians for rotations), in declaration order.
    pub fn axis_values(&self) -> Vec<f64> {
        self.axes.iter().map(Axis::value).collect()
    }

    /// Index of the axis called `name`.
    pub fn axis_index(&self, name: &str) -> Result<usize> {
        self.axes
            .iter()
            .position(|a| a.name() == name)
            .ok_or_else(|| HklError::UnknownAxis(name.to_string()))
    }

    /// The axis called `name`.
    pub fn axis(&self, name: &str) -> Result<&Axis> {
        self.axis_index(name).map(|i| &self.axes[i])
    }

    /// Set one axis by name.
    pub fn set_axis_value(&mut self, name: &str, value: f64) -> Result<()> {
        let index = self.axis_index(name)?;
        self.set_axis_value_by_index(index, value)
    }

    /// Set one axis by index.
    pub fn set_axis_value_by_index(&mut self, index: usize, value: f64) -> Result<()> {
        let axis = self
            .axes
            .get_mut(index)
            .ok_or_else(|| HklError::UnknownAxis(format!("#{index}")))?;
        axis.parameter_mut().set_value(value)?;
        self.update();
        Ok(())
    }

    /// Set every axis at once (internal units, declaration order).
    pub fn set_axis_values(&mut self, values: &[f64]) -> Result<()> {
        self.check_len(values)?;
        // validate everything before touching the axes
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(HklError::InvalidParameter(format!("{v} is not a finite value")));
        }
        for (axis, &value) in self.axes.iter_mut().zip(values) {
            axis.parameter_mut().set_value(value)?;
        }
        self.update();
        Ok(())
    }

    /// Set every axis at once from user units (degrees for rotations).
    pub fn set_axis_values_in_user_unit(&mut self, values: &[f64]) -> Result<()> {
        self.check_len(values)?;
        let mut internal = Vec::with_capacity(values.len());
        for (axis, &value) in self.axes.iter().zip(values) {
            let mut p = axis.parameter().clone();
            p.set_value_in_user_unit(value)?;
            internal.push(p.value());
        }
        self.set_axis_values(&internal)
    }

    /// Change the range of an axis, in user units.
    pub fn set_axis_range_in_user_unit(&mut self, name: &str, min: f64, max: f64) -> Result<()> {
        let index = self.axis_index(name)?;
        self.axes[index].parameter_mut().set_range_in_user_unit(min, max)
    }

    /// Set the axes at `indices` to `values`.
    pub(crate) fn set_values_at(&mut self, indices: &[usize], values: &[f64]) -> Result<()> {
        for (&i, &v) in indices.iter().zip(values) {
            self.axes[i].parameter_mut().set_value(v)?;
        }
        self.update();
        Ok(())
    }

    /// Map the rotation axes at `indices` into (−π, π].
    pub(crate) fn normalize_axes(&mut self, indices: &[usize]) -> Result<()> {
        for &i in indices {
            let axis = &mut self.axes[i];
            if axis.kind() == AxisKind::Rotation {
                let value = normalize_angle(axis.value());
                axis.parameter_mut().set_value(value)?;
            }
        }
        self.update();
        Ok(())
    }

    fn check_len(&self, values: &[f64]) -> Result<()> {
        if values.len() != self.axes.len() {
            return Err(HklError::InvalidParameter(format!(
                "{} expects {} axis values, got {}",
                self.name,
                self.axes.len(),
                values.len()
            )));
        }
        Ok(())
    }

    /// All holders. Holder 0 is the sample holder, holder 1 the detector holder.
    pub fn holders(&self) -> &[Holder] {
        &self.holders
    }

    /// Holder `index`, if present.
    pub fn holder(&self, index: usize) -> Option<&Holder> {
        self.holders.get(index)
    }

    /// The holder carrying the sample.
    pub fn sample_holder(&self) -> &Holder {
        &self.holders[0]
    }

    /// The holder carrying the detector.
    pub fn detector_holder(&self) -> &Holder {
        &self.holders[1]
    }

    /// Counter bumped on every mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Recompute the holders whose axes changed, then clear the flags.
    pub fn update(&mut self) {
        let mut dirty = false;
        for holder in &mut self.holders {
            if holder.is_dirty(&self.axes) {
                holder.recompute(&self.axes);
                dirty = true;
            }
        }
        if dirty || self.axes.iter().any(|a| a.parameter().changed()) {
            self.generation += 1;
            trace!(geometry = %self.name, generation = self.generation, "holders updated");
        }
        self.clear_changed();
    }

    fn clear_changed(&mut self) {
        for axis in &mut self.axes {
            axis.parameter_mut().clear_changed();
        }
    }

    /// Sum of absolute axis differences with `other`.
    pub fn distance(&self, other: &Geometry) -> f64 {
        self.axes
            .iter()
            .zip(&other.axes)
            .map(|(a, b)| (a.value() - b.value()).abs())
            .sum()
    }

    /// Euclidean norm of the axis differences with `other`. Solutions are
    /// ranked by this distance.
    pub fn distance_euclidean(&self, other: &Geometry) -> f64 {
        self.axes
            .iter()
            .zip(&other.axes)
            .map(|(a, b)| (a.value() - b.value()).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Like [`distance`](Self::distance), but rotation differences take the
    /// shorter way around the circle.
    pub fn distance_orthodromic(&self, other: &Geometry) -> f64 {
        self.axes
            .iter()
            .zip(&other.axes)
            .map(|(a, b)| {
                let d = (a.value() - b.value()).abs();
                match a.kind() {
                    AxisKind::Rotation => {
                        let d = d % TAU;
                        d.min(TAU - d)
                    }
                    AxisKind::Translation => d,
                }
            })
            .sum()
    }

    /// Whether every axis lies inside its range.
    pub fn is_valid(&self) -> bool {
        self.axes.iter().all(|a| a.parameter().is_in_range())
    }

    /// Serializable view of the axis values, in user units.
    pub fn snapshot(&self) -> GeometrySnapshot {
        GeometrySnapshot {
            name: self.name.clone(),
            wavelength: self.wavelength(),
            axes: self
                .axes
                .iter()
                .map(|a| AxisValue {
                    name: a.name().to_string(),
                    value: a.parameter().value_in_user_unit(),
                })
                .collect(),
        }
    }
}

/// One axis value of a [`GeometrySnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisValue {
    /// Axis name.
    pub name: String,
    /// Value in user units (degrees for rotations).
    pub value: f64,
}

/// Export form of a geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometrySnapshot {
    /// Diffractometer type name.
    pub name: String,
    /// Wavelength in ångströms.
    pub wavelength: f64,
    /// Axis values in declaration order.
    pub axes: Vec<AxisValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn three_axes() -> Geometry {
        GeometryBuilder::new("TEST")
            .holder(&[("mu", Vec3::z()), ("omega", -Vec3::y())])
            .holder(&[("mu", Vec3::z()), ("delta", -Vec3::y())])
            .build()
            .unwrap()
    }

    #[test]
    fn test_shared_axes() {
        let g = three_axes();
        assert_eq!(g.axis_names(), vec!["mu", "omega", "delta"]);
        assert_eq!(g.sample_holder().axes(), &[0, 1]);
        assert_eq!(g.detector_holder().axes(), &[0, 2]);
    }

    #[test]
    fn test_shared_axis_direction_mismatch() {
        let err = GeometryBuilder::new("BAD")
            .holder(&[("mu", Vec3::z())])
            .holder(&[("mu", Vec3::y())])
            .build()
            .unwrap_err();
        assert!(matches!(err, HklError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_missing_detector_holder() {
        let err = GeometryBuilder::new("BAD")
            .holder(&[("omega", Vec3::z())])
            .build()
            .unwrap_err();
        assert!(matches!(err, HklError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_update_on_mutation() {
        let mut g = three_axes();
        let generation = g.generation();
        g.set_axis_value("mu", FRAC_PI_2).unwrap();
        assert!(g.generation() > generation);
        // both holders carry mu
        let v = g.detector_holder().quaternion().rotate(&Vec3::x());
        assert!((v - Vec3::y()).norm() < 1e-12);
        let v = g.sample_holder().quaternion().rotate(&Vec3::x());
        assert!((v - Vec3::y()).norm() < 1e-12);
        assert!(g.axes().iter().all(|a| !a.parameter().changed()));
    }

    #[test]
    fn test_set_axis_values() {
        let mut g = three_axes();
        assert!(g.set_axis_values(&[0.0, 0.1]).is_err());
        assert!(g.set_axis_values(&[0.0, f64::NAN, 0.0]).is_err());
        assert_eq!(g.axis_values(), vec![0.0, 0.0, 0.0]);
        g.set_axis_values_in_user_unit(&[0.0, 90.0, -180.0]).unwrap();
        let values = g.axis_values();
        assert!((values[1] - FRAC_PI_2).abs() < 1e-12);
        assert!((values[2] + PI).abs() < 1e-12);
        assert!(matches!(g.set_axis_value("chi", 0.0), Err(HklError::UnknownAxis(_))));
    }

    #[test]
    fn test_distance() {
        let g1 = three_axes();
        let mut g2 = three_axes();
        assert_eq!(g1.distance(&g2), 0.0);
        g2.set_axis_values(&[1.0, 1.0, 1.0]).unwrap();
        assert!((g1.distance(&g2) - 3.0).abs() < 1e-12);
        assert!((g1.distance_euclidean(&g2) - 3f64.sqrt()).abs() < 1e-12);

        g2.set_axis_values(&[-PI + 0.1, 0.0, 0.0]).unwrap();
        let mut g3 = three_axes();
        g3.set_axis_values(&[PI - 0.1, 0.0, 0.0]).unwrap();
        assert!((g3.distance_orthodromic(&g2) - 0.2).abs() < 1e-12);
        assert!((g3.distance(&g2) - (TAU - 0.2)).abs() < 1e-12);
    }

    #[test]
    fn test_is_valid_and_snapshot() {
        let mut g = three_axes();
        g.set_axis_value("omega", 4.0).unwrap();
        assert!(!g.is_valid());
        g.normalize_axes(&[1]).unwrap();
        assert!(g.is_valid());
        assert!((g.axis_values()[1] - (4.0 - TAU)).abs() < 1e-12);

        g.set_axis_value("delta", FRAC_PI_2).unwrap();
        let snapshot = g.snapshot();
        assert_eq!(snapshot.name, "TEST");
        assert_eq!(snapshot.axes[2].name, "delta");
        assert!((snapshot.axes[2].value - 90.0).abs() < 1e-9);
    }
}
