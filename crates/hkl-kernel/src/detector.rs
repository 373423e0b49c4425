//! Point detectors.

use hkl_math::Vec3;

use crate::error::{HklError, Result};
use crate::geometry::Geometry;

/// Detector technology. Only point detectors are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectorKind {
    /// A single-pixel detector looking along the holder x axis.
    #[default]
    ZeroD,
}

/// A detector mounted on one holder of the geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detector {
    kind: DetectorKind,
    holder: usize,
}

impl Detector {
    /// A point detector on holder `holder`.
    pub fn new(kind: DetectorKind, holder: usize) -> Self {
        Self { kind, holder }
    }

    /// Detector technology.
    pub fn kind(&self) -> DetectorKind {
        self.kind
    }

    /// Index of the holder carrying the detector.
    pub fn holder(&self) -> usize {
        self.holder
    }

    /// Check that the holder exists in `geometry`.
    pub fn validate(&self, geometry: &Geometry) -> Result<()> {
        if geometry.holder(self.holder).is_none() {
            return Err(HklError::InvalidConfiguration(format!(
                "detector holder {} missing from {}",
                self.holder,
                geometry.name()
            )));
        }
        Ok(())
    }

    /// Scattered wave vector `kf`.
    ///
    /// # Panics
    ///
    /// When the holder is missing; [`validate`](Self::validate) first.
    pub fn kf(&self, geometry: &Geometry) -> Vec3 {
        match self.kind {
            DetectorKind::ZeroD => {
                let q = geometry.holders()[self.holder].quaternion();
                q.rotate(&Vec3::x()) * geometry.source().k()
            }
        }
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(DetectorKind::ZeroD, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryBuilder;
    use hkl_math::TAU;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_kf() {
        let mut g = GeometryBuilder::new("TEST")
            .holder(&[("omega", Vec3::z())])
            .holder(&[("a", Vec3::x()), ("b", Vec3::y())])
            .build()
            .unwrap();
        let detector = Detector::default();
        detector.validate(&g).unwrap();
        assert!((detector.kf(&g) - g.ki()).norm() < 1e-12);

        g.set_axis_value("a", FRAC_PI_2).unwrap();
        g.set_axis_value("b", FRAC_PI_2).unwrap();
        let kf = detector.kf(&g);
        assert!((kf - Vec3::new(0.0, TAU / 1.54, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn test_missing_holder() {
        let g = GeometryBuilder::new("TEST")
            .holder(&[("omega", Vec3::z())])
            .holder(&[("tth", Vec3::z())])
            .build()
            .unwrap();
        assert!(Detector::new(DetectorKind::ZeroD, 3).validate(&g).is_err());
    }
}
