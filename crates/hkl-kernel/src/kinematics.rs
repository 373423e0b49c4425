//! Wave vectors and sample rotation of one geometry/detector/sample triple.

use std::f64::consts::FRAC_PI_2;

use hkl_math::{matrix, vector, Mat3, Vec3};

use crate::detector::Detector;
use crate::error::Result;
use crate::geometry::Geometry;
use crate::sample::Sample;

/// Borrowed view used by the engines to evaluate pseudo-axes.
#[derive(Clone, Copy)]
pub(crate) struct Kinematics<'a> {
    pub geometry: &'a Geometry,
    pub detector: &'a Detector,
    pub sample: &'a Sample,
}

impl<'a> Kinematics<'a> {
    pub fn new(geometry: &'a Geometry, detector: &'a Detector, sample: &'a Sample) -> Self {
        Self {
            geometry,
            detector,
            sample,
        }
    }

    /// Wave number `TAU / λ`.
    pub fn k(&self) -> f64 {
        self.geometry.source().k()
    }

    pub fn ki(&self) -> Vec3 {
        self.geometry.ki()
    }

    pub fn kf(&self) -> Vec3 {
        self.detector.kf(self.geometry)
    }

    /// Scattering vector `kf − ki` in the lab frame.
    pub fn q(&self) -> Vec3 {
        self.kf() - self.ki()
    }

    /// Rotation of the sample holder.
    pub fn rotation(&self) -> Mat3 {
        self.geometry.sample_holder().quaternion().to_matrix()
    }

    /// `R·U·B`.
    pub fn rub(&self) -> Mat3 {
        self.rotation() * self.sample.ub()
    }

    /// Lab-frame scattering vector of reflection `hkl`.
    pub fn lab_hkl(&self, hkl: &Vec3) -> Vec3 {
        self.rub() * hkl
    }

    /// Miller indices currently in diffraction condition.
    pub fn hkl(&self) -> Result<Vec3> {
        Ok(matrix::solve(&self.rub(), &self.q())?)
    }

    /// Sample-frame vector `n` in the lab frame.
    pub fn surface(&self, n: &Vec3) -> Vec3 {
        self.geometry.sample_holder().quaternion().rotate(n)
    }

    /// Azimuth of reflection `reference` about the scattering vector,
    /// measured from the intersection of the scattering plane and the
    /// plane normal to Q.
    ///
    /// `None` when Q is null or colinear with `reference`.
    pub fn psi(&self, reference: &Vec3) -> Option<f64> {
        let ki = self.ki();
        let kf = self.kf();
        let q = kf - ki;
        if vector::is_null(&q) {
            return None;
        }
        let q = q.normalize();
        let n = kf.cross(&ki).cross(&q);
        let projected = vector::project_on_plane(&self.lab_hkl(reference), &q);
        if vector::is_null(&projected) {
            return None;
        }
        Some(vector::oriented_angle(&n, &projected, &q))
    }

    /// Angle between the incident beam and the surface of normal `n`.
    pub fn incidence(&self, n: &Vec3) -> f64 {
        vector::angle(&self.surface(n), &self.ki()) - FRAC_PI_2
    }

    /// Angle between the scattered beam and the surface of normal `n`.
    pub fn emergence(&self, n: &Vec3) -> f64 {
        FRAC_PI_2 - vector::angle(&self.surface(n), &self.kf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryBuilder;
    use crate::lattice::Lattice;

    #[test]
    fn test_hkl_of_e4cv_setting() {
        let mut g = GeometryBuilder::new("E4CV")
            .holder(&[("omega", -Vec3::y()), ("chi", Vec3::x()), ("phi", -Vec3::y())])
            .holder(&[("tth", -Vec3::y())])
            .build()
            .unwrap();
        let detector = Detector::default();
        let sample = Sample::new("cubic", Lattice::cubic(1.54).unwrap());

        g.set_axis_values_in_user_unit(&[30.0, 0.0, 0.0, 60.0]).unwrap();
        let hkl = Kinematics::new(&g, &detector, &sample).hkl().unwrap();
        assert!((hkl - Vec3::new(0.0, 0.0, 1.0)).norm() < 1e-9);

        g.set_axis_values_in_user_unit(&[45.0, 0.0, 135.0, 90.0]).unwrap();
        let kin = Kinematics::new(&g, &detector, &sample);
        let hkl = kin.hkl().unwrap();
        assert!((hkl - Vec3::new(1.0, 0.0, -1.0)).norm() < 1e-9);
        assert!((kin.lab_hkl(&hkl) - kin.q()).norm() < 1e-9);
    }
}
