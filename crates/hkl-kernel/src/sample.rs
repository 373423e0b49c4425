//! Crystal samples: lattice, orientation and reflections.

use tracing::debug;

use hkl_math::{matrix, vector, Mat3, MathError, Vec3, EPSILON};

use crate::detector::Detector;
use crate::error::{HklError, Result};
use crate::geometry::Geometry;
use crate::lattice::Lattice;

/// A measured Bragg reflection.
#[derive(Debug, Clone, PartialEq)]
pub struct Reflection {
    hkl: Vec3,
    geometry: Geometry,
    detector: Detector,
    q: Vec3,
}

impl Reflection {
    /// Miller indices.
    pub fn hkl(&self) -> &Vec3 {
        &self.hkl
    }

    /// Geometry at which the reflection was measured.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Detector used for the measurement.
    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    /// Scattering vector in the sample frame.
    pub fn q(&self) -> &Vec3 {
        &self.q
    }
}

/// A crystal with its orientation on the sample holder.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    name: String,
    lattice: Lattice,
    u: Mat3,
    ub: Mat3,
    reflections: Vec<Reflection>,
}

impl Sample {
    /// A sample with identity orientation.
    pub fn new(name: impl Into<String>, lattice: Lattice) -> Self {
        Self {
            name: name.into(),
            ub: lattice.b_matrix(),
            lattice,
            u: Mat3::identity(),
            reflections: Vec::new(),
        }
    }

    /// Sample name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit cell.
    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// Replace the lattice and recompute UB.
    pub fn set_lattice(&mut self, lattice: Lattice) {
        self.lattice = lattice;
        self.ub = self.u * lattice.b_matrix();
    }

    /// Orientation matrix.
    pub fn u(&self) -> &Mat3 {
        &self.u
    }

    /// Set the orientation matrix. It must be a proper rotation.
    pub fn set_u(&mut self, u: Mat3) -> Result<()> {
        if (u.transpose() * u - Mat3::identity()).norm() > EPSILON || (u.determinant() - 1.0).abs() > EPSILON {
            return Err(HklError::InvalidParameter("U must be a rotation matrix".into()));
        }
        self.u = u;
        self.ub = u * self.lattice.b_matrix();
        Ok(())
    }

    /// Set U from Euler angles (radians), see [`matrix::from_euler`].
    pub fn set_u_from_euler(&mut self, x: f64, y: f64, z: f64) -> Result<()> {
        self.set_u(matrix::from_euler(x, y, z))
    }

    /// `U·B`.
    pub fn ub(&self) -> &Mat3 {
        &self.ub
    }

    /// Stored reflections.
    pub fn reflections(&self) -> &[Reflection] {
        &self.reflections
    }

    /// Record reflection `hkl` measured at `geometry`. Returns its index.
    pub fn add_reflection(&mut self, geometry: &Geometry, detector: &Detector, hkl: Vec3) -> Result<usize> {
        detector.validate(geometry)?;
        let r = geometry.sample_holder().quaternion();
        let q = r.conjugate().rotate(&(detector.kf(geometry) - geometry.ki()));
        self.reflections.push(Reflection {
            hkl,
            geometry: geometry.clone(),
            detector: *detector,
            q,
        });
        Ok(self.reflections.len() - 1)
    }

    /// Remove reflection `index`.
    pub fn remove_reflection(&mut self, index: usize) -> Result<Reflection> {
        self.check_index(index)?;
        Ok(self.reflections.remove(index))
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.reflections.len() {
            return Err(HklError::InvalidParameter(format!(
                "no reflection #{index}, the sample has {}",
                self.reflections.len()
            )));
        }
        Ok(())
    }

    /// Compute U from reflections `i` and `j` (Busing & Levy 1967).
    pub fn compute_ub_busing_levy(&mut self, i: usize, j: usize) -> Result<()> {
        self.check_index(i)?;
        self.check_index(j)?;
        let (r1, r2) = (&self.reflections[i], &self.reflections[j]);
        let b = self.lattice.b_matrix();

        let tc = matrix::from_two_vectors(&(b * r1.hkl), &(b * r2.hkl))
            .map_err(|e| singular("hkl", e))?;
        let tphi = matrix::from_two_vectors(&r1.q, &r2.q).map_err(|e| singular("q", e))?;

        self.u = tphi * tc.transpose();
        self.ub = self.u * b;
        debug!(sample = %self.name, i, j, "UB computed by Busing-Levy");
        Ok(())
    }

    /// Angle between the measured scattering vectors of two reflections.
    pub fn reflections_measured_angle(&self, i: usize, j: usize) -> Result<f64> {
        self.check_index(i)?;
        self.check_index(j)?;
        Ok(vector::angle(&self.reflections[i].q, &self.reflections[j].q))
    }

    /// Angle between two reflections computed from the lattice.
    pub fn reflections_theoretical_angle(&self, i: usize, j: usize) -> Result<f64> {
        self.check_index(i)?;
        self.check_index(j)?;
        let b = self.lattice.b_matrix();
        Ok(vector::angle(&(b * self.reflections[i].hkl), &(b * self.reflections[j].hkl)))
    }
}

impl Default for Sample {
    fn default() -> Self {
        Self::new("default", Lattice::default())
    }
}

fn singular(what: &str, err: MathError) -> HklError {
    HklError::Singular(format!("reflection {what} vectors: {err}"))
}
