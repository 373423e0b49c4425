//! Unit quaternions used to compose axis rotations.

use std::ops::Mul;

use serde::{Deserialize, Serialize};

use crate::{normalize_angle, Mat3, MathError, Result, Vec3, EPSILON};

/// A quaternion `w + x·i + y·j + z·k`.
///
/// Rotations are represented by unit quaternions; the norm is checked
/// (in debug builds) wherever a quaternion is consumed as a rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    /// Scalar part.
    pub w: f64,
    /// i component.
    pub x: f64,
    /// j component.
    pub y: f64,
    /// k component.
    pub z: f64,
}

impl Quaternion {
    /// Create a quaternion from its four components.
    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation.
    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `angle` radians about `axis` (normalized here).
    pub fn from_angle_and_axis(angle: f64, axis: &Vec3) -> Result<Self> {
        let norm = axis.norm();
        if norm < EPSILON {
            return Err(MathError::NullVector);
        }
        let (s, c) = (angle / 2.0).sin_cos();
        let v = axis * (s / norm);
        Ok(Self::new(c, v.x, v.y, v.z))
    }

    /// Build the unit quaternion of a rotation matrix (Shepperd's method).
    pub fn from_matrix(m: &Mat3) -> Self {
        let trace = m[(0, 0)] + m[(1, 1)] + m[(2, 2)];
        if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Self::new(
                0.25 * s,
                (m[(2, 1)] - m[(1, 2)]) / s,
                (m[(0, 2)] - m[(2, 0)]) / s,
                (m[(1, 0)] - m[(0, 1)]) / s,
            )
        } else if m[(0, 0)] > m[(1, 1)] && m[(0, 0)] > m[(2, 2)] {
            let s = (1.0 + m[(0, 0)] - m[(1, 1)] - m[(2, 2)]).sqrt() * 2.0;
            Self::new(
                (m[(2, 1)] - m[(1, 2)]) / s,
                0.25 * s,
                (m[(0, 1)] + m[(1, 0)]) / s,
                (m[(0, 2)] + m[(2, 0)]) / s,
            )
        } else if m[(1, 1)] > m[(2, 2)] {
            let s = (1.0 + m[(1, 1)] - m[(0, 0)] - m[(2, 2)]).sqrt() * 2.0;
            Self::new(
                (m[(0, 2)] - m[(2, 0)]) / s,
                (m[(0, 1)] + m[(1, 0)]) / s,
                0.25 * s,
                (m[(1, 2)] + m[(2, 1)]) / s,
            )
        } else {
            let s = (1.0 + m[(2, 2)] - m[(0, 0)] - m[(1, 1)]).sqrt() * 2.0;
            Self::new(
                (m[(1, 0)] - m[(0, 1)]) / s,
                (m[(0, 2)] + m[(2, 0)]) / s,
                (m[(1, 2)] + m[(2, 1)]) / s,
                0.25 * s,
            )
        }
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f64 {
        self.norm_squared().sqrt()
    }

    /// Squared norm.
    pub fn norm_squared(&self) -> f64 {
        self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Conjugate, which is the inverse rotation for a unit quaternion.
    pub fn conjugate(&self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Scale to unit norm.
    pub fn normalize(&self) -> Result<Self> {
        let n = self.norm();
        if n < EPSILON {
            return Err(MathError::NullVector);
        }
        Ok(Self::new(self.w / n, self.x / n, self.y / n, self.z / n))
    }

    /// Rotation matrix of this unit quaternion.
    pub fn to_matrix(&self) -> Mat3 {
        debug_assert!(
            (self.norm_squared() - 1.0).abs() < EPSILON,
            "quaternion used as a rotation must be unit"
        );
        let (w, x, y, z) = (self.w, self.x, self.y, self.z);
        Mat3::new(
            w * w + x * x - y * y - z * z,
            2.0 * (x * y - w * z),
            2.0 * (x * z + w * y),
            2.0 * (x * y + w * z),
            w * w - x * x + y * y - z * z,
            2.0 * (y * z - w * x),
            2.0 * (x * z - w * y),
            2.0 * (y * z + w * x),
            w * w - x * x - y * y + z * z,
        )
    }

    /// Decompose into a rotation angle in (−π, π] and its axis.
    ///
    /// The identity rotation yields an angle of 0 and a null axis.
    pub fn to_angle_and_axis(&self) -> (f64, Vec3) {
        let w = self.w.clamp(-1.0, 1.0);
        let half = w.acos();
        let s = half.sin();
        if s.abs() < EPSILON {
            return (0.0, Vec3::zeros());
        }
        let axis = Vec3::new(self.x, self.y, self.z) / s;
        (normalize_angle(2.0 * half), axis)
    }

    /// Rotate a vector.
    pub fn rotate(&self, v: &Vec3) -> Vec3 {
        let u = Vec3::new(self.x, self.y, self.z);
        let t = u.cross(v) * 2.0;
        v + t * self.w + u.cross(&t)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for Quaternion {
    type Output = Quaternion;

    /// Hamilton product: `(self * rhs).rotate(v) == self.rotate(&rhs.rotate(v))`.
    fn mul(self, rhs: Quaternion) -> Quaternion {
        Quaternion::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }
}
