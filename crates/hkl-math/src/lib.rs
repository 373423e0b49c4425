#![warn(missing_docs)]

//! Math types for diffractometer kinematics.
//!
//! Thin wrappers around nalgebra providing the domain-specific pieces
//! the kinematics core is built on: 3-vectors and 3×3 matrices,
//! unit quaternions for composing axis rotations, vector helpers for
//! oriented angles and projections, and tolerance constants.
//!
//! # Example
//!
//! ```
//! use hkl_math::{Quaternion, Vec3};
//! use std::f64::consts::FRAC_PI_2;
//!
//! let q = Quaternion::from_angle_and_axis(FRAC_PI_2, &Vec3::z()).unwrap();
//! let v = q.rotate(&Vec3::x());
//! assert!((v - Vec3::y()).norm() < 1e-12);
//! ```

use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

pub mod matrix;
mod quaternion;
pub mod vector;

pub use quaternion::Quaternion;

/// A vector in 3D space (lab or reciprocal frame).
pub type Vec3 = Vector3<f64>;

/// A 3×3 matrix (orientation, metric or rotation matrix).
pub type Mat3 = Matrix3<f64>;

/// Numerical tolerance shared by every comparison in the kinematics core.
pub const EPSILON: f64 = 1e-6;

/// One full turn in radians.
pub const TAU: f64 = std::f64::consts::TAU;

/// Errors from the math primitives.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MathError {
    /// A vector that must define a direction has (near) zero length.
    #[error("null vector cannot define a direction")]
    NullVector,

    /// Two vectors that must span a plane are colinear.
    #[error("vectors are colinear")]
    Colinear,

    /// A matrix that must be inverted has a (near) zero determinant.
    #[error("singular matrix (det = {0:e})")]
    Singular(f64),
}

/// Result type for math operations.
pub type Result<T> = std::result::Result<T, MathError>;

/// Tolerance constants for kinematic comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Tolerance on vector components and residuals.
    pub linear: f64,
    /// Tolerance on angles in radians.
    pub angular: f64,
}

impl Tolerance {
    /// Default tolerances (1e-6 on both).
    pub const DEFAULT: Self = Self {
        linear: EPSILON,
        angular: EPSILON,
    };

    /// Check if two vectors are equal within tolerance.
    pub fn vectors_equal(&self, a: &Vec3, b: &Vec3) -> bool {
        (a - b).norm() < self.linear
    }

    /// Check if a scalar is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.linear
    }

    /// Check if two angles are equal modulo a full turn.
    pub fn angles_equal(&self, a: f64, b: f64) -> bool {
        normalize_angle(a - b).abs() < self.angular
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Map an angle into the half-open interval (−π, π].
pub fn normalize_angle(angle: f64) -> f64 {
    use std::f64::consts::PI;

    let mut a = angle % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}
