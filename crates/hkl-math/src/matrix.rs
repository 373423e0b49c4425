//! 3×3 matrix helpers: Euler angles, orthonormal frames and linear solves.

use crate::{vector, Mat3, MathError, Result, Vec3, EPSILON};

/// Rotation matrix `Rx(x)·Ry(y)·Rz(z)`.
pub fn from_euler(x: f64, y: f64, z: f64) -> Mat3 {
    let (b, a) = x.sin_cos();
    let (d, c) = y.sin_cos();
    let (f, e) = z.sin_cos();
    let ad = a * d;
    let bd = b * d;
    Mat3::new(
        c * e,
        -c * f,
        d,
        bd * e + a * f,
        -bd * f + a * e,
        -b * c,
        -ad * e + b * f,
        ad * f + b * e,
        a * c,
    )
}

/// Euler angles `(x, y, z)` of a rotation matrix built by [`from_euler`].
///
/// In gimbal lock (`|cos y| < ε`) the x angle is set to 0.
pub fn to_euler(m: &Mat3) -> (f64, f64, f64) {
    let y = m[(0, 2)].clamp(-1.0, 1.0).asin();
    let c = y.cos();
    if c.abs() > EPSILON {
        let x = (-m[(1, 2)] / c).atan2(m[(2, 2)] / c);
        let z = (-m[(0, 1)] / c).atan2(m[(0, 0)] / c);
        (x, y, z)
    } else {
        (0.0, y, m[(1, 0)].atan2(m[(1, 1)]))
    }
}

/// Orthonormal frame whose first column follows `v1` and whose third
/// column is normal to the (`v1`, `v2`) plane.
pub fn from_two_vectors(v1: &Vec3, v2: &Vec3) -> Result<Mat3> {
    if vector::is_null(v1) || vector::is_null(v2) {
        return Err(MathError::NullVector);
    }
    let cross = v1.cross(v2);
    if cross.norm() < EPSILON {
        return Err(MathError::Colinear);
    }
    let x = v1.normalize();
    let z = cross.normalize();
    let y = z.cross(&x);
    Ok(Mat3::from_columns(&[x, y, z]))
}

/// Solve `m · x = v` by LU decomposition.
pub fn solve(m: &Mat3, v: &Vec3) -> Result<Vec3> {
    let det = m.determinant();
    if det.abs() < EPSILON {
        return Err(MathError::Singular(det));
    }
    m.lu().solve(v).ok_or(MathError::Singular(det))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_euler_round_trip() {
        let (x, y, z) = (0.3, -0.7, 1.9);
        let m = from_euler(x, y, z);
        assert!((m.transpose() * m - Mat3::identity()).norm() < 1e-12);
        let (ex, ey, ez) = to_euler(&m);
        assert_relative_eq!(ex, x, epsilon = 1e-12);
        assert_relative_eq!(ey, y, epsilon = 1e-12);
        assert_relative_eq!(ez, z, epsilon = 1e-12);
    }

    #[test]
    fn test_euler_gimbal_lock() {
        let m = from_euler(0.0, FRAC_PI_2, 0.4);
        let (ex, ey, ez) = to_euler(&m);
        assert_eq!(ex, 0.0);
        assert_relative_eq!(ey, FRAC_PI_2, epsilon = 1e-6);
        assert!((from_euler(ex, ey, ez) - m).norm() < 1e-6);
    }

    #[test]
    fn test_from_two_vectors() {
        let m = from_two_vectors(&Vec3::new(2.0, 0.0, 0.0), &Vec3::new(1.0, 1.0, 0.0)).unwrap();
        assert!((m - Mat3::identity()).norm() < 1e-12);
        assert_eq!(
            from_two_vectors(&Vec3::x(), &Vec3::new(-3.0, 0.0, 0.0)).unwrap_err(),
            MathError::Colinear
        );
    }

    #[test]
    fn test_solve() {
        let m = Mat3::new(1.0, 3.0, 3.0, 1.0, 4.0, 3.0, 1.0, 3.0, 4.0);
        let x = solve(&m, &Vec3::new(1.0, 2.0, 3.0)).unwrap();
        assert!((m * x - Vec3::new(1.0, 2.0, 3.0)).norm() < 1e-12);
        assert!(matches!(
            solve(&Mat3::zeros(), &Vec3::x()),
            Err(MathError::Singular(_))
        ));
    }
}
