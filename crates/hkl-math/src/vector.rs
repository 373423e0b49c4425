//! Vector helpers: angles, projections and rotations about arbitrary lines.

use crate::{Quaternion, Vec3, EPSILON};

/// Unsigned angle between two vectors in [0, π].
///
/// Returns 0 when either vector is null.
pub fn angle(a: &Vec3, b: &Vec3) -> f64 {
    let norm = a.norm() * b.norm();
    if norm < EPSILON {
        return 0.0;
    }
    (a.dot(b) / norm).clamp(-1.0, 1.0).acos()
}

/// Angle from `a` to `b`, negative when `a × b` points against `reference`.
pub fn oriented_angle(a: &Vec3, b: &Vec3, reference: &Vec3) -> f64 {
    let angle = angle(a, b);
    let cross = a.cross(b);
    if is_null(&cross) {
        return angle;
    }
    if cross.dot(reference) < 0.0 {
        -angle
    } else {
        angle
    }
}

/// Oriented angle at `p2` of the triangle (p1, p2, p3).
pub fn oriented_angle_points(p1: &Vec3, p2: &Vec3, p3: &Vec3, reference: &Vec3) -> f64 {
    oriented_angle(&(p1 - p2), &(p3 - p2), reference)
}

/// True when every component is within [`EPSILON`] of zero.
pub fn is_null(v: &Vec3) -> bool {
    v.iter().all(|c| c.abs() < EPSILON)
}

/// True when the two vectors are parallel or anti-parallel.
pub fn is_colinear(a: &Vec3, b: &Vec3) -> bool {
    a.cross(b).norm() < EPSILON
}

/// Project `v` on the plane through the origin with the given normal.
pub fn project_on_plane(v: &Vec3, normal: &Vec3) -> Vec3 {
    let n2 = normal.norm_squared();
    if n2 < EPSILON * EPSILON {
        return *v;
    }
    v - normal * (v.dot(normal) / n2)
}

/// Project the point `v` on the plane with `normal` containing `point`.
pub fn project_on_plane_with_point(v: &Vec3, normal: &Vec3, point: &Vec3) -> Vec3 {
    point + project_on_plane(&(v - point), normal)
}

/// Rotate `v` by `angle` about `axis` through the origin (Rodrigues).
pub fn rotated_around_vector(v: &Vec3, axis: &Vec3, angle: f64) -> Vec3 {
    let norm = axis.norm();
    if norm < EPSILON {
        return *v;
    }
    let k = axis / norm;
    let (s, c) = angle.sin_cos();
    v * c + k.cross(v) * s + k * (k.dot(v) * (1.0 - c))
}

/// Rotate the point `v` by `angle` about the line from `c1` to `c2`.
pub fn rotated_around_line(v: &Vec3, angle: f64, c1: &Vec3, c2: &Vec3) -> Vec3 {
    let axis = c2 - c1;
    c1 + rotated_around_vector(&(v - c1), &axis, angle)
}

/// Rotate `v` by a unit quaternion.
pub fn rotated_quaternion(v: &Vec3, q: &Quaternion) -> Vec3 {
    q.rotate(v)
}
