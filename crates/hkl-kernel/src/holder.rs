//! Ordered chains of axes carrying the sample or the detector.

use nalgebra::Matrix4;

use hkl_math::{Quaternion, Vec3};

use crate::axis::Axis;

/// An ordered list of axis indices into the owning geometry.
///
/// The cached transform is `q₀·q₁·…·qₙ₋₁`: the last axis in the list is
/// applied first to a vector carried by the holder.
#[derive(Debug, Clone, PartialEq)]
pub struct Holder {
    axes: Vec<usize>,
    q: Quaternion,
    translation: Vec3,
}

impl Holder {
    pub(crate) fn new(axes: Vec<usize>) -> Self {
        Self {
            axes,
            q: Quaternion::identity(),
            translation: Vec3::zeros(),
        }
    }

    /// Indices of the axes, outermost first.
    pub fn axes(&self) -> &[usize] {
        &self.axes
    }

    /// Whether axis `index` belongs to this holder.
    pub fn contains(&self, index: usize) -> bool {
        self.axes.contains(&index)
    }

    /// Position of axis `index` inside the holder.
    pub fn position(&self, index: usize) -> Option<usize> {
        self.axes.iter().position(|&i| i == index)
    }

    /// Cached rotation of the holder.
    pub fn quaternion(&self) -> &Quaternion {
        &self.q
    }

    /// Cached displacement of the holder origin.
    pub fn translation(&self) -> &Vec3 {
        &self.translation
    }

    /// Homogeneous transform combining rotation and translation.
    pub fn transform(&self) -> Matrix4<f64> {
        let r = self.q.to_matrix();
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }

    /// Rotation of the first `n` axes only (`q₀·…·qₙ₋₁`).
    pub(crate) fn partial_quaternion(&self, axes: &[Axis], n: usize) -> Quaternion {
        self.axes
            .iter()
            .take(n)
            .fold(Quaternion::identity(), |q, &i| q * axes[i].quaternion())
    }

    /// Whether any axis of the holder changed since the last recompute.
    pub(crate) fn is_dirty(&self, axes: &[Axis]) -> bool {
        self.axes.iter().any(|&i| axes[i].parameter().changed())
    }

    pub(crate) fn recompute(&mut self, axes: &[Axis]) {
        let mut q = Quaternion::identity();
        let mut t = Vec3::zeros();
        for &i in &self.axes {
            let axis = &axes[i];
            t += q.rotate(&axis.translation_vector());
            q = q * axis.quaternion();
        }
        self.q = q;
        self.translation = t;
    }
}
