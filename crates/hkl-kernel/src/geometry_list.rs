//! Candidate solutions of an inverse computation.

use hkl_math::{EPSILON, TAU};

use crate::axis::AxisKind;
use crate::geometry::Geometry;

/// An ordered collection of geometries without near-duplicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryList {
    items: Vec<Geometry>,
}

impl GeometryList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `geometry` unless an item is already within [`EPSILON`].
    ///
    /// Returns whether the geometry was added.
    pub fn add(&mut self, geometry: Geometry) -> bool {
        if self.items.iter().any(|g| g.distance(&geometry) < EPSILON) {
            return false;
        }
        self.items.push(geometry);
        true
    }

    /// Stable sort by ascending Euclidean distance to `reference`.
    pub fn sort(&mut self, reference: &Geometry) {
        let mut keyed: Vec<(f64, Geometry)> = self
            .items
            .drain(..)
            .map(|g| (g.distance_euclidean(reference), g))
            .collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.items = keyed.into_iter().map(|(_, g)| g).collect();
    }

    /// Drop every geometry with an axis outside its range.
    pub fn remove_invalid(&mut self) {
        self.items.retain(Geometry::is_valid);
    }

    /// Add, for every item, the variants where rotation axes are shifted by
    /// multiples of 2π while staying in range.
    pub fn multiply_from_range(&mut self) {
        let originals = self.items.clone();
        for geometry in &originals {
            let mut variants = vec![geometry.clone()];
            for (index, axis) in geometry.axes().iter().enumerate() {
                if axis.kind() != AxisKind::Rotation {
                    continue;
                }
                let (min, max) = axis.parameter().range();
                let value = axis.value();
                let mut shifts = Vec::new();
                let mut v = value - TAU;
                while v >= min {
                    shifts.push(v);
                    v -= TAU;
                }
                let mut v = value + TAU;
                while v <= max {
                    shifts.push(v);
                    v += TAU;
                }
                if shifts.is_empty() {
                    continue;
                }
                let mut extended = Vec::with_capacity(variants.len() * (shifts.len() + 1));
                for variant in &variants {
                    extended.push(variant.clone());
                    for &shifted in &shifts {
                        let mut g = variant.clone();
                        if g.set_axis_value_by_index(index, shifted).is_ok() {
                            extended.push(g);
                        }
                    }
                }
                variants = extended;
            }
            for variant in variants.into_iter().skip(1) {
                self.add(variant);
            }
        }
    }

    /// Iterate over the geometries.
    pub fn iter(&self) -> std::slice::Iter<'_, Geometry> {
        self.items.iter()
    }

    /// Number of geometries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Geometry at `index`.
    pub fn get(&self, index: usize) -> Option<&Geometry> {
        self.items.get(index)
    }

    /// The geometry nearest to `reference` in the Euclidean sense.
    pub fn closest(&self, reference: &Geometry) -> Option<&Geometry> {
        self.items
            .iter()
            .min_by(|a, b| {
                a.distance_euclidean(reference)
                    .total_cmp(&b.distance_euclidean(reference))
            })
    }

    /// Remove every geometry.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<'a> IntoIterator for &'a GeometryList {
    type Item = &'a Geometry;
    type IntoIter = std::slice::Iter<'a, Geometry>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryBuilder;
    use hkl_math::Vec3;
    use std::f64::consts::PI;

    fn geometry(values: &[f64]) -> Geometry {
        let mut g = GeometryBuilder::new("TEST")
            .holder(&[("a", Vec3::z()), ("b", Vec3::x())])
            .holder(&[("c", Vec3::z())])
            .build()
            .unwrap();
        g.set_axis_values(values).unwrap();
        g
    }

    #[test]
    fn test_add_drops_duplicates() {
        let mut list = GeometryList::new();
        assert!(list.add(geometry(&[0.0, 0.0, 0.0])));
        assert!(!list.add(geometry(&[0.0, 0.0, 1e-8])));
        assert!(list.add(geometry(&[0.1, 0.0, 0.0])));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_sort() {
        let mut list = GeometryList::new();
        list.add(geometry(&[1.0, 1.0, 1.0]));
        list.add(geometry(&[0.1, 0.0, 0.0]));
        list.add(geometry(&[0.5, 0.0, 0.0]));
        let reference = geometry(&[0.0, 0.0, 0.0]);
        list.sort(&reference);
        let firsts: Vec<f64> = list.iter().map(|g| g.axis_values()[0]).collect();
        assert_eq!(firsts, vec![0.1, 0.5, 1.0]);
        assert_eq!(list.closest(&reference), list.get(0));
    }

    #[test]
    fn test_sort_is_euclidean() {
        // (0.9, 0.9) is nearer than (1.5, 0) in L2 but farther in L1.
        let mut list = GeometryList::new();
        list.add(geometry(&[1.5, 0.0, 0.0]));
        list.add(geometry(&[0.9, 0.9, 0.0]));
        let reference = geometry(&[0.0, 0.0, 0.0]);
        list.sort(&reference);
        assert_eq!(list.get(0).unwrap().axis_values(), vec![0.9, 0.9, 0.0]);
        assert_eq!(list.closest(&reference), list.get(0));
        let first = list.get(0).unwrap();
        let second = list.get(1).unwrap();
        assert!(first.distance(&reference) > second.distance(&reference));
    }

    #[test]
    fn test_remove_invalid() {
        let mut list = GeometryList::new();
        list.add(geometry(&[0.0, 0.0, 0.0]));
        list.add(geometry(&[4.0, 0.0, 0.0]));
        list.remove_invalid();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_multiply_from_range() {
        let mut g = geometry(&[0.5, 0.0, 0.0]);
        g.set_axis_range_in_user_unit("a", -360.0, 360.0).unwrap();
        let mut list = GeometryList::new();
        list.add(g);
        list.multiply_from_range();
        let mut firsts: Vec<f64> = list.iter().map(|g| g.axis_values()[0]).collect();
        firsts.sort_by(f64::total_cmp);
        assert_eq!(firsts.len(), 2);
        assert!((firsts[0] - (0.5 - 2.0 * PI)).abs() < 1e-12);
        assert!((firsts[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_multiply_from_range_two_axes() {
        let mut g = geometry(&[0.0, 0.0, 0.0]);
        g.set_axis_range_in_user_unit("a", -400.0, 400.0).unwrap();
        g.set_axis_range_in_user_unit("b", -400.0, 400.0).unwrap();
        let mut list = GeometryList::new();
        list.add(g);
        list.multiply_from_range();
        // a and b each in {-2π, 0, 2π}
        assert_eq!(list.len(), 9);
        assert!(list.iter().all(Geometry::is_valid));
    }
}
