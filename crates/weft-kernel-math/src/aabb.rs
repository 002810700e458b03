//! Axis-aligned bounding boxes.

use crate::{Point3, Vec3};

/// Axis-aligned bounding box in 3D.
///
/// The empty box is represented with inverted infinite corners so that
/// extending it with any point or box produces that point or box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    /// Minimum corner.
    pub lower: Point3,
    /// Maximum corner.
    pub upper: Point3,
}

impl Aabb3 {
    /// Create an AABB from lower and upper corners.
    pub fn new(lower: Point3, upper: Point3) -> Self {
        Self { lower, upper }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            lower: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            upper: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// The degenerate box containing a single point.
    pub fn from_point(p: Point3) -> Self {
        Self { lower: p, upper: p }
    }

    /// True if the box contains no points (any axis inverted).
    pub fn is_empty(&self) -> bool {
        self.lower.x > self.upper.x || self.lower.y > self.upper.y || self.lower.z > self.upper.z
    }

    /// Expand this AABB to include a point.
    pub fn extend_point(&mut self, p: &Point3) {
        self.lower.x = self.lower.x.min(p.x);
        self.lower.y = self.lower.y.min(p.y);
        self.lower.z = self.lower.z.min(p.z);
        self.upper.x = self.upper.x.max(p.x);
        self.upper.y = self.upper.y.max(p.y);
        self.upper.z = self.upper.z.max(p.z);
    }

    /// Expand this AABB to include another box.
    pub fn extend(&mut self, other: &Aabb3) {
        self.lower.x = self.lower.x.min(other.lower.x);
        self.lower.y = self.lower.y.min(other.lower.y);
        self.lower.z = self.lower.z.min(other.lower.z);
        self.upper.x = self.upper.x.max(other.upper.x);
        self.upper.y = self.upper.y.max(other.upper.y);
        self.upper.z = self.upper.z.max(other.upper.z);
    }

    /// The union of two boxes.
    pub fn merge(a: &Aabb3, b: &Aabb3) -> Aabb3 {
        let mut out = *a;
        out.extend(b);
        out
    }

    /// The intersection of two boxes. May be empty.
    pub fn intersection(a: &Aabb3, b: &Aabb3) -> Aabb3 {
        Aabb3::new(
            Point3::new(
                a.lower.x.max(b.lower.x),
                a.lower.y.max(b.lower.y),
                a.lower.z.max(b.lower.z),
            ),
            Point3::new(
                a.upper.x.min(b.upper.x),
                a.upper.y.min(b.upper.y),
                a.upper.z.min(b.upper.z),
            ),
        )
    }

    /// Componentwise linear interpolation of two boxes.
    ///
    /// Corners that agree between `a` and `b` pass through unchanged, so
    /// interpolating two identical (possibly infinite) boxes is exact.
    pub fn lerp(a: &Aabb3, b: &Aabb3, t: f32) -> Aabb3 {
        #[inline]
        fn mix(a: f32, b: f32, t: f32) -> f32 {
            if a == b {
                a
            } else {
                a + (b - a) * t
            }
        }
        Aabb3::new(
            Point3::new(
                mix(a.lower.x, b.lower.x, t),
                mix(a.lower.y, b.lower.y, t),
                mix(a.lower.z, b.lower.z, t),
            ),
            Point3::new(
                mix(a.upper.x, b.upper.x, t),
                mix(a.upper.y, b.upper.y, t),
                mix(a.upper.z, b.upper.z, t),
            ),
        )
    }

    /// Center of the box.
    pub fn center(&self) -> Point3 {
        Point3::new(
            (self.lower.x + self.upper.x) * 0.5,
            (self.lower.y + self.upper.y) * 0.5,
            (self.lower.z + self.upper.z) * 0.5,
        )
    }

    /// Extent of the box along each axis.
    pub fn size(&self) -> Vec3 {
        self.upper - self.lower
    }

    /// Half of the surface area: `dx*dy + dy*dz + dz*dx`.
    ///
    /// The usual SAH quantity; the factor of two cancels in cost ratios.
    pub fn half_area(&self) -> f32 {
        let d = self.size();
        d.x * d.y + d.y * d.z + d.z * d.x
    }

    /// True if the box contains the point (boundary inclusive).
    pub fn contains(&self, p: &Point3) -> bool {
        self.lower.x <= p.x
            && p.x <= self.upper.x
            && self.lower.y <= p.y
            && p.y <= self.upper.y
            && self.lower.z <= p.z
            && p.z <= self.upper.z
    }

    /// True if `other` lies entirely inside this box, within `tol` per axis.
    pub fn contains_box(&self, other: &Aabb3, tol: f32) -> bool {
        other.is_empty()
            || (self.lower.x <= other.lower.x + tol
                && self.lower.y <= other.lower.y + tol
                && self.lower.z <= other.lower.z + tol
                && self.upper.x >= other.upper.x - tol
                && self.upper.y >= other.upper.y - tol
                && self.upper.z >= other.upper.z - tol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_extend() {
        let mut b = Aabb3::empty();
        assert!(b.is_empty());
        b.extend_point(&Point3::new(1.0, 2.0, 3.0));
        assert!(!b.is_empty());
        assert_eq!(b.lower, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(b.upper, Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_merge_identity() {
        let b = Aabb3::new(Point3::new(-1.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        let merged = Aabb3::merge(&b, &Aabb3::empty());
        assert_eq!(merged, b);
    }

    #[test]
    fn test_half_area() {
        let b = Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 3.0, 4.0));
        // 2*3 + 3*4 + 4*2
        assert!((b.half_area() - 26.0).abs() < 1e-6);
    }

    #[test]
    fn test_lerp_endpoints() {
        let a = Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let b = Aabb3::new(Point3::new(2.0, 2.0, 2.0), Point3::new(3.0, 3.0, 3.0));
        assert_eq!(Aabb3::lerp(&a, &b, 0.0), a);
        assert_eq!(Aabb3::lerp(&a, &b, 1.0), b);
        let mid = Aabb3::lerp(&a, &b, 0.5);
        assert_eq!(mid.lower, Point3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_lerp_empty_stays_empty() {
        let e = Aabb3::empty();
        let l = Aabb3::lerp(&e, &e, 0.5);
        assert!(l.is_empty());
        assert!(l.lower.x.is_infinite());
    }

    #[test]
    fn test_intersection() {
        let a = Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0));
        let b = Aabb3::new(Point3::new(1.0, 1.0, 1.0), Point3::new(3.0, 3.0, 3.0));
        let i = Aabb3::intersection(&a, &b);
        assert_eq!(i.lower, Point3::new(1.0, 1.0, 1.0));
        assert_eq!(i.upper, Point3::new(2.0, 2.0, 2.0));

        let far = Aabb3::new(Point3::new(5.0, 5.0, 5.0), Point3::new(6.0, 6.0, 6.0));
        assert!(Aabb3::intersection(&a, &far).is_empty());
    }
}
