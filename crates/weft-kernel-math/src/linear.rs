//! Linearly time-varying bounding boxes.

use crate::{Aabb3, Point3, TimeRange, Vec3};

/// A bounding box whose corners vary linearly over normalized time.
///
/// `bounds0` is the box at t = 0 and `bounds1` the box at t = 1; the box at
/// any t in between is the componentwise interpolation of the two. The pair
/// is a conservative affine envelope: the true shape at time t always lies
/// within [`LinearBounds::interpolate`], though not necessarily tightly.
/// No operation shrinks the envelope except explicit re-derivation from
/// fresh sample boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearBounds {
    /// Box at normalized time 0.
    pub bounds0: Aabb3,
    /// Box at normalized time 1.
    pub bounds1: Aabb3,
}

impl LinearBounds {
    /// Create from explicit endpoint boxes.
    pub fn new(bounds0: Aabb3, bounds1: Aabb3) -> Self {
        Self { bounds0, bounds1 }
    }

    /// The static (non-moving) envelope of a single box.
    pub fn constant(bounds: Aabb3) -> Self {
        Self {
            bounds0: bounds,
            bounds1: bounds,
        }
    }

    /// The empty envelope, identity of [`LinearBounds::merge`].
    pub fn empty() -> Self {
        Self {
            bounds0: Aabb3::empty(),
            bounds1: Aabb3::empty(),
        }
    }

    /// Fit an envelope over boxes sampled at uniformly spaced times.
    ///
    /// Starts from the first and last sample and widens both endpoints by
    /// the deficit of each interior sample against the interpolated
    /// envelope at its parametric position. The result contains every
    /// sample at its own time. The shared correction makes this an
    /// approximate conservative fit, not a least-squares one; the
    /// hierarchy builder's split heuristics are tuned against exactly this
    /// fit, so it must not be tightened.
    pub fn from_samples(samples: &[Aabb3]) -> Self {
        assert!(!samples.is_empty(), "from_samples requires at least one box");
        let mut lb = Self::new(samples[0], samples[samples.len() - 1]);
        for (i, sample) in samples.iter().enumerate().take(samples.len() - 1).skip(1) {
            let f = i as f32 / (samples.len() - 1) as f32;
            lb.widen_to_contain(sample, f);
        }
        lb
    }

    /// Widen the envelope just enough that its interpolation at `f`
    /// contains `sample`.
    ///
    /// The correction is applied to both endpoints equally (the shared
    /// correction of the approximate fit), so the envelope at every other
    /// time shifts by the same amount and previously contained samples
    /// stay contained on the side that grew.
    pub fn widen_to_contain(&mut self, sample: &Aabb3, f: f32) {
        let bt = self.interpolate(f);
        let dlower = inf_zero(sample.lower - bt.lower);
        let dupper = sup_zero(sample.upper - bt.upper);
        self.bounds0.lower += dlower;
        self.bounds1.lower += dlower;
        self.bounds0.upper += dupper;
        self.bounds1.upper += dupper;
    }

    /// Merge envelopes that are valid over different time intervals.
    ///
    /// Produces one envelope valid over the union of the input intervals,
    /// together with that union. The initial endpoints are taken from the
    /// inputs reaching the global interval bounds; every input's endpoint
    /// boxes are then re-checked at their position along the new
    /// parametrization and the envelope widened by any deficit, with the
    /// same shared correction as [`LinearBounds::from_samples`].
    pub fn merge_with_time(inputs: &[(LinearBounds, TimeRange)]) -> (LinearBounds, TimeRange) {
        let mut t_lower = f32::INFINITY;
        let mut t_upper = f32::NEG_INFINITY;
        let mut b0 = Aabb3::empty();
        let mut b1 = Aabb3::empty();
        for (lbounds, range) in inputs {
            if range.lower < t_lower {
                t_lower = range.lower;
                b0 = lbounds.bounds0;
            }
            if range.upper > t_upper {
                t_upper = range.upper;
                b1 = lbounds.bounds1;
            }
        }

        let global = TimeRange::new(t_lower, t_upper);
        let mut merged = LinearBounds::new(b0, b1);
        for (lbounds, range) in inputs {
            for (sample, t) in [(lbounds.bounds0, range.lower), (lbounds.bounds1, range.upper)] {
                merged.widen_to_contain(&sample, global.to_local(t));
            }
        }
        (merged, global)
    }

    /// The envelope box at time `t`.
    pub fn interpolate(&self, t: f32) -> Aabb3 {
        Aabb3::lerp(&self.bounds0, &self.bounds1, t)
    }

    /// Restrict the envelope to a sub-interval of its domain.
    ///
    /// The result is a new envelope whose [0, 1] domain corresponds to
    /// `dt` in this envelope's domain; restriction composes recursively.
    pub fn interpolate_range(&self, dt: TimeRange) -> LinearBounds {
        LinearBounds::new(self.interpolate(dt.lower), self.interpolate(dt.upper))
    }

    /// Extrapolate an envelope valid over `dt` back to the full [0, 1]
    /// domain, evaluating the same linear function outside `dt`.
    ///
    /// Inverse of [`LinearBounds::interpolate_range`].
    pub fn global(&self, dt: TimeRange) -> LinearBounds {
        let rcp_size = 1.0 / dt.size();
        let b0 = self.interpolate(-dt.lower * rcp_size);
        let b1 = self.interpolate((1.0 - dt.lower) * rcp_size);
        LinearBounds::new(b0, b1)
    }

    /// The spatial union of the two endpoint boxes.
    pub fn bounds(&self) -> Aabb3 {
        Aabb3::merge(&self.bounds0, &self.bounds1)
    }

    /// True if the union of the endpoints is empty.
    pub fn is_empty(&self) -> bool {
        self.bounds().is_empty()
    }

    /// Expand to cover another envelope, endpoint by endpoint.
    pub fn extend(&mut self, other: &LinearBounds) {
        self.bounds0.extend(&other.bounds0);
        self.bounds1.extend(&other.bounds1);
    }

    /// The union of two envelopes. Commutative and associative, with
    /// [`LinearBounds::empty`] as identity.
    pub fn merge(a: &LinearBounds, b: &LinearBounds) -> LinearBounds {
        LinearBounds::new(
            Aabb3::merge(&a.bounds0, &b.bounds0),
            Aabb3::merge(&a.bounds1, &b.bounds1),
        )
    }

    /// Expected half surface area over t in [0, 1], exact.
    ///
    /// Integrates the half-area polynomial of the linearly moving box:
    /// for each face pair with extents a(t), b(t) linear in t, the
    /// integral of a(t)b(t) is `a0*b0 + (a0*db + da*b0)/2 + da*db/3`.
    /// This is the split-quality metric; the endpoint mean is available
    /// separately as a cheaper approximation.
    pub fn expected_half_area(&self) -> f32 {
        let d0 = self.bounds0.size();
        let d1 = self.bounds1.size();
        expected_area(d0.x, d1.x, d0.y, d1.y)
            + expected_area(d0.y, d1.y, d0.z, d1.z)
            + expected_area(d0.z, d1.z, d0.x, d1.x)
    }

    /// Expected half surface area over a sub-interval of the domain.
    pub fn expected_half_area_over(&self, dt: TimeRange) -> f32 {
        self.interpolate_range(dt).expected_half_area()
    }

    /// Arithmetic mean of the endpoint half areas.
    ///
    /// Cheaper than [`LinearBounds::expected_half_area`] and close enough
    /// for coarse cost comparisons.
    pub fn approx_half_area(&self) -> f32 {
        0.5 * (self.bounds0.half_area() + self.bounds1.half_area())
    }
}

/// Exact integral over t in [0, 1] of `(a0 + t*da) * (b0 + t*db)`.
fn expected_area(a0: f32, a1: f32, b0: f32, b1: f32) -> f32 {
    let da = a1 - a0;
    let db = b1 - b0;
    a0 * b0 + (a0 * db + da * b0) * 0.5 + da * db * (1.0 / 3.0)
}

/// Componentwise min with zero.
fn inf_zero(v: Vec3) -> Vec3 {
    Vec3::new(v.x.min(0.0), v.y.min(0.0), v.z.min(0.0))
}

/// Componentwise max with zero.
fn sup_zero(v: Vec3) -> Vec3 {
    Vec3::new(v.x.max(0.0), v.y.max(0.0), v.z.max(0.0))
}

/// Extrapolate a pair of positions sampled at the ends of `dt` to the
/// positions the same linear motion reaches at t = 0 and t = 1.
///
/// Used when storage holds one linear piece of a longer piecewise motion
/// and the piece must be re-expressed over the global time domain.
pub fn global_linear(v: (Point3, Point3), dt: TimeRange) -> (Point3, Point3) {
    let rcp_size = 1.0 / dt.size();
    let dir = v.1 - v.0;
    let g0 = v.0 + dir * (-dt.lower * rcp_size);
    let g1 = v.0 + dir * ((1.0 - dt.lower) * rcp_size);
    (g0, g1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(lo: f32, hi: f32) -> Aabb3 {
        Aabb3::new(Point3::new(lo, lo, lo), Point3::new(hi, hi, hi))
    }

    #[test]
    fn test_from_samples_contains_all_samples() {
        // Nonlinear motion: the middle sample bulges outside the straight
        // interpolation of the end samples.
        let samples = [boxed(0.0, 1.0), boxed(2.0, 4.0), boxed(1.0, 2.0)];
        let lb = LinearBounds::from_samples(&samples);
        for (i, s) in samples.iter().enumerate() {
            let t = i as f32 / (samples.len() - 1) as f32;
            assert!(
                lb.interpolate(t).contains_box(s, 1e-5),
                "sample {i} escapes the envelope"
            );
        }
    }

    #[test]
    fn test_from_samples_dense_oscillation() {
        // Nine samples of a box drifting while oscillating in size; the
        // fitted envelope must contain every sample at its own time.
        let samples: Vec<Aabb3> = (0..9)
            .map(|i| {
                let t = i as f32 / 8.0;
                let wobble = [0.0, 0.7, -0.3, 0.9, 0.1, -0.5, 0.6, -0.2, 0.0][i];
                boxed(t * 4.0 - wobble, t * 4.0 + 1.0 + wobble)
            })
            .collect();
        let lb = LinearBounds::from_samples(&samples);
        for (i, s) in samples.iter().enumerate() {
            let t = i as f32 / (samples.len() - 1) as f32;
            assert!(
                lb.interpolate(t).contains_box(s, 1e-4),
                "sample {i} escapes the envelope"
            );
        }
    }

    #[test]
    fn test_from_samples_two_is_exact() {
        let lb = LinearBounds::from_samples(&[boxed(0.0, 1.0), boxed(3.0, 5.0)]);
        assert_eq!(lb.bounds0, boxed(0.0, 1.0));
        assert_eq!(lb.bounds1, boxed(3.0, 5.0));
    }

    #[test]
    fn test_merge_associative_with_identity() {
        let a = LinearBounds::new(boxed(0.0, 1.0), boxed(1.0, 2.0));
        let b = LinearBounds::new(boxed(-1.0, 0.5), boxed(0.0, 3.0));
        let c = LinearBounds::new(boxed(2.0, 4.0), boxed(-2.0, 0.0));

        let left = LinearBounds::merge(&LinearBounds::merge(&a, &b), &c);
        let right = LinearBounds::merge(&a, &LinearBounds::merge(&b, &c));
        assert_eq!(left, right);

        assert_eq!(LinearBounds::merge(&a, &LinearBounds::empty()), a);
    }

    #[test]
    fn test_merge_with_time_soundness() {
        let inputs = [
            (
                LinearBounds::new(boxed(0.0, 1.0), boxed(1.0, 2.0)),
                TimeRange::new(0.0, 0.5),
            ),
            (
                LinearBounds::new(boxed(1.5, 3.0), boxed(4.0, 6.0)),
                TimeRange::new(0.5, 1.0),
            ),
            (
                LinearBounds::new(boxed(-1.0, 0.0), boxed(0.0, 1.0)),
                TimeRange::new(0.25, 0.75),
            ),
        ];
        let (merged, global) = LinearBounds::merge_with_time(&inputs);
        assert_eq!(global, TimeRange::new(0.0, 1.0));

        for (lbounds, range) in &inputs {
            for step in 0..=8 {
                let local = step as f32 / 8.0;
                let t = range.lower + local * range.size();
                let shape = lbounds.interpolate(local);
                let envelope = merged.interpolate(global.to_local(t));
                assert!(
                    envelope.contains_box(&shape, 1e-4),
                    "input escapes merged envelope at t={t}"
                );
            }
        }
    }

    #[test]
    fn test_global_inverts_interpolate_range() {
        let lb = LinearBounds::new(boxed(0.0, 2.0), boxed(4.0, 8.0));
        for dt in [
            TimeRange::new(0.25, 0.75),
            TimeRange::new(0.0, 0.5),
            TimeRange::new(0.1, 0.9),
        ] {
            let restricted = lb.interpolate_range(dt);
            let restored = restricted.global(dt);
            assert!(lb.bounds0.contains_box(&restored.bounds0, 1e-4));
            assert!(restored.bounds0.contains_box(&lb.bounds0, 1e-4));
            assert!(lb.bounds1.contains_box(&restored.bounds1, 1e-4));
            assert!(restored.bounds1.contains_box(&lb.bounds1, 1e-4));
        }
    }

    #[test]
    fn test_expected_half_area_static_matches_box() {
        let lb = LinearBounds::constant(boxed(0.0, 2.0));
        assert!((lb.expected_half_area() - lb.bounds0.half_area()).abs() < 1e-4);
        assert!((lb.approx_half_area() - lb.bounds0.half_area()).abs() < 1e-4);
    }

    #[test]
    fn test_expected_half_area_linear_growth() {
        // Unit cube at t=0 growing to a 2-cube at t=1 along x only:
        // d(t) = (1+t, 1, 1), half-area = (1+t)*1 + 1*1 + (1+t)*1.
        // Integral over [0,1]: (3/2 + 1 + 3/2) = 4.
        let lb = LinearBounds::new(
            Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)),
            Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0)),
        );
        assert!((lb.expected_half_area() - 4.0).abs() < 1e-4);
        // The endpoint mean happens to agree for linear integrands.
        assert!((lb.approx_half_area() - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_global_linear_round_trip() {
        let p0 = Point3::new(1.0, 0.0, 0.0);
        let p1 = Point3::new(2.0, 1.0, 0.0);
        let dt = TimeRange::new(0.25, 0.5);
        let (g0, g1) = global_linear((p0, p1), dt);
        // Evaluating the global line back at dt's endpoints recovers the
        // original samples.
        let at = |t: f32| g0 + (g1 - g0) * t;
        assert!((at(0.25) - p0).norm() < 1e-5);
        assert!((at(0.5) - p1).norm() < 1e-5);
    }
}
