//! Conservative packet frusta for whole-subtree culling.

use weft_kernel_math::Vec3;

use crate::node::ChildBounds;
use crate::ray::{LaneMask, RayPacket};

/// Rounding multipliers applied to the robust slab comparison; two ulps of
/// margin on each side covers the error of the subtract-then-multiply
/// ordering.
pub const ROUND_DOWN: f32 = 1.0 - 2.0 * f32::EPSILON;
/// See [`ROUND_DOWN`].
pub const ROUND_UP: f32 = 1.0 + 2.0 * f32::EPSILON;

/// A single conservative bounding frustum over the active rays of a
/// packet.
///
/// Origins and reciprocal directions are reduced to per-axis min/max
/// scalars, masked by ray validity. The packet is assumed octant-split:
/// rays may differ slightly in direction but share the direction sign per
/// axis, which is what lets one scalar slab test stay conservative. In
/// `t = (p - org) * rdir`, for an all-non-negative axis
/// `t_min = p_min*rdir_min - org_max*rdir_min` and
/// `t_max = p_max*rdir_max - org_min*rdir_max`; an all-negative axis swaps
/// which reduced value plays each role.
///
/// The node test is a conservative superset: it can retain children no
/// individual ray hits, so descended nodes and primitives are always
/// re-tested per ray.
#[derive(Debug, Clone, Copy)]
pub struct PacketFrustum {
    min_rdir: Vec3,
    max_rdir: Vec3,
    /// Fast mode: premultiplied `org*rdir` terms. Robust mode: just the
    /// selected origin reductions, multiplied after the subtract.
    min_org_rdir: Vec3,
    max_org_rdir: Vec3,
    min_dist: f32,
    max_dist: f32,
    /// Per axis, whether the near plane is the upper side (negative
    /// direction octant).
    near_is_upper: [bool; 3],
    robust: bool,
}

impl PacketFrustum {
    /// Derive the frustum of the `valid` lanes of a packet.
    ///
    /// `robust` selects the numerically safeguarded slab variant: ordered
    /// subtract-then-multiply plus rounding-tolerance multipliers on the
    /// final comparison, trading a little tightness for a correctness
    /// margin (and absorbing infinite reciprocal directions of
    /// axis-aligned rays).
    pub fn new<const K: usize>(valid: LaneMask<K>, packet: &RayPacket<K>, robust: bool) -> Self {
        let (min_org, max_org) = reduce3(valid, &packet.org_x, &packet.org_y, &packet.org_z);
        let (min_rd, max_rd) = reduce3(valid, &packet.rdir_x, &packet.rdir_y, &packet.rdir_z);

        let mut min_rdir = Vec3::zeros();
        let mut max_rdir = Vec3::zeros();
        let mut min_org_sel = Vec3::zeros();
        let mut max_org_sel = Vec3::zeros();
        let mut near_is_upper = [false; 3];
        for axis in 0..3 {
            let positive = min_rd[axis] >= 0.0;
            near_is_upper[axis] = !positive;
            // The near coefficient and the origin it pairs with swap roles
            // in the negative octant.
            min_rdir[axis] = if positive { min_rd[axis] } else { max_rd[axis] };
            max_rdir[axis] = if positive { max_rd[axis] } else { min_rd[axis] };
            min_org_sel[axis] = if positive { max_org[axis] } else { min_org[axis] };
            max_org_sel[axis] = if positive { min_org[axis] } else { max_org[axis] };
        }

        let (min_org_rdir, max_org_rdir) = if robust {
            (min_org_sel, max_org_sel)
        } else {
            (
                min_rdir.component_mul(&min_org_sel),
                max_rdir.component_mul(&max_org_sel),
            )
        };

        let mut min_dist = f32::INFINITY;
        let mut max_dist = f32::NEG_INFINITY;
        for k in valid.lanes() {
            min_dist = min_dist.min(packet.tnear[k]);
            max_dist = max_dist.max(packet.tfar[k]);
        }

        Self {
            min_rdir,
            max_rdir,
            min_org_rdir,
            max_org_rdir,
            min_dist,
            max_dist,
            near_is_upper,
            robust,
        }
    }

    /// Smallest near distance over the active rays.
    pub fn min_dist(&self) -> f32 {
        self.min_dist
    }

    /// Largest far distance over the active rays.
    pub fn max_dist(&self) -> f32 {
        self.max_dist
    }

    /// Per axis, whether the near child plane is the upper side.
    pub fn near_is_upper(&self) -> [bool; 3] {
        self.near_is_upper
    }

    /// Tighten the far distance after the packet's best hits improved,
    /// without rebuilding the whole frustum.
    pub fn update_max_dist<const K: usize>(&mut self, valid: LaneMask<K>, packet: &RayPacket<K>) {
        let mut max_dist = f32::NEG_INFINITY;
        for k in valid.lanes() {
            max_dist = max_dist.max(packet.tfar[k]);
        }
        self.max_dist = max_dist;
    }

    /// Slab-test all children of a node at once.
    ///
    /// Returns the bitmask of candidate children and writes each
    /// candidate's near distance into `dist` for traversal ordering.
    /// Unused child slots are never candidates.
    pub fn intersect_node<const N: usize>(
        &self,
        bounds: &ChildBounds<N>,
        dist: &mut [f32; N],
    ) -> u32 {
        let near_x: &[f32; N] = side(bounds, 0, self.near_is_upper[0]);
        let far_x: &[f32; N] = side(bounds, 0, !self.near_is_upper[0]);
        let near_y: &[f32; N] = side(bounds, 1, self.near_is_upper[1]);
        let far_y: &[f32; N] = side(bounds, 1, !self.near_is_upper[1]);
        let near_z: &[f32; N] = side(bounds, 2, self.near_is_upper[2]);
        let far_z: &[f32; N] = side(bounds, 2, !self.near_is_upper[2]);

        let mut mask = 0u32;
        for i in 0..N {
            if bounds.is_child_empty(i) {
                continue;
            }
            let (fmin, fmax) = if self.robust {
                (
                    ((near_x[i] - self.min_org_rdir.x) * self.min_rdir.x)
                        .max((near_y[i] - self.min_org_rdir.y) * self.min_rdir.y)
                        .max((near_z[i] - self.min_org_rdir.z) * self.min_rdir.z)
                        .max(self.min_dist),
                    ((far_x[i] - self.max_org_rdir.x) * self.max_rdir.x)
                        .min((far_y[i] - self.max_org_rdir.y) * self.max_rdir.y)
                        .min((far_z[i] - self.max_org_rdir.z) * self.max_rdir.z)
                        .min(self.max_dist),
                )
            } else {
                (
                    (near_x[i] * self.min_rdir.x - self.min_org_rdir.x)
                        .max(near_y[i] * self.min_rdir.y - self.min_org_rdir.y)
                        .max(near_z[i] * self.min_rdir.z - self.min_org_rdir.z)
                        .max(self.min_dist),
                    (far_x[i] * self.max_rdir.x - self.max_org_rdir.x)
                        .min(far_y[i] * self.max_rdir.y - self.max_org_rdir.y)
                        .min(far_z[i] * self.max_rdir.z - self.max_org_rdir.z)
                        .min(self.max_dist),
                )
            };
            dist[i] = fmin;
            let hit = if self.robust {
                ROUND_DOWN * fmin <= ROUND_UP * fmax
            } else {
                fmin <= fmax
            };
            if hit {
                mask |= 1 << i;
            }
        }
        mask
    }
}

/// Masked per-axis min/max reduction over three lane arrays.
fn reduce3<const K: usize>(
    valid: LaneMask<K>,
    x: &[f32; K],
    y: &[f32; K],
    z: &[f32; K],
) -> (Vec3, Vec3) {
    let mut min = Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY);
    let mut max = Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);
    for k in valid.lanes() {
        min.x = min.x.min(x[k]);
        min.y = min.y.min(y[k]);
        min.z = min.z.min(z[k]);
        max.x = max.x.max(x[k]);
        max.y = max.y.max(y[k]);
        max.z = max.z.max(z[k]);
    }
    (min, max)
}

/// One of the six plane arrays, selected by axis and side.
fn side<const N: usize>(bounds: &ChildBounds<N>, axis: usize, upper: bool) -> &[f32; N] {
    match (axis, upper) {
        (0, false) => &bounds.lower_x,
        (0, true) => &bounds.upper_x,
        (1, false) => &bounds.lower_y,
        (1, true) => &bounds.upper_y,
        (2, false) => &bounds.lower_z,
        _ => &bounds.upper_z,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ray::Ray;
    use weft_kernel_math::{Aabb3, Point3};

    fn bounds_of(children: &[Aabb3]) -> ChildBounds<4> {
        let mut cb = ChildBounds::empty();
        for (i, b) in children.iter().enumerate() {
            cb.set_child(i, b);
        }
        cb
    }

    fn unit_box_at(x: f32) -> Aabb3 {
        Aabb3::new(Point3::new(x, -0.5, -0.5), Point3::new(x + 1.0, 0.5, 0.5))
    }

    /// Exact scalar slab test, the per-ray ground truth the frustum must
    /// never contradict with a false negative.
    fn ray_hits_box(ray: &Ray, b: &Aabb3) -> bool {
        let rcp = ray.rcp_dir();
        let mut tmin = ray.tnear;
        let mut tmax = ray.tfar;
        for axis in 0..3 {
            let (lo, hi, o, r) = match axis {
                0 => (b.lower.x, b.upper.x, ray.origin.x, rcp.x),
                1 => (b.lower.y, b.upper.y, ray.origin.y, rcp.y),
                _ => (b.lower.z, b.upper.z, ray.origin.z, rcp.z),
            };
            let t1 = (lo - o) * r;
            let t2 = (hi - o) * r;
            tmin = tmin.max(t1.min(t2));
            tmax = tmax.min(t1.max(t2));
        }
        tmin <= tmax
    }

    #[test]
    fn test_no_false_negatives() {
        // Slightly divergent rays sharing the (+,+,+) octant.
        let rays = [
            Ray::new(Point3::new(-4.0, 0.0, 0.0), Vec3::new(1.0, 0.02, 0.0)),
            Ray::new(Point3::new(-4.0, 0.2, 0.1), Vec3::new(1.0, 0.03, 0.01)),
            Ray::new(Point3::new(-4.2, -0.1, 0.0), Vec3::new(1.0, 0.0, 0.02)),
            Ray::new(Point3::new(-3.8, 0.1, -0.1), Vec3::new(1.0, 0.01, 0.015)),
        ];
        let (packet, mask) = RayPacket::<4>::from_rays(&rays);

        let children = [
            unit_box_at(0.0),
            unit_box_at(3.0),
            unit_box_at(-8.0),
            unit_box_at(20.0),
        ];
        for robust in [false, true] {
            let frustum = PacketFrustum::new(mask, &packet, robust);
            let mut dist = [0.0f32; 4];
            let hits = frustum.intersect_node(&bounds_of(&children), &mut dist);
            for (i, child) in children.iter().enumerate() {
                let any_ray_hits = rays.iter().any(|r| ray_hits_box(r, child));
                if any_ray_hits {
                    assert!(
                        hits & (1 << i) != 0,
                        "frustum (robust={robust}) missed child {i} hit by a ray"
                    );
                }
            }
            // The box behind every ray is culled.
            assert_eq!(hits & (1 << 2), 0);
        }
    }

    #[test]
    fn test_false_positive_is_tolerated() {
        // Two same-octant rays whose paths straddle the box at x=5: one
        // crosses its y span long before x=5, the other stays above it.
        // Neither hits, but the packet envelope covers the box, and the
        // conservative test must keep it as a candidate.
        let rays = [
            Ray::new(Point3::new(0.0, -2.0, 0.0), Vec3::new(1.0, 0.9, 0.0)),
            Ray::new(Point3::new(0.0, 2.0, 0.0), Vec3::new(1.0, 0.05, 0.0)),
        ];
        let (packet, mask) = RayPacket::<4>::from_rays(&rays);
        let frustum = PacketFrustum::new(mask, &packet, false);

        let gap_box = Aabb3::new(Point3::new(5.0, -0.2, -0.2), Point3::new(5.5, 0.2, 0.2));
        assert!(!rays.iter().any(|r| ray_hits_box(r, &gap_box)));

        let mut dist = [0.0f32; 4];
        let hits = frustum.intersect_node(&bounds_of(&[gap_box]), &mut dist);
        assert_eq!(hits & 1, 1, "conservative test should keep the gap box");
    }

    #[test]
    fn test_negative_octant_axis_swap() {
        let rays = [
            Ray::new(Point3::new(4.0, 0.0, 0.0), Vec3::new(-1.0, 0.01, 0.005)),
            Ray::new(Point3::new(4.1, 0.1, 0.0), Vec3::new(-1.0, 0.02, 0.01)),
        ];
        let (packet, mask) = RayPacket::<4>::from_rays(&rays);
        let frustum = PacketFrustum::new(mask, &packet, false);
        assert!(frustum.near_is_upper()[0]);
        assert!(!frustum.near_is_upper()[1]);

        let mut dist = [0.0f32; 4];
        let hits = frustum.intersect_node(&bounds_of(&[unit_box_at(0.0)]), &mut dist);
        assert_eq!(hits & 1, 1);
        assert!(dist[0] > 0.0);
    }

    #[test]
    fn test_update_max_dist_culls() {
        let rays = [Ray::new(Point3::new(-4.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0))];
        let (mut packet, mask) = RayPacket::<4>::from_rays(&rays);
        let mut frustum = PacketFrustum::new(mask, &packet, false);

        let far_box = unit_box_at(10.0);
        let mut dist = [0.0f32; 4];
        assert_eq!(frustum.intersect_node(&bounds_of(&[far_box]), &mut dist) & 1, 1);

        // A hit at t=6 makes the far box unreachable.
        packet.tfar[0] = 6.0;
        frustum.update_max_dist(mask, &packet);
        assert_eq!(frustum.intersect_node(&bounds_of(&[far_box]), &mut dist) & 1, 0);
    }

    #[test]
    fn test_axis_aligned_rays_robust() {
        // Rays exactly along +x give infinite rdir in y and z; the robust
        // variant must still accept the box they pass through.
        let rays = [
            Ray::new(Point3::new(-2.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)),
            Ray::new(Point3::new(-2.0, 0.1, 0.1), Vec3::new(1.0, 0.0, 0.0)),
        ];
        let (packet, mask) = RayPacket::<4>::from_rays(&rays);
        let frustum = PacketFrustum::new(mask, &packet, true);
        let mut dist = [0.0f32; 4];
        let hits = frustum.intersect_node(&bounds_of(&[unit_box_at(0.0)]), &mut dist);
        assert_eq!(hits & 1, 1);
    }
}
