//! Rays, ray packets, and lane masks.

use weft_kernel_math::{Point3, Vec3};

use crate::INVALID_ID;

/// A single ray with a travel-distance span and a motion-blur time.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Origin point.
    pub origin: Point3,
    /// Direction. Not required to be normalized.
    pub dir: Vec3,
    /// Minimum travel distance.
    pub tnear: f32,
    /// Maximum travel distance; doubles as the best-hit distance during
    /// an intersect query.
    pub tfar: f32,
    /// Normalized motion-blur time in [0, 1].
    pub time: f32,
}

impl Ray {
    /// A ray at time 0 with an unbounded travel span.
    pub fn new(origin: Point3, dir: Vec3) -> Self {
        Self {
            origin,
            dir,
            tnear: 0.0,
            tfar: f32::INFINITY,
            time: 0.0,
        }
    }

    /// Same ray queried at a different motion-blur time.
    pub fn at_time(mut self, time: f32) -> Self {
        self.time = time;
        self
    }

    /// Same ray with an explicit travel span.
    pub fn with_span(mut self, tnear: f32, tfar: f32) -> Self {
        self.tnear = tnear;
        self.tfar = tfar;
        self
    }

    /// Componentwise reciprocal of the direction.
    ///
    /// Axis-aligned rays produce infinities here; the slab tests absorb
    /// them rather than treating them as errors.
    pub fn rcp_dir(&self) -> Vec3 {
        Vec3::new(1.0 / self.dir.x, 1.0 / self.dir.y, 1.0 / self.dir.z)
    }

    /// Point reached after travel distance `t`.
    pub fn at(&self, t: f32) -> Point3 {
        self.origin + self.dir * t
    }
}

/// A set of active lanes in a `K`-wide packet, stored as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneMask<const K: usize>(u32);

impl<const K: usize> LaneMask<K> {
    /// No lanes active.
    pub fn none() -> Self {
        Self(0)
    }

    /// All `K` lanes active.
    pub fn all() -> Self {
        debug_assert!(K <= 32);
        if K == 32 {
            Self(u32::MAX)
        } else {
            Self((1u32 << K) - 1)
        }
    }

    /// Mask from raw bits; bits at or above `K` are discarded.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits & Self::all().0)
    }

    /// Raw bits.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Whether lane `k` is active.
    pub fn get(&self, k: usize) -> bool {
        self.0 & (1 << k) != 0
    }

    /// Activate lane `k`.
    pub fn set(&mut self, k: usize) {
        self.0 |= 1 << k;
    }

    /// Deactivate lane `k`.
    pub fn clear(&mut self, k: usize) {
        self.0 &= !(1 << k);
    }

    /// Number of active lanes.
    pub fn count(&self) -> u32 {
        self.0.count_ones()
    }

    /// True if any lane is active.
    pub fn any(&self) -> bool {
        self.0 != 0
    }

    /// True if no lane is active.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate over the active lane indices.
    pub fn lanes(self) -> impl Iterator<Item = usize> {
        (0..K).filter(move |k| self.get(*k))
    }

    /// Lanes active in both masks.
    pub fn and(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }
}

/// A committed hit for one ray.
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    /// Travel distance of the hit.
    pub t: f32,
    /// First barycentric coordinate.
    pub u: f32,
    /// Second barycentric coordinate.
    pub v: f32,
    /// Geometry containing the hit primitive.
    pub geom_id: u32,
    /// Hit primitive within the geometry.
    pub prim_id: u32,
}

/// `K` rays in structure-of-arrays layout, with per-lane hit state.
///
/// Inactive lanes carry an inverted travel span (`tnear = +inf`,
/// `tfar = -inf`) so every masked reduction they enter is a no-op.
#[derive(Debug, Clone)]
pub struct RayPacket<const K: usize> {
    /// Origin components.
    pub org_x: [f32; K],
    /// Origin components.
    pub org_y: [f32; K],
    /// Origin components.
    pub org_z: [f32; K],
    /// Direction components.
    pub dir_x: [f32; K],
    /// Direction components.
    pub dir_y: [f32; K],
    /// Direction components.
    pub dir_z: [f32; K],
    /// Reciprocal direction components.
    pub rdir_x: [f32; K],
    /// Reciprocal direction components.
    pub rdir_y: [f32; K],
    /// Reciprocal direction components.
    pub rdir_z: [f32; K],
    /// Minimum travel distance per lane.
    pub tnear: [f32; K],
    /// Maximum travel distance per lane; tightened as hits are found.
    pub tfar: [f32; K],
    /// Motion-blur time per lane.
    pub time: [f32; K],
    /// Geometry id of the committed hit, or `INVALID_ID`.
    pub hit_geom_id: [u32; K],
    /// Primitive id of the committed hit, or `INVALID_ID`.
    pub hit_prim_id: [u32; K],
    /// Barycentric u of the committed hit.
    pub hit_u: [f32; K],
    /// Barycentric v of the committed hit.
    pub hit_v: [f32; K],
}

impl<const K: usize> RayPacket<K> {
    /// Build a packet from up to `K` rays.
    ///
    /// Returns the packet together with the mask of lanes that received a
    /// ray; surplus lanes are left inverted.
    pub fn from_rays(rays: &[Ray]) -> (Self, LaneMask<K>) {
        assert!(rays.len() <= K, "packet overflow: {} rays into {K} lanes", rays.len());
        let mut packet = Self {
            org_x: [0.0; K],
            org_y: [0.0; K],
            org_z: [0.0; K],
            dir_x: [0.0; K],
            dir_y: [0.0; K],
            dir_z: [0.0; K],
            rdir_x: [0.0; K],
            rdir_y: [0.0; K],
            rdir_z: [0.0; K],
            tnear: [f32::INFINITY; K],
            tfar: [f32::NEG_INFINITY; K],
            time: [0.0; K],
            hit_geom_id: [INVALID_ID; K],
            hit_prim_id: [INVALID_ID; K],
            hit_u: [0.0; K],
            hit_v: [0.0; K],
        };
        let mut mask = LaneMask::none();
        for (k, ray) in rays.iter().enumerate() {
            packet.set_ray(k, ray);
            mask.set(k);
        }
        (packet, mask)
    }

    /// Store a ray into lane `k`, resetting that lane's hit state.
    pub fn set_ray(&mut self, k: usize, ray: &Ray) {
        let rcp = ray.rcp_dir();
        self.org_x[k] = ray.origin.x;
        self.org_y[k] = ray.origin.y;
        self.org_z[k] = ray.origin.z;
        self.dir_x[k] = ray.dir.x;
        self.dir_y[k] = ray.dir.y;
        self.dir_z[k] = ray.dir.z;
        self.rdir_x[k] = rcp.x;
        self.rdir_y[k] = rcp.y;
        self.rdir_z[k] = rcp.z;
        self.tnear[k] = ray.tnear;
        self.tfar[k] = ray.tfar;
        self.time[k] = ray.time;
        self.hit_geom_id[k] = INVALID_ID;
        self.hit_prim_id[k] = INVALID_ID;
        self.hit_u[k] = 0.0;
        self.hit_v[k] = 0.0;
    }

    /// Single-ray view of lane `k`.
    pub fn ray(&self, k: usize) -> Ray {
        Ray {
            origin: Point3::new(self.org_x[k], self.org_y[k], self.org_z[k]),
            dir: Vec3::new(self.dir_x[k], self.dir_y[k], self.dir_z[k]),
            tnear: self.tnear[k],
            tfar: self.tfar[k],
            time: self.time[k],
        }
    }

    /// Commit a hit into lane `k`, tightening its far distance.
    pub fn commit_hit(&mut self, k: usize, hit: &Hit) {
        self.tfar[k] = hit.t;
        self.hit_geom_id[k] = hit.geom_id;
        self.hit_prim_id[k] = hit.prim_id;
        self.hit_u[k] = hit.u;
        self.hit_v[k] = hit.v;
    }

    /// Mark lane `k` occluded by collapsing its travel span.
    pub fn mark_occluded(&mut self, k: usize) {
        self.tfar[k] = f32::NEG_INFINITY;
    }

    /// Whether lane `k` has a committed hit.
    pub fn has_hit(&self, k: usize) -> bool {
        self.hit_geom_id[k] != INVALID_ID
    }

    /// Lanes of `mask` whose travel span is non-empty.
    pub fn alive(&self, mask: LaneMask<K>) -> LaneMask<K> {
        let mut out = LaneMask::none();
        for k in mask.lanes() {
            if self.tnear[k] <= self.tfar[k] {
                out.set(k);
            }
        }
        out
    }

    /// The single time shared by all lanes of `mask`, if they agree.
    pub fn uniform_time(&self, mask: LaneMask<K>) -> Option<f32> {
        let mut time = None;
        for k in mask.lanes() {
            match time {
                None => time = Some(self.time[k]),
                Some(t) if t == self.time[k] => {}
                _ => return None,
            }
        }
        time
    }
}
