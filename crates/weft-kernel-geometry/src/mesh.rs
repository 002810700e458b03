//! Piecewise-linear motion meshes.

use weft_kernel_math::{lerp, Aabb3, LinearBounds, Point3, TimeRange, TOLERANCE};

use crate::{MotionGeometry, PrimId};

/// An indexed triangle mesh with per-time-sample vertex positions.
///
/// A mesh with `s` stored samples has `s - 1` linear motion segments; the
/// samples are uniformly spaced over normalized time [0, 1]. A mesh with a
/// single sample is static.
#[derive(Debug, Clone)]
pub struct TriangleMotionMesh {
    triangles: Vec<[u32; 3]>,
    /// One vertex array per time sample, all of equal length.
    steps: Vec<Vec<Point3>>,
}

impl TriangleMotionMesh {
    /// Create a mesh from triangles and one vertex array per time sample.
    pub fn new(triangles: Vec<[u32; 3]>, steps: Vec<Vec<Point3>>) -> Self {
        assert!(!steps.is_empty(), "mesh requires at least one time sample");
        let n = steps[0].len();
        assert!(
            steps.iter().all(|s| s.len() == n),
            "all time samples must store the same vertex count"
        );
        Self { triangles, steps }
    }

    /// A static mesh with a single time sample.
    pub fn constant(triangles: Vec<[u32; 3]>, positions: Vec<Point3>) -> Self {
        Self::new(triangles, vec![positions])
    }

    /// Number of linear motion segments.
    pub fn segment_count(&self) -> u32 {
        (self.steps.len() - 1) as u32
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> u32 {
        self.triangles.len() as u32
    }

    /// Vertex indices of a triangle.
    pub fn triangle(&self, prim_id: u32) -> [u32; 3] {
        self.triangles[prim_id as usize]
    }

    /// Vertex position at a stored time sample.
    pub fn vertex(&self, vertex: u32, time_sample: u32) -> Point3 {
        self.steps[time_sample as usize][vertex as usize]
    }

    /// Vertex position at an arbitrary normalized time.
    pub fn vertex_at(&self, vertex: u32, t: f32) -> Point3 {
        let segments = self.segment_count();
        if segments == 0 {
            return self.vertex(vertex, 0);
        }
        let s = (t * segments as f32).clamp(0.0, segments as f32);
        let seg = (s.floor() as u32).min(segments - 1);
        let frac = s - seg as f32;
        let a = self.vertex(vertex, seg);
        let b = self.vertex(vertex, seg + 1);
        Point3::new(
            lerp(a.x, b.x, frac),
            lerp(a.y, b.y, frac),
            lerp(a.z, b.z, frac),
        )
    }

    /// Bounding box of a triangle at an arbitrary normalized time.
    pub fn triangle_bounds_at(&self, prim_id: u32, t: f32) -> Aabb3 {
        let mut b = Aabb3::empty();
        for v in self.triangle(prim_id) {
            b.extend_point(&self.vertex_at(v, t));
        }
        b
    }

    /// Linear bounds of a triangle over a time window.
    ///
    /// Anchored at the boxes the triangle occupies at the window's ends,
    /// then widened for every stored sample time strictly inside the
    /// window. Motion is linear between samples, so containment at the
    /// window ends and interior sample times implies containment at every
    /// time in the window.
    pub fn triangle_motion_bounds(&self, prim_id: u32, window: TimeRange) -> LinearBounds {
        if window.is_degenerate() || self.segment_count() == 0 {
            return LinearBounds::constant(self.triangle_bounds_at(prim_id, window.lower));
        }
        let mut lb = LinearBounds::new(
            self.triangle_bounds_at(prim_id, window.lower),
            self.triangle_bounds_at(prim_id, window.upper),
        );
        let segments = self.segment_count();
        for sample in 1..segments {
            let t = sample as f32 / segments as f32;
            if t > window.lower + TOLERANCE && t < window.upper - TOLERANCE {
                lb.widen_to_contain(&self.triangle_bounds_at(prim_id, t), window.to_local(t));
            }
        }
        lb
    }
}

/// A collection of motion meshes addressed by geometry id.
///
/// The unit the build phase and the traversal tests operate on; geometry
/// ids are assigned densely in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MotionScene {
    meshes: Vec<TriangleMotionMesh>,
}

impl MotionScene {
    /// An empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mesh, returning its geometry id.
    pub fn push_mesh(&mut self, mesh: TriangleMotionMesh) -> u32 {
        self.meshes.push(mesh);
        (self.meshes.len() - 1) as u32
    }

    /// Access a mesh by geometry id.
    pub fn mesh(&self, geom_id: u32) -> &TriangleMotionMesh {
        &self.meshes[geom_id as usize]
    }

    /// Number of meshes.
    pub fn mesh_count(&self) -> u32 {
        self.meshes.len() as u32
    }
}

impl MotionGeometry for MotionScene {
    fn time_segment_count(&self, geom_id: u32) -> u32 {
        self.mesh(geom_id).segment_count()
    }

    fn triangle_indices(&self, prim: PrimId) -> [u32; 3] {
        self.mesh(prim.geom_id).triangle(prim.prim_id)
    }

    fn vertex_position(&self, geom_id: u32, vertex: u32, time_sample: u32) -> Point3 {
        self.mesh(geom_id).vertex(vertex, time_sample)
    }

    fn motion_bounds(&self, prim: PrimId, window: TimeRange) -> LinearBounds {
        self.mesh(prim.geom_id)
            .triangle_motion_bounds(prim.prim_id, window)
    }
}
