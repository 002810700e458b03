#![warn(missing_docs)]

//! Time-varying triangle geometry for the weft kernel.
//!
//! The acceleration core consumes scene geometry through the narrow
//! [`MotionGeometry`] query surface; [`TriangleMotionMesh`] and
//! [`MotionScene`] provide the concrete piecewise-linear implementation.

use weft_kernel_math::{LinearBounds, Point3, TimeRange};

mod mesh;

pub use mesh::{MotionScene, TriangleMotionMesh};

/// A primitive's identity within a scene: which geometry and which
/// triangle inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimId {
    /// Index of the owning geometry.
    pub geom_id: u32,
    /// Index of the triangle within that geometry.
    pub prim_id: u32,
}

impl PrimId {
    /// Pair up a geometry and primitive index.
    pub fn new(geom_id: u32, prim_id: u32) -> Self {
        Self { geom_id, prim_id }
    }
}

/// Query surface through which the acceleration core reads geometry.
///
/// Motion is piecewise linear: a geometry with `n` time segments stores
/// `n + 1` vertex samples at uniformly spaced normalized times, and vertex
/// positions between samples interpolate linearly.
pub trait MotionGeometry {
    /// Number of linear motion segments of a geometry.
    fn time_segment_count(&self, geom_id: u32) -> u32;

    /// Vertex indices of a triangle.
    fn triangle_indices(&self, prim: PrimId) -> [u32; 3];

    /// Position of a vertex at one of the geometry's time samples.
    ///
    /// `time_sample` ranges over `0..=time_segment_count(geom_id)`.
    fn vertex_position(&self, geom_id: u32, vertex: u32, time_sample: u32) -> Point3;

    /// Conservative linear bounds of a primitive over a time window.
    ///
    /// The returned envelope's [0, 1] domain corresponds to `window`; it
    /// must contain the triangle at every time inside the window, derived
    /// from the exact piecewise-linear motion rather than from any coarser
    /// storage of the primitive.
    fn motion_bounds(&self, prim: PrimId, window: TimeRange) -> LinearBounds;
}
