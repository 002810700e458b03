//! Build-time references to time-varying primitives.

use weft_kernel_math::{Aabb3, LinearBounds, Point3, TimeRange};

use weft_kernel_geometry::{MotionGeometry, PrimId};

use crate::batch::FillParams;

/// A primitive reference used as hierarchy-build input.
///
/// Pairs a primitive's linear bounds over its active time window with its
/// identity and time-segment bookkeeping. Created during scene
/// pre-processing, reordered freely during construction, and discarded once
/// leaves are built; its information survives in batch records and node
/// bounds.
#[derive(Debug, Clone, Copy)]
pub struct MotionPrimRef {
    lbounds: LinearBounds,
    time_range: TimeRange,
    geom_id: u32,
    prim_id: u32,
    active_segments: u32,
    total_segments: u32,
}

impl MotionPrimRef {
    /// Create a reference from explicit parts.
    pub fn new(
        lbounds: LinearBounds,
        time_range: TimeRange,
        geom_id: u32,
        prim_id: u32,
        active_segments: u32,
        total_segments: u32,
    ) -> Self {
        Self {
            lbounds,
            time_range,
            geom_id,
            prim_id,
            active_segments,
            total_segments,
        }
    }

    /// Derive a reference for one primitive restricted to a time window.
    ///
    /// The active segment count uses the same tolerance-nudged rounding as
    /// the batch fill, so a reference and the fill that later consumes it
    /// agree on which segments the window touches.
    pub fn from_geometry(
        scene: &impl MotionGeometry,
        prim: PrimId,
        window: TimeRange,
        params: &FillParams,
    ) -> Self {
        let total = scene.time_segment_count(prim.geom_id);
        let active = if total == 0 {
            0
        } else {
            let (ilower, iupper) = params.segment_span(window, total);
            (iupper - ilower).max(0) as u32
        };
        Self {
            lbounds: scene.motion_bounds(prim, window),
            time_range: window,
            geom_id: prim.geom_id,
            prim_id: prim.prim_id,
            active_segments: active,
            total_segments: total,
        }
    }

    /// Linear bounds over the active window.
    pub fn bounds(&self) -> LinearBounds {
        self.lbounds
    }

    /// The active time window.
    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    /// Number of the primitive's global time segments inside the window.
    ///
    /// The builder compares this against [`MotionPrimRef::total_time_segments`]
    /// to decide whether a primitive is worth splitting further in time.
    pub fn size(&self) -> u32 {
        self.active_segments
    }

    /// The primitive's global time-segment count.
    pub fn total_time_segments(&self) -> u32 {
        self.total_segments
    }

    /// Owning geometry id.
    pub fn geom_id(&self) -> u32 {
        self.geom_id
    }

    /// Primitive id within the geometry.
    pub fn prim_id(&self) -> u32 {
        self.prim_id
    }

    /// Centroid used for binning: center of the envelope at the window
    /// midpoint.
    pub fn bin_center(&self) -> Point3 {
        self.lbounds.interpolate(0.5).center()
    }

    /// Bounds and centroid for time-varying binning.
    pub fn bin_bounds_and_center(&self) -> (LinearBounds, Point3) {
        (self.lbounds, self.bin_center())
    }

    /// Static-proxy bounds and centroid: the box at the window midpoint.
    ///
    /// Some build phases bin on a static criterion even for moving
    /// primitives; both forms are therefore exposed.
    pub fn bin_bounds_and_center_static(&self) -> (Aabb3, Point3) {
        let bounds = self.lbounds.interpolate(0.5);
        let center = bounds.center();
        (bounds, center)
    }

    /// Total ordering key packing `(prim_id, geom_id)`.
    pub fn id64(&self) -> u64 {
        ((self.prim_id as u64) << 32) | self.geom_id as u64
    }
}

/// References order and compare by identity alone, so sorting and dedup
/// during construction are deterministic regardless of bound jitter.
impl PartialEq for MotionPrimRef {
    fn eq(&self, other: &Self) -> bool {
        self.id64() == other.id64()
    }
}

impl Eq for MotionPrimRef {}

impl PartialOrd for MotionPrimRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MotionPrimRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id64().cmp(&other.id64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_kernel_math::Vec3;
    use weft_kernel_geometry::{MotionScene, TriangleMotionMesh};

    fn two_step_scene() -> MotionScene {
        let base = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let moved: Vec<Point3> = base.iter().map(|p| p + Vec3::new(2.0, 0.0, 0.0)).collect();
        let mut scene = MotionScene::new();
        scene.push_mesh(TriangleMotionMesh::new(vec![[0, 1, 2]], vec![base, moved]));
        scene
    }

    #[test]
    fn test_from_geometry_full_window() {
        let scene = two_step_scene();
        let r = MotionPrimRef::from_geometry(
            &scene,
            PrimId::new(0, 0),
            TimeRange::UNIT,
            &FillParams::default(),
        );
        assert_eq!(r.size(), 1);
        assert_eq!(r.total_time_segments(), 1);
        // Envelope endpoints are the triangle boxes at t=0 and t=1.
        assert!((r.bounds().bounds0.lower.x - 0.0).abs() < 1e-6);
        assert!((r.bounds().bounds1.lower.x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_bin_center_midpoint() {
        let scene = two_step_scene();
        let r = MotionPrimRef::from_geometry(
            &scene,
            PrimId::new(0, 0),
            TimeRange::UNIT,
            &FillParams::default(),
        );
        // At t=0.5 the triangle spans x in [1, 2].
        assert!((r.bin_center().x - 1.5).abs() < 1e-5);
        let (static_bounds, center) = r.bin_bounds_and_center_static();
        assert!((static_bounds.lower.x - 1.0).abs() < 1e-5);
        assert_eq!(center, r.bin_center());
    }

    #[test]
    fn test_id64_ordering() {
        let lb = LinearBounds::empty();
        let mk = |geom, prim| MotionPrimRef::new(lb, TimeRange::UNIT, geom, prim, 1, 1);
        let mut refs = [mk(1, 2), mk(0, 1), mk(2, 1), mk(3, 0)];
        refs.sort_unstable();
        let ids: Vec<_> = refs.iter().map(|r| (r.prim_id(), r.geom_id())).collect();
        assert_eq!(ids, vec![(0, 3), (1, 0), (1, 2), (2, 1)]);
    }

    #[test]
    fn test_dedup_by_identity() {
        let lb = LinearBounds::empty();
        let mut refs = vec![
            MotionPrimRef::new(lb, TimeRange::UNIT, 0, 1, 1, 1),
            MotionPrimRef::new(lb, TimeRange::UNIT, 0, 1, 2, 4),
            MotionPrimRef::new(lb, TimeRange::UNIT, 1, 1, 1, 1),
        ];
        refs.dedup();
        assert_eq!(refs.len(), 2);
    }
}
