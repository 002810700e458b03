//! Fixed-capacity batches of time-varying triangles.

use std::ops::Range;

use rayon::prelude::*;

use weft_kernel_math::{global_linear, Aabb3, LinearBounds, Point3, TimeRange, Vec3};

use weft_kernel_geometry::{MotionGeometry, PrimId};

use crate::error::{AccelError, Result};
use crate::primref::MotionPrimRef;
use crate::INVALID_ID;

/// Tunable constants of the batch-fill algorithms.
///
/// The segment rounding factors and the upper-time nudge are empirically
/// tuned; they widen segment-boundary comparisons just enough that
/// floating rounding never excludes a boundary segment or a t = 1.0 ray.
#[derive(Debug, Clone, Copy)]
pub struct FillParams {
    /// Relative factor applied before rounding a window's lower segment
    /// index up.
    pub round_down: f32,
    /// Relative factor applied before rounding a window's upper segment
    /// index down.
    pub round_up: f32,
    /// Added to a slot's exact-1.0 upper time bound so that degenerate
    /// interval tests downstream keep t = 1.0 inside.
    pub upper_nudge: f32,
}

impl Default for FillParams {
    fn default() -> Self {
        Self {
            round_down: 0.9999,
            round_up: 1.0001,
            upper_nudge: f32::EPSILON,
        }
    }
}

impl FillParams {
    /// Inclusive-exclusive range of a geometry's time segments overlapping
    /// `window`, under the tolerance-nudged rounding.
    pub fn segment_span(&self, window: TimeRange, segments: u32) -> (i32, i32) {
        let ilower = (self.round_down * window.lower * segments as f32).ceil() as i32;
        let iupper = (self.round_up * window.upper * segments as f32).floor() as i32;
        (ilower.max(0), iupper.min(segments as i32))
    }

    /// A slot time range with the upper bound nudged past an exact 1.0.
    fn slot_range(&self, range: TimeRange) -> TimeRange {
        let upper = if range.upper >= 1.0 {
            1.0 + self.upper_nudge
        } else {
            range.upper
        };
        TimeRange::new(range.lower, upper)
    }
}

/// Up to `M` time-varying triangles in structure-of-arrays layout.
///
/// Each slot stores vertex positions at global t = 0 plus per-unit-time
/// deltas, so a vertex at time t is `v + t * dv`, together with the slot's
/// own valid time sub-interval and identifiers. Slots are filled front to
/// back; the sentinel geometry id [`INVALID_ID`] marks unused slots, and
/// every reduction over the batch masks them out rather than truncating
/// iteration.
#[derive(Debug, Clone, Copy)]
pub struct MotionTriangleBatch<const M: usize> {
    v0: [Point3; M],
    v1: [Point3; M],
    v2: [Point3; M],
    dv0: [Vec3; M],
    dv1: [Vec3; M],
    dv2: [Vec3; M],
    time_lower: [f32; M],
    time_upper: [f32; M],
    geom_ids: [u32; M],
    prim_ids: [u32; M],
}

impl<const M: usize> Default for MotionTriangleBatch<M> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<const M: usize> MotionTriangleBatch<M> {
    /// A batch with every slot unused.
    pub fn empty() -> Self {
        Self {
            v0: [Point3::origin(); M],
            v1: [Point3::origin(); M],
            v2: [Point3::origin(); M],
            dv0: [Vec3::zeros(); M],
            dv1: [Vec3::zeros(); M],
            dv2: [Vec3::zeros(); M],
            time_lower: [0.0; M],
            time_upper: [0.0; M],
            geom_ids: [INVALID_ID; M],
            prim_ids: [INVALID_ID; M],
        }
    }

    /// Maximum number of stored triangles.
    pub fn max_size() -> usize {
        M
    }

    /// Number of batches required for `n` slots.
    pub fn blocks(n: usize) -> usize {
        n.div_ceil(M)
    }

    /// Whether slot `i` holds a triangle.
    pub fn valid(&self, i: usize) -> bool {
        self.geom_ids[i] != INVALID_ID
    }

    /// Index of the first unused slot.
    ///
    /// Slots are filled front to back, so this is also the number of
    /// stored triangles.
    pub fn size(&self) -> usize {
        (0..M).find(|&i| !self.valid(i)).unwrap_or(M)
    }

    /// Geometry id of slot `i`.
    pub fn geom_id(&self, i: usize) -> u32 {
        self.geom_ids[i]
    }

    /// Primitive id of slot `i`.
    pub fn prim_id(&self, i: usize) -> u32 {
        self.prim_ids[i]
    }

    /// Valid time sub-interval of slot `i`.
    pub fn time_range(&self, i: usize) -> TimeRange {
        TimeRange::new(self.time_lower[i], self.time_upper[i])
    }

    /// The three vertex positions of slot `i` evaluated at time `t`.
    pub fn positions_at(&self, i: usize, t: f32) -> [Point3; 3] {
        [
            self.v0[i] + self.dv0[i] * t,
            self.v1[i] + self.dv1[i] * t,
            self.v2[i] + self.dv2[i] * t,
        ]
    }

    fn set_slot(
        &mut self,
        i: usize,
        a: (Point3, Point3),
        b: (Point3, Point3),
        c: (Point3, Point3),
        time: TimeRange,
        geom_id: u32,
        prim_id: u32,
    ) {
        self.v0[i] = a.0;
        self.v1[i] = b.0;
        self.v2[i] = c.0;
        self.dv0[i] = a.1 - a.0;
        self.dv1[i] = b.1 - b.0;
        self.dv2[i] = c.1 - c.0;
        self.time_lower[i] = time.lower;
        self.time_upper[i] = time.upper;
        self.geom_ids[i] = geom_id;
        self.prim_ids[i] = prim_id;
    }

    /// Box over the stored t = 0 endpoints of all valid slots.
    pub fn bounds0(&self) -> Aabb3 {
        let mut b = Aabb3::empty();
        for i in 0..M {
            if self.valid(i) {
                b.extend_point(&self.v0[i]);
                b.extend_point(&self.v1[i]);
                b.extend_point(&self.v2[i]);
            }
        }
        b
    }

    /// Box over the stored t = 1 endpoints of all valid slots.
    pub fn bounds1(&self) -> Aabb3 {
        let mut b = Aabb3::empty();
        for i in 0..M {
            if self.valid(i) {
                b.extend_point(&(self.v0[i] + self.dv0[i]));
                b.extend_point(&(self.v1[i] + self.dv1[i]));
                b.extend_point(&(self.v2[i] + self.dv2[i]));
            }
        }
        b
    }

    /// Linear bounds over the stored endpoints of all valid slots.
    pub fn linear_bounds(&self) -> LinearBounds {
        LinearBounds::new(self.bounds0(), self.bounds1())
    }

    /// Fill this batch from a run of primitive references sharing one
    /// uniform time range.
    ///
    /// Consumes up to `M` references starting at `*cursor` (not past
    /// `end`), advancing the cursor past what was consumed. Each
    /// primitive's raw vertex positions are read at its motion's first and
    /// last sample, and every slot receives the uniform time range
    /// `[0, 1 + nudge]`; this is exact for single-segment motion, which is
    /// what uniform fills are used for. Returns the union of the raw
    /// endpoint boxes of everything written.
    ///
    /// Fails with [`AccelError::MixedTimeSegments`] when the run mixes
    /// differing global time-segment counts; multi-segment content belongs
    /// in [`MotionTriangleBatch::fill_mblur`].
    pub fn fill(
        &mut self,
        prims: &[MotionPrimRef],
        cursor: &mut usize,
        end: usize,
        scene: &impl MotionGeometry,
        params: &FillParams,
    ) -> Result<LinearBounds> {
        debug_assert!(*cursor < end, "fill requires a non-empty reference run");
        let mut fresh = Self::empty();
        let mut bounds0 = Aabb3::empty();
        let mut bounds1 = Aabb3::empty();

        let expected = scene.time_segment_count(prims[*cursor].geom_id());
        // Static geometry has a single sample; moving geometry is read at
        // its first and last.
        let last_sample = expected;
        let slot_time = params.slot_range(TimeRange::UNIT);

        let mut i = 0;
        while i < M && *cursor < end {
            let prim = &prims[*cursor];
            let found = scene.time_segment_count(prim.geom_id());
            if found != expected {
                return Err(AccelError::MixedTimeSegments {
                    geom_id: prim.geom_id(),
                    expected,
                    found,
                });
            }
            let indices = scene.triangle_indices(PrimId::new(prim.geom_id(), prim.prim_id()));
            let mut corners = [(Point3::origin(), Point3::origin()); 3];
            for (corner, &vertex) in corners.iter_mut().zip(indices.iter()) {
                let p0 = scene.vertex_position(prim.geom_id(), vertex, 0);
                let p1 = scene.vertex_position(prim.geom_id(), vertex, last_sample);
                bounds0.extend_point(&p0);
                bounds1.extend_point(&p1);
                *corner = (p0, p1);
            }
            fresh.set_slot(
                i,
                corners[0],
                corners[1],
                corners[2],
                slot_time,
                prim.geom_id(),
                prim.prim_id(),
            );
            i += 1;
            *cursor += 1;
        }

        *self = fresh;
        Ok(LinearBounds::new(bounds0, bounds1))
    }

    /// Fill batches from primitive references restricted to a time window,
    /// one slot per overlapping time segment.
    ///
    /// For each primitive the inclusive range of its own global time
    /// segments overlapping `window` is computed with the tolerance-nudged
    /// rounding of [`FillParams::segment_span`]; each overlapping segment
    /// becomes one slot whose endpoint positions are extrapolated to the
    /// global [0, 1] line and whose time range is the segment clipped to
    /// the window. A batch is flushed whenever it reaches capacity.
    ///
    /// The returned bound is the union of each primitive's exact motion
    /// bounds over the window, queried from the scene rather than derived
    /// from the written slots, so it is independent of how slots were
    /// distributed across batches.
    pub fn fill_mblur(
        prims: &[MotionPrimRef],
        range: Range<usize>,
        window: TimeRange,
        scene: &impl MotionGeometry,
        params: &FillParams,
    ) -> (Vec<Self>, LinearBounds) {
        let mut batches = Vec::new();
        let mut current = Self::empty();
        let mut lid = 0;
        let mut all_bounds = LinearBounds::empty();

        let flush_if_full = |current: &mut Self, lid: &mut usize, batches: &mut Vec<Self>| {
            if *lid == M {
                batches.push(*current);
                *current = Self::empty();
                *lid = 0;
            }
        };

        for prim in &prims[range] {
            let id = PrimId::new(prim.geom_id(), prim.prim_id());
            let indices = scene.triangle_indices(id);
            all_bounds.extend(&scene.motion_bounds(id, window));

            let segments = scene.time_segment_count(prim.geom_id());
            if segments == 0 {
                // Static geometry occupies one slot covering the window.
                let mut corners = [(Point3::origin(), Point3::origin()); 3];
                for (corner, &vertex) in corners.iter_mut().zip(indices.iter()) {
                    let p = scene.vertex_position(prim.geom_id(), vertex, 0);
                    *corner = (p, p);
                }
                current.set_slot(
                    lid,
                    corners[0],
                    corners[1],
                    corners[2],
                    params.slot_range(window),
                    prim.geom_id(),
                    prim.prim_id(),
                );
                lid += 1;
                flush_if_full(&mut current, &mut lid, &mut batches);
                continue;
            }

            let (ilower, iupper) = params.segment_span(window, segments);
            for j in ilower..iupper {
                let segment = TimeRange::new(
                    j as f32 / segments as f32,
                    (j + 1) as f32 / segments as f32,
                );
                let mut corners = [(Point3::origin(), Point3::origin()); 3];
                for (corner, &vertex) in corners.iter_mut().zip(indices.iter()) {
                    let p0 = scene.vertex_position(prim.geom_id(), vertex, j as u32);
                    let p1 = scene.vertex_position(prim.geom_id(), vertex, j as u32 + 1);
                    *corner = global_linear((p0, p1), segment);
                }
                let slot_time = TimeRange::intersect(window, segment);
                current.set_slot(
                    lid,
                    corners[0],
                    corners[1],
                    corners[2],
                    params.slot_range(slot_time),
                    prim.geom_id(),
                    prim.prim_id(),
                );
                lid += 1;
                flush_if_full(&mut current, &mut lid, &mut batches);
            }
        }

        if lid != 0 {
            batches.push(current);
        }
        (batches, all_bounds)
    }

    /// Number of batches [`MotionTriangleBatch::fill_mblur`] will emit for
    /// a range, without touching vertex data.
    pub fn fill_mblur_blocks(
        prims: &[MotionPrimRef],
        range: Range<usize>,
        window: TimeRange,
        scene: &impl MotionGeometry,
        params: &FillParams,
    ) -> usize {
        let mut slots = 0usize;
        for prim in &prims[range] {
            let segments = scene.time_segment_count(prim.geom_id());
            if segments == 0 {
                slots += 1;
            } else {
                let (ilower, iupper) = params.segment_span(window, segments);
                slots += (iupper - ilower).max(0) as usize;
            }
        }
        Self::blocks(slots)
    }

    /// Run [`MotionTriangleBatch::fill_mblur`] over disjoint leaf ranges
    /// in parallel.
    ///
    /// Each range fills into its own output slot, so the fan-out needs no
    /// synchronization beyond the deterministic range-to-slot mapping; the
    /// result vector is aligned with `ranges`.
    pub fn fill_leaves_par<S>(
        prims: &[MotionPrimRef],
        ranges: &[Range<usize>],
        window: TimeRange,
        scene: &S,
        params: &FillParams,
    ) -> Vec<(Vec<Self>, LinearBounds)>
    where
        S: MotionGeometry + Sync,
    {
        ranges
            .par_iter()
            .map(|range| Self::fill_mblur(prims, range.clone(), window, scene, params))
            .collect()
    }
}
