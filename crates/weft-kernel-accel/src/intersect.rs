//! Ray-batch primitive intersection.

use weft_kernel_math::{Point3, Vec3};

use crate::batch::MotionTriangleBatch;
use crate::ray::{Hit, Ray};
use crate::traverse::QueryContext;

/// Determinants below this are treated as parallel; the ray grazes the
/// triangle plane.
const MIN_DET: f32 = 1e-12;

/// Primitive-level intersector a traversal dispatches into at leaves.
///
/// Implementations evaluate exact intersection at the ray's own time;
/// nothing beyond this contract is visible to the traversal.
pub trait BatchIntersector<const M: usize> {
    /// Closest accepted hit of the ray against the batch, if any.
    fn intersect(
        &self,
        batch: &MotionTriangleBatch<M>,
        ray: &Ray,
        ctx: &QueryContext<'_>,
    ) -> Option<Hit>;

    /// Whether any accepted primitive blocks the ray.
    fn occluded(&self, batch: &MotionTriangleBatch<M>, ray: &Ray, ctx: &QueryContext<'_>) -> bool;
}

/// Möller–Trumbore intersector over motion-triangle batches.
///
/// Slots are gated by their valid time sub-interval (lower inclusive,
/// upper exclusive; fills nudge an exact-1.0 upper past 1.0 so t = 1.0
/// stays inside) and by slot validity. Vertices are evaluated at the
/// ray's time before the planar test.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotionTriangleIntersector;

impl MotionTriangleIntersector {
    fn hit_slot<const M: usize>(
        batch: &MotionTriangleBatch<M>,
        i: usize,
        ray: &Ray,
        ctx: &QueryContext<'_>,
        tfar: f32,
    ) -> Option<Hit> {
        if !batch.valid(i) {
            return None;
        }
        let range = batch.time_range(i);
        if !(range.lower <= ray.time && ray.time < range.upper) {
            return None;
        }
        if !ctx.accept(batch.geom_id(i), batch.prim_id(i)) {
            return None;
        }

        let [a, b, c] = batch.positions_at(i, ray.time);
        let (t, u, v) = moeller_trumbore(ray, a, b, c)?;
        if t < ray.tnear || t > tfar {
            return None;
        }
        Some(Hit {
            t,
            u,
            v,
            geom_id: batch.geom_id(i),
            prim_id: batch.prim_id(i),
        })
    }
}

impl<const M: usize> BatchIntersector<M> for MotionTriangleIntersector {
    fn intersect(
        &self,
        batch: &MotionTriangleBatch<M>,
        ray: &Ray,
        ctx: &QueryContext<'_>,
    ) -> Option<Hit> {
        let mut best: Option<Hit> = None;
        let mut tfar = ray.tfar;
        for i in 0..M {
            if let Some(hit) = Self::hit_slot(batch, i, ray, ctx, tfar) {
                tfar = hit.t;
                best = Some(hit);
            }
        }
        best
    }

    fn occluded(&self, batch: &MotionTriangleBatch<M>, ray: &Ray, ctx: &QueryContext<'_>) -> bool {
        (0..M).any(|i| Self::hit_slot(batch, i, ray, ctx, ray.tfar).is_some())
    }
}

/// Möller–Trumbore ray/triangle test, returning `(t, u, v)`.
fn moeller_trumbore(ray: &Ray, a: Point3, b: Point3, c: Point3) -> Option<(f32, f32, f32)> {
    let e1: Vec3 = b - a;
    let e2: Vec3 = c - a;
    let pvec = ray.dir.cross(&e2);
    let det = e1.dot(&pvec);
    if det.abs() < MIN_DET {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = ray.origin - a;
    let u = tvec.dot(&pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(&e1);
    let v = ray.dir.dot(&qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(&qvec) * inv_det;
    Some((t, u, v))
}
