//! Hybrid packet/single-ray BVH traversal.

use crate::error::{AccelError, Result};
use crate::frustum::PacketFrustum;
use crate::intersect::BatchIntersector;
use crate::node::{Bvh, NodeRef, FAN_OUT};
use crate::ray::{LaneMask, RayPacket};

/// Traversal debug logging, enabled by the `debug-traversal` feature.
#[cfg(feature = "debug-traversal")]
macro_rules! debug_trav {
    ($($arg:tt)*) => {
        eprintln!($($arg)*)
    };
}

/// No-op version when the debug-traversal feature is disabled.
#[allow(unused_macros)]
#[cfg(not(feature = "debug-traversal"))]
macro_rules! debug_trav {
    ($($arg:tt)*) => {};
}

/// Packet widths the traverser accepts.
const SUPPORTED_WIDTHS: [usize; 3] = [4, 8, 16];

/// Below this many active lanes a coherent packet degrades to single-ray
/// traversal; coherent packets amortize packet overhead down to the last
/// pair of rays.
const COHERENT_SWITCH_THRESHOLD: u32 = 2;

/// Per-query knobs of a [`HybridTraverser`], validated at construction.
#[derive(Debug, Clone, Copy)]
pub struct TraversalConfig {
    /// Use the numerically safeguarded slab variant everywhere.
    pub robust: bool,
    /// Accept hierarchies containing motion-interpolated nodes.
    pub allow_motion_nodes: bool,
    /// Override the width-dependent packet/single-ray switch threshold.
    pub switch_threshold: Option<u32>,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            robust: false,
            allow_motion_nodes: true,
            switch_threshold: None,
        }
    }
}

/// Caller-supplied state carried through one query.
#[derive(Default, Clone, Copy)]
pub struct QueryContext<'a> {
    /// Geometry filter: primitives for which this returns `false` are
    /// skipped as if absent. `None` accepts everything.
    pub filter: Option<&'a dyn Fn(u32, u32) -> bool>,
}

impl QueryContext<'_> {
    /// Whether a primitive participates in this query.
    pub fn accept(&self, geom_id: u32, prim_id: u32) -> bool {
        self.filter.map_or(true, |f| f(geom_id, prim_id))
    }
}

/// Stack walker answering intersect and occlusion queries for ray packets.
///
/// Per call it decides whether to traverse the packet as a whole behind a
/// conservative frustum or to degrade to one ray at a time: once few lanes
/// remain active, packet-wide tests cull almost nothing and per-ray
/// traversal is cheaper. The switch threshold grows with the packet width
/// since wider packets amortize packet overhead better.
///
/// Queries are read-only over the tree and keep all working state (stack,
/// frustum, active mask) local to the call, so any number of concurrent
/// queries may share one hierarchy.
#[derive(Debug)]
pub struct HybridTraverser<'a, I, const K: usize, const M: usize> {
    bvh: &'a Bvh<M>,
    intersector: I,
    robust: bool,
    switch_threshold: u32,
    stack_capacity: usize,
}

impl<'a, I, const K: usize, const M: usize> HybridTraverser<'a, I, K, M>
where
    I: BatchIntersector<M>,
{
    /// Set up a traverser over a finished hierarchy.
    ///
    /// The (width x node-flavor x robustness) combination is validated
    /// here and never re-checked per ray; an unsupported combination is a
    /// configuration error, not a runtime condition.
    pub fn new(bvh: &'a Bvh<M>, intersector: I, config: TraversalConfig) -> Result<Self> {
        if !SUPPORTED_WIDTHS.contains(&K) {
            return Err(AccelError::UnsupportedConfiguration(format!(
                "packet width {K} is not one of {SUPPORTED_WIDTHS:?}"
            )));
        }
        if M == 0 {
            return Err(AccelError::UnsupportedConfiguration(
                "batch capacity must be non-zero".into(),
            ));
        }
        if bvh.has_motion_nodes() && !config.allow_motion_nodes {
            return Err(AccelError::UnsupportedConfiguration(
                "hierarchy contains motion nodes but the configuration disables them".into(),
            ));
        }

        // Incoherent packets stop paying for packet-wide tests earlier on
        // narrow widths.
        let switch_threshold = config.switch_threshold.unwrap_or(match K {
            4 => 3,
            8 => 5,
            _ => 14,
        });

        Ok(Self {
            bvh,
            intersector,
            robust: config.robust,
            switch_threshold,
            stack_capacity: 1 + (FAN_OUT - 1) * bvh.depth() as usize,
        })
    }

    /// Find the closest hit for every active ray of the packet.
    ///
    /// Committed hits land in the packet's hit state and tighten the
    /// per-lane far distance.
    pub fn intersect(&self, valid: LaneMask<K>, packet: &mut RayPacket<K>, ctx: &QueryContext<'_>) {
        self.query(valid, packet, ctx, false, false);
    }

    /// [`HybridTraverser::intersect`] for packets of similar-direction
    /// rays; skips the frustum narrowing between sibling visits.
    pub fn intersect_coherent(
        &self,
        valid: LaneMask<K>,
        packet: &mut RayPacket<K>,
        ctx: &QueryContext<'_>,
    ) {
        self.query(valid, packet, ctx, false, true);
    }

    /// Test every active ray for any blocking hit.
    ///
    /// A ray is finished as soon as one hit is confirmed; occluded lanes
    /// end with a collapsed travel span.
    pub fn occluded(&self, valid: LaneMask<K>, packet: &mut RayPacket<K>, ctx: &QueryContext<'_>) {
        self.query(valid, packet, ctx, true, false);
    }

    /// [`HybridTraverser::occluded`] for packets of similar-direction rays.
    pub fn occluded_coherent(
        &self,
        valid: LaneMask<K>,
        packet: &mut RayPacket<K>,
        ctx: &QueryContext<'_>,
    ) {
        self.query(valid, packet, ctx, true, true);
    }

    /// Mode decision and dispatch shared by all four entry points.
    fn query(
        &self,
        valid: LaneMask<K>,
        packet: &mut RayPacket<K>,
        ctx: &QueryContext<'_>,
        occlusion: bool,
        coherent: bool,
    ) {
        let active = packet.alive(valid);
        if active.is_empty() {
            return;
        }

        let threshold = if coherent {
            COHERENT_SWITCH_THRESHOLD
        } else {
            self.switch_threshold
        };

        // Packet-mode motion nodes interpolate the frustum's single time;
        // mixed-time packets over a motion tree fall back to per-ray
        // traversal, which evaluates each ray's own time.
        let time = packet.uniform_time(active);
        let mixed_time = self.bvh.has_motion_nodes() && time.is_none();

        if active.count() < threshold || mixed_time {
            debug_trav!(
                "degrading to single-ray: {} active lanes, mixed_time={mixed_time}",
                active.count()
            );
            for k in active.lanes() {
                if occlusion {
                    self.occluded1(packet, k, ctx);
                } else {
                    self.intersect1(packet, k, ctx);
                }
            }
            return;
        }

        self.traverse_packet(active, packet, ctx, occlusion, coherent, time.unwrap_or(0.0));
    }

    /// Walk the tree once for a whole packet behind one frustum.
    fn traverse_packet(
        &self,
        mut active: LaneMask<K>,
        packet: &mut RayPacket<K>,
        ctx: &QueryContext<'_>,
        occlusion: bool,
        coherent: bool,
        time: f32,
    ) {
        let mut frustum = PacketFrustum::new(active, packet, self.robust);
        let mut stack: Vec<(NodeRef, f32)> = Vec::with_capacity(self.stack_capacity);
        stack.push((self.bvh.root(), frustum.min_dist()));

        while let Some((node, entry_dist)) = stack.pop() {
            // Entries pushed before the far bound tightened may be dead.
            if entry_dist > frustum.max_dist() {
                continue;
            }
            match node {
                NodeRef::Empty => {}
                NodeRef::Leaf { first, count } => {
                    for b in first..first + count {
                        let batch = self.bvh.batch(b);
                        for k in active.lanes() {
                            // The frustum is only an envelope; each lane is
                            // tested exactly, at its own time.
                            let ray = packet.ray(k);
                            if occlusion {
                                if self.intersector.occluded(batch, &ray, ctx) {
                                    packet.mark_occluded(k);
                                    active.clear(k);
                                }
                            } else if let Some(hit) =
                                self.intersector.intersect(batch, &ray, ctx)
                            {
                                packet.commit_hit(k, &hit);
                            }
                        }
                    }
                    if occlusion && active.is_empty() {
                        return;
                    }
                    if !coherent {
                        frustum.update_max_dist(active, packet);
                    }
                }
                NodeRef::Node(i) => {
                    let node = self.bvh.node(i);
                    let mut dist = [f32::INFINITY; FAN_OUT];
                    let hits = frustum.intersect_node(&node.bounds, &mut dist);
                    push_ordered(&mut stack, &node.children, hits, &dist);
                }
                NodeRef::Motion(i) => {
                    let node = self.bvh.motion_node(i);
                    let bounds = node.interpolate(time);
                    let mut dist = [f32::INFINITY; FAN_OUT];
                    let hits = frustum.intersect_node(&bounds, &mut dist);
                    push_ordered(&mut stack, &node.children, hits, &dist);
                }
            }
        }
    }

    /// Closest-hit traversal of a single lane.
    ///
    /// A one-lane frustum reduces to that ray's exact slab test, so the
    /// packet node test and visitation order are reused unchanged.
    fn intersect1(&self, packet: &mut RayPacket<K>, k: usize, ctx: &QueryContext<'_>) {
        let mut lane = LaneMask::<K>::none();
        lane.set(k);
        let time = packet.time[k];
        let mut frustum = PacketFrustum::new(lane, packet, self.robust);
        let mut stack: Vec<(NodeRef, f32)> = Vec::with_capacity(self.stack_capacity);
        stack.push((self.bvh.root(), frustum.min_dist()));

        while let Some((node, entry_dist)) = stack.pop() {
            if entry_dist > frustum.max_dist() {
                continue;
            }
            match node {
                NodeRef::Empty => {}
                NodeRef::Leaf { first, count } => {
                    let mut improved = false;
                    for b in first..first + count {
                        let ray = packet.ray(k);
                        if let Some(hit) = self.intersector.intersect(self.bvh.batch(b), &ray, ctx)
                        {
                            packet.commit_hit(k, &hit);
                            improved = true;
                        }
                    }
                    if improved {
                        frustum.update_max_dist(lane, packet);
                    }
                }
                NodeRef::Node(i) => {
                    let node = self.bvh.node(i);
                    let mut dist = [f32::INFINITY; FAN_OUT];
                    let hits = frustum.intersect_node(&node.bounds, &mut dist);
                    push_ordered(&mut stack, &node.children, hits, &dist);
                }
                NodeRef::Motion(i) => {
                    let node = self.bvh.motion_node(i);
                    let bounds = node.interpolate(time);
                    let mut dist = [f32::INFINITY; FAN_OUT];
                    let hits = frustum.intersect_node(&bounds, &mut dist);
                    push_ordered(&mut stack, &node.children, hits, &dist);
                }
            }
        }
    }

    /// Any-hit traversal of a single lane; returns at the first
    /// confirmed hit.
    fn occluded1(&self, packet: &mut RayPacket<K>, k: usize, ctx: &QueryContext<'_>) {
        let mut lane = LaneMask::<K>::none();
        lane.set(k);
        let time = packet.time[k];
        let frustum = PacketFrustum::new(lane, packet, self.robust);
        let mut stack: Vec<(NodeRef, f32)> = Vec::with_capacity(self.stack_capacity);
        stack.push((self.bvh.root(), frustum.min_dist()));

        while let Some((node, entry_dist)) = stack.pop() {
            if entry_dist > frustum.max_dist() {
                continue;
            }
            match node {
                NodeRef::Empty => {}
                NodeRef::Leaf { first, count } => {
                    let ray = packet.ray(k);
                    for b in first..first + count {
                        if self.intersector.occluded(self.bvh.batch(b), &ray, ctx) {
                            packet.mark_occluded(k);
                            return;
                        }
                    }
                }
                NodeRef::Node(i) => {
                    let node = self.bvh.node(i);
                    let mut dist = [f32::INFINITY; FAN_OUT];
                    let hits = frustum.intersect_node(&node.bounds, &mut dist);
                    push_ordered(&mut stack, &node.children, hits, &dist);
                }
                NodeRef::Motion(i) => {
                    let node = self.bvh.motion_node(i);
                    let bounds = node.interpolate(time);
                    let mut dist = [f32::INFINITY; FAN_OUT];
                    let hits = frustum.intersect_node(&bounds, &mut dist);
                    push_ordered(&mut stack, &node.children, hits, &dist);
                }
            }
        }
    }
}

/// Push candidate children far-to-near so the LIFO pops the nearest first.
///
/// Child counts are small and bounded, so an insertion ordering beats a
/// full sort.
fn push_ordered(
    stack: &mut Vec<(NodeRef, f32)>,
    children: &[NodeRef; FAN_OUT],
    hits: u32,
    dist: &[f32; FAN_OUT],
) {
    let mut items = [(NodeRef::Empty, 0.0f32); FAN_OUT];
    let mut n = 0;
    for i in 0..FAN_OUT {
        if hits & (1 << i) != 0 && children[i] != NodeRef::Empty {
            items[n] = (children[i], dist[i]);
            n += 1;
        }
    }
    // Descending by near distance: the nearest child ends up on top.
    for i in 1..n {
        let item = items[i];
        let mut j = i;
        while j > 0 && items[j - 1].1 < item.1 {
            items[j] = items[j - 1];
            j -= 1;
        }
        items[j] = item;
    }
    stack.extend_from_slice(&items[..n]);
}
