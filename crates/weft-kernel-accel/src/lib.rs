#![warn(missing_docs)]

//! Motion-blur BVH acceleration for the weft ray-tracing kernel.
//!
//! Builds the spatial vocabulary of `weft-kernel-math` into an acceleration
//! structure over time-varying triangles and answers intersect and occlusion
//! queries for packets of rays.
//!
//! # Architecture
//!
//! - [`primref`] - Build-time primitive references with linear bounds
//! - [`batch`] - Fixed-capacity SoA batches of motion triangles
//! - [`ray`] - Rays, ray packets, and lane masks
//! - [`frustum`] - Conservative packet frusta for subtree culling
//! - [`node`] - Static and motion node layouts plus the tree container
//! - [`traverse`] - Hybrid packet/single-ray traversal
//! - [`intersect`] - Primitive-level intersection at a ray's time
//!
//! # Example
//!
//! ```ignore
//! use weft_kernel_accel::{HybridTraverser, MotionTriangleIntersector,
//!     QueryContext, RayPacket, TraversalConfig};
//!
//! let traverser = HybridTraverser::<_, 8, 4>::new(
//!     &bvh,
//!     MotionTriangleIntersector,
//!     TraversalConfig::default(),
//! )?;
//!
//! let (mut packet, mask) = RayPacket::<8>::from_rays(&rays);
//! traverser.intersect(mask, &mut packet, &QueryContext::default());
//! ```

pub mod batch;
pub mod error;
pub mod frustum;
pub mod intersect;
pub mod node;
pub mod primref;
pub mod ray;
pub mod traverse;

pub use batch::{FillParams, MotionTriangleBatch};
pub use error::{AccelError, Result};
pub use frustum::PacketFrustum;
pub use intersect::{BatchIntersector, MotionTriangleIntersector};
pub use node::{Bvh, ChildBounds, MotionNode, NodeRef, StaticNode, FAN_OUT};
pub use primref::MotionPrimRef;
pub use ray::{Hit, LaneMask, Ray, RayPacket};
pub use traverse::{HybridTraverser, QueryContext, TraversalConfig};

/// Sentinel identifier marking unused batch slots and unset hit ids.
pub const INVALID_ID: u32 = u32::MAX;
