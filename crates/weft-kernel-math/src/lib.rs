#![warn(missing_docs)]

//! Math types for the weft ray-tracing kernel.
//!
//! Thin wrappers around nalgebra providing the spatial vocabulary the
//! acceleration structure is built on: axis-aligned boxes, normalized
//! time intervals, and linearly time-varying bounds.

use nalgebra::Vector3;

mod aabb;
mod linear;
mod time;

pub use aabb::Aabb3;
pub use linear::{global_linear, LinearBounds};
pub use time::TimeRange;

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f32>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f32>;

/// General-purpose geometric tolerance.
pub const TOLERANCE: f32 = 1e-6;

/// Linear interpolation between two scalars.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
