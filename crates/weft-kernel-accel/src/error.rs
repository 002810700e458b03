//! Error types for the acceleration core.

use thiserror::Error;

/// Errors raised by hierarchy construction helpers and traverser setup.
///
/// Numeric edge cases (degenerate time windows, zero-volume bounds,
/// infinite reciprocal directions) are never errors; they are absorbed by
/// the masked and robust code paths.
#[derive(Error, Debug)]
pub enum AccelError {
    /// The requested combination of packet width, node flavors, and
    /// robustness is outside the supported set. Detected at setup, never
    /// per ray.
    #[error("unsupported traversal configuration: {0}")]
    UnsupportedConfiguration(String),

    /// A batch fill that assumes a uniform time-segment count was fed
    /// geometry with differing counts.
    #[error("geometry {geom_id} has {found} time segments where the fill expected {expected}")]
    MixedTimeSegments {
        /// Geometry whose segment count differs.
        geom_id: u32,
        /// Segment count the fill was started with.
        expected: u32,
        /// Segment count actually found on the geometry.
        found: u32,
    },
}

/// Result type for acceleration-core operations.
pub type Result<T> = std::result::Result<T, AccelError>;
