//! `TopologyError`: unified error type for topology construction.
//!
//! Construction either returns a fully built, immutable topology or one of
//! these errors; no partially constructed topology is ever handed out.
//! Accessors on a built topology cannot fail.

use thiserror::Error;

/// Unified error type for mesh topology construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// A caller requested an option outside the supported set
    /// (non-face connectivity, ghost layers deeper than one, ...).
    #[error("unsupported option: {0}")]
    Unsupported(String),

    /// The requested mesh shape is malformed (empty axis, too few
    /// dimensions, non-monotonic radial range, mismatched option lengths).
    #[error("invalid mesh shape: {0}")]
    InvalidShape(String),

    /// The connectivity engine detected inconsistent collective input:
    /// a face shared by more than two elements, an orientation that does
    /// not form a valid corner permutation, or a dangling neighbor id.
    #[error("mesh invariant violated: {0}")]
    MeshInvariant(String),

    /// The cubed-sphere warp was called with a point that has no dominant
    /// cube face (the origin).
    #[error("warp input has no dominant cube face")]
    InvalidWarpInput,
}
