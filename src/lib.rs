//! # dycore-topology
//!
//! Distributed mesh topology core for dynamical-core solvers: partitioned
//! unstructured hex/quad element meshes with explicit ghost layers,
//! neighbor-communication descriptors, and face-to-face connectivity
//! (including relative orientation) between elements.
//!
//! Four topology flavors are built atop one shared connectivity engine:
//! - [`Topology::brick`] — a d-dimensional axis-aligned brick of logically
//!   cartesian elements, optionally periodic along any axis.
//! - [`Topology::stacked_brick`] — a (d-1)-dimensional brick extruded along
//!   the last axis into vertical stacks that are never split across ranks.
//! - [`Topology::cubed_shell`] — a logically 2-D mesh of the six faces of a
//!   cube embedded in 3-D, later warped to a spherical shell by
//!   [`warp::cubed_sphere_warp`].
//! - [`Topology::stacked_cubed_sphere`] — the cubed shell extruded radially
//!   into 3-D spherical shell layers.
//!
//! Construction is collective and deterministic: elements are ordered along
//! a Hilbert curve, each rank owns a contiguous slice of that ordering, and
//! the same inputs always produce bitwise-identical tables. Message passing
//! is consumed only through the thin [`comm::Communicator`] port; a serial
//! [`comm::NoComm`], an in-process [`comm::LocalComm`] universe for
//! threaded tests, and an optional MPI adapter (feature `mpi-support`) are
//! provided.
//!
//! ```
//! use std::sync::Arc;
//! use dycore_topology::prelude::*;
//!
//! # fn try_main() -> Result<(), dycore_topology::error::TopologyError> {
//! let comm = Arc::new(NoComm);
//! let x: Vec<f64> = (0..=10).map(f64::from).collect();
//! let topology = Topology::brick(
//!     comm,
//!     &[x],
//!     BrickOptions {
//!         periodicity: Some(vec![true]),
//!         ..BrickOptions::default()
//!     },
//! )?;
//! assert_eq!(topology.realelems().len(), 10);
//! assert!(topology.ghostelems().is_empty());
//! # Ok(())
//! # }
//! # try_main().unwrap();
//! ```

pub mod comm;
pub mod error;
pub mod mesh;
pub mod topology;
pub mod warp;

/// A convenient prelude importing the most-used types.
pub mod prelude {
    pub use crate::comm::{Communicator, LocalComm, NoComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::error::TopologyError;
    pub use crate::topology::orientation::FaceOrder;
    pub use crate::topology::{
        BrickOptions, Connectivity, ShellOptions, SphereOptions, Topology, TopologyKind,
    };
    pub use crate::warp::{cubed_sphere_warp, cubed_sphere_warp_with_radius};
}
