//! Topology facade: the four public mesh constructors and the read-only
//! query surface consumed by downstream grid builders.
//!
//! A [`Topology`] is one rank's immutable view of a partitioned hex/quad
//! mesh: contiguous real and ghost element ranges, face-neighbor tables
//! with orientation codes, boundary tags, and per-neighbor send/receive
//! descriptors. Construction is collective across the communicator and
//! either yields a fully consistent topology on every rank or fails with a
//! [`TopologyError`]; nothing partial is ever returned.

pub mod orientation;
pub(crate) mod stack;

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::comm::Communicator;
use crate::error::TopologyError;
use crate::mesh::brick::brickmesh;
use crate::mesh::connect::{connectmesh, MeshConnectivity};
use crate::mesh::partition::sfc_partition;
use crate::mesh::shell::cubedshellmesh;
use orientation::FaceOrder;
use stack::StackMode;

/// Which constructor produced a topology.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TopologyKind {
    Brick,
    StackedBrick,
    CubedShell,
    StackedCubedSphere,
}

impl TopologyKind {
    /// Stacked kinds keep whole vertical columns on one rank.
    #[inline]
    pub fn is_stacked(self) -> bool {
        matches!(
            self,
            TopologyKind::StackedBrick | TopologyKind::StackedCubedSphere
        )
    }
}

/// Face connectivity flavor. Only [`Connectivity::Face`] is supported;
/// requesting vertex-reachable neighbors fails with
/// [`TopologyError::Unsupported`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Connectivity {
    #[default]
    Face,
    Full,
}

/// Options for [`Topology::brick`] and [`Topology::stacked_brick`].
#[derive(Clone, Debug)]
pub struct BrickOptions {
    /// Per-axis wrap flags; defaults to all false. For stacked bricks the
    /// last axis is the stacked one and may be periodic.
    pub periodicity: Option<Vec<bool>>,
    /// Per-axis `[low, high]` boundary tags (positive); defaults to all 1.
    pub boundary: Option<Vec<[i32; 2]>>,
    pub connectivity: Connectivity,
    /// Ghost layer depth; only 1 is supported.
    pub ghostsize: usize,
}

impl Default for BrickOptions {
    fn default() -> Self {
        Self {
            periodicity: None,
            boundary: None,
            connectivity: Connectivity::Face,
            ghostsize: 1,
        }
    }
}

/// Options for [`Topology::cubed_shell`].
#[derive(Clone, Debug)]
pub struct ShellOptions {
    pub connectivity: Connectivity,
    pub ghostsize: usize,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            connectivity: Connectivity::Face,
            ghostsize: 1,
        }
    }
}

/// Options for [`Topology::stacked_cubed_sphere`].
#[derive(Clone, Debug)]
pub struct SphereOptions {
    pub connectivity: Connectivity,
    pub ghostsize: usize,
    /// `[inner, outer]` radial boundary tags.
    pub bc: [i32; 2],
}

impl Default for SphereOptions {
    fn default() -> Self {
        Self {
            connectivity: Connectivity::Face,
            ghostsize: 1,
            bc: [1, 1],
        }
    }
}

fn check_supported(connectivity: Connectivity, ghostsize: usize) -> Result<(), TopologyError> {
    if connectivity != Connectivity::Face {
        return Err(TopologyError::Unsupported(
            "only face connectivity is supported".into(),
        ));
    }
    if ghostsize != 1 {
        return Err(TopologyError::Unsupported(format!(
            "only a ghost layer of depth 1 is supported, got {ghostsize}"
        )));
    }
    Ok(())
}

fn check_boundary_tags(boundary: &[[i32; 2]]) -> Result<(), TopologyError> {
    if boundary.iter().flatten().any(|&tag| tag <= 0) {
        return Err(TopologyError::InvalidShape(
            "boundary tags must be positive".into(),
        ));
    }
    Ok(())
}

/// One rank's immutable view of a partitioned element mesh.
///
/// Local element indices are `0..nreal + nghost`: the rank's own elements
/// first, then ghost mirrors of neighbor-rank elements referenced across a
/// face. Faces are numbered in Cartesian order (axis `a`: face `2a` low,
/// `2a + 1` high); corners likewise (bit `k` of the corner index selects
/// low/high along axis `k`).
pub struct Topology<C: Communicator> {
    kind: TopologyKind,
    dim: usize,
    comm: Arc<C>,
    nglobal: usize,
    global_offset: usize,
    nreal: usize,
    nghost: usize,
    stacksize: Option<usize>,
    elem_to_elem: Vec<usize>,
    elem_to_face: Vec<u8>,
    elem_to_ordr: Vec<FaceOrder>,
    elem_to_bndy: Vec<i32>,
    elem_to_coord: Vec<f64>,
    send_elems: Vec<usize>,
    nabr_to_rank: Vec<usize>,
    nabr_to_recv: Vec<Range<usize>>,
    nabr_to_send: Vec<Range<usize>>,
}

impl<C: Communicator> fmt::Debug for Topology<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topology")
            .field("kind", &self.kind)
            .field("dim", &self.dim)
            .field("nreal", &self.nreal)
            .field("nghost", &self.nghost)
            .field("stacksize", &self.stacksize)
            .field("nabr_to_rank", &self.nabr_to_rank)
            .finish_non_exhaustive()
    }
}

impl<C: Communicator> Topology<C> {
    /// Build a d-dimensional axis-aligned brick of logically cartesian
    /// elements, optionally periodic along any axis.
    ///
    /// `elemrange[a]` lists the element corner coordinates along axis `a`.
    /// Collective: every rank of `comm` must call with identical arguments.
    pub fn brick(
        comm: Arc<C>,
        elemrange: &[Vec<f64>],
        opts: BrickOptions,
    ) -> Result<Self, TopologyError> {
        check_supported(opts.connectivity, opts.ghostsize)?;
        let dim = elemrange.len();
        if !(1..=3).contains(&dim) {
            return Err(TopologyError::InvalidShape(format!(
                "brick topologies support 1 to 3 dimensions, got {dim}"
            )));
        }
        let periodicity = opts.periodicity.unwrap_or_else(|| vec![false; dim]);
        let boundary = opts.boundary.unwrap_or_else(|| vec![[1, 1]; dim]);
        if periodicity.len() != dim || boundary.len() != dim {
            return Err(TopologyError::InvalidShape(format!(
                "periodicity/boundary must have one entry per axis ({dim})"
            )));
        }
        check_boundary_tags(&boundary)?;

        let mesh = brickmesh(
            elemrange,
            &periodicity,
            &boundary,
            comm.rank(),
            comm.size(),
        )?;
        let mesh = sfc_partition(comm.as_ref(), mesh)?;
        let conn = connectmesh(comm.as_ref(), &mesh)?;
        let topo = Self::assemble(
            TopologyKind::Brick,
            dim,
            comm,
            mesh.nglobal,
            mesh.first_global,
            None,
            conn,
        );
        debug_assert_eq!(topo.validate(), Ok(()));
        Ok(topo)
    }

    /// Build a (d-1)-dimensional brick extruded along the last axis into
    /// vertical stacks that are never split across ranks.
    ///
    /// The last entry of `elemrange` is the stack coordinate; the last
    /// entries of `periodicity`/`boundary` apply to the stacked axis.
    pub fn stacked_brick(
        comm: Arc<C>,
        elemrange: &[Vec<f64>],
        opts: BrickOptions,
    ) -> Result<Self, TopologyError> {
        check_supported(opts.connectivity, opts.ghostsize)?;
        let dim = elemrange.len();
        if !(2..=3).contains(&dim) {
            return Err(TopologyError::InvalidShape(format!(
                "stacked bricks need 2 or 3 dimensions, got {dim}"
            )));
        }
        let periodicity = opts.periodicity.unwrap_or_else(|| vec![false; dim]);
        let boundary = opts.boundary.unwrap_or_else(|| vec![[1, 1]; dim]);
        if periodicity.len() != dim || boundary.len() != dim {
            return Err(TopologyError::InvalidShape(format!(
                "periodicity/boundary must have one entry per axis ({dim})"
            )));
        }
        check_boundary_tags(&boundary)?;

        let base = Self::brick(
            comm,
            &elemrange[..dim - 1],
            BrickOptions {
                periodicity: Some(periodicity[..dim - 1].to_vec()),
                boundary: Some(boundary[..dim - 1].to_vec()),
                ..BrickOptions::default()
            },
        )?;
        let topo = stack::extrude(
            base,
            TopologyKind::StackedBrick,
            &elemrange[dim - 1],
            StackMode::Brick {
                periodic: periodicity[dim - 1],
                bc: boundary[dim - 1],
            },
        )?;
        debug_assert_eq!(topo.validate(), Ok(()));
        Ok(topo)
    }

    /// Build the six-face cubed shell: a logically 2-D mesh of `6 * ne^2`
    /// quads covering the surface of the `[-1, 1]^3` cube.
    pub fn cubed_shell(
        comm: Arc<C>,
        ne: usize,
        opts: ShellOptions,
    ) -> Result<Self, TopologyError> {
        check_supported(opts.connectivity, opts.ghostsize)?;
        let mesh = cubedshellmesh(ne, comm.rank(), comm.size())?;
        let mesh = sfc_partition(comm.as_ref(), mesh)?;
        let conn = connectmesh(comm.as_ref(), &mesh)?;
        let topo = Self::assemble(
            TopologyKind::CubedShell,
            2,
            comm,
            mesh.nglobal,
            mesh.first_global,
            None,
            conn,
        );
        debug_assert_eq!(topo.validate(), Ok(()));
        Ok(topo)
    }

    /// Build the cubed shell extruded radially into 3-D spherical shell
    /// layers that are never split across ranks.
    ///
    /// `rrange` lists the shell radii (strictly increasing, length >= 2);
    /// base coordinates are scaled by each radius, so corners end up on
    /// cubes of half-side `rrange[j]` ready for the gnomonic warp.
    pub fn stacked_cubed_sphere(
        comm: Arc<C>,
        nhorz: usize,
        rrange: &[f64],
        opts: SphereOptions,
    ) -> Result<Self, TopologyError> {
        check_supported(opts.connectivity, opts.ghostsize)?;
        if rrange.len() < 2 || rrange.windows(2).any(|w| w[1] <= w[0]) {
            return Err(TopologyError::InvalidShape(
                "rrange must be strictly increasing with at least two radii".into(),
            ));
        }
        if opts.bc.iter().any(|&tag| tag <= 0) {
            return Err(TopologyError::InvalidShape(
                "radial boundary tags must be positive".into(),
            ));
        }
        let base = Self::cubed_shell(
            comm,
            nhorz,
            ShellOptions::default(),
        )?;
        let topo = stack::extrude(
            base,
            TopologyKind::StackedCubedSphere,
            rrange,
            StackMode::Sphere { bc: opts.bc },
        )?;
        debug_assert_eq!(topo.validate(), Ok(()));
        Ok(topo)
    }

    pub(crate) fn assemble(
        kind: TopologyKind,
        dim: usize,
        comm: Arc<C>,
        nglobal: usize,
        global_offset: usize,
        stacksize: Option<usize>,
        conn: MeshConnectivity,
    ) -> Self {
        Self {
            kind,
            dim,
            comm,
            nglobal,
            global_offset,
            nreal: conn.nreal,
            nghost: conn.nghost,
            stacksize,
            elem_to_elem: conn.elem_to_elem,
            elem_to_face: conn.elem_to_face,
            elem_to_ordr: conn.elem_to_ordr,
            elem_to_bndy: conn.elem_to_bndy,
            elem_to_coord: conn.elem_to_coord,
            send_elems: conn.send_elems,
            nabr_to_rank: conn.nabr_to_rank,
            nabr_to_recv: conn.nabr_to_recv,
            nabr_to_send: conn.nabr_to_send,
        }
    }

    // --- read-only queries -------------------------------------------------

    /// Which constructor produced this topology.
    #[inline]
    pub fn kind(&self) -> TopologyKind {
        self.kind
    }

    /// Logical element dimension (coordinates are always 3-component).
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The communicator this topology was built over.
    #[inline]
    pub fn comm(&self) -> &C {
        &self.comm
    }

    /// Faces per element (`2 * dim`).
    #[inline]
    pub fn nfaces(&self) -> usize {
        2 * self.dim
    }

    /// Corners per element (`2^dim`).
    #[inline]
    pub fn ncorners(&self) -> usize {
        1 << self.dim
    }

    /// All local elements: real then ghost.
    #[inline]
    pub fn elems(&self) -> Range<usize> {
        0..self.nreal + self.nghost
    }

    /// Elements owned by this rank.
    #[inline]
    pub fn realelems(&self) -> Range<usize> {
        0..self.nreal
    }

    /// Elements mirrored from neighbor ranks.
    #[inline]
    pub fn ghostelems(&self) -> Range<usize> {
        self.nreal..self.nreal + self.nghost
    }

    #[inline]
    pub fn nreal(&self) -> usize {
        self.nreal
    }

    #[inline]
    pub fn nghost(&self) -> usize {
        self.nghost
    }

    #[inline]
    pub fn nelems(&self) -> usize {
        self.nreal + self.nghost
    }

    /// Global element count across all ranks.
    #[inline]
    pub fn nglobal(&self) -> usize {
        self.nglobal
    }

    /// Global id of local element 0; local real elements are a contiguous
    /// slice of the global curve ordering.
    #[inline]
    pub fn global_offset(&self) -> usize {
        self.global_offset
    }

    /// Elements per vertical column (stacked topologies only).
    #[inline]
    pub fn stacksize(&self) -> Option<usize> {
        self.stacksize
    }

    /// Local real elements shipped to neighbors, grouped per neighbor.
    #[inline]
    pub fn sendelems(&self) -> &[usize] {
        &self.send_elems
    }

    /// Neighbor ranks, ascending.
    #[inline]
    pub fn neighbor_ranks(&self) -> &[usize] {
        &self.nabr_to_rank
    }

    /// Ghost element range received from each neighbor.
    #[inline]
    pub fn recv_ranges(&self) -> &[Range<usize>] {
        &self.nabr_to_recv
    }

    /// Index range into [`Self::sendelems`] for each neighbor.
    #[inline]
    pub fn send_ranges(&self) -> &[Range<usize>] {
        &self.nabr_to_send
    }

    /// Neighbor element across face `f` of element `e` (`e` itself on a
    /// physical boundary).
    #[inline]
    pub fn neighbor(&self, e: usize, f: usize) -> usize {
        self.elem_to_elem[e * self.nfaces() + f]
    }

    /// Face index on the neighbor glued to `(e, f)`.
    #[inline]
    pub fn neighbor_face(&self, e: usize, f: usize) -> usize {
        usize::from(self.elem_to_face[e * self.nfaces() + f])
    }

    /// Relative orientation of the neighbor's face corners.
    #[inline]
    pub fn orientation(&self, e: usize, f: usize) -> FaceOrder {
        self.elem_to_ordr[e * self.nfaces() + f]
    }

    /// Boundary tag of `(e, f)`; 0 means connected to another element.
    #[inline]
    pub fn boundary_tag(&self, e: usize, f: usize) -> i32 {
        self.elem_to_bndy[e * self.nfaces() + f]
    }

    /// Whether `(e, f)` lies on a physical boundary.
    #[inline]
    pub fn is_boundary_face(&self, e: usize, f: usize) -> bool {
        self.boundary_tag(e, f) != 0
    }

    /// Coordinates of corner `v` of element `e`.
    #[inline]
    pub fn corner_coord(&self, e: usize, v: usize) -> [f64; 3] {
        let base = (e * self.ncorners() + v) * 3;
        [
            self.elem_to_coord[base],
            self.elem_to_coord[base + 1],
            self.elem_to_coord[base + 2],
        ]
    }

    /// All real boundary faces as `(element, face, tag)`.
    pub fn boundary_faces(&self) -> impl Iterator<Item = (usize, usize, i32)> + '_ {
        let nfaces = self.nfaces();
        (0..self.nreal).flat_map(move |e| {
            (0..nfaces).filter_map(move |f| {
                let tag = self.boundary_tag(e, f);
                (tag != 0).then_some((e, f, tag))
            })
        })
    }

    // --- raw table access for the grid builder -----------------------------

    /// Raw neighbor table, stride [`Self::nfaces`] per element.
    #[inline]
    pub fn elem_to_elem(&self) -> &[usize] {
        &self.elem_to_elem
    }

    /// Raw neighbor-face table.
    #[inline]
    pub fn elem_to_face(&self) -> &[u8] {
        &self.elem_to_face
    }

    /// Raw orientation table.
    #[inline]
    pub fn elem_to_ordr(&self) -> &[FaceOrder] {
        &self.elem_to_ordr
    }

    /// Raw boundary-tag table.
    #[inline]
    pub fn elem_to_bndy(&self) -> &[i32] {
        &self.elem_to_bndy
    }

    /// Raw corner coordinates, layout `[(e * ncorners + v) * 3 + d]`.
    #[inline]
    pub fn elem_to_coord(&self) -> &[f64] {
        &self.elem_to_coord
    }

    // --- invariants ---------------------------------------------------------

    /// Re-check the structural invariants of this rank's tables.
    ///
    /// Used by construction debug assertions and tests; a violation on a
    /// constructed topology indicates a bug, not bad user input.
    pub fn validate(&self) -> Result<(), TopologyError> {
        let nfaces = self.nfaces();
        let ntot = self.nelems();
        let bad = |msg: String| Err(TopologyError::MeshInvariant(msg));

        if self.elem_to_elem.len() != ntot * nfaces
            || self.elem_to_face.len() != ntot * nfaces
            || self.elem_to_ordr.len() != ntot * nfaces
            || self.elem_to_bndy.len() != ntot * nfaces
            || self.elem_to_coord.len() != ntot * self.ncorners() * 3
        {
            return bad("table sizes do not match the element count".into());
        }

        for e in self.realelems() {
            for f in 0..nfaces {
                let nbr = self.neighbor(e, f);
                if self.is_boundary_face(e, f) {
                    if nbr != e
                        || self.neighbor_face(e, f) != f
                        || self.orientation(e, f) != FaceOrder::Identity
                    {
                        return bad(format!(
                            "boundary face ({e}, {f}) is not self-referential"
                        ));
                    }
                    continue;
                }
                if nbr >= ntot {
                    return bad(format!("face ({e}, {f}) points at invalid element {nbr}"));
                }
                let f2 = self.neighbor_face(e, f);
                if f2 >= nfaces {
                    return bad(format!("face ({e}, {f}) has invalid neighbor face {f2}"));
                }
                if nbr < self.nreal {
                    // Reciprocity, checkable locally for real neighbors.
                    if self.neighbor(nbr, f2) != e
                        || self.neighbor_face(nbr, f2) != f
                        || self.orientation(nbr, f2)
                            != FaceOrder::inverse(self.orientation(e, f))
                    {
                        return bad(format!(
                            "faces ({e}, {f}) and ({nbr}, {f2}) are not reciprocal"
                        ));
                    }
                }
            }
        }

        // Ghosts must all be referenced by some real face.
        let mut referenced = vec![false; self.nghost];
        for e in self.realelems() {
            for f in 0..nfaces {
                let nbr = self.neighbor(e, f);
                if nbr >= self.nreal && !self.is_boundary_face(e, f) {
                    referenced[nbr - self.nreal] = true;
                }
            }
        }
        if referenced.iter().any(|r| !r) {
            return bad("ghost element never referenced by a real element".into());
        }

        // Neighbor ranges partition the ghost range and the send list.
        if self.nabr_to_rank.len() != self.nabr_to_recv.len()
            || self.nabr_to_rank.len() != self.nabr_to_send.len()
        {
            return bad("neighbor descriptor lengths disagree".into());
        }
        if self.nabr_to_rank.windows(2).any(|w| w[0] >= w[1]) {
            return bad("neighbor ranks are not strictly ascending".into());
        }
        let mut next = self.nreal;
        for r in &self.nabr_to_recv {
            if r.start != next || r.is_empty() {
                return bad("recv ranges do not partition the ghost elements".into());
            }
            next = r.end;
        }
        if next != ntot {
            return bad("recv ranges do not cover the ghost elements".into());
        }
        let mut next = 0;
        for r in &self.nabr_to_send {
            if r.start != next || r.is_empty() {
                return bad("send ranges do not partition the send list".into());
            }
            next = r.end;
        }
        if next != self.send_elems.len() {
            return bad("send ranges do not cover the send list".into());
        }
        if self.send_elems.iter().any(|&e| e >= self.nreal) {
            return bad("send list contains non-real elements".into());
        }

        if let Some(ss) = self.stacksize {
            if ss == 0 || self.nreal % ss != 0 || self.nghost % ss != 0 {
                return bad("stack size does not divide the element counts".into());
            }
        }

        Ok(())
    }
}
