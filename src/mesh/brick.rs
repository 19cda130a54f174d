//! Brick generator: d-dimensional axis-aligned meshes of logically
//! cartesian elements.
//!
//! Elements are ordered globally along the Hilbert curve over the lattice of
//! per-axis element indices; each rank materializes only its contiguous
//! [`linear_partition`](super::partition::linear_partition) slice of that
//! ordering. Vertices get dense ids on the `(N1+1) x ... x (Nd+1)` lattice,
//! and periodicity is expressed as pairs of vertex ids to be fused later by
//! the connectivity engine.

use crate::error::TopologyError;
use crate::mesh::hilbert::{bits_for_extent, hilbert_index};
use crate::mesh::partition::linear_partition;
use crate::mesh::LocalMesh;

/// Generate one rank's slice of a brick mesh.
///
/// `elemrange[a]` holds the element corner coordinates along axis `a`
/// (`len >= 2`, so at least one element per axis); `boundary[a]` is the
/// `[low, high]` tag pair for the physical faces of axis `a`, ignored when
/// the axis is periodic.
pub fn brickmesh(
    elemrange: &[Vec<f64>],
    periodicity: &[bool],
    boundary: &[[i32; 2]],
    part: usize,
    numparts: usize,
) -> Result<LocalMesh, TopologyError> {
    let dim = elemrange.len();
    if !(1..=3).contains(&dim) {
        return Err(TopologyError::InvalidShape(format!(
            "brick meshes support 1 to 3 dimensions, got {dim}"
        )));
    }
    debug_assert_eq!(periodicity.len(), dim);
    debug_assert_eq!(boundary.len(), dim);
    for (a, axis) in elemrange.iter().enumerate() {
        if axis.len() < 2 {
            return Err(TopologyError::InvalidShape(format!(
                "axis {a} has {} corner coordinates; at least 2 are required",
                axis.len()
            )));
        }
    }

    // Padded per-axis extents so index arithmetic is uniform in dim.
    let mut nd = [1usize; 3];
    let mut nv = [1usize; 3];
    for a in 0..dim {
        nd[a] = elemrange[a].len() - 1;
        nv[a] = nd[a] + 1;
    }
    let nelem = nd[0] * nd[1] * nd[2];
    let vstride = [1u64, nv[0] as u64, (nv[0] * nv[1]) as u64];

    // Global ordering: Hilbert index of each lattice element. Coordinates
    // are exact lattice indices, so distinct elements get distinct codes and
    // the sort is a permutation with no ties to break.
    let bits = (0..dim).map(|a| bits_for_extent(nd[a])).max().unwrap_or(1);
    let mut order: Vec<(u128, usize)> = Vec::with_capacity(nelem);
    for i2 in 0..nd[2] {
        for i1 in 0..nd[1] {
            for i0 in 0..nd[0] {
                let lattice = [i0 as u32, i1 as u32, i2 as u32];
                let code = hilbert_index(&lattice[..dim], bits);
                order.push((code, i0 + nd[0] * (i1 + nd[1] * i2)));
            }
        }
    }
    order.sort_unstable();

    let slice = linear_partition(nelem, part, numparts);
    let nlocal = slice.len();
    let ncorners = 1usize << dim;
    let nfaces = 2 * dim;

    let mut elem_to_vert = Vec::with_capacity(nlocal * ncorners);
    let mut elem_to_coord = Vec::with_capacity(nlocal * ncorners * 3);
    let mut elem_to_bndy = vec![0i32; nlocal * nfaces];

    for (local, &(_, lex)) in order[slice.clone()].iter().enumerate() {
        let idx = [lex % nd[0], (lex / nd[0]) % nd[1], lex / (nd[0] * nd[1])];
        for v in 0..ncorners {
            let mut vid = 0u64;
            for a in 0..dim {
                let x = idx[a] + ((v >> a) & 1);
                vid += x as u64 * vstride[a];
            }
            elem_to_vert.push(vid);
            for d in 0..3 {
                let x = if d < dim {
                    elemrange[d][idx[d] + ((v >> d) & 1)]
                } else {
                    0.0
                };
                elem_to_coord.push(x);
            }
        }
        for a in 0..dim {
            if periodicity[a] {
                continue;
            }
            if idx[a] == 0 {
                elem_to_bndy[local * nfaces + 2 * a] = boundary[a][0];
            }
            if idx[a] == nd[a] - 1 {
                elem_to_bndy[local * nfaces + 2 * a + 1] = boundary[a][1];
            }
        }
    }

    // Periodic identification: every vertex on the high lattice plane of a
    // periodic axis is the same vertex as its partner on the low plane.
    let mut face_connections = Vec::new();
    for a in 0..dim {
        if !periodicity[a] {
            continue;
        }
        for x2 in 0..nv[2] {
            for x1 in 0..nv[1] {
                for x0 in 0..nv[0] {
                    let x = [x0, x1, x2];
                    if x[a] != nv[a] - 1 {
                        continue;
                    }
                    let mut low = x;
                    low[a] = 0;
                    let high_vid: u64 =
                        (0..3).map(|d| x[d] as u64 * vstride[d]).sum();
                    let low_vid: u64 =
                        (0..3).map(|d| low[d] as u64 * vstride[d]).sum();
                    face_connections.push((high_vid, low_vid));
                }
            }
        }
    }

    Ok(LocalMesh {
        dim,
        cdim: dim,
        nglobal: nelem,
        first_global: slice.start,
        elem_to_vert,
        elem_to_coord,
        elem_to_bndy,
        face_connections,
    })
}
