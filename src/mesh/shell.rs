//! Cubed-shell generator: six `ne x ne` quad patches covering the surface
//! of a cube.
//!
//! Patch vertices live on the shared `(ne+1)^3` lattice, so patches that
//! abut along a cube edge automatically reference the same vertex ids and
//! no explicit identifications are needed; every cube edge is covered by
//! exactly two patches and every cube corner by three. Patch frames are
//! right-handed with respect to the outward normal, which reverses the
//! in-plane axis on three of the six faces; the connectivity engine later
//! reads those reversals off as orientation codes.
//!
//! Coordinates are centered, `(2 * idx - ne) / ne in [-1, 1]^3`, forming the
//! unit-half-side cube the gnomonic warp and the radial extrusion expect.

use crate::error::TopologyError;
use crate::mesh::partition::linear_partition;
use crate::mesh::LocalMesh;

/// Lattice position of vertex `(i, j)` of patch `b`.
///
/// Patches cover the `-x, -y, +x, +y, -z, +z` cube faces in that order.
#[inline]
fn patch_vertex(b: usize, i: usize, j: usize, ne: usize) -> [usize; 3] {
    match b {
        0 => [0, ne - i, j],
        1 => [i, 0, j],
        2 => [ne, i, j],
        3 => [ne - i, ne, j],
        4 => [j, i, 0],
        5 => [i, j, ne],
        _ => unreachable!("cube has six faces"),
    }
}

/// Generate one rank's slice of a cubed-shell mesh with `6 * ne^2` quads.
///
/// The generator's global ordering is patch-major lexicographic; the
/// space-filling-curve partition applied afterwards replaces it. Boundary
/// tags are all zero (a shell has no boundary) and no face connections are
/// emitted.
pub fn cubedshellmesh(
    ne: usize,
    part: usize,
    numparts: usize,
) -> Result<LocalMesh, TopologyError> {
    if ne == 0 {
        return Err(TopologyError::InvalidShape(
            "cubed shell needs at least one element per patch edge".into(),
        ));
    }
    let nelem = 6 * ne * ne;
    let slice = linear_partition(nelem, part, numparts);
    let nlocal = slice.len();
    let nv = (ne + 1) as u64;

    let mut elem_to_vert = Vec::with_capacity(nlocal * 4);
    let mut elem_to_coord = Vec::with_capacity(nlocal * 12);

    for gid in slice.clone() {
        let b = gid / (ne * ne);
        let rem = gid % (ne * ne);
        let (i, j) = (rem % ne, rem / ne);
        for v in 0..4 {
            let (di, dj) = (v & 1, v >> 1);
            let p = patch_vertex(b, i + di, j + dj, ne);
            elem_to_vert.push(p[0] as u64 + nv * (p[1] as u64 + nv * p[2] as u64));
            for &x in &p {
                elem_to_coord.push((2.0 * x as f64 - ne as f64) / ne as f64);
            }
        }
    }

    Ok(LocalMesh {
        dim: 2,
        cdim: 3,
        nglobal: nelem,
        first_global: slice.start,
        elem_to_vert,
        elem_to_coord,
        elem_to_bndy: vec![0i32; nlocal * 4],
        face_connections: Vec::new(),
    })
}
