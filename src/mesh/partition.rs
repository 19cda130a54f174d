//! Element partitioning: the linear splitter and the space-filling-curve
//! repartition collective.
//!
//! [`linear_partition`] is the only place rank slices are computed, so the
//! generator, the repartitioner, and the connectivity engine's owner lookups
//! always agree. [`sfc_partition`] reorders the global element list along
//! the Hilbert curve of element centroids and ships every element to the
//! rank owning its slot in the new ordering.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};

use crate::comm::{from_bytes, to_bytes, Communicator};
use crate::error::TopologyError;
use crate::mesh::hilbert::{hilbert_index, quantize};
use crate::mesh::LocalMesh;

/// Bits per axis used when quantizing centroids for curve codes.
const CODE_BITS: u32 = 20;

/// Contiguous slice of `0..nelem` owned by `part` out of `nparts`.
///
/// The split is as even as possible; the first `nelem % nparts` parts
/// receive one extra element. Deterministic and side-effect free.
#[must_use]
pub fn linear_partition(nelem: usize, part: usize, nparts: usize) -> Range<usize> {
    assert!(nparts > 0 && part < nparts);
    let base = nelem / nparts;
    let rem = nelem % nparts;
    let start = part * base + part.min(rem);
    let len = base + usize::from(part < rem);
    start..start + len
}

/// Rank owning global element `gid` under [`linear_partition`].
#[must_use]
pub fn partition_owner(gid: usize, nelem: usize, nparts: usize) -> usize {
    debug_assert!(gid < nelem);
    let base = nelem / nparts;
    let rem = nelem % nparts;
    let cut = (base + 1) * rem;
    if gid < cut {
        gid / (base + 1)
    } else {
        rem + (gid - cut) / base
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct WireBounds {
    min: [f64; 3],
    max: [f64; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct WireCode {
    code: u64,
    gid: u64,
}

/// Element payload shipped to its new owner. Corner/face arrays are padded
/// to the 3-D maximum so the record is fixed width.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct WireElem {
    pos: u64,
    verts: [u64; 8],
    coords: [f64; 24],
    bndy: [i32; 6],
}

const _: () = {
    // Pod/Zeroable ensure no padding leaks when cast to bytes.
    assert!(std::mem::size_of::<WireBounds>() == 48);
    assert!(std::mem::size_of::<WireCode>() == 16);
    assert!(std::mem::size_of::<WireElem>() == 288);
};

/// Collective: reorder the global element list along the Hilbert curve of
/// element centroids and return this rank's contiguous slice of the new
/// ordering. Every rank must call this with matching global metadata.
///
/// The new global ordering depends only on the mesh (centroid bounds,
/// quantized codes, generator ids as tie-break), not on the rank count, so
/// runs at different scales agree on the global structure.
pub fn sfc_partition<C: Communicator>(
    comm: &C,
    mesh: LocalMesh,
) -> Result<LocalMesh, TopologyError> {
    let size = comm.size();
    let rank = comm.rank();
    let nlocal = mesh.nelem();
    let nglobal = mesh.nglobal;
    let ncorners = mesh.ncorners();
    let nfaces = mesh.nfaces();

    // Global centroid bounds, via an all-to-all broadcast reduce.
    let mut local = WireBounds {
        min: [f64::INFINITY; 3],
        max: [f64::NEG_INFINITY; 3],
    };
    for e in 0..nlocal {
        let c = mesh.centroid(e);
        for d in 0..3 {
            local.min[d] = local.min[d].min(c[d]);
            local.max[d] = local.max[d].max(c[d]);
        }
    }
    let payload = to_bytes(&[local]);
    let recv = comm.all_to_all_v(vec![payload; size]);
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    for bytes in &recv {
        for b in from_bytes::<WireBounds>(bytes)? {
            for d in 0..3 {
                min[d] = min[d].min(b.min[d]);
                max[d] = max[d].max(b.max[d]);
            }
        }
    }

    // Curve code per local element, broadcast to every rank.
    let codes: Vec<WireCode> = (0..nlocal)
        .map(|e| {
            let c = mesh.centroid(e);
            let mut q = [0u32; 3];
            for d in 0..mesh.cdim {
                q[d] = quantize(c[d], min[d], max[d], CODE_BITS);
            }
            WireCode {
                code: hilbert_index(&q[..mesh.cdim], CODE_BITS) as u64,
                gid: mesh.global_id(e) as u64,
            }
        })
        .collect();
    let recv = comm.all_to_all_v(vec![to_bytes(&codes); size]);
    let mut all_codes: Vec<WireCode> = Vec::with_capacity(nglobal);
    for bytes in &recv {
        all_codes.extend(from_bytes::<WireCode>(bytes)?);
    }
    if all_codes.len() != nglobal {
        return Err(TopologyError::MeshInvariant(format!(
            "curve code exchange produced {} entries for {} global elements",
            all_codes.len(),
            nglobal
        )));
    }

    // Every rank derives the same global ordering: by code, generator id as
    // the (never actually needed) tie-break.
    all_codes.sort_unstable_by_key(|wc| (wc.code, wc.gid));
    let mut newpos_by_gid = vec![u64::MAX; nglobal];
    for (pos, wc) in all_codes.iter().enumerate() {
        let gid = wc.gid as usize;
        if gid >= nglobal || newpos_by_gid[gid] != u64::MAX {
            return Err(TopologyError::MeshInvariant(format!(
                "duplicate or out-of-range element id {gid} in curve codes"
            )));
        }
        newpos_by_gid[gid] = pos as u64;
    }

    // Ship each element to the owner of its new slot.
    let mut send: Vec<Vec<WireElem>> = vec![Vec::new(); size];
    for e in 0..nlocal {
        let pos = newpos_by_gid[mesh.global_id(e)];
        let dst = partition_owner(pos as usize, nglobal, size);
        let mut rec = WireElem {
            pos,
            verts: [0; 8],
            coords: [0.0; 24],
            bndy: [0; 6],
        };
        rec.verts[..ncorners]
            .copy_from_slice(&mesh.elem_to_vert[e * ncorners..(e + 1) * ncorners]);
        rec.coords[..ncorners * 3]
            .copy_from_slice(&mesh.elem_to_coord[e * ncorners * 3..(e + 1) * ncorners * 3]);
        rec.bndy[..nfaces].copy_from_slice(&mesh.elem_to_bndy[e * nfaces..(e + 1) * nfaces]);
        send[dst].push(rec);
    }
    let recv = comm.all_to_all_v(send.into_iter().map(|v| to_bytes(&v)).collect());

    let slice = linear_partition(nglobal, rank, size);
    let mut incoming: Vec<WireElem> = Vec::with_capacity(slice.len());
    for bytes in &recv {
        incoming.extend(from_bytes::<WireElem>(bytes)?);
    }
    incoming.sort_unstable_by_key(|rec| rec.pos);
    if incoming.len() != slice.len()
        || incoming
            .iter()
            .zip(slice.clone())
            .any(|(rec, pos)| rec.pos as usize != pos)
    {
        return Err(TopologyError::MeshInvariant(
            "repartitioned elements do not form this rank's contiguous slice".into(),
        ));
    }

    let mut elem_to_vert = Vec::with_capacity(incoming.len() * ncorners);
    let mut elem_to_coord = Vec::with_capacity(incoming.len() * ncorners * 3);
    let mut elem_to_bndy = Vec::with_capacity(incoming.len() * nfaces);
    for rec in &incoming {
        elem_to_vert.extend_from_slice(&rec.verts[..ncorners]);
        elem_to_coord.extend_from_slice(&rec.coords[..ncorners * 3]);
        elem_to_bndy.extend_from_slice(&rec.bndy[..nfaces]);
    }

    Ok(LocalMesh {
        dim: mesh.dim,
        cdim: mesh.cdim,
        nglobal,
        first_global: slice.start,
        elem_to_vert,
        elem_to_coord,
        elem_to_bndy,
        face_connections: mesh.face_connections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::NoComm;
    use crate::mesh::brick::brickmesh;
    use proptest::prelude::*;

    #[test]
    fn linear_partition_gives_extras_to_leading_parts() {
        assert_eq!(linear_partition(10, 0, 3), 0..4);
        assert_eq!(linear_partition(10, 1, 3), 4..7);
        assert_eq!(linear_partition(10, 2, 3), 7..10);
        assert_eq!(linear_partition(2, 2, 4), 2..2);
    }

    proptest! {
        #[test]
        fn linear_partition_covers_without_overlap(
            nelem in 0usize..500,
            nparts in 1usize..17,
        ) {
            let mut next = 0;
            for part in 0..nparts {
                let r = linear_partition(nelem, part, nparts);
                prop_assert_eq!(r.start, next);
                next = r.end;
            }
            prop_assert_eq!(next, nelem);
        }

        #[test]
        fn owner_is_inverse_of_slices(
            nelem in 1usize..300,
            nparts in 1usize..17,
        ) {
            for part in 0..nparts {
                for gid in linear_partition(nelem, part, nparts) {
                    prop_assert_eq!(partition_owner(gid, nelem, nparts), part);
                }
            }
        }
    }

    #[test]
    fn serial_sfc_partition_keeps_one_dimensional_order() {
        let elemrange = vec![(0..=10).map(f64::from).collect::<Vec<_>>()];
        let mesh = brickmesh(&elemrange, &[false], &[[1, 2]], 0, 1).unwrap();
        let mesh = sfc_partition(&NoComm, mesh).unwrap();
        assert_eq!(mesh.nelem(), 10);
        for e in 0..10 {
            assert_eq!(mesh.coord(e, 0)[0], e as f64);
        }
    }

    #[test]
    fn serial_sfc_partition_is_a_permutation() {
        let elemrange = vec![(0..=4).map(f64::from).collect::<Vec<_>>(); 2];
        let before = brickmesh(&elemrange, &[false; 2], &[[1, 2]; 2], 0, 1).unwrap();
        let mut before_verts: Vec<_> = (0..before.nelem())
            .map(|e| before.elem_to_vert[e * 4..(e + 1) * 4].to_vec())
            .collect();
        let after = sfc_partition(&NoComm, before.clone()).unwrap();
        let mut after_verts: Vec<_> = (0..after.nelem())
            .map(|e| after.elem_to_vert[e * 4..(e + 1) * 4].to_vec())
            .collect();
        before_verts.sort();
        after_verts.sort();
        assert_eq!(before_verts, after_verts);
    }
}
