//! Stack extruder: lift a (d-1)-dimensional base topology into a
//! d-dimensional stacked topology.
//!
//! Construction is mechanical and fully determined by the base: element
//! `stacksize * i + j` is level `j` of base element `i`, so whole columns
//! stay contiguous and on one rank. Horizontal connectivity is lifted
//! level-by-level from the base, vertical connectivity walks the column
//! (wrapping when the new axis is periodic), and the exchange descriptors
//! scale by the stack size so columns stay contiguous on the wire too.

use crate::comm::Communicator;
use crate::error::TopologyError;
use crate::topology::orientation::FaceOrder;
use crate::topology::{Topology, TopologyKind};

/// Flavor of extrusion.
pub(crate) enum StackMode {
    /// Linear extrusion: the stack coordinate becomes the new axis.
    Brick { periodic: bool, bc: [i32; 2] },
    /// Radial extrusion: base coordinates are scaled by each radius.
    /// Never periodic.
    Sphere { bc: [i32; 2] },
}

/// Extrude `base` along `stack` (length `stacksize + 1`, strictly
/// increasing).
pub(crate) fn extrude<C: Communicator>(
    base: Topology<C>,
    kind: TopologyKind,
    stack: &[f64],
    mode: StackMode,
) -> Result<Topology<C>, TopologyError> {
    if stack.len() < 2 {
        return Err(TopologyError::InvalidShape(
            "stack coordinate needs at least two entries".into(),
        ));
    }
    if stack.windows(2).any(|w| w[1] <= w[0]) {
        return Err(TopologyError::InvalidShape(
            "stack coordinate must be strictly increasing".into(),
        ));
    }

    let ss = stack.len() - 1;
    let bdim = base.dim;
    let dim = bdim + 1;
    let bnc = 1usize << bdim;
    let nc = 2 * bnc;
    let bnf = 2 * bdim;
    let nf = bnf + 2;
    let bntot = base.nreal + base.nghost;
    let nreal = base.nreal * ss;
    let nghost = base.nghost * ss;
    let ntot = bntot * ss;

    let (periodic, bc) = match mode {
        StackMode::Brick { periodic, bc } => (periodic, bc),
        StackMode::Sphere { bc } => (false, bc),
    };

    // Corner coordinates: lower corners at stack[j], upper at stack[j + 1];
    // radial mode scales the base cube-surface coordinates instead.
    let mut elem_to_coord = vec![0.0f64; ntot * nc * 3];
    for i in 0..bntot {
        for j in 0..ss {
            let e = i * ss + j;
            for (k, &level) in stack[j..=j + 1].iter().enumerate() {
                for v in 0..bnc {
                    let mut x = base.corner_coord(i, v);
                    match mode {
                        StackMode::Brick { .. } => x[bdim] = level,
                        StackMode::Sphere { .. } => {
                            for c in &mut x {
                                *c *= level;
                            }
                        }
                    }
                    let out = (e * nc + k * bnc + v) * 3;
                    elem_to_coord[out..out + 3].copy_from_slice(&x);
                }
            }
        }
    }

    // Face tables start out self-referential; ghost columns stay that way.
    let mut elem_to_elem: Vec<usize> = Vec::with_capacity(ntot * nf);
    let mut elem_to_face: Vec<u8> = Vec::with_capacity(ntot * nf);
    for e in 0..ntot {
        for f in 0..nf {
            elem_to_elem.push(e);
            elem_to_face.push(f as u8);
        }
    }
    let mut elem_to_ordr = vec![FaceOrder::Identity; ntot * nf];
    let mut elem_to_bndy = vec![0i32; ntot * nf];

    let (bottom, top) = (nf - 2, nf - 1);
    for i in 0..base.nreal {
        for j in 0..ss {
            let e = i * ss + j;

            // Horizontal faces lift from the base, level by level.
            for f in 0..bnf {
                let idx = e * nf + f;
                let tag = base.boundary_tag(i, f);
                if tag != 0 {
                    elem_to_bndy[idx] = tag;
                    continue;
                }
                let i2 = base.neighbor(i, f);
                let ordr = base.orientation(i, f);
                if matches!(mode, StackMode::Brick { .. }) {
                    debug_assert_eq!(
                        ordr,
                        FaceOrder::Identity,
                        "brick bases only produce aligned faces"
                    );
                }
                elem_to_elem[idx] = i2 * ss + j;
                elem_to_face[idx] = base.elem_to_face[i * bnf + f];
                elem_to_ordr[idx] = ordr;
            }

            // Vertical faces walk the column.
            let bidx = e * nf + bottom;
            if j > 0 {
                elem_to_elem[bidx] = e - 1;
                elem_to_face[bidx] = top as u8;
            } else if periodic {
                elem_to_elem[bidx] = i * ss + (ss - 1);
                elem_to_face[bidx] = top as u8;
            } else {
                elem_to_bndy[bidx] = bc[0];
            }

            let tidx = e * nf + top;
            if j + 1 < ss {
                elem_to_elem[tidx] = e + 1;
                elem_to_face[tidx] = bottom as u8;
            } else if periodic {
                elem_to_elem[tidx] = i * ss;
                elem_to_face[tidx] = bottom as u8;
            } else {
                elem_to_bndy[tidx] = bc[1];
            }
        }
    }

    // Exchange descriptors scale by the stack size; each base element
    // becomes its whole column, in column order.
    let send_elems: Vec<usize> = base
        .send_elems
        .iter()
        .flat_map(|&b| (0..ss).map(move |j| b * ss + j))
        .collect();
    let nabr_to_send = base
        .nabr_to_send
        .iter()
        .map(|r| r.start * ss..r.end * ss)
        .collect();
    let nabr_to_recv = base
        .nabr_to_recv
        .iter()
        .map(|r| r.start * ss..r.end * ss)
        .collect();

    Ok(Topology {
        kind,
        dim,
        comm: base.comm,
        nglobal: base.nglobal * ss,
        global_offset: base.global_offset * ss,
        nreal,
        nghost,
        stacksize: Some(ss),
        elem_to_elem,
        elem_to_face,
        elem_to_ordr,
        elem_to_bndy,
        elem_to_coord,
        send_elems,
        nabr_to_rank: base.nabr_to_rank,
        nabr_to_recv,
        nabr_to_send,
    })
}
