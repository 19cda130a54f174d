//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use dycore_topology::comm::{Communicator, LocalComm};
use dycore_topology::topology::Topology;

/// Run `f` once per rank of an in-process universe, returning the results
/// in rank order.
pub fn run_ranks<T, F>(size: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(LocalComm) -> T + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let handles: Vec<_> = LocalComm::universe(size)
        .into_iter()
        .map(|comm| {
            let f = Arc::clone(&f);
            std::thread::spawn(move || f(comm))
        })
        .collect();
    handles
        .into_iter()
        .map(|h| h.join().expect("rank thread panicked"))
        .collect()
}

fn round(x: f64) -> i64 {
    (x * 1e9).round() as i64
}

/// Sorted, quantized corner tuples of face `(e, f)`.
fn face_coords<C: Communicator>(
    topo: &Topology<C>,
    e: usize,
    f: usize,
    shift: [f64; 3],
) -> Vec<[i64; 3]> {
    let dim = topo.dim();
    let axis = f / 2;
    let side = f % 2;
    let mut out: Vec<[i64; 3]> = (0..topo.ncorners())
        .filter(|v| (v >> axis) & 1 == side)
        .map(|v| {
            let c = topo.corner_coord(e, v);
            [
                round(c[0] + shift[0]),
                round(c[1] + shift[1]),
                round(c[2] + shift[2]),
            ]
        })
        .collect();
    debug_assert_eq!(out.len(), 1 << (dim - 1));
    out.sort_unstable();
    out
}

/// Check that every connected face geometrically coincides with the face it
/// is glued to, allowing a wrap by `periods[axis]` along the face's axis.
///
/// Works across ranks because ghost elements carry coordinates too.
pub fn assert_geometric_conformity<C: Communicator>(
    topo: &Topology<C>,
    periods: [Option<f64>; 3],
) {
    for e in topo.realelems() {
        for f in 0..topo.nfaces() {
            if topo.is_boundary_face(e, f) {
                continue;
            }
            let e2 = topo.neighbor(e, f);
            let f2 = topo.neighbor_face(e, f);
            let theirs = face_coords(topo, e2, f2, [0.0; 3]);
            let axis = f / 2;
            let mut shifts = vec![0.0];
            if let Some(period) = periods[axis] {
                shifts.push(period);
                shifts.push(-period);
            }
            let matched = shifts.iter().any(|&s| {
                let mut shift = [0.0; 3];
                shift[axis] = s;
                face_coords(topo, e, f, shift) == theirs
            });
            assert!(
                matched,
                "face ({e}, {f}) does not coincide with its neighbor ({e2}, {f2})"
            );
        }
    }
}
