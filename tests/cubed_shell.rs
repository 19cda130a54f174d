//! Cubed-shell topology on a single rank.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::assert_geometric_conformity;
use dycore_topology::prelude::*;

fn build_shell(ne: usize) -> Topology<NoComm> {
    Topology::cubed_shell(Arc::new(NoComm), ne, ShellOptions::default()).unwrap()
}

fn quantized_corner(topo: &Topology<NoComm>, e: usize, v: usize) -> [i64; 3] {
    let c = topo.corner_coord(e, v);
    [
        (c[0] * 1e9).round() as i64,
        (c[1] * 1e9).round() as i64,
        (c[2] * 1e9).round() as i64,
    ]
}

#[test]
fn shell_of_twenty_four_elements() {
    let topo = build_shell(2);

    assert_eq!(topo.kind(), TopologyKind::CubedShell);
    assert_eq!(topo.dim(), 2);
    assert_eq!(topo.realelems().len(), 24);
    assert!(topo.ghostelems().is_empty());
    assert_eq!(topo.stacksize(), None);
    topo.validate().unwrap();

    // A shell has no boundary: every element has four connected faces.
    assert_eq!(topo.boundary_faces().count(), 0);
    for e in topo.realelems() {
        for f in 0..4 {
            assert_ne!(topo.neighbor(e, f), e);
        }
    }

    assert_geometric_conformity(&topo, [None, None, None]);
}

#[test]
fn cube_corners_are_shared_by_three_elements() {
    let topo = build_shell(2);
    let one = 1_000_000_000i64;

    // Count elements touching each cube corner through their coordinates.
    let mut elems_at: HashMap<[i64; 3], usize> = HashMap::new();
    for e in topo.realelems() {
        for v in 0..4 {
            let q = quantized_corner(&topo, e, v);
            if q.iter().all(|&x| x.abs() == one) {
                *elems_at.entry(q).or_default() += 1;
            }
        }
    }
    assert_eq!(elems_at.len(), 8, "a cube has eight corners");
    for (corner, count) in elems_at {
        assert_eq!(count, 3, "corner {corner:?} should join three patches");
    }
}

#[test]
fn abutting_patches_reverse_at_most_the_first_face_coordinate() {
    let topo = build_shell(2);
    let mut seen_reverse = false;
    for e in topo.realelems() {
        for f in 0..4 {
            match topo.orientation(e, f) {
                FaceOrder::Identity => {}
                FaceOrder::Reverse => seen_reverse = true,
            }
        }
    }
    // The six patch frames cannot all align; some seams run backwards.
    assert!(seen_reverse);
}

#[test]
fn reciprocity_includes_orientation() {
    let topo = build_shell(3);
    topo.validate().unwrap();
    for e in topo.realelems() {
        for f in 0..4 {
            let e2 = topo.neighbor(e, f);
            let f2 = topo.neighbor_face(e, f);
            assert_eq!(topo.neighbor(e2, f2), e);
            assert_eq!(topo.neighbor_face(e2, f2), f);
            assert_eq!(
                topo.orientation(e2, f2),
                FaceOrder::inverse(topo.orientation(e, f))
            );
        }
    }
}

#[test]
fn single_element_patches_still_close_the_shell() {
    let topo = build_shell(1);
    assert_eq!(topo.realelems().len(), 6);
    topo.validate().unwrap();
    assert_eq!(topo.boundary_faces().count(), 0);
    assert_geometric_conformity(&topo, [None, None, None]);
}

#[test]
fn shell_corners_sit_on_the_unit_cube() {
    let topo = build_shell(2);
    for e in topo.realelems() {
        for v in 0..4 {
            let c = topo.corner_coord(e, v);
            let inf = c.iter().fold(0.0f64, |m, &x| m.max(x.abs()));
            assert_eq!(inf, 1.0);
        }
    }
}

#[test]
fn zero_resolution_is_rejected() {
    let err = Topology::cubed_shell(Arc::new(NoComm), 0, ShellOptions::default()).unwrap_err();
    assert!(matches!(err, TopologyError::InvalidShape(_)));
}
