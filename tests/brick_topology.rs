//! Brick topology construction on a single rank.

mod common;

use std::sync::Arc;

use common::assert_geometric_conformity;
use dycore_topology::prelude::*;

fn axis(range: std::ops::RangeInclusive<i32>) -> Vec<f64> {
    range.map(f64::from).collect()
}

#[test]
fn periodic_line_of_ten_elements() {
    let comm = Arc::new(NoComm);
    let topo = Topology::brick(
        comm,
        &[axis(0..=10)],
        BrickOptions {
            periodicity: Some(vec![true]),
            ..BrickOptions::default()
        },
    )
    .unwrap();

    assert_eq!(topo.kind(), TopologyKind::Brick);
    assert_eq!(topo.dim(), 1);
    assert_eq!(topo.realelems(), 0..10);
    assert!(topo.ghostelems().is_empty());
    assert!(topo.sendelems().is_empty());
    assert!(topo.neighbor_ranks().is_empty());
    topo.validate().unwrap();

    for e in 0..10 {
        // Elements are ordered along the line: corners at e and e + 1.
        assert_eq!(topo.corner_coord(e, 0), [e as f64, 0.0, 0.0]);
        assert_eq!(topo.corner_coord(e, 1), [(e + 1) as f64, 0.0, 0.0]);
        // Left neighbor wraps from 0 to 9.
        assert_eq!(topo.neighbor(e, 0), (e + 9) % 10);
        assert_eq!(topo.neighbor(e, 1), (e + 1) % 10);
        // Glued to the opposite face, aligned.
        assert_eq!(topo.neighbor_face(e, 0), 1);
        assert_eq!(topo.neighbor_face(e, 1), 0);
        assert_eq!(topo.orientation(e, 0), FaceOrder::Identity);
        assert_eq!(topo.orientation(e, 1), FaceOrder::Identity);
        assert_eq!(topo.boundary_tag(e, 0), 0);
        assert_eq!(topo.boundary_tag(e, 1), 0);
    }
    assert_geometric_conformity(&topo, [Some(10.0), None, None]);
}

#[test]
fn plane_periodic_in_y() {
    let comm = Arc::new(NoComm);
    let topo = Topology::brick(
        comm,
        &[axis(0..=4), axis(5..=9)],
        BrickOptions {
            periodicity: Some(vec![false, true]),
            ..BrickOptions::default()
        },
    )
    .unwrap();

    assert_eq!(topo.realelems().len(), 16);
    assert!(topo.ghostelems().is_empty());
    topo.validate().unwrap();

    // Only the x faces carry boundary tags (the default tag, 1); four
    // elements touch each of the two physical walls.
    let boundary: Vec<_> = topo.boundary_faces().collect();
    assert_eq!(boundary.len(), 8);
    assert!(boundary.iter().all(|&(_, f, tag)| tag == 1 && f < 2));
    assert_eq!(boundary.iter().filter(|&&(_, f, _)| f == 0).count(), 4);
    assert_eq!(boundary.iter().filter(|&&(_, f, _)| f == 1).count(), 4);

    // Brick meshes never rotate faces.
    for e in topo.realelems() {
        for f in 0..topo.nfaces() {
            assert_eq!(topo.orientation(e, f), FaceOrder::Identity);
        }
    }

    // Every connected face coincides with its neighbor, wrapping in y.
    assert_geometric_conformity(&topo, [None, Some(4.0), None]);
}

#[test]
fn fully_periodic_plane_has_no_boundary() {
    let comm = Arc::new(NoComm);
    let topo = Topology::brick(
        comm,
        &[axis(0..=3), axis(0..=3)],
        BrickOptions {
            periodicity: Some(vec![true, true]),
            ..BrickOptions::default()
        },
    )
    .unwrap();
    topo.validate().unwrap();
    assert_eq!(topo.boundary_faces().count(), 0);
    assert_geometric_conformity(&topo, [Some(3.0), Some(3.0), None]);
}

#[test]
fn three_dimensional_brick_with_custom_tags() {
    let comm = Arc::new(NoComm);
    let topo = Topology::brick(
        comm,
        &[axis(0..=2), axis(0..=2), axis(0..=2)],
        BrickOptions {
            boundary: Some(vec![[1, 2], [3, 4], [5, 6]]),
            ..BrickOptions::default()
        },
    )
    .unwrap();

    assert_eq!(topo.realelems().len(), 8);
    topo.validate().unwrap();
    assert_geometric_conformity(&topo, [None, None, None]);

    // Each element sits in a corner of the 2x2x2 brick: three boundary
    // faces with the tag of the matching wall.
    for e in topo.realelems() {
        let tags: Vec<i32> = (0..6).map(|f| topo.boundary_tag(e, f)).collect();
        assert_eq!(tags.iter().filter(|&&t| t != 0).count(), 3);
        for a in 0..3 {
            let (low, high) = (tags[2 * a], tags[2 * a + 1]);
            let wall = [[1, 2], [3, 4], [5, 6]][a];
            assert!(
                (low == wall[0] && high == 0) || (low == 0 && high == wall[1]),
                "element {e} axis {a} tags ({low}, {high})"
            );
        }
    }
}

#[test]
fn construction_is_deterministic() {
    let build = || {
        Topology::brick(
            Arc::new(NoComm),
            &[axis(0..=5), axis(0..=5)],
            BrickOptions {
                periodicity: Some(vec![true, false]),
                ..BrickOptions::default()
            },
        )
        .unwrap()
    };
    let a = build();
    let b = build();
    assert_eq!(a.elem_to_elem(), b.elem_to_elem());
    assert_eq!(a.elem_to_face(), b.elem_to_face());
    assert_eq!(a.elem_to_ordr(), b.elem_to_ordr());
    assert_eq!(a.elem_to_bndy(), b.elem_to_bndy());
    assert_eq!(a.elem_to_coord(), b.elem_to_coord());
}

#[test]
fn unsupported_options_are_rejected() {
    let err = Topology::brick(
        Arc::new(NoComm),
        &[axis(0..=4)],
        BrickOptions {
            connectivity: Connectivity::Full,
            ..BrickOptions::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, TopologyError::Unsupported(_)));

    let err = Topology::brick(
        Arc::new(NoComm),
        &[axis(0..=4)],
        BrickOptions {
            ghostsize: 2,
            ..BrickOptions::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, TopologyError::Unsupported(_)));
}

#[test]
fn malformed_shapes_are_rejected() {
    // An axis with a single coordinate has zero elements.
    let err = Topology::brick(
        Arc::new(NoComm),
        &[vec![0.0]],
        BrickOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, TopologyError::InvalidShape(_)));

    // Option lengths must match the dimension.
    let err = Topology::brick(
        Arc::new(NoComm),
        &[axis(0..=4)],
        BrickOptions {
            periodicity: Some(vec![false, true]),
            ..BrickOptions::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, TopologyError::InvalidShape(_)));

    // Boundary tags are positive; zero would be indistinguishable from
    // "connected".
    let err = Topology::brick(
        Arc::new(NoComm),
        &[axis(0..=4)],
        BrickOptions {
            boundary: Some(vec![[0, 1]]),
            ..BrickOptions::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, TopologyError::InvalidShape(_)));
}
