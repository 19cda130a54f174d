//! Equiangular gnomonic cubed-sphere warp.
//!
//! Pure mapping from the surface of an axis-aligned cube to the sphere,
//! after Ronchi, Iacono & Paolucci (1996): the dominant coordinate selects
//! the cube face, the two subordinate ratios become equiangular parameters
//! `xi, eta in [-1, 1]`, and the face point `(tan(pi xi / 4),
//! tan(pi eta / 4))` is projected radially onto the sphere. The stacked
//! cubed-sphere topology stores unwarped cube-shell coordinates; grid
//! builders apply this map per quadrature point.

use crate::error::TopologyError;

/// Project the cube-face point with dominant coordinate `sr` and
/// equiangular parameters `(xi, eta)` onto the sphere of radius `|sr|`.
#[inline]
fn gnomonic(sr: f64, xi: f64, eta: f64) -> (f64, f64, f64) {
    let x = (std::f64::consts::PI * xi / 4.0).tan();
    let y = (std::f64::consts::PI * eta / 4.0).tan();
    let major = sr / (x * x + y * y + 1.0).sqrt();
    (major, x * major, y * major)
}

/// Warp a point on the surface of the cube of half-side
/// `max(|a|, |b|, |c|)` onto the sphere of the same radius.
///
/// Fails with [`TopologyError::InvalidWarpInput`] for the origin, which has
/// no dominant cube face.
pub fn cubed_sphere_warp(a: f64, b: f64, c: f64) -> Result<[f64; 3], TopologyError> {
    cubed_sphere_warp_with_radius(a, b, c, a.abs().max(b.abs()).max(c.abs()))
}

/// Warp onto the sphere of radius `r`, preserving the direction selected by
/// the dominant coordinate of `(a, b, c)`.
///
/// Host models use this to scale a unit shell to a planetary radius.
pub fn cubed_sphere_warp_with_radius(
    a: f64,
    b: f64,
    c: f64,
    r: f64,
) -> Result<[f64; 3], TopologyError> {
    let (aa, ab, ac) = (a.abs(), b.abs(), c.abs());
    if aa >= ab && aa >= ac && a != 0.0 {
        let (x1, x2, x3) = gnomonic(r.copysign(a), b / a, c / a);
        Ok([x1, x2, x3])
    } else if ab >= ac && b != 0.0 {
        let (x2, x1, x3) = gnomonic(r.copysign(b), a / b, c / b);
        Ok([x1, x2, x3])
    } else if c != 0.0 {
        let (x3, x1, x2) = gnomonic(r.copysign(c), a / c, b / c);
        Ok([x1, x2, x3])
    } else {
        Err(TopologyError::InvalidWarpInput)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn norm(p: [f64; 3]) -> f64 {
        (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt()
    }

    #[test]
    fn face_centers_map_to_poles() {
        assert_eq!(cubed_sphere_warp(1.0, 0.0, 0.0).unwrap(), [1.0, 0.0, 0.0]);
        assert_eq!(cubed_sphere_warp(0.0, -2.0, 0.0).unwrap(), [0.0, -2.0, 0.0]);
        assert_eq!(cubed_sphere_warp(0.0, 0.0, 3.0).unwrap(), [0.0, 0.0, 3.0]);
    }

    #[test]
    fn cube_corner_lands_on_the_diagonal() {
        let p = cubed_sphere_warp(1.0, 1.0, 1.0).unwrap();
        assert!((norm(p) - 1.0).abs() < 1e-12);
        assert!((p[0] - p[1]).abs() < 1e-12);
        assert!((p[1] - p[2]).abs() < 1e-12);
    }

    #[test]
    fn origin_is_rejected() {
        assert_eq!(
            cubed_sphere_warp(0.0, 0.0, 0.0).unwrap_err(),
            TopologyError::InvalidWarpInput
        );
    }

    #[test]
    fn explicit_radius_scales_the_sphere() {
        let p = cubed_sphere_warp_with_radius(1.0, 0.25, -0.5, 6.371e6).unwrap();
        assert!((norm(p) - 6.371e6).abs() < 1e-3);
    }

    #[test]
    fn warp_preserves_signs() {
        let p = cubed_sphere_warp(-1.0, 0.5, -0.25).unwrap();
        assert!(p[0] < 0.0 && p[1] > 0.0 && p[2] < 0.0);
    }

    proptest! {
        // Property: any point on the unit cube surface maps onto the unit
        // sphere to within 1e-12.
        #[test]
        fn unit_cube_surface_maps_to_unit_sphere(
            u in -1.0f64..=1.0,
            v in -1.0f64..=1.0,
            face in 0usize..6,
        ) {
            let p = match face {
                0 => [1.0, u, v],
                1 => [-1.0, u, v],
                2 => [u, 1.0, v],
                3 => [u, -1.0, v],
                4 => [u, v, 1.0],
                _ => [u, v, -1.0],
            };
            let w = cubed_sphere_warp(p[0], p[1], p[2]).unwrap();
            prop_assert!((norm(w) - 1.0).abs() < 1e-12);
        }

        // The two warp entry points agree when the radius is the max-norm.
        #[test]
        fn default_radius_matches_explicit(
            u in -1.0f64..=1.0,
            v in -1.0f64..=1.0,
        ) {
            let w1 = cubed_sphere_warp(1.0, u, v).unwrap();
            let w2 = cubed_sphere_warp_with_radius(1.0, u, v, 1.0).unwrap();
            prop_assert_eq!(w1, w2);
        }
    }
}
