//! Face orientation codes: small, copyable representations of how a
//! neighbor's face-corner enumeration relates to ours.
//!
//! Conforming hex/quad meshes built from bricks and cubed shells only ever
//! need two elements of the face symmetry group: the identity, and the
//! reversal of the first face coordinate (abutting shell patches whose
//! in-plane axes run opposite ways). The group is C2: composition is XOR
//! and every element is its own inverse.

/// Relative orientation of a matched face pair.
///
/// The raw wire codes are `1` (identity) and `3` (reverse first face
/// coordinate), kept for compatibility with the downstream grid builder.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum FaceOrder {
    /// Corner enumerations align.
    #[default]
    Identity = 1,
    /// The neighbor traverses the first face coordinate backwards.
    Reverse = 3,
}

impl FaceOrder {
    /// Raw orientation code (`1` or `3`).
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decode a raw orientation code.
    #[inline]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(FaceOrder::Identity),
            3 => Some(FaceOrder::Reverse),
            _ => None,
        }
    }

    /// Group composition (apply `b`, then `a`).
    #[inline]
    pub const fn compose(a: Self, b: Self) -> Self {
        match (a, b) {
            (FaceOrder::Identity, x) | (x, FaceOrder::Identity) => x,
            (FaceOrder::Reverse, FaceOrder::Reverse) => FaceOrder::Identity,
        }
    }

    /// Group inverse; both elements are involutions.
    #[inline]
    pub const fn inverse(a: Self) -> Self {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for o in [FaceOrder::Identity, FaceOrder::Reverse] {
            assert_eq!(FaceOrder::from_code(o.code()), Some(o));
        }
        assert_eq!(FaceOrder::from_code(0), None);
        assert_eq!(FaceOrder::from_code(2), None);
    }

    #[test]
    fn group_laws_hold() {
        use FaceOrder::*;
        for a in [Identity, Reverse] {
            assert_eq!(FaceOrder::compose(a, FaceOrder::inverse(a)), Identity);
            for b in [Identity, Reverse] {
                // C2 is abelian.
                assert_eq!(FaceOrder::compose(a, b), FaceOrder::compose(b, a));
            }
        }
    }
}
