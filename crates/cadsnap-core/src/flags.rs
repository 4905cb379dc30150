//! Bit-flag newtypes.
//!
//! Each type is a plain integer mask with `has`/`enable`/`disable`/`toggle`.

use cadsnap_geom::Axis;

macro_rules! bit_flags {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(
                $(#[$flag_meta:meta])*
                const $flag:ident = $value:expr;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name($ty);

        impl $name {
            $(
                $(#[$flag_meta])*
                pub const $flag: $name = $name($value);
            )*

            pub const NONE: $name = $name(0);

            pub const fn from_bits(bits: $ty) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> $ty {
                self.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// True when every bit of `other` is set.
            pub const fn has(self, other: $name) -> bool {
                other.0 != 0 && self.0 & other.0 == other.0
            }

            /// True when any bit of `other` is set.
            pub const fn intersects(self, other: $name) -> bool {
                self.0 & other.0 != 0
            }

            pub fn enable(&mut self, other: $name) {
                self.0 |= other.0;
            }

            pub fn disable(&mut self, other: $name) {
                self.0 &= !other.0;
            }

            pub fn toggle(&mut self, other: $name) {
                self.0 ^= other.0;
            }

            pub const fn with(self, other: $name) -> Self {
                Self(self.0 | other.0)
            }

            pub const fn without(self, other: $name) -> Self {
                Self(self.0 & !other.0)
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: $name) {
                self.0 |= rhs.0;
            }
        }

        impl std::ops::BitAnd for $name {
            type Output = $name;
            fn bitand(self, rhs: $name) -> $name {
                $name(self.0 & rhs.0)
            }
        }
    };
}

bit_flags! {
    /// Which scene elements the user wants to snap to.
    pub struct SnapElements: u32 {
        const VERT = 1 << 0;
        const EDGE = 1 << 1;
        const EDGE_CENTER = 1 << 2;
        const FACE = 1 << 3;
        const FACE_CENTER = 1 << 4;
        const GRID = 1 << 5;
        /// Object origins.
        const ORIGIN = 1 << 6;
        /// Bounding-box corners.
        const BOUNDS = 1 << 7;
        /// The 3D cursor.
        const CURSOR = 1 << 8;
        /// Median of the current selection.
        const MEDIAN = 1 << 9;
        /// User-created helpers.
        const HELPER = 1 << 10;
    }
}

impl SnapElements {
    /// Elements resolved against real geometry.
    pub const GEOMETRY: SnapElements = SnapElements(0b11111);
    /// Virtual targets that only the raster engine can find.
    pub const VIRTUAL: SnapElements = SnapElements((1 << 6) | (1 << 7) | (1 << 8) | (1 << 9) | (1 << 10));
    pub const ALL: SnapElements = SnapElements((1 << 11) - 1);
}

bit_flags! {
    /// Shape of a snap candidate.
    pub struct SnapItemKind: u8 {
        const POINT = 1 << 0;
        const LINE = 1 << 1;
        const TRI = 1 << 2;
        /// Combined with LINE or TRI for edge and face centers.
        const CENTER = 1 << 3;
    }
}

impl SnapItemKind {
    /// Rank used by the tie-break: POINT < LINE center < LINE < TRI center < TRI.
    pub fn type_priority(self) -> u8 {
        if self.has(SnapItemKind::POINT) {
            0
        } else if self.has(SnapItemKind::LINE) {
            if self.has(SnapItemKind::CENTER) {
                1
            } else {
                2
            }
        } else if self.has(SnapItemKind::TRI) {
            if self.has(SnapItemKind::CENTER) {
                3
            } else {
                4
            }
        } else {
            5
        }
    }
}

bit_flags! {
    /// Kind of a modal transform; primitive modes combine with BY_3_POINTS.
    pub struct TransformKind: u16 {
        const MOVE = 1 << 0;
        const ROTATE = 1 << 1;
        const SCALE = 1 << 2;
        const PINHOLE = 1 << 3;
        const BY_3_POINTS = 1 << 4;
        /// Fold accumulated step deltas into the base transform.
        const FINAL = 1 << 5;
        /// Steps only move previews until the whole sequence finishes.
        const APPLY_STEP = 1 << 6;
    }
}

impl TransformKind {
    pub const PRIMITIVES: TransformKind = TransformKind(0b1111);

    /// The primitive mode bits alone.
    pub fn primitive(self) -> TransformKind {
        self & Self::PRIMITIVES
    }

    /// Same modifiers with a different primitive mode.
    pub fn with_primitive(self, primitive: TransformKind) -> TransformKind {
        self.without(Self::PRIMITIVES).without(Self::FINAL) | primitive.primitive()
    }
}

bit_flags! {
    /// Axis or plane constraint, optionally perpendicular/parallel for rotation.
    pub struct ConstraintFlags: u8 {
        const AXIS = 1 << 0;
        const PLANE = 1 << 1;
        const X = 1 << 2;
        const Y = 1 << 3;
        const Z = 1 << 4;
        const PERPENDICULAR = 1 << 5;
        const PARALLEL = 1 << 6;
    }
}

impl ConstraintFlags {
    /// Constraint along `axis`.
    pub fn along(axis: Axis) -> Self {
        Self::AXIS | Self::for_axis(axis)
    }

    /// Constraint to the plane whose normal is `axis`.
    pub fn plane(axis: Axis) -> Self {
        Self::PLANE | Self::for_axis(axis)
    }

    fn for_axis(axis: Axis) -> Self {
        match axis {
            Axis::X => Self::X,
            Axis::Y => Self::Y,
            Axis::Z => Self::Z,
        }
    }

    /// The constrained axis (line direction, or plane normal).
    pub fn axis(self) -> Option<Axis> {
        if self.has(Self::X) {
            Some(Axis::X)
        } else if self.has(Self::Y) {
            Some(Axis::Y)
        } else if self.has(Self::Z) {
            Some(Axis::Z)
        } else {
            None
        }
    }

    pub fn is_axis(self) -> bool {
        self.has(Self::AXIS) && self.axis().is_some()
    }

    pub fn is_plane(self) -> bool {
        self.has(Self::PLANE) && self.axis().is_some()
    }

    pub fn is_constrained(self) -> bool {
        self.is_axis() || self.is_plane()
    }

    /// Apply a key press: the same constraint twice clears it.
    pub fn toggled(self, requested: ConstraintFlags) -> ConstraintFlags {
        if self == requested {
            ConstraintFlags::NONE
        } else {
            requested
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_ops() {
        let mut e = SnapElements::VERT | SnapElements::EDGE;
        assert!(e.has(SnapElements::VERT));
        assert!(!e.has(SnapElements::VERT | SnapElements::FACE));
        assert!(e.intersects(SnapElements::VERT | SnapElements::FACE));
        e.toggle(SnapElements::VERT);
        assert!(!e.has(SnapElements::VERT));
        e.enable(SnapElements::FACE);
        e.disable(SnapElements::EDGE);
        assert_eq!(e, SnapElements::FACE);
        assert!(!e.has(SnapElements::NONE));
    }

    #[test]
    fn test_type_priority_order() {
        let order = [
            SnapItemKind::POINT,
            SnapItemKind::LINE | SnapItemKind::CENTER,
            SnapItemKind::LINE,
            SnapItemKind::TRI | SnapItemKind::CENTER,
            SnapItemKind::TRI,
        ];
        for pair in order.windows(2) {
            assert!(pair[0].type_priority() < pair[1].type_priority());
        }
    }

    #[test]
    fn test_constraint_toggle_is_idempotent() {
        let x = ConstraintFlags::along(Axis::X);
        let c = ConstraintFlags::NONE.toggled(x);
        assert_eq!(c, x);
        assert_eq!(c.toggled(x), ConstraintFlags::NONE);
        assert_eq!(c.toggled(ConstraintFlags::plane(Axis::Z)), ConstraintFlags::plane(Axis::Z));
        assert_eq!(ConstraintFlags::plane(Axis::Y).axis(), Some(Axis::Y));
        assert!(!ConstraintFlags::AXIS.is_constrained());
    }

    #[test]
    fn test_with_primitive_keeps_modifiers() {
        let k = TransformKind::BY_3_POINTS | TransformKind::MOVE;
        let next = k.with_primitive(TransformKind::PINHOLE);
        assert_eq!(next, TransformKind::BY_3_POINTS | TransformKind::PINHOLE);
        assert_eq!(next.primitive(), TransformKind::PINHOLE);
    }
}
