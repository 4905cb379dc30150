//! The three-click `BY_3_POINTS` sequence.
//!
//! The first click moves the pivot, the second aims its X axis, the third
//! turns the frame about X so the three points define its XY plane.

use glam::DVec3;

use cadsnap_core::TransformKind;
use cadsnap_geom::geom3d::safe_basis_from_direction_and_guide;
use cadsnap_geom::{Axis, GeomError, Space};

/// Primitive modes of the sequence, in click order.
pub const BY_3_POINTS_STEPS: [TransformKind; 3] = [TransformKind::MOVE, TransformKind::PINHOLE, TransformKind::ROTATE];

/// Position of a running sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sequence {
    index: usize,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Primitive mode of the current click, or `FINAL` once all are taken.
    pub fn current(&self) -> TransformKind {
        BY_3_POINTS_STEPS
            .get(self.index)
            .copied()
            .unwrap_or(TransformKind::FINAL)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= BY_3_POINTS_STEPS.len()
    }

    pub fn is_finished(&self) -> bool {
        self.index >= BY_3_POINTS_STEPS.len()
    }

    /// Move to the next click and return `kind` with that primitive mode,
    /// keeping its other modifiers.
    pub fn advance(&mut self, kind: TransformKind) -> TransformKind {
        self.index = (self.index + 1).min(BY_3_POINTS_STEPS.len());
        let next = self.current();
        if next == TransformKind::FINAL {
            kind.without(TransformKind::PRIMITIVES) | TransformKind::FINAL
        } else {
            kind.with_primitive(next)
        }
    }
}

/// Frame defined by up to three points.
///
/// `a` is the origin. `b` fixes the X axis when given. `c` fixes the XY plane
/// when given and not collinear with `a` and `b`. Missing points leave the
/// corresponding part of `current` unchanged.
pub fn pivot_from_three_points(
    current: &Space,
    a: DVec3,
    b: Option<DVec3>,
    c: Option<DVec3>,
) -> Result<Space, GeomError> {
    let Some(b) = b else {
        return Ok(current.with_origin(a));
    };
    let x = b - a;

    let basis = match c {
        Some(c) => {
            let in_plane = c - a;
            let normal = x.cross(in_plane);
            match safe_basis_from_direction_and_guide(x, normal, Axis::X, Axis::Z) {
                Ok(basis) if normal.length_squared() > 0.0 => basis,
                _ => safe_basis_from_direction_and_guide(x, current.z(), Axis::X, Axis::Z)?,
            }
        }
        None => safe_basis_from_direction_and_guide(x, current.z(), Axis::X, Axis::Z)?,
    };

    Ok(Space::from_origin_basis(a, basis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_in_order() {
        let mut seq = Sequence::new();
        let kind = TransformKind::BY_3_POINTS | TransformKind::MOVE;
        assert_eq!(seq.current(), TransformKind::MOVE);
        assert!(!seq.is_last());

        let kind = seq.advance(kind);
        assert_eq!(kind, TransformKind::BY_3_POINTS | TransformKind::PINHOLE);
        let kind = seq.advance(kind);
        assert_eq!(kind, TransformKind::BY_3_POINTS | TransformKind::ROTATE);
        assert!(seq.is_last());

        let kind = seq.advance(kind);
        assert_eq!(kind, TransformKind::BY_3_POINTS | TransformKind::FINAL);
        assert!(seq.is_finished());
        assert_eq!(seq.advance(kind), kind);
    }

    #[test]
    fn test_pivot_from_three_points() {
        let a = DVec3::new(1.0, 1.0, 0.0);
        let b = DVec3::new(1.0, 3.0, 0.0);
        let c = DVec3::new(0.0, 1.0, 5.0);
        let space = pivot_from_three_points(&Space::WORLD, a, Some(b), Some(c)).unwrap();
        assert_eq!(space.origin(), a);
        assert!(space.x().distance(DVec3::Y) < 1e-12);
        // Normal of the plane through a, b, c.
        let n = (b - a).cross(c - a).normalize();
        assert!(space.z().distance(n) < 1e-12);
        assert!(space.to_local(c).z.abs() < 1e-12);
    }

    #[test]
    fn test_collinear_third_point_keeps_z() {
        let space = pivot_from_three_points(
            &Space::WORLD,
            DVec3::ZERO,
            Some(DVec3::Y),
            Some(DVec3::new(0.0, 2.0, 0.0)),
        )
        .unwrap();
        assert!(space.x().distance(DVec3::Y) < 1e-12);
        assert!(space.z().distance(DVec3::Z) < 1e-12);
    }

    #[test]
    fn test_partial_points() {
        let moved = pivot_from_three_points(&Space::WORLD, DVec3::ONE, None, None).unwrap();
        assert_eq!(moved, Space::from_origin(DVec3::ONE));
        assert!(pivot_from_three_points(&Space::WORLD, DVec3::ONE, Some(DVec3::ONE), None).is_err());
    }
}
