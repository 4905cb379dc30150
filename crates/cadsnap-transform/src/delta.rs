//! Turning a transform action into a delta matrix.

use glam::{DMat4, DVec3};

use cadsnap_constraint::{apply, rotation_axis};
use cadsnap_core::{ConstraintFlags, TransformAction, TransformKind};
use cadsnap_geom::geom3d::{
    project_point_on_plane, rotation_about_point, safe_basis_from_direction_and_guide, safe_normalize,
    signed_angle_in_plane,
};
use cadsnap_geom::{Axis, EPSILON};

/// A world-space change to apply to a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delta {
    /// Pre-multiplied into the target's world matrix.
    pub matrix: DMat4,
    /// A scale factor went negative; mesh data needs its normals flipped.
    pub flip_normals: bool,
}

impl Delta {
    pub const IDENTITY: Delta = Delta {
        matrix: DMat4::IDENTITY,
        flip_normals: false,
    };

    pub fn from_matrix(matrix: DMat4) -> Self {
        Self {
            matrix,
            flip_normals: false,
        }
    }

    pub fn translation(&self) -> DVec3 {
        self.matrix.w_axis.truncate()
    }

    pub fn is_identity(&self) -> bool {
        self.matrix.abs_diff_eq(DMat4::IDENTITY, EPSILON)
    }

    /// `self` followed by `next`.
    pub fn then(&self, next: &Delta) -> Delta {
        Delta {
            matrix: next.matrix * self.matrix,
            flip_normals: self.flip_normals != next.flip_normals,
        }
    }

    pub fn inverse(&self) -> Delta {
        Delta {
            matrix: self.matrix.inverse(),
            flip_normals: self.flip_normals,
        }
    }

    pub fn apply_to(&self, world: &DMat4) -> DMat4 {
        self.matrix * *world
    }
}

impl Default for Delta {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Compute the delta of `action` at its current step.
///
/// `FINAL` and inactive actions give the identity. Any non-finite result is
/// replaced by the identity.
pub fn compute_delta(action: &TransformAction) -> Delta {
    let kind = action.kind;
    let delta = if !action.is_active || kind.has(TransformKind::FINAL) {
        Delta::IDENTITY
    } else if kind.has(TransformKind::MOVE) {
        move_delta(action)
    } else if kind.has(TransformKind::ROTATE) {
        rotate_delta(action)
    } else if kind.has(TransformKind::SCALE) {
        scale_delta(action)
    } else if kind.has(TransformKind::PINHOLE) {
        pinhole_delta(action)
    } else {
        Delta::IDENTITY
    };

    if delta.matrix.is_finite() {
        delta
    } else {
        tracing::warn!(?kind, "non-finite delta replaced by identity");
        Delta::IDENTITY
    }
}

/// Where `snap_to` lands after the constraint, for display and chaining.
pub fn resolved_target(action: &TransformAction) -> DVec3 {
    if action.is(TransformKind::MOVE) {
        apply(action, action.snap_to, &action.space().with_origin(action.snap_from))
    } else {
        apply(action, action.snap_to, action.space())
    }
}

/// Translation along the constrained `snap_from -> snap_to` vector.
fn move_delta(action: &TransformAction) -> Delta {
    let about = action.space();
    let to = resolved_target(action);
    let mut offset = to - action.snap_from;

    if let Some(length) = action.keyboard_value {
        let direction = safe_normalize(offset).unwrap_or_else(|| match action.constraint.axis() {
            Some(axis) if action.constraint.is_axis() => about.axis(axis),
            _ => about.x(),
        });
        offset = direction * length;
    }

    Delta::from_matrix(DMat4::from_translation(offset * action.step_fraction()))
}

/// Rotation about the pivot by the signed angle `snap_from -> snap_to`.
fn rotate_delta(action: &TransformAction) -> Delta {
    let about = action.space();
    let origin = about.origin();
    let axis = rotation_axis(action, about);

    let angle = match action.keyboard_value {
        Some(angle) => angle,
        None => {
            let to = resolved_target(action);
            action
                .rounding
                .apply(signed_angle_in_plane(action.snap_from - origin, to - origin, axis))
        }
    };

    Delta::from_matrix(rotation_about_point(origin, axis, angle * action.step_fraction()))
}

/// Axes a scale acts on: all for uniform, the axis, or the two in-plane axes.
fn scaled_axes(constraint: ConstraintFlags) -> [bool; 3] {
    match constraint.axis() {
        Some(axis) if constraint.is_axis() => {
            let mut axes = [false; 3];
            axes[axis.index()] = true;
            axes
        }
        Some(axis) if constraint.is_plane() => {
            let mut axes = [true; 3];
            axes[axis.index()] = false;
            axes
        }
        _ => [true; 3],
    }
}

fn ratio(from: f64, to: f64) -> f64 {
    if from.abs() < EPSILON || to.abs() < EPSILON {
        1.0
    } else {
        to / from
    }
}

/// Uniform or per-axis scale about the pivot.
fn scale_delta(action: &TransformAction) -> Delta {
    let about = action.space();
    let origin = about.origin();
    let to = resolved_target(action);
    let axes = scaled_axes(action.constraint);
    let uniform = !action.constraint.is_constrained();

    let mut factors = if uniform {
        DVec3::splat(ratio(action.snap_from.distance(origin), to.distance(origin)))
    } else {
        let from_local = about.to_local(action.snap_from);
        let to_local = about.to_local(to);
        DVec3::from_array(std::array::from_fn(|i| {
            if axes[i] {
                ratio(from_local[i], to_local[i])
            } else {
                1.0
            }
        }))
    };

    if let Some(value) = action.keyboard_value {
        factors = DVec3::from_array(std::array::from_fn(|i| if axes[i] { value } else { 1.0 }));
    }

    let t = action.step_fraction();
    factors = DVec3::ONE + (factors - DVec3::ONE) * t;

    let frame = about.matrix();
    Delta {
        matrix: frame * DMat4::from_scale(factors) * frame.inverse(),
        // An even number of negative factors is a rotation, not a mirror.
        flip_normals: factors.x * factors.y * factors.z < 0.0,
    }
}

/// Re-orient the pivot frame so its X axis points at `snap_to`.
///
/// Z stays as close to the current Z as the new X allows. Under a plane
/// constraint the target is first dropped into that plane.
fn pinhole_delta(action: &TransformAction) -> Delta {
    let about = action.space();
    let origin = about.origin();
    let target = match action.constraint.axis() {
        Some(axis) if action.constraint.is_plane() => project_point_on_plane(action.snap_to, origin, about.axis(axis)),
        _ => action.snap_to,
    };

    let Ok(basis) = safe_basis_from_direction_and_guide(target - origin, about.z(), Axis::X, Axis::Z) else {
        return Delta::IDENTITY;
    };

    let rotation = DMat4::from_mat3(basis) * DMat4::from_mat3(about.basis()).transpose();
    let angle_scaled = if action.step_fraction() < 1.0 {
        let (axis, angle) = glam::DQuat::from_mat4(&rotation).to_axis_angle();
        DMat4::from_axis_angle(axis, angle * action.step_fraction())
    } else {
        rotation
    };

    Delta::from_matrix(DMat4::from_translation(origin) * angle_scaled * DMat4::from_translation(-origin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadsnap_core::AngleRounding;
    use cadsnap_geom::Space;
    use proptest::prelude::*;
    use std::f64::consts::FRAC_PI_2;

    fn action(kind: TransformKind, from: DVec3, to: DVec3) -> TransformAction {
        let mut action = TransformAction::new();
        action.start(kind, Space::WORLD);
        action.snap_from = from;
        action.snap_to = to;
        action
    }

    #[test]
    fn test_move_axis_constraint() {
        let mut a = action(TransformKind::MOVE, DVec3::ZERO, DVec3::new(3.0, 4.0, 0.0));
        a.constraint = ConstraintFlags::along(Axis::X);
        let d = compute_delta(&a);
        assert!(d.translation().distance(DVec3::new(3.0, 0.0, 0.0)) < 1e-12);
    }

    #[test]
    fn test_move_keyboard_length() {
        let mut a = action(TransformKind::MOVE, DVec3::ZERO, DVec3::new(3.0, 4.0, 0.0));
        a.keyboard_value = Some(10.0);
        assert!(compute_delta(&a).translation().distance(DVec3::new(6.0, 8.0, 0.0)) < 1e-12);

        let mut a = action(TransformKind::MOVE, DVec3::ZERO, DVec3::ZERO);
        a.constraint = ConstraintFlags::along(Axis::Y);
        a.keyboard_value = Some(-2.0);
        assert!(compute_delta(&a).translation().distance(DVec3::new(0.0, -2.0, 0.0)) < 1e-12);
    }

    #[test]
    fn test_move_step_fraction() {
        let a = action(TransformKind::MOVE, DVec3::ZERO, DVec3::new(4.0, 0.0, 0.0)).at_step(1, 4);
        assert!(compute_delta(&a).translation().distance(DVec3::new(1.0, 0.0, 0.0)) < 1e-12);
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let a = action(TransformKind::ROTATE, DVec3::X, DVec3::Y);
        let d = compute_delta(&a);
        assert!(d.matrix.transform_point3(DVec3::X).distance(DVec3::Y) < 1e-12);
    }

    #[test]
    fn test_rotate_rounding_and_keyboard() {
        let mut a = action(TransformKind::ROTATE, DVec3::X, DVec3::new(1.0, 0.12, 0.0));
        a.rounding = AngleRounding::Coarse;
        let d = compute_delta(&a);
        let p = d.matrix.transform_point3(DVec3::X);
        assert!((p.y.atan2(p.x) - 5f64.to_radians()).abs() < 1e-12);

        a.keyboard_value = Some(FRAC_PI_2);
        let p = compute_delta(&a).matrix.transform_point3(DVec3::X);
        assert!(p.distance(DVec3::Y) < 1e-12);
    }

    #[test]
    fn test_uniform_scale() {
        let a = action(TransformKind::SCALE, DVec3::new(1.0, 0.0, 0.0), DVec3::new(0.0, 3.0, 0.0));
        let d = compute_delta(&a);
        assert!(d.matrix.transform_point3(DVec3::ONE).distance(DVec3::splat(3.0)) < 1e-12);
        assert!(!d.flip_normals);
    }

    #[test]
    fn test_axis_scale_flip() {
        let mut a = action(TransformKind::SCALE, DVec3::new(2.0, 1.0, 0.0), DVec3::new(-4.0, 1.0, 0.0));
        a.constraint = ConstraintFlags::along(Axis::X);
        let d = compute_delta(&a);
        assert!(d.matrix.transform_point3(DVec3::new(1.0, 1.0, 1.0)).distance(DVec3::new(-2.0, 1.0, 1.0)) < 1e-12);
        assert!(d.flip_normals);
    }

    #[test]
    fn test_two_negative_factors_keep_normals() {
        let mut a = action(TransformKind::SCALE, DVec3::new(2.0, 1.0, 0.0), DVec3::new(-4.0, -3.0, 0.0));
        a.constraint = ConstraintFlags::plane(Axis::Z);
        let d = compute_delta(&a);
        assert!((d.matrix.x_axis.x + 2.0).abs() < 1e-12);
        assert!((d.matrix.y_axis.y + 3.0).abs() < 1e-12);
        assert!(!d.flip_normals);
    }

    #[test]
    fn test_scale_zero_component_is_identity_on_that_axis() {
        let mut a = action(TransformKind::SCALE, DVec3::new(2.0, 1e-9, 0.0), DVec3::new(4.0, 5.0, 0.0));
        a.constraint = ConstraintFlags::plane(Axis::Z);
        let d = compute_delta(&a);
        assert_eq!(d.matrix.y_axis.y, 1.0);
        assert!((d.matrix.x_axis.x - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_pinhole_orients_x() {
        let a = action(TransformKind::PINHOLE, DVec3::ZERO, DVec3::new(0.0, 2.0, 0.0));
        let d = compute_delta(&a);
        assert!(d.matrix.transform_vector3(DVec3::X).distance(DVec3::Y) < 1e-12);
        assert!(d.matrix.transform_vector3(DVec3::Z).distance(DVec3::Z) < 1e-12);
    }

    #[test]
    fn test_final_and_inactive_are_identity() {
        let a = action(TransformKind::FINAL, DVec3::ZERO, DVec3::X);
        assert!(compute_delta(&a).is_identity());
        let mut a = action(TransformKind::MOVE, DVec3::ZERO, DVec3::X);
        a.is_active = false;
        assert!(compute_delta(&a).is_identity());
    }

    #[test]
    fn test_non_finite_input_gives_identity() {
        let a = action(TransformKind::MOVE, DVec3::ZERO, DVec3::new(f64::NAN, 0.0, 0.0));
        assert_eq!(compute_delta(&a), Delta::IDENTITY);
    }

    proptest! {
        #[test]
        fn prop_move_then_inverse_restores(
            x in -100.0f64..100.0, y in -100.0f64..100.0, z in -100.0f64..100.0,
            angle in 0.0f64..6.28,
        ) {
            let a = action(TransformKind::MOVE, DVec3::ZERO, DVec3::new(x, y, z));
            let d = compute_delta(&a);
            let world = DMat4::from_rotation_z(angle) * DMat4::from_translation(DVec3::new(1.0, 2.0, 3.0));
            let back = d.inverse().apply_to(&d.apply_to(&world));
            prop_assert!(back.abs_diff_eq(world, 1e-9));
        }

        #[test]
        fn prop_scale_near_zero_from_is_exactly_one(tiny in -1e-7f64..1e-7, to in -10.0f64..10.0) {
            let mut a = action(TransformKind::SCALE, DVec3::new(tiny, 1.0, 1.0), DVec3::new(to, 1.0, 1.0));
            a.constraint = ConstraintFlags::along(Axis::X);
            let d = compute_delta(&a);
            prop_assert_eq!(d.matrix.x_axis.x, 1.0);
            prop_assert!(d.matrix.is_finite());
        }
    }
}
