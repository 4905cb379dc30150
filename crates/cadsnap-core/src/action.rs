//! In-progress modal transform state.

use glam::{DMat4, DVec3};

use cadsnap_geom::{Ray, Space};

use crate::flags::{ConstraintFlags, TransformKind};
use crate::item::SnapItem;

/// Angle rounding modifier for rotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AngleRounding {
    #[default]
    None,
    /// 5 degree steps.
    Coarse,
    /// 1 degree steps.
    Fine,
}

impl AngleRounding {
    /// Step size in radians.
    pub fn step(self) -> Option<f64> {
        match self {
            AngleRounding::None => None,
            AngleRounding::Coarse => Some(5f64.to_radians()),
            AngleRounding::Fine => Some(1f64.to_radians()),
        }
    }

    pub fn apply(self, angle: f64) -> f64 {
        match self.step() {
            Some(step) => (angle / step).round() * step,
            None => angle,
        }
    }
}

/// Mutable state of one modal transform.
///
/// Created inactive; the session activates it on invoke and mutates it on
/// every event until it is converted into a delta on confirm.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformAction {
    pub kind: TransformKind,
    pub snap_from: DVec3,
    pub snap_to: DVec3,
    /// Candidate used for intersection/perpendicular/parallel resolution.
    pub active_item: Option<SnapItem>,
    pub constraint: ConstraintFlags,
    space: Space,
    /// Current step of a stepped transform, `1..=steps`.
    pub step: u32,
    pub steps: u32,
    pub copy_count: u32,
    pub is_active: bool,
    /// Slide along the snapped edge instead of crossing into a constraint plane.
    pub along_segment: bool,
    /// Cursor ray of the pass that produced `active_item`.
    pub reference_ray: Option<Ray>,
    /// Typed value overriding the mouse: distance, angle (radians) or factor.
    pub keyboard_value: Option<f64>,
    pub rounding: AngleRounding,
}

impl Default for TransformAction {
    fn default() -> Self {
        Self {
            kind: TransformKind::NONE,
            snap_from: DVec3::ZERO,
            snap_to: DVec3::ZERO,
            active_item: None,
            constraint: ConstraintFlags::NONE,
            space: Space::WORLD,
            step: 1,
            steps: 1,
            copy_count: 0,
            is_active: false,
            along_segment: false,
            reference_ray: None,
            keyboard_value: None,
            rounding: AngleRounding::None,
        }
    }
}

impl TransformAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate with a transform kind about `space`, unconstrained.
    ///
    /// Copy count, rounding and along-segment mode carry over.
    pub fn start(&mut self, kind: TransformKind, space: Space) {
        self.kind = kind;
        self.space = space;
        self.constraint = ConstraintFlags::NONE;
        self.snap_from = space.origin();
        self.snap_to = space.origin();
        self.active_item = None;
        self.reference_ray = None;
        self.keyboard_value = None;
        self.step = 1;
        self.steps = 1;
        self.is_active = true;
    }

    pub fn space(&self) -> &Space {
        &self.space
    }

    /// Replace the pivot, re-normalizing the matrix.
    pub fn set_space(&mut self, matrix: DMat4) {
        self.space.set(matrix);
    }

    pub fn set_space_frame(&mut self, space: Space) {
        self.space = space;
    }

    pub fn is(&self, kind: TransformKind) -> bool {
        self.kind.has(kind)
    }

    /// `step / steps`, or 1 when no stepping is configured.
    pub fn step_fraction(&self) -> f64 {
        if self.steps == 0 {
            1.0
        } else {
            self.step.min(self.steps) as f64 / self.steps as f64
        }
    }

    /// Copy of this action evaluated at `step` of `steps`.
    pub fn at_step(&self, step: u32, steps: u32) -> Self {
        let mut action = self.clone();
        action.step = step;
        action.steps = steps;
        action
    }

    /// Back to the initial inactive state, keeping the pivot.
    pub fn reset(&mut self) {
        let space = self.space;
        *self = Self::default();
        self.space = space;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let action = TransformAction::new();
        assert!(!action.is_active);
        assert!(action.kind.is_empty());
        assert_eq!(action.step_fraction(), 1.0);
    }

    #[test]
    fn test_start_clears_constraint() {
        use cadsnap_geom::Axis;

        let mut action = TransformAction::new();
        action.start(TransformKind::MOVE, Space::WORLD);
        action.constraint = ConstraintFlags::along(Axis::X);
        action.copy_count = 2;
        action.rounding = AngleRounding::Fine;

        action.start(TransformKind::ROTATE, Space::from_origin(DVec3::X));
        assert_eq!(action.constraint, ConstraintFlags::NONE);
        assert_eq!(action.snap_from, DVec3::X);
        assert_eq!(action.copy_count, 2);
        assert_eq!(action.rounding, AngleRounding::Fine);
    }

    #[test]
    fn test_space_is_renormalized() {
        let mut action = TransformAction::new();
        action.set_space(DMat4::from_scale(DVec3::splat(3.0)));
        assert!((action.space().basis().determinant() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rounding() {
        let a = AngleRounding::Coarse.apply(7f64.to_radians());
        assert!((a - 5f64.to_radians()).abs() < 1e-12);
        let a = AngleRounding::Fine.apply(7.4f64.to_radians());
        assert!((a - 7f64.to_radians()).abs() < 1e-12);
        assert_eq!(AngleRounding::None.apply(0.123), 0.123);
    }

    #[test]
    fn test_step_fraction() {
        let action = TransformAction::new().at_step(2, 4);
        assert_eq!(action.step_fraction(), 0.5);
    }
}
