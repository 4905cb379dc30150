//! The modal snapping session.
//!
//! A session owns everything one modal transform needs: settings, the snap
//! helpers, the detection engines, the numeric entry buffer, the snap context
//! and a stack of transform frames. The bottom frame is the operation the user
//! invoked; editing the pivot, the grid or a helper pushes a frame on top and
//! pops back into the parent when that edit is confirmed or cancelled.
//!
//! Every host event runs detection, the constraint and the delta to
//! completion before returning.

use glam::{DMat4, DVec2, DVec3};

use cadsnap_core::{
    AngleRounding, ConstraintFlags, HelperId, NumericEntry, ObjectId, QuantityKind, SessionError, SnapElements,
    SnapError, SnapItem, SnapSettings, TransformAction, TransformKind,
};
use cadsnap_detect::{DetectContext, Detector, Editable, HelperRegistry, SceneQuery};
use cadsnap_geom::geom3d::intersect_ray_plane;
use cadsnap_geom::{Axis, Ray, Space, View};

use crate::context::{ContextOperation, SnapContext};
use crate::copies::copy_deltas;
use crate::delta::{compute_delta, Delta};
use crate::machine::{transition, Command, Flow, Input, Phase};
use crate::sequence::Sequence;
use crate::target::{EditTarget, SceneWriter, Snapshot};

/// Keys the session understands, already mapped from host key codes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyInput {
    /// A character for numeric entry. `-` flips the sign.
    Char(char),
    Backspace,
    Enter,
    Escape,
    /// Toggle a constraint; the same constraint twice clears it.
    Constraint(ConstraintFlags),
    Rounding(AngleRounding),
    CopyCount(u32),
    ToggleAlongSegment,
    ToggleXray,
    ToggleElements(SnapElements),
    /// Add the current snap item to the snap context.
    SelectItem,
    BuildHelper(ContextOperation),
    ClearContext,
    EditPivot,
    EditGrid,
    EditHelper { id: HelperId, handle: Option<usize> },
}

/// What happened in response to an event.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Ignored,
    /// A frame started; `depth` counts frames including the new one.
    Started { phase: Phase, depth: usize },
    /// `snap_from` follows the cursor.
    Tracking { from: DVec3 },
    /// Pending delta, plus the deltas of copies that would be created.
    Preview { delta: Delta, copies: Vec<Delta> },
    /// A sequence step was baked; `kind` is the next step.
    StepApplied { step: usize, kind: TransformKind },
    /// A frame was confirmed; `depth` counts the frames left.
    Applied { delta: Delta, depth: usize },
    Cancelled { depth: usize },
    Selected { count: usize },
    HelperBuilt(HelperId),
    /// A setting changed without affecting the pending result.
    Updated,
}

/// Result of one detection pass, with the free-position fallback applied.
#[derive(Debug, Clone)]
struct Pick {
    position: DVec3,
    item: Option<SnapItem>,
    ray: Ray,
}

/// One transform on the stack.
#[derive(Debug, Clone)]
struct Frame {
    target: EditTarget,
    action: TransformAction,
    phase: Phase,
    sequence: Option<Sequence>,
    snapshot: Snapshot,
    /// Sequence steps already taken.
    baked: Delta,
}

impl Frame {
    fn flow(&self) -> Flow {
        match &self.sequence {
            None => Flow::Single,
            Some(sequence) if sequence.is_last() => Flow::SequenceLast,
            Some(_) => Flow::Sequence,
        }
    }

    /// Baked steps followed by the pending one.
    fn total(&self) -> Delta {
        self.baked.then(&compute_delta(&self.action))
    }
}

fn quantity_kind(kind: TransformKind) -> Option<QuantityKind> {
    if kind.has(TransformKind::MOVE) {
        Some(QuantityKind::Length)
    } else if kind.has(TransformKind::ROTATE) {
        Some(QuantityKind::Angle)
    } else if kind.has(TransformKind::SCALE) {
        Some(QuantityKind::Scalar)
    } else {
        None
    }
}

/// State of one modal operation from invoke to confirm or cancel.
pub struct SnappingSession {
    settings: SnapSettings,
    helpers: HelperRegistry,
    detector: Detector,
    detector_started: bool,
    elements: SnapElements,
    edit_mode: bool,
    grid: Space,
    pivot: Space,
    frames: Vec<Frame>,
    entry: NumericEntry,
    context: SnapContext,
    /// Phase the bottom frame ended in.
    outcome: Phase,
}

impl SnappingSession {
    pub fn new(settings: SnapSettings, helpers: HelperRegistry) -> Self {
        let detector = Detector::with_defaults(&settings);
        Self {
            settings,
            helpers,
            detector,
            detector_started: false,
            elements: SnapElements::ALL,
            edit_mode: false,
            grid: Space::WORLD,
            pivot: Space::WORLD,
            frames: Vec::new(),
            entry: NumericEntry::new(),
            context: SnapContext::new(),
            outcome: Phase::Idle,
        }
    }

    pub fn with_detector(mut self, detector: Detector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_elements(mut self, elements: SnapElements) -> Self {
        self.elements = elements;
        self
    }

    pub fn with_grid(mut self, grid: Space) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_edit_mode(mut self, edit_mode: bool) -> Self {
        self.edit_mode = edit_mode;
        self
    }

    pub fn settings(&self) -> &SnapSettings {
        &self.settings
    }

    pub fn helpers(&self) -> &HelperRegistry {
        &self.helpers
    }

    pub fn into_helpers(self) -> HelperRegistry {
        self.helpers
    }

    pub fn elements(&self) -> SnapElements {
        self.elements
    }

    pub fn grid(&self) -> Space {
        self.grid
    }

    /// Pivot of the bottom frame, updated when a pivot edit is confirmed.
    pub fn pivot(&self) -> Space {
        self.pivot
    }

    pub fn context(&self) -> &SnapContext {
        &self.context
    }

    pub fn typed_text(&self) -> &str {
        self.entry.text()
    }

    /// Action of the innermost frame.
    pub fn action(&self) -> Option<&TransformAction> {
        self.frames.last().map(|f| &f.action)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Phase of the innermost frame, or how the session ended.
    pub fn phase(&self) -> Phase {
        self.frames.last().map_or(self.outcome, |f| f.phase)
    }

    pub fn is_finished(&self) -> bool {
        self.frames.is_empty() && self.outcome.is_terminal()
    }

    /// Start the bottom frame.
    pub fn begin<S: SceneQuery + SceneWriter>(
        &mut self,
        scene: &mut S,
        target: EditTarget,
        kind: TransformKind,
        pivot: Space,
    ) -> Result<SessionEvent, SnapError> {
        if !self.frames.is_empty() {
            return Err(SessionError::AlreadyRunning.into());
        }
        self.pivot = pivot;
        self.outcome = Phase::Idle;
        tracing::debug!(?kind, edit = ?target, "snapping session invoked");
        let space = if target == EditTarget::Grid { self.grid } else { pivot };
        self.push_frame(scene, target, kind, space)
    }

    pub fn mouse_move<S: SceneQuery + SceneWriter>(
        &mut self,
        scene: &mut S,
        cursor: DVec2,
    ) -> Result<SessionEvent, SnapError> {
        let pick = self.pick(scene, cursor)?;
        self.track(pick);
        self.dispatch(scene, Input::Move)
    }

    /// Mouse click; `shift` confirms a sequence early.
    pub fn press<S: SceneQuery + SceneWriter>(
        &mut self,
        scene: &mut S,
        cursor: DVec2,
        shift: bool,
    ) -> Result<SessionEvent, SnapError> {
        let pick = self.pick(scene, cursor)?;
        self.track(pick);
        let input = if shift { Input::ShiftPress } else { Input::Press };
        self.dispatch(scene, input)
    }

    pub fn confirm<S: SceneQuery + SceneWriter>(&mut self, scene: &mut S) -> Result<SessionEvent, SnapError> {
        self.dispatch(scene, Input::Confirm)
    }

    /// Cancel the innermost frame, restoring what it changed.
    pub fn cancel<S: SceneQuery + SceneWriter>(&mut self, scene: &mut S) -> Result<SessionEvent, SnapError> {
        self.dispatch(scene, Input::Cancel)
    }

    pub fn key<S: SceneQuery + SceneWriter>(
        &mut self,
        scene: &mut S,
        key: KeyInput,
    ) -> Result<SessionEvent, SnapError> {
        match key {
            KeyInput::Char(c) => {
                if !self.entry.push(c) {
                    return Ok(SessionEvent::Ignored);
                }
                self.typed(scene)
            }
            KeyInput::Backspace => {
                self.entry.backspace();
                self.typed(scene)
            }
            KeyInput::Enter => self.dispatch(scene, Input::Confirm),
            KeyInput::Escape => self.dispatch(scene, Input::Cancel),
            KeyInput::Constraint(requested) => {
                let action = self.action_mut()?;
                action.constraint = action.constraint.toggled(requested);
                tracing::debug!(constraint = ?action.constraint, "constraint changed");
                self.dispatch(scene, Input::Type)
            }
            KeyInput::Rounding(rounding) => {
                self.action_mut()?.rounding = rounding;
                self.dispatch(scene, Input::Type)
            }
            KeyInput::CopyCount(count) => {
                self.action_mut()?.copy_count = count;
                self.dispatch(scene, Input::Type)
            }
            KeyInput::ToggleAlongSegment => {
                let action = self.action_mut()?;
                action.along_segment = !action.along_segment;
                self.dispatch(scene, Input::Type)
            }
            KeyInput::ToggleXray => {
                self.settings.xray = !self.settings.xray;
                self.detector.invalidate();
                Ok(SessionEvent::Updated)
            }
            KeyInput::ToggleElements(elements) => {
                self.elements.toggle(elements);
                Ok(SessionEvent::Updated)
            }
            KeyInput::SelectItem => match self.action().and_then(|a| a.active_item.clone()) {
                Some(item) => {
                    self.context.select(item);
                    Ok(SessionEvent::Selected { count: self.context.len() })
                }
                None => Ok(SessionEvent::Ignored),
            },
            KeyInput::BuildHelper(operation) => {
                let id = self.context.build(operation, &mut self.helpers)?;
                self.detector.invalidate();
                Ok(SessionEvent::HelperBuilt(id))
            }
            KeyInput::ClearContext => {
                self.context.clear();
                Ok(SessionEvent::Updated)
            }
            KeyInput::EditPivot => {
                let space = *self.action().ok_or(SessionError::NotRunning)?.space();
                self.push_frame(scene, EditTarget::Pivot, TransformKind::BY_3_POINTS, space)
            }
            KeyInput::EditGrid => {
                self.action().ok_or(SessionError::NotRunning)?;
                let grid = self.grid;
                self.push_frame(scene, EditTarget::Grid, TransformKind::BY_3_POINTS, grid)
            }
            KeyInput::EditHelper { id, handle } => {
                self.action().ok_or(SessionError::NotRunning)?;
                let space = self
                    .helpers
                    .get(id)
                    .ok_or(SessionError::UnknownHelper { id: id.0 })?
                    .space();
                self.push_frame(scene, EditTarget::Helper { id, handle }, TransformKind::MOVE, space)
            }
        }
    }

    fn action_mut(&mut self) -> Result<&mut TransformAction, SessionError> {
        self.frames
            .last_mut()
            .map(|f| &mut f.action)
            .ok_or(SessionError::NotRunning)
    }

    fn push_frame<S: SceneQuery + SceneWriter>(
        &mut self,
        scene: &mut S,
        target: EditTarget,
        kind: TransformKind,
        space: Space,
    ) -> Result<SessionEvent, SnapError> {
        let snapshot = match &target {
            EditTarget::Objects(ids) => {
                self.detector.exclude(ids);
                Snapshot::Objects(
                    ids.iter()
                        .filter_map(|id| scene.world_matrix(*id).map(|m| (*id, m)))
                        .collect(),
                )
            }
            EditTarget::Pivot | EditTarget::Grid => Snapshot::Space(space),
            EditTarget::Helper { id, .. } => {
                Snapshot::Helper(*self.helpers.get(*id).ok_or(SessionError::UnknownHelper { id: id.0 })?)
            }
        };

        let sequence = kind.has(TransformKind::BY_3_POINTS).then(Sequence::new);
        let first = match &sequence {
            Some(sequence) => kind.with_primitive(sequence.current()),
            None => kind,
        };
        let mut action = TransformAction::new();
        action.start(first, space);

        let mut frame = Frame {
            target,
            action,
            phase: Phase::Idle,
            sequence,
            snapshot,
            baked: Delta::IDENTITY,
        };
        let begin = transition(frame.phase, Input::Invoke, frame.flow());
        frame.phase = begin.next;

        // Handle drags start from the handle itself.
        if let (EditTarget::Helper { handle, .. }, Snapshot::Helper(helper)) = (&frame.target, &frame.snapshot) {
            let from = handle
                .and_then(|i| helper.handles().get(i).copied())
                .unwrap_or_else(|| helper.space().origin());
            frame.action.snap_from = from;
            frame.action.snap_to = from;
            frame.phase = transition(frame.phase, Input::Press, frame.flow()).next;
        }

        let phase = frame.phase;
        tracing::debug!(kind = ?first, edit = ?frame.target, %phase, depth = self.frames.len() + 1, "transform frame started");
        self.frames.push(frame);
        self.entry.clear();
        Ok(SessionEvent::Started {
            phase,
            depth: self.frames.len(),
        })
    }

    /// Run detection at `cursor`, falling back to a free position.
    fn pick<S: SceneQuery>(&mut self, scene: &S, cursor: DVec2) -> Result<Pick, SessionError> {
        if self.frames.is_empty() {
            return Err(SessionError::NotRunning);
        }
        let ctx = DetectContext::new(scene, &self.settings, &self.helpers, self.elements, cursor)
            .with_grid(self.grid)
            .with_edit_mode(self.edit_mode);
        if !self.detector_started {
            self.detector.start(&ctx);
            self.detector_started = true;
        }
        let item = self.detector.detect(&ctx);
        let ray = ctx.ray;
        let position = match &item {
            Some(item) => item.coord,
            None => self.free_position(scene.view(), &ray),
        };
        Ok(Pick { position, item, ray })
    }

    /// Cursor ray on the pivot XY plane, else on a view-facing plane through
    /// the anchor, else the last known position.
    fn free_position(&self, view: &View, ray: &Ray) -> DVec3 {
        let Some(frame) = self.frames.last() else {
            return ray.origin;
        };
        let action = &frame.action;
        let space = action.space();
        let (anchor, last) = match frame.phase {
            Phase::PickTo => (action.snap_from, action.snap_to),
            _ => (space.origin(), action.snap_from),
        };
        intersect_ray_plane(ray.origin, ray.direction, space.origin(), space.z())
            .or_else(|| intersect_ray_plane(ray.origin, ray.direction, anchor, view.view_direction()))
            .unwrap_or(last)
    }

    fn track(&mut self, pick: Pick) {
        let Some(frame) = self.frames.last_mut() else {
            return;
        };
        let action = &mut frame.action;
        action.active_item = pick.item;
        action.reference_ray = Some(pick.ray);
        match frame.phase {
            Phase::PickFrom => action.snap_from = pick.position,
            Phase::PickTo => action.snap_to = pick.position,
            _ => {}
        }
    }

    fn typed<S: SceneWriter>(&mut self, scene: &mut S) -> Result<SessionEvent, SnapError> {
        let frame = self.frames.last_mut().ok_or(SessionError::NotRunning)?;
        frame.action.keyboard_value = if self.entry.is_empty() {
            None
        } else {
            quantity_kind(frame.action.kind).and_then(|kind| match self.entry.value(kind) {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::trace!(%err, text = self.entry.text(), "typed value not usable yet");
                    None
                }
            })
        };
        self.dispatch(scene, Input::Type)
    }

    fn dispatch<S: SceneWriter>(&mut self, scene: &mut S, input: Input) -> Result<SessionEvent, SnapError> {
        let frame = self.frames.last_mut().ok_or(SessionError::NotRunning)?;
        let step = transition(frame.phase, input, frame.flow());
        if step.command != Command::Ignore {
            tracing::trace!(from = %frame.phase, to = %step.next, ?input, command = ?step.command, "transition");
        }
        frame.phase = step.next;

        match step.command {
            Command::Begin | Command::Ignore => Ok(SessionEvent::Ignored),
            Command::Track => Ok(SessionEvent::Tracking {
                from: frame.action.snap_from,
            }),
            Command::SetFrom => {
                frame.action.snap_to = frame.action.snap_from;
                Ok(SessionEvent::Tracking {
                    from: frame.action.snap_from,
                })
            }
            Command::Preview => Ok(self.preview(scene)),
            Command::ApplyStep => self.apply_step(),
            Command::Apply => self.apply(scene),
            Command::Restore => self.restore(scene),
        }
    }

    fn preview<S: SceneWriter>(&self, scene: &mut S) -> SessionEvent {
        let Some(frame) = self.frames.last() else {
            return SessionEvent::Ignored;
        };
        let (delta, copies) = if frame.sequence.is_some() {
            (frame.total(), Vec::new())
        } else {
            let mut deltas = copy_deltas(&frame.action);
            let full = deltas.pop().unwrap_or_default();
            (full, deltas)
        };
        if let Snapshot::Objects(saved) = &frame.snapshot {
            for (id, world) in saved {
                scene.set_world_matrix(*id, delta.apply_to(world));
            }
        }
        SessionEvent::Preview { delta, copies }
    }

    /// Bake the current sequence step and set up the next one.
    fn apply_step(&mut self) -> Result<SessionEvent, SnapError> {
        let frame = self.frames.last_mut().ok_or(SessionError::NotRunning)?;
        let Some(sequence) = frame.sequence.as_mut() else {
            return Ok(SessionEvent::Ignored);
        };
        let step = compute_delta(&frame.action);
        frame.baked = frame.baked.then(&step);
        let space = frame.action.space().transformed(&step.matrix);
        let kind = sequence.advance(frame.action.kind);
        let index = sequence.index();

        frame.action.start(kind, space);
        if kind.has(TransformKind::ROTATE) {
            // Turn about the new X axis, measuring from the current Y.
            frame.action.constraint = ConstraintFlags::along(Axis::X);
            frame.action.snap_from = space.origin() + space.y();
            frame.action.snap_to = frame.action.snap_from;
        }
        self.entry.clear();
        tracing::debug!(step = index, ?kind, "sequence advanced");
        Ok(SessionEvent::StepApplied { step: index, kind })
    }

    /// Bake the innermost frame into its target and pop it.
    fn apply<S: SceneWriter>(&mut self, scene: &mut S) -> Result<SessionEvent, SnapError> {
        let frame = self.frames.pop().ok_or(SessionError::NotRunning)?;
        let total = frame.total();

        match (&frame.target, &frame.snapshot) {
            (EditTarget::Objects(_), Snapshot::Objects(saved)) => {
                let copies = if frame.sequence.is_some() || frame.action.copy_count == 0 {
                    Vec::new()
                } else {
                    let mut deltas = copy_deltas(&frame.action);
                    deltas.pop();
                    deltas
                };
                for (id, world) in saved {
                    for delta in &copies {
                        if let Some(copy) = scene.duplicate(*id) {
                            write_object(scene, copy, world, delta);
                        }
                    }
                    write_object(scene, *id, world, &total);
                }
            }
            (EditTarget::Pivot, Snapshot::Space(start)) => {
                let pivot = start.transformed(&total.matrix);
                self.pivot = pivot;
                if let Some(parent) = self.frames.last_mut() {
                    parent.action.set_space_frame(pivot);
                    if parent.phase == Phase::PickFrom {
                        parent.action.snap_from = pivot.origin();
                    }
                }
            }
            (EditTarget::Grid, Snapshot::Space(start)) => {
                self.grid = start.transformed(&total.matrix);
                self.detector.invalidate();
            }
            (EditTarget::Helper { id, handle }, Snapshot::Helper(saved)) => {
                let helper = self
                    .helpers
                    .get_mut(*id)
                    .ok_or(SessionError::UnknownHelper { id: id.0 })?;
                *helper = *saved;
                helper.transform_handle(*handle, &total.matrix);
                self.detector.invalidate();
            }
            _ => {}
        }

        tracing::debug!(edit = ?frame.target, depth = self.frames.len(), "transform applied");
        self.close(Phase::Done);
        Ok(SessionEvent::Applied {
            delta: total,
            depth: self.frames.len(),
        })
    }

    /// Put back what the innermost frame changed and pop it.
    fn restore<S: SceneWriter>(&mut self, scene: &mut S) -> Result<SessionEvent, SnapError> {
        let frame = self.frames.pop().ok_or(SessionError::NotRunning)?;
        if let Snapshot::Objects(saved) = &frame.snapshot {
            for (id, world) in saved {
                scene.set_world_matrix(*id, *world);
            }
        }
        tracing::debug!(edit = ?frame.target, depth = self.frames.len(), "transform cancelled");
        self.close(Phase::Cancelled);
        Ok(SessionEvent::Cancelled {
            depth: self.frames.len(),
        })
    }

    fn close(&mut self, phase: Phase) {
        self.entry.clear();
        if self.frames.is_empty() {
            self.outcome = phase;
            self.detector.exit();
            self.detector_started = false;
            tracing::debug!(%phase, "snapping session finished");
        }
    }

    /// Objects the detector currently skips.
    pub fn excluded(&self) -> Vec<ObjectId> {
        self.frames
            .iter()
            .filter_map(|f| match &f.target {
                EditTarget::Objects(ids) => Some(ids.iter().copied()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

fn write_object<S: SceneWriter>(scene: &mut S, id: ObjectId, saved: &DMat4, delta: &Delta) {
    scene.set_world_matrix(id, delta.apply_to(saved));
    if delta.flip_normals {
        scene.flip_normals(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadsnap_detect::{Detectable, Geometry, MeshData, SnapHelper, StaticScene};

    /// Top-down orthographic view, 10 px per unit, world origin at (50, 50).
    fn scene() -> StaticScene {
        let view = View::orthographic(DVec3::new(0.0, 0.0, 10.0), DVec3::ZERO, DVec3::Y, 5.0, 100, 100);
        StaticScene::new(view).with_object(Detectable::new(
            ObjectId(1),
            DMat4::IDENTITY,
            Geometry::Mesh(MeshData::cube(1.0)),
        ))
    }

    fn px(p: DVec3) -> DVec2 {
        DVec2::new(50.0 + 10.0 * p.x, 50.0 - 10.0 * p.y)
    }

    fn session(elements: SnapElements) -> SnappingSession {
        SnappingSession::new(SnapSettings::default(), HelperRegistry::new()).with_elements(elements)
    }

    fn moving(scene: &mut StaticScene, elements: SnapElements) -> SnappingSession {
        let mut s = session(elements);
        s.begin(scene, EditTarget::Objects(vec![ObjectId(1)]), TransformKind::MOVE, Space::WORLD)
            .unwrap();
        s
    }

    #[test]
    fn test_move_preview_confirm() {
        let mut scene = scene();
        let mut s = moving(&mut scene, SnapElements::GRID);
        assert_eq!(s.phase(), Phase::PickFrom);

        let origin = px(DVec3::ZERO);
        s.press(&mut scene, origin, false).unwrap();
        assert_eq!(s.phase(), Phase::PickTo);

        let target = px(DVec3::new(2.0, 1.0, 0.0));
        let event = s.mouse_move(&mut scene, target).unwrap();
        let SessionEvent::Preview { delta, copies } = event else {
            panic!("expected a preview, got {event:?}");
        };
        assert!(copies.is_empty());
        assert!(delta.translation().distance(DVec3::new(2.0, 1.0, 0.0)) < 1e-9);
        assert_eq!(scene.world_matrix(ObjectId(1)), Some(delta.matrix));

        let event = s.press(&mut scene, target, false).unwrap();
        assert!(matches!(event, SessionEvent::Applied { depth: 0, .. }));
        assert!(s.is_finished());
        assert_eq!(s.phase(), Phase::Done);
    }

    #[test]
    fn test_cancel_restores_exact_matrix() {
        let mut scene = scene();
        let start = DMat4::from_rotation_z(0.3) * DMat4::from_translation(DVec3::new(0.5, 0.25, 0.0));
        scene.set_world_matrix(ObjectId(1), start);
        let mut s = moving(&mut scene, SnapElements::GRID);
        s.press(&mut scene, px(DVec3::ZERO), false).unwrap();
        s.mouse_move(&mut scene, px(DVec3::new(3.0, -2.0, 0.0))).unwrap();
        assert_ne!(scene.world_matrix(ObjectId(1)), Some(start));

        let event = s.key(&mut scene, KeyInput::Escape).unwrap();
        assert_eq!(event, SessionEvent::Cancelled { depth: 0 });
        assert_eq!(scene.world_matrix(ObjectId(1)), Some(start));
        assert_eq!(s.phase(), Phase::Cancelled);
    }

    #[test]
    fn test_free_position_without_candidates() {
        let mut scene = scene();
        let mut s = moving(&mut scene, SnapElements::NONE);
        s.press(&mut scene, DVec2::new(50.0, 50.0), false).unwrap();
        s.mouse_move(&mut scene, DVec2::new(65.0, 50.0)).unwrap();
        let action = s.action().unwrap();
        assert!(action.snap_to.distance(DVec3::new(1.5, 0.0, 0.0)) < 1e-9);
        assert!(action.active_item.is_none());
    }

    #[test]
    fn test_typed_distance_and_constraint() {
        let mut scene = scene();
        let mut s = moving(&mut scene, SnapElements::NONE);
        s.press(&mut scene, DVec2::new(50.0, 50.0), false).unwrap();
        s.mouse_move(&mut scene, DVec2::new(60.0, 40.0)).unwrap();
        s.key(&mut scene, KeyInput::Constraint(ConstraintFlags::along(Axis::X))).unwrap();
        for c in "250mm".chars() {
            s.key(&mut scene, KeyInput::Char(c)).unwrap();
        }
        assert_eq!(s.typed_text(), "250mm");
        let event = s.key(&mut scene, KeyInput::Enter).unwrap();
        let SessionEvent::Applied { delta, .. } = event else {
            panic!("expected apply, got {event:?}");
        };
        assert!(delta.translation().distance(DVec3::new(0.25, 0.0, 0.0)) < 1e-9);
    }

    #[test]
    fn test_copies_are_duplicated_on_confirm() {
        let mut scene = scene();
        let mut s = moving(&mut scene, SnapElements::GRID);
        s.press(&mut scene, px(DVec3::ZERO), false).unwrap();
        s.key(&mut scene, KeyInput::CopyCount(2)).unwrap();
        let event = s.mouse_move(&mut scene, px(DVec3::new(3.0, 0.0, 0.0))).unwrap();
        let SessionEvent::Preview { copies, .. } = event else {
            panic!("expected a preview");
        };
        assert_eq!(copies.len(), 2);

        s.confirm(&mut scene).unwrap();
        assert_eq!(scene.objects.len(), 3);
        let xs: Vec<f64> = scene.objects.iter().map(|o| o.origin().x).collect();
        for expected in [1.0, 2.0, 3.0] {
            assert!(xs.iter().any(|x| (x - expected).abs() < 1e-9), "{xs:?}");
        }
    }

    #[test]
    fn test_moved_object_is_excluded() {
        let mut scene = scene();
        let mut s = moving(&mut scene, SnapElements::VERT);
        assert_eq!(s.excluded(), vec![ObjectId(1)]);
        let corner = px(DVec3::new(0.5, 0.5, 0.5));
        s.mouse_move(&mut scene, corner).unwrap();
        assert!(s.action().unwrap().active_item.is_none());
    }

    #[test]
    fn test_nested_pivot_edit() {
        let mut scene = scene();
        let mut s = session(SnapElements::NONE);
        s.begin(&mut scene, EditTarget::Objects(vec![ObjectId(1)]), TransformKind::ROTATE, Space::WORLD)
            .unwrap();
        let event = s.key(&mut scene, KeyInput::EditPivot).unwrap();
        assert_eq!(event, SessionEvent::Started { phase: Phase::PickTo, depth: 2 });

        s.press(&mut scene, DVec2::new(70.0, 50.0), true).unwrap();
        assert_eq!(s.depth(), 1);
        assert!(s.pivot().origin().distance(DVec3::new(2.0, 0.0, 0.0)) < 1e-9);
        assert_eq!(s.action().unwrap().space().origin(), s.pivot().origin());
        assert_eq!(s.phase(), Phase::PickFrom);
    }

    #[test]
    fn test_nested_cancel_keeps_parent() {
        let mut scene = scene();
        let mut s = moving(&mut scene, SnapElements::NONE);
        s.key(&mut scene, KeyInput::EditGrid).unwrap();
        s.press(&mut scene, DVec2::new(70.0, 50.0), false).unwrap();
        assert_eq!(s.cancel(&mut scene).unwrap(), SessionEvent::Cancelled { depth: 1 });
        assert_eq!(s.grid(), Space::WORLD);
        assert!(!s.is_finished());
    }

    #[test]
    fn test_build_and_edit_helper() {
        let mut scene = scene();
        let mut s = moving(&mut scene, SnapElements::GRID);
        for p in [DVec3::new(-2.0, 0.0, 0.0), DVec3::new(2.0, 0.0, 0.0)] {
            s.mouse_move(&mut scene, px(p)).unwrap();
            assert_eq!(s.key(&mut scene, KeyInput::SelectItem).unwrap(), SessionEvent::Selected {
                count: if p.x < 0.0 { 1 } else { 2 }
            });
        }
        let SessionEvent::HelperBuilt(id) = s.key(&mut scene, KeyInput::BuildHelper(ContextOperation::Average)).unwrap()
        else {
            panic!("expected a helper");
        };
        assert_eq!(s.helpers().get(id), Some(&SnapHelper::Point { coord: DVec3::ZERO }));

        s.key(&mut scene, KeyInput::EditHelper { id, handle: None }).unwrap();
        assert_eq!(s.phase(), Phase::PickTo);
        s.press(&mut scene, px(DVec3::new(0.0, 3.0, 0.0)), false).unwrap();
        assert_eq!(s.helpers().get(id), Some(&SnapHelper::Point { coord: DVec3::new(0.0, 3.0, 0.0) }));
        assert_eq!(s.depth(), 1);
    }

    #[test]
    fn test_unsupported_helper_is_an_error() {
        let mut scene = scene();
        let mut s = moving(&mut scene, SnapElements::NONE);
        let err = s.key(&mut scene, KeyInput::BuildHelper(ContextOperation::Intersection)).unwrap_err();
        assert!(matches!(err, SnapError::Context(_)));
    }

    #[test]
    fn test_events_after_finish() {
        let mut scene = scene();
        let mut s = moving(&mut scene, SnapElements::NONE);
        s.cancel(&mut scene).unwrap();
        assert!(matches!(
            s.mouse_move(&mut scene, DVec2::ZERO),
            Err(SnapError::Session(SessionError::NotRunning))
        ));
        assert!(matches!(
            s.begin(&mut scene, EditTarget::Pivot, TransformKind::MOVE, Space::WORLD),
            Ok(SessionEvent::Started { .. })
        ));
    }
}
