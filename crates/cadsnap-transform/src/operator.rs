//! Single-instance wrapper around [`SnappingSession`].

use glam::DVec2;

use cadsnap_core::{SessionError, SnapElements, SnapError, SnapSettings, TransformKind};
use cadsnap_detect::{HelperRegistry, SceneQuery};
use cadsnap_geom::Space;

use crate::session::{KeyInput, SessionEvent, SnappingSession};
use crate::target::{EditTarget, SceneWriter};

/// Owns what outlives a session (settings, helpers, grid, snap elements) and
/// runs at most one session at a time.
pub struct TransformOperator {
    settings: SnapSettings,
    helpers: HelperRegistry,
    elements: SnapElements,
    grid: Space,
    session: Option<SnappingSession>,
}

impl TransformOperator {
    pub fn new(settings: SnapSettings) -> Self {
        Self {
            settings,
            helpers: HelperRegistry::new(),
            elements: SnapElements::ALL,
            grid: Space::WORLD,
            session: None,
        }
    }

    pub fn with_elements(mut self, elements: SnapElements) -> Self {
        self.elements = elements;
        self
    }

    pub fn settings(&self) -> &SnapSettings {
        self.session.as_ref().map_or(&self.settings, |s| s.settings())
    }

    /// Helpers, including those created by a running session.
    pub fn helpers(&self) -> &HelperRegistry {
        self.session.as_ref().map_or(&self.helpers, |s| s.helpers())
    }

    pub fn grid(&self) -> Space {
        self.session.as_ref().map_or(self.grid, |s| s.grid())
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&SnappingSession> {
        self.session.as_ref()
    }

    /// Start a session. Returns `Ok(false)` without doing anything if one is
    /// already running.
    pub fn invoke<S: SceneQuery + SceneWriter>(
        &mut self,
        scene: &mut S,
        target: EditTarget,
        kind: TransformKind,
        pivot: Space,
    ) -> Result<bool, SnapError> {
        if self.session.is_some() {
            tracing::debug!("transform already running, invoke ignored");
            return Ok(false);
        }

        let helpers = std::mem::take(&mut self.helpers);
        let mut session = SnappingSession::new(self.settings.clone(), helpers)
            .with_elements(self.elements)
            .with_grid(self.grid);
        match session.begin(scene, target, kind, pivot) {
            Ok(_) => {
                self.session = Some(session);
                Ok(true)
            }
            Err(err) => {
                self.helpers = session.into_helpers();
                Err(err)
            }
        }
    }

    pub fn mouse_move<S: SceneQuery + SceneWriter>(
        &mut self,
        scene: &mut S,
        cursor: DVec2,
    ) -> Result<SessionEvent, SnapError> {
        self.forward(scene, |session, scene| session.mouse_move(scene, cursor))
    }

    pub fn press<S: SceneQuery + SceneWriter>(
        &mut self,
        scene: &mut S,
        cursor: DVec2,
        shift: bool,
    ) -> Result<SessionEvent, SnapError> {
        self.forward(scene, |session, scene| session.press(scene, cursor, shift))
    }

    pub fn key<S: SceneQuery + SceneWriter>(&mut self, scene: &mut S, key: KeyInput) -> Result<SessionEvent, SnapError> {
        self.forward(scene, |session, scene| session.key(scene, key))
    }

    pub fn cancel<S: SceneQuery + SceneWriter>(&mut self, scene: &mut S) -> Result<SessionEvent, SnapError> {
        self.forward(scene, |session, scene| session.cancel(scene))
    }

    fn forward<S, F>(&mut self, scene: &mut S, f: F) -> Result<SessionEvent, SnapError>
    where
        F: FnOnce(&mut SnappingSession, &mut S) -> Result<SessionEvent, SnapError>,
    {
        let session = self.session.as_mut().ok_or(SessionError::NotRunning)?;
        let result = f(session, scene);
        if session.is_finished() {
            self.reap();
        }
        result
    }

    /// Take back persistent state from a finished session.
    fn reap(&mut self) {
        if let Some(session) = self.session.take() {
            self.settings.xray = session.settings().xray;
            self.elements = session.elements();
            self.grid = session.grid();
            self.helpers = session.into_helpers();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadsnap_core::ObjectId;
    use cadsnap_detect::{Detectable, Geometry, MeshData, StaticScene};
    use cadsnap_geom::View;
    use glam::{DMat4, DVec3};

    fn scene() -> StaticScene {
        let view = View::orthographic(DVec3::new(0.0, 0.0, 10.0), DVec3::ZERO, DVec3::Y, 5.0, 100, 100);
        StaticScene::new(view).with_object(Detectable::new(
            ObjectId(1),
            DMat4::IDENTITY,
            Geometry::Mesh(MeshData::cube(1.0)),
        ))
    }

    #[test]
    fn test_single_instance() {
        let mut scene = scene();
        let mut op = TransformOperator::new(SnapSettings::default()).with_elements(SnapElements::NONE);
        let target = EditTarget::Objects(vec![ObjectId(1)]);
        assert!(op.invoke(&mut scene, target.clone(), TransformKind::MOVE, Space::WORLD).unwrap());
        assert!(!op.invoke(&mut scene, target.clone(), TransformKind::ROTATE, Space::WORLD).unwrap());
        assert_eq!(op.session().and_then(|s| s.action()).map(|a| a.kind), Some(TransformKind::MOVE));

        op.cancel(&mut scene).unwrap();
        assert!(!op.is_running());
        assert!(op.invoke(&mut scene, target, TransformKind::ROTATE, Space::WORLD).unwrap());
    }

    #[test]
    fn test_state_survives_sessions() {
        let mut scene = scene();
        let mut op = TransformOperator::new(SnapSettings::default()).with_elements(SnapElements::NONE);
        op.invoke(&mut scene, EditTarget::Grid, TransformKind::MOVE, Space::WORLD).unwrap();
        op.key(&mut scene, KeyInput::ToggleXray).unwrap();
        op.press(&mut scene, DVec2::new(50.0, 50.0), false).unwrap();
        op.press(&mut scene, DVec2::new(60.0, 50.0), false).unwrap();

        assert!(!op.is_running());
        assert!(op.settings().xray);
        assert!(op.grid().origin().distance(DVec3::X) < 1e-9);
    }

    #[test]
    fn test_events_without_session() {
        let mut scene = scene();
        let mut op = TransformOperator::new(SnapSettings::default());
        assert!(matches!(
            op.cancel(&mut scene),
            Err(SnapError::Session(SessionError::NotRunning))
        ));
    }
}
