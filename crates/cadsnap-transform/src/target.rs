//! What a transform edits, and how the result is written back.

use glam::DMat4;

use cadsnap_core::{HelperId, ObjectId};
use cadsnap_detect::{SnapHelper, StaticScene};
use cadsnap_geom::Space;

use crate::delta::Delta;

/// Write access to the scene, provided by the host.
pub trait SceneWriter {
    fn world_matrix(&self, id: ObjectId) -> Option<DMat4>;

    fn set_world_matrix(&mut self, id: ObjectId, matrix: DMat4);

    /// Copy an object and return the id of the copy.
    fn duplicate(&mut self, id: ObjectId) -> Option<ObjectId>;

    /// Called once on confirm when a scale mirrored the object.
    fn flip_normals(&mut self, _id: ObjectId) {}

    fn apply_delta(&mut self, id: ObjectId, delta: &Delta) {
        if let Some(world) = self.world_matrix(id) {
            self.set_world_matrix(id, delta.apply_to(&world));
        }
    }
}

impl SceneWriter for StaticScene {
    fn world_matrix(&self, id: ObjectId) -> Option<DMat4> {
        self.objects.iter().find(|o| o.id == id).map(|o| o.matrix)
    }

    fn set_world_matrix(&mut self, id: ObjectId, matrix: DMat4) {
        if let Some(object) = self.object_mut(id) {
            object.matrix = matrix;
        }
    }

    fn duplicate(&mut self, id: ObjectId) -> Option<ObjectId> {
        let mut copy = self.objects.iter().find(|o| o.id == id)?.clone();
        let next = self.objects.iter().map(|o| o.id.0).max().unwrap_or(0) + 1;
        copy.id = ObjectId(next);
        self.objects.push(copy);
        Some(ObjectId(next))
    }
}

/// The thing a transform frame edits.
#[derive(Debug, Clone, PartialEq)]
pub enum EditTarget {
    Objects(Vec<ObjectId>),
    /// The pivot of the enclosing transform.
    Pivot,
    Grid,
    /// A helper, or one of its handles.
    Helper { id: HelperId, handle: Option<usize> },
}

/// State saved when a frame starts, restored on cancel.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Snapshot {
    Objects(Vec<(ObjectId, DMat4)>),
    Space(Space),
    Helper(SnapHelper),
}
