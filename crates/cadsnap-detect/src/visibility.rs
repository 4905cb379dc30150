//! Per-view screen bounds of detectables.

use std::collections::HashMap;

use glam::DVec2;

use cadsnap_core::ObjectId;
use cadsnap_geom::{ScreenRect, View};

use crate::scene::Detectable;

/// Caches each object's projected bounding rectangle until the view changes.
#[derive(Debug, Default)]
pub struct VisibilityCache {
    view: Option<View>,
    rects: HashMap<ObjectId, Option<ScreenRect>>,
}

impl VisibilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop cached rectangles when `view` differs from the cached one.
    pub fn sync(&mut self, view: &View) {
        if !self.view.is_some_and(|v| v.same_projection(view)) {
            self.rects.clear();
            self.view = Some(*view);
        }
    }

    pub fn clear(&mut self) {
        self.rects.clear();
        self.view = None;
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Screen rectangle of `object`, `None` when it is outside the viewport.
    pub fn screen_rect(&mut self, object: &Detectable, view: &View) -> Option<ScreenRect> {
        self.sync(view);
        *self
            .rects
            .entry(object.id)
            .or_insert_with(|| project_bounds(object, view))
    }

    /// Whether the object's screen rectangle overlaps the snap radius.
    pub fn near_cursor(&mut self, object: &Detectable, view: &View, cursor: DVec2, radius: f64) -> bool {
        self.screen_rect(object, view)
            .is_some_and(|rect| rect.intersects(&ScreenRect::around(cursor, radius)))
    }
}

fn project_bounds(object: &Detectable, view: &View) -> Option<ScreenRect> {
    let viewport = ScreenRect::new(DVec2::ZERO, view.size());
    let projected: Option<Vec<DVec2>> = object.world_corners().iter().map(|c| view.project(*c)).collect();
    match projected {
        Some(points) => ScreenRect::from_points(points).filter(|rect| rect.intersects(&viewport)),
        // A corner behind the camera: the object may surround it.
        None => Some(viewport),
    }
}
