//! The detection engine contract and the per-pass orchestrator.

use glam::{DVec2, DVec3};
use smallvec::SmallVec;

use cadsnap_core::{ObjectId, SnapElements, SnapItem, SnapItems, SnapSettings, SnapTarget, TieBreak};
use cadsnap_geom::geom2d::{distance_sq, nearest_point_on_segment};
use cadsnap_geom::geom3d::nearest_point_between_ray_and_line;
use cadsnap_geom::{Ray, Space, View};

use crate::grid::GridEngine;
use crate::helpers::HelperRegistry;
use crate::raster::RasterEngine;
use crate::ray::RayEngine;
use crate::scene::SceneQuery;
use crate::software::SoftwareIndexRenderer;

/// Everything an engine needs for one detection pass.
#[derive(Clone, Copy)]
pub struct DetectContext<'a> {
    pub scene: &'a dyn SceneQuery,
    pub view: &'a View,
    /// Cursor position in pixels.
    pub cursor: DVec2,
    /// Camera ray through the cursor.
    pub ray: Ray,
    pub settings: &'a SnapSettings,
    pub elements: SnapElements,
    pub helpers: &'a HelperRegistry,
    /// Grid frame; its XY plane is snapped to.
    pub grid: Space,
    /// Editing a mesh rather than transforming objects.
    pub edit_mode: bool,
}

impl<'a> DetectContext<'a> {
    pub fn new(
        scene: &'a dyn SceneQuery,
        settings: &'a SnapSettings,
        helpers: &'a HelperRegistry,
        elements: SnapElements,
        cursor: DVec2,
    ) -> Self {
        let view = scene.view();
        Self {
            scene,
            view,
            cursor,
            ray: view.ray_from_pixel(cursor),
            settings,
            elements,
            helpers,
            grid: scene.grid(),
            edit_mode: false,
        }
    }

    pub fn with_grid(mut self, grid: Space) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_edit_mode(mut self, edit_mode: bool) -> Self {
        self.edit_mode = edit_mode;
        self
    }

    pub fn tie_break(&self) -> TieBreak {
        TieBreak::for_mode(self.edit_mode, self.settings.xray)
    }

    /// Fill in the screen distance and depths of `item`; `None` if it does
    /// not project.
    pub(crate) fn measure(&self, item: SnapItem, ray_depth: u32) -> Option<SnapItem> {
        let screen = self.view.project(item.coord)?;
        let distance = distance_sq(screen, self.cursor);
        let depth = self.view.view_depth(item.coord);
        Some(item.with_distance(distance).with_depths(depth, ray_depth))
    }

    /// Fraction along `a`-`b` nearest the cursor ray, with a screen-space
    /// fallback when the ray runs parallel to the edge.
    pub(crate) fn edge_fraction(&self, a: DVec3, b: DVec3) -> Option<f64> {
        match nearest_point_between_ray_and_line(self.ray.origin, self.ray.direction, a, b) {
            Some((t, _)) => Some(t.clamp(0.0, 1.0)),
            None => {
                let (pa, pb) = (self.view.project(a)?, self.view.project(b)?);
                Some(nearest_point_on_segment(self.cursor, pa, pb).0)
            }
        }
    }

    /// The point an edge snaps to besides the edge itself: its center or
    /// its nearer endpoint, whichever is preferred and inside the radius.
    pub(crate) fn edge_point(
        &self,
        a: DVec3,
        b: DVec3,
        fraction: f64,
        allowed: SnapElements,
        target: SnapTarget,
        ray_depth: u32,
    ) -> Option<SnapItem> {
        let radius_sq = self.settings.snap_radius_sq();
        edge_points(self.settings, a, b, fraction, allowed, target)
            .into_iter()
            .filter_map(|item| self.measure(item, ray_depth))
            .find(|item| item.distance <= radius_sq)
    }
}

/// Center and nearer endpoint of `a`-`b` in order of preference.
///
/// The center comes first when `fraction` is inside the edge-center window.
/// Modes missing from `allowed` are left out, so the other one is still
/// tried.
pub(crate) fn edge_points(
    settings: &SnapSettings,
    a: DVec3,
    b: DVec3,
    fraction: f64,
    allowed: SnapElements,
    target: SnapTarget,
) -> SmallVec<[SnapItem; 2]> {
    let mid = allowed
        .has(SnapElements::EDGE_CENTER)
        .then(|| SnapItem::line_center(a, b, target));
    let end = allowed
        .has(SnapElements::VERT)
        .then(|| SnapItem::point(if fraction < 0.5 { a } else { b }, target));
    let (first, second) = if settings.in_edge_center_range(fraction) {
        (mid, end)
    } else {
        (end, mid)
    };
    first.into_iter().chain(second).collect()
}

/// A strategy that contributes snap candidates.
pub trait DetectionEngine {
    fn name(&self) -> &'static str;

    /// Whether this engine has anything to do for the element mask.
    fn enabled(&self, elements: SnapElements) -> bool;

    /// Called once when a snapping session begins.
    fn start(&mut self, ctx: &DetectContext<'_>);

    /// Add candidates near the cursor to `items`.
    fn detect(&mut self, ctx: &DetectContext<'_>, items: &mut SnapItems);

    /// Called once when the session ends.
    fn exit(&mut self);

    /// Ignore these objects until `exit`.
    fn exclude(&mut self, objects: &[ObjectId]);

    /// Drop cached state after an external scene change.
    fn invalidate(&mut self) {}
}

/// Runs the enabled engines and resolves the tie-break.
pub struct Detector {
    engines: Vec<Box<dyn DetectionEngine>>,
    items: SnapItems,
}

impl Detector {
    pub fn new() -> Self {
        Self {
            engines: Vec::new(),
            items: SnapItems::new(),
        }
    }

    /// The ray, raster and grid engines, with the raster back end sized
    /// from `settings`.
    pub fn with_defaults(settings: &SnapSettings) -> Self {
        let mut detector = Self::new();
        detector.push(RayEngine::new());
        detector.push(RasterEngine::new(SoftwareIndexRenderer::new(
            settings.point_size,
            settings.line_width,
        )));
        detector.push(GridEngine::new());
        detector
    }

    pub fn push(&mut self, engine: impl DetectionEngine + 'static) {
        self.engines.push(Box::new(engine));
    }

    pub fn engine_names(&self) -> Vec<&'static str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    pub fn start(&mut self, ctx: &DetectContext<'_>) {
        for engine in &mut self.engines {
            engine.start(ctx);
        }
    }

    pub fn exit(&mut self) {
        for engine in &mut self.engines {
            engine.exit();
        }
        self.items.clear();
    }

    pub fn exclude(&mut self, objects: &[ObjectId]) {
        for engine in &mut self.engines {
            engine.exclude(objects);
        }
    }

    pub fn invalidate(&mut self) {
        for engine in &mut self.engines {
            engine.invalidate();
        }
    }

    /// Run one pass and return the winning candidate, if any.
    pub fn detect(&mut self, ctx: &DetectContext<'_>) -> Option<SnapItem> {
        self.items.clear();
        for engine in &mut self.engines {
            if engine.enabled(ctx.elements) {
                engine.detect(ctx, &mut self.items);
            }
        }
        let found = self.items.len();
        let best = self.items.pick_best(ctx.tie_break()).ok();
        if let Some(item) = &best {
            tracing::trace!(candidates = found, kind = ?item.kind, target = ?item.target, "snap resolved");
        }
        best
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(items: &[SnapItem]) -> Vec<bool> {
        items.iter().map(|i| i.is_point()).collect()
    }

    #[test]
    fn test_edge_points_prefer_by_fraction() {
        let settings = SnapSettings::default();
        let both = SnapElements::VERT | SnapElements::EDGE_CENTER;
        let (a, b) = (DVec3::ZERO, DVec3::X);

        let centered = edge_points(&settings, a, b, 0.4, both, SnapTarget::None);
        assert_eq!(kinds(&centered), vec![false, true]);
        let near_end = edge_points(&settings, a, b, 0.9, both, SnapTarget::None);
        assert_eq!(kinds(&near_end), vec![true, false]);
        assert_eq!(near_end[0].coord, b);
    }

    #[test]
    fn test_edge_points_fall_back_when_mode_is_off() {
        let settings = SnapSettings::default();
        let (a, b) = (DVec3::ZERO, DVec3::X);

        let end = edge_points(&settings, a, b, 0.4, SnapElements::VERT, SnapTarget::None);
        assert_eq!(end.len(), 1);
        assert_eq!(end[0].coord, a);

        let mid = edge_points(&settings, a, b, 0.9, SnapElements::EDGE_CENTER, SnapTarget::None);
        assert_eq!(mid.len(), 1);
        assert!(mid[0].coord.distance(DVec3::new(0.5, 0.0, 0.0)) < 1e-12);

        assert!(edge_points(&settings, a, b, 0.5, SnapElements::EDGE, SnapTarget::None).is_empty());
    }
}
