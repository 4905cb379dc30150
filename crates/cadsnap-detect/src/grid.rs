//! Snapping to the nearest grid intersection.

use glam::DVec3;

use cadsnap_core::{ObjectId, SnapElements, SnapItem, SnapItems, SnapSettings, SnapTarget};
use cadsnap_geom::geom2d::distance_sq;
use cadsnap_geom::geom3d::intersect_ray_plane;
use cadsnap_geom::{Space, View};

use crate::engine::{DetectContext, DetectionEngine};

/// Coarsening stops after this many subdivisions.
const MAX_COARSEN: u32 = 12;

#[derive(Debug, Clone, Copy)]
struct GridStep {
    view: View,
    plane: Space,
    step: f64,
}

/// Detection engine for the grid plane.
#[derive(Debug, Default)]
pub struct GridEngine {
    cached: Option<GridStep>,
}

impl GridEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grid step in world units for the current view.
    ///
    /// Starts at one subdivision of the main unit and grows by the
    /// subdivision factor while a step is smaller than the minimum on screen.
    pub fn step(&mut self, view: &View, plane: &Space, settings: &SnapSettings) -> f64 {
        if let Some(cached) = &self.cached {
            if cached.view.same_projection(view) && cached.plane == *plane {
                return cached.step;
            }
        }

        let step = adapted_step(view, plane, settings);
        self.cached = Some(GridStep { view: *view, plane: *plane, step });
        tracing::trace!(step, "grid step adapted");
        step
    }
}

fn adapted_step(view: &View, plane: &Space, settings: &SnapSettings) -> f64 {
    let factor = settings.unit_system.grid_subdivisions() as f64;
    let mut step = settings.grid_scale.abs().max(f64::EPSILON) / factor;
    let Some(world_per_pixel) = view.world_per_pixel(plane.origin()) else {
        return step;
    };
    let min_world = settings.grid_min_pixels * world_per_pixel;
    for _ in 0..MAX_COARSEN {
        if step >= min_world {
            break;
        }
        step *= factor;
    }
    step
}

/// Round `point` to the nearest grid intersection on the plane of `space`.
pub fn snap_to_grid(space: &Space, point: DVec3, step: f64) -> DVec3 {
    let local = space.to_local(point);
    let snapped = DVec3::new((local.x / step).round() * step, (local.y / step).round() * step, 0.0);
    space.to_world(snapped)
}

impl DetectionEngine for GridEngine {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn enabled(&self, elements: SnapElements) -> bool {
        elements.has(SnapElements::GRID)
    }

    fn start(&mut self, _ctx: &DetectContext<'_>) {
        self.cached = None;
    }

    fn detect(&mut self, ctx: &DetectContext<'_>, items: &mut SnapItems) {
        let plane = ctx.grid;
        let Some(hit) = intersect_ray_plane(ctx.ray.origin, ctx.ray.direction, plane.origin(), plane.z()) else {
            return;
        };
        let step = self.step(ctx.view, &plane, ctx.settings);
        let coord = snap_to_grid(&plane, hit, step);

        let Some(screen) = ctx.view.project(coord) else {
            return;
        };
        let distance = distance_sq(screen, ctx.cursor);
        if distance > ctx.settings.snap_radius_sq() {
            return;
        }
        items.add(
            SnapItem::point(coord, SnapTarget::Grid)
                .with_normal(plane.z())
                .with_distance(distance)
                .with_depths(ctx.view.view_depth(coord), 0),
        );
    }

    fn exit(&mut self) {
        self.cached = None;
    }

    fn exclude(&mut self, _objects: &[ObjectId]) {}

    fn invalidate(&mut self) {
        self.cached = None;
    }
}
