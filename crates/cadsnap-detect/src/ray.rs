//! Ray-cast detection for meshes.
//!
//! A center ray through the cursor plus a ring of extra rays on the snap
//! radius are cast against every raycastable mesh near the cursor. Each face
//! that is hit contributes vertex, edge, face-center and face candidates.

use std::collections::HashSet;

use glam::DVec3;

use cadsnap_core::{ObjectId, SnapElements, SnapItem, SnapItems, SnapTarget};
use cadsnap_geom::geom2d::circle_samples;
use cadsnap_geom::geom3d::{centroid, intersect_ray_triangle};
use cadsnap_geom::Ray;

use crate::engine::{DetectContext, DetectionEngine};
use crate::scene::{Detectable, MeshData};
use crate::visibility::VisibilityCache;

/// One ray/face hit.
#[derive(Debug, Clone, Copy)]
struct Hit {
    object: usize,
    face: usize,
    point: DVec3,
    t: f64,
}

/// Detection engine for meshes under the vertex-count threshold.
#[derive(Debug, Default)]
pub struct RayEngine {
    excluded: HashSet<ObjectId>,
    visibility: VisibilityCache,
}

impl RayEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// All hits of `ray`, nearest first, at most one per face.
    fn cast(&mut self, ctx: &DetectContext<'_>, ray: &Ray) -> Vec<Hit> {
        let mut hits = Vec::new();
        for (index, object) in ctx.scene.detectables().iter().enumerate() {
            if !self.candidate(ctx, object) {
                continue;
            }
            let Some(mesh) = object.geometry.as_mesh() else {
                continue;
            };
            let Some(local) = ray.transformed(&object.matrix.inverse()) else {
                continue;
            };

            let mut faces_hit = HashSet::new();
            for (face, [a, b, c]) in mesh.triangles() {
                if faces_hit.contains(&face) {
                    continue;
                }
                if let Some((_, p)) = intersect_ray_triangle(local.origin, local.direction, a, b, c) {
                    faces_hit.insert(face);
                    let point = object.matrix.transform_point3(p);
                    let t = (point - ray.origin).dot(ray.direction);
                    hits.push(Hit { object: index, face, point, t });
                }
            }
        }
        hits.sort_by(|a, b| a.t.total_cmp(&b.t));
        hits
    }

    fn candidate(&mut self, ctx: &DetectContext<'_>, object: &Detectable) -> bool {
        !self.excluded.contains(&object.id)
            && object.is_raycastable(ctx.settings.max_vertex_count)
            && object.elements.intersects(ctx.elements & SnapElements::GEOMETRY)
            && self
                .visibility
                .near_cursor(object, ctx.view, ctx.cursor, ctx.settings.snap_radius)
    }
}

/// Emit the candidates of one hit face.
fn evaluate_face(
    ctx: &DetectContext<'_>,
    object: &Detectable,
    mesh: &MeshData,
    hit: &Hit,
    ray_depth: u32,
    items: &mut SnapItems,
) {
    let elements = ctx.elements & object.elements;
    let target = SnapTarget::Object(object.id);
    let radius_sq = ctx.settings.snap_radius_sq();
    let corners: Vec<DVec3> = mesh
        .face_corners(hit.face)
        .map(|c| object.matrix.transform_point3(c))
        .collect();
    if corners.len() < 3 {
        return;
    }

    let finish = |item: SnapItem| ctx.measure(item, ray_depth);

    if elements.has(SnapElements::VERT) {
        let nearest = corners
            .iter()
            .filter_map(|c| finish(SnapItem::point(*c, target)))
            .min_by(|a, b| a.distance.total_cmp(&b.distance));
        if let Some(item) = nearest.filter(|i| i.distance <= radius_sq) {
            items.add(item);
        }
    }

    if elements.intersects(SnapElements::EDGE | SnapElements::EDGE_CENTER) {
        let nearest_edge = (0..corners.len())
            .filter_map(|i| {
                let (a, b) = (corners[i], corners[(i + 1) % corners.len()]);
                let fraction = ctx.edge_fraction(a, b)?;
                let item = finish(SnapItem::line(a, b, fraction, target))?;
                Some((a, b, item))
            })
            .min_by(|x, y| x.2.distance.total_cmp(&y.2.distance));

        if let Some((a, b, line)) = nearest_edge.filter(|e| e.2.distance <= radius_sq) {
            if let Some(point) = ctx.edge_point(a, b, line.fraction, elements, target, ray_depth) {
                items.add(point);
            }
            if elements.has(SnapElements::EDGE) {
                items.add(line);
            }
        }
    }

    let tri = [corners[0], corners[1], corners[2]];

    if elements.has(SnapElements::FACE_CENTER) {
        if let Some(center) = centroid(&corners).and_then(|c| finish(SnapItem::tri_center(c, tri, target))) {
            if center.distance <= radius_sq {
                items.add(center);
            }
        }
    }

    if elements.has(SnapElements::FACE) {
        if let Some(face) = finish(SnapItem::tri(hit.point, tri, target)) {
            items.add(face);
        }
    }
}

impl DetectionEngine for RayEngine {
    fn name(&self) -> &'static str {
        "ray"
    }

    fn enabled(&self, elements: SnapElements) -> bool {
        elements.intersects(SnapElements::GEOMETRY)
    }

    fn start(&mut self, _ctx: &DetectContext<'_>) {
        self.visibility.clear();
    }

    fn detect(&mut self, ctx: &DetectContext<'_>, items: &mut SnapItems) {
        self.visibility.sync(ctx.view);

        let mut rays = vec![ctx.ray];
        rays.extend(
            circle_samples(ctx.cursor, ctx.settings.snap_radius, ctx.settings.extra_rays)
                .map(|pixel| ctx.view.ray_from_pixel(pixel)),
        );

        let keep = if ctx.settings.multi_hit() {
            ctx.settings.max_ray_depth.max(1) as usize
        } else {
            1
        };

        let objects = ctx.scene.detectables();
        let mut evaluated = HashSet::new();
        for ray in &rays {
            let hits = self.cast(ctx, ray);
            for (depth, hit) in hits.iter().take(keep).enumerate() {
                if !evaluated.insert((hit.object, hit.face)) {
                    continue;
                }
                let object = &objects[hit.object];
                if let Some(mesh) = object.geometry.as_mesh() {
                    evaluate_face(ctx, object, mesh, hit, depth as u32, items);
                }
            }
        }
    }

    fn exit(&mut self) {
        self.excluded.clear();
        self.visibility.clear();
    }

    fn exclude(&mut self, objects: &[ObjectId]) {
        self.excluded.extend(objects.iter().copied());
    }

    fn invalidate(&mut self) {
        self.visibility.clear();
    }
}
