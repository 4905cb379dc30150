//! Index-buffer picking for geometry that is not ray cast.
//!
//! Every pickable primitive is drawn into an offscreen buffer with its index
//! encoded as a color. The window around the cursor is then decoded ring by
//! ring, nearest first, into candidate primitive indices.

use std::collections::HashSet;

use glam::{DVec2, DVec3};
use smallvec::SmallVec;

use cadsnap_core::{ObjectId, SnapElements, SnapItem, SnapItems, SnapTarget};
use cadsnap_geom::geom3d::{intersect_ray_plane, triangle_center, triangle_normal};
use cadsnap_geom::View;

use crate::engine::{DetectContext, DetectionEngine};
use crate::scene::Rasterizable;

/// A drawable pick shape in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Point(DVec3),
    Line(DVec3, DVec3),
    Tri([DVec3; 3]),
}

/// A primitive with the entity it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickPrimitive {
    pub primitive: Primitive,
    pub target: SnapTarget,
}

impl PickPrimitive {
    pub fn new(primitive: Primitive, target: SnapTarget) -> Self {
        Self { primitive, target }
    }
}

/// Encode a primitive index as an RGBA color, least significant byte in red.
///
/// Zero is reserved for the background, so index `n` is stored as `n + 1`.
pub fn encode_id(index: u32) -> [u8; 4] {
    index.wrapping_add(1).to_le_bytes()
}

/// Inverse of [`encode_id`]; `None` for background pixels.
pub fn decode_color(color: [u8; 4]) -> Option<u32> {
    u32::from_le_bytes(color).checked_sub(1)
}

/// A rendered index buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[u8; 4]>,
}

impl IndexImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0; 4]; (width as usize) * (height as usize)],
        }
    }

    pub fn id_at(&self, x: i64, y: i64) -> Option<u32> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        let idx = y as usize * self.width as usize + x as usize;
        self.pixels.get(idx).copied().and_then(decode_color)
    }
}

/// Decode the square window of half-size `radius` around `center`.
///
/// Pixels are visited in rings of growing Chebyshev distance, nearest pixel
/// first within a ring. Each index is reported once, with the pixel where it
/// was first seen.
pub fn decode_window(image: &IndexImage, center: DVec2, radius: u32) -> Vec<(u32, DVec2)> {
    let cx = center.x.floor() as i64;
    let cy = center.y.floor() as i64;
    let radius = radius as i64;

    let mut seen = HashSet::new();
    let mut hits = Vec::new();
    let mut ring: Vec<(i64, i64)> = Vec::new();

    for r in 0..=radius {
        ring.clear();
        for dy in -r..=r {
            for dx in -r..=r {
                if dx.abs().max(dy.abs()) == r {
                    ring.push((dx, dy));
                }
            }
        }
        ring.sort_by_key(|(dx, dy)| dx * dx + dy * dy);

        for &(dx, dy) in &ring {
            let (x, y) = (cx + dx, cy + dy);
            if let Some(id) = image.id_at(x, y) {
                if seen.insert(id) {
                    hits.push((id, DVec2::new(x as f64 + 0.5, y as f64 + 0.5)));
                }
            }
        }
    }
    hits
}

/// Renders primitives into an index buffer.
///
/// The primitive at slice position `i` is written with color `encode_id(i)`.
pub trait PickingBackend {
    fn render_index_buffer(&mut self, primitives: &[PickPrimitive], view: &View) -> IndexImage;

    fn decode(&self, image: &IndexImage, center: DVec2, radius: u32) -> Vec<(u32, DVec2)> {
        decode_window(image, center, radius)
    }
}

/// Detection engine for curves, point clouds, heavy meshes and virtual targets.
pub struct RasterEngine<B> {
    backend: B,
    sources: Vec<PickPrimitive>,
    image: Option<IndexImage>,
    last_view: Option<View>,
    dirty: bool,
    excluded: HashSet<ObjectId>,
}

impl<B: PickingBackend> RasterEngine<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            sources: Vec::new(),
            image: None,
            last_view: None,
            dirty: true,
            excluded: HashSet::new(),
        }
    }

    /// Force a redraw on the next pass.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn collect_sources(&self, ctx: &DetectContext<'_>) -> Vec<PickPrimitive> {
        let elements = ctx.elements;
        let mut out = Vec::new();

        for object in ctx.scene.detectables() {
            if self.excluded.contains(&object.id) {
                continue;
            }
            if !object.is_raycastable(ctx.settings.max_vertex_count) {
                object.pick_primitives(elements & SnapElements::GEOMETRY, &mut out);
            }
            if elements.has(SnapElements::ORIGIN) {
                out.push(PickPrimitive::new(Primitive::Point(object.origin()), SnapTarget::Origin(object.id)));
            }
            if elements.has(SnapElements::BOUNDS) {
                out.extend(
                    object
                        .world_corners()
                        .iter()
                        .map(|c| PickPrimitive::new(Primitive::Point(*c), SnapTarget::Bounds(object.id))),
                );
            }
        }

        if elements.has(SnapElements::CURSOR) {
            if let Some(cursor) = ctx.scene.cursor() {
                out.push(PickPrimitive::new(Primitive::Point(cursor), SnapTarget::Cursor));
            }
        }
        if elements.has(SnapElements::MEDIAN) {
            if let Some(median) = ctx.scene.selection_median() {
                out.push(PickPrimitive::new(Primitive::Point(median), SnapTarget::Median));
            }
        }
        if elements.has(SnapElements::HELPER) {
            ctx.helpers.pick_primitives(elements, &mut out);
        }
        out
    }

    /// Candidates for one decoded primitive, not yet radius filtered.
    fn items_for(&self, ctx: &DetectContext<'_>, source: &PickPrimitive) -> SmallVec<[SnapItem; 2]> {
        let target = source.target;
        // Helpers expose every sub-element regardless of the element mask. A
        // helper plane's center is already drawn as its origin point.
        let allowed = if matches!(target, SnapTarget::Helper(_)) {
            SnapElements::GEOMETRY.without(SnapElements::FACE_CENTER)
        } else {
            ctx.elements
        };
        let mut out = SmallVec::new();

        match source.primitive {
            Primitive::Point(p) => out.extend(ctx.measure(SnapItem::point(p, target), 0)),
            Primitive::Line(a, b) => {
                let Some(fraction) = ctx.edge_fraction(a, b) else {
                    return out;
                };
                out.extend(ctx.edge_point(a, b, fraction, allowed, target, 0));
                if allowed.has(SnapElements::EDGE) {
                    out.extend(ctx.measure(SnapItem::line(a, b, fraction, target), 0));
                }
            }
            Primitive::Tri([a, b, c]) => {
                let Some(normal) = triangle_normal(a, b, c) else {
                    return out;
                };
                let corners = [a, b, c];
                if allowed.has(SnapElements::FACE_CENTER) {
                    out.extend(ctx.measure(SnapItem::tri_center(triangle_center(a, b, c), corners, target), 0));
                }
                if allowed.has(SnapElements::FACE) {
                    let hit = intersect_ray_plane(ctx.ray.origin, ctx.ray.direction, a, normal)
                        .unwrap_or_else(|| triangle_center(a, b, c));
                    out.extend(ctx.measure(SnapItem::tri(hit, corners, target), 0));
                }
            }
        }
        out
    }
}

impl<B: PickingBackend> DetectionEngine for RasterEngine<B> {
    fn name(&self) -> &'static str {
        "raster"
    }

    fn enabled(&self, elements: SnapElements) -> bool {
        !elements.is_empty()
    }

    fn start(&mut self, _ctx: &DetectContext<'_>) {
        self.dirty = true;
        self.image = None;
        self.last_view = None;
    }

    fn detect(&mut self, ctx: &DetectContext<'_>, items: &mut SnapItems) {
        let sources = self.collect_sources(ctx);
        if sources != self.sources {
            self.sources = sources;
            self.dirty = true;
        }
        if self.sources.is_empty() {
            return;
        }
        if !self.last_view.is_some_and(|v| v.same_projection(ctx.view)) {
            self.dirty = true;
        }

        if self.dirty || self.image.is_none() {
            self.image = Some(self.backend.render_index_buffer(&self.sources, ctx.view));
            self.last_view = Some(*ctx.view);
            self.dirty = false;
            tracing::trace!(primitives = self.sources.len(), "index buffer redrawn");
        }
        let Some(image) = &self.image else {
            return;
        };

        let radius = ctx.settings.snap_radius;
        let hits = self.backend.decode(image, ctx.cursor, radius.ceil() as u32);
        for (index, _) in hits {
            let Some(source) = self.sources.get(index as usize) else {
                continue;
            };
            for item in self.items_for(ctx, source) {
                if item.distance <= ctx.settings.snap_radius_sq() {
                    items.add(item);
                }
            }
        }
    }

    fn exit(&mut self) {
        self.sources.clear();
        self.image = None;
        self.last_view = None;
        self.excluded.clear();
    }

    fn exclude(&mut self, objects: &[ObjectId]) {
        self.excluded.extend(objects.iter().copied());
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::{HelperRegistry, SnapHelper};
    use crate::scene::{Detectable, Geometry, MeshData, StaticScene};
    use crate::software::SoftwareIndexRenderer;
    use cadsnap_core::{SnapItemKind, SnapSettings, TieBreak};
    use glam::DMat4;

    fn top_scene() -> StaticScene {
        let view = View::orthographic(DVec3::new(0.0, 0.0, 10.0), DVec3::ZERO, DVec3::Y, 5.0, 100, 100);
        StaticScene::new(view)
    }

    fn run(scene: &StaticScene, helpers: &HelperRegistry, elements: SnapElements, cursor: DVec2) -> Option<SnapItem> {
        let settings = SnapSettings::default();
        let ctx = DetectContext::new(scene, &settings, helpers, elements, cursor);
        let mut engine = RasterEngine::new(SoftwareIndexRenderer::default());
        engine.start(&ctx);
        let mut items = SnapItems::new();
        engine.detect(&ctx, &mut items);
        items.pick_best(TieBreak::ScreenDistance).ok()
    }

    #[test]
    fn test_curve_center() {
        let scene = top_scene().with_object(Detectable::new(
            ObjectId(4),
            DMat4::IDENTITY,
            Geometry::Lines {
                vertices: vec![DVec3::new(-4.0, 0.0, 0.0), DVec3::new(4.0, 0.0, 0.0)],
                edges: vec![[0, 1]],
            },
        ));
        let helpers = HelperRegistry::new();
        let best = run(&scene, &helpers, SnapElements::EDGE | SnapElements::EDGE_CENTER, DVec2::new(60.5, 50.5)).unwrap();
        assert_eq!(best.kind, SnapItemKind::LINE | SnapItemKind::CENTER);
        assert!(best.coord.length() < 1e-9);
        assert_eq!(best.target, SnapTarget::Object(ObjectId(4)));

        let best = run(&scene, &helpers, SnapElements::EDGE, DVec2::new(80.5, 50.5)).unwrap();
        assert_eq!(best.kind, SnapItemKind::LINE);
        assert!((best.coord.x - 3.05).abs() < 1e-9);
    }

    #[test]
    fn test_virtual_origin_target() {
        let scene = top_scene().with_object(Detectable::new(
            ObjectId(9),
            DMat4::from_translation(DVec3::new(1.0, 1.0, 0.0)),
            Geometry::Mesh(MeshData::cube(1.0)),
        ));
        let helpers = HelperRegistry::new();
        let best = run(&scene, &helpers, SnapElements::ORIGIN, DVec2::new(62.0, 42.0)).unwrap();
        assert_eq!(best.target, SnapTarget::Origin(ObjectId(9)));
        assert!(best.coord.distance(DVec3::new(1.0, 1.0, 0.0)) < 1e-9);
    }

    #[test]
    fn test_helper_point() {
        let scene = top_scene();
        let mut helpers = HelperRegistry::new();
        let id = helpers.add(SnapHelper::Point { coord: DVec3::new(-2.0, 0.0, 0.0) });
        let best = run(&scene, &helpers, SnapElements::HELPER, DVec2::new(31.0, 50.0)).unwrap();
        assert_eq!(best.target, SnapTarget::Helper(id));
        assert!(run(&scene, &helpers, SnapElements::VERT, DVec2::new(31.0, 50.0)).is_none());
    }

    #[test]
    fn test_color_encoding() {
        assert_eq!(encode_id(0), [1, 0, 0, 0]);
        assert_eq!(encode_id(255), [0, 1, 0, 0]);
        assert_eq!(decode_color([0, 0, 0, 0]), None);
        for id in [0u32, 1, 254, 255, 65_535, 16_777_216] {
            assert_eq!(decode_color(encode_id(id)), Some(id));
        }
    }

    #[test]
    fn test_decode_nearest_ring_first() {
        let mut image = IndexImage::new(20, 20);
        image.pixels[10 * 20 + 14] = encode_id(7);
        image.pixels[10 * 20 + 11] = encode_id(3);
        image.pixels[10 * 20 + 12] = encode_id(3);

        let hits = decode_window(&image, DVec2::new(10.5, 10.5), 5);
        let ids: Vec<u32> = hits.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![3, 7]);
        assert_eq!(hits[0].1, DVec2::new(11.5, 10.5));
    }

    #[test]
    fn test_decode_clips_to_image() {
        let mut image = IndexImage::new(4, 4);
        image.pixels[0] = encode_id(0);
        let hits = decode_window(&image, DVec2::new(0.0, 0.0), 3);
        assert_eq!(hits.len(), 1);
        assert!(decode_window(&image, DVec2::new(100.0, 100.0), 3).is_empty());
    }

    fn lines(id: u64, a: DVec3, b: DVec3) -> Detectable {
        Detectable::new(
            ObjectId(id),
            DMat4::IDENTITY,
            Geometry::Lines {
                vertices: vec![a, b],
                edges: vec![[0, 1]],
            },
        )
    }

    #[test]
    fn test_face_center_offered_with_face() {
        let triangle = MeshData::new(
            vec![DVec3::ZERO, DVec3::new(3.0, 0.0, 0.0), DVec3::new(0.0, 3.0, 0.0)],
            vec![vec![0, 1, 2]],
        );
        let scene = top_scene().with_object(Detectable::new(ObjectId(2), DMat4::IDENTITY, Geometry::Mesh(triangle)));
        let settings = SnapSettings {
            max_vertex_count: 0,
            ..SnapSettings::default()
        };
        let helpers = HelperRegistry::new();
        let cursor = DVec2::new(62.0, 42.0);

        let pick = |elements: SnapElements| {
            let ctx = DetectContext::new(&scene, &settings, &helpers, elements, cursor);
            let mut engine = RasterEngine::new(SoftwareIndexRenderer::default());
            engine.start(&ctx);
            let mut items = SnapItems::new();
            engine.detect(&ctx, &mut items);
            items.pick_best(TieBreak::ScreenDistance).ok()
        };

        let best = pick(SnapElements::FACE | SnapElements::FACE_CENTER).unwrap();
        assert_eq!(best.kind, SnapItemKind::TRI | SnapItemKind::CENTER);
        assert!(best.coord.distance(DVec3::new(1.0, 1.0, 0.0)) < 1e-9);

        let best = pick(SnapElements::FACE).unwrap();
        assert_eq!(best.kind, SnapItemKind::TRI);
    }

    #[test]
    fn test_line_center_when_endpoints_are_off() {
        let scene = top_scene().with_object(lines(3, DVec3::new(-0.5, 0.0, 0.0), DVec3::new(0.5, 0.0, 0.0)));
        let helpers = HelperRegistry::new();
        let cursor = DVec2::new(54.5, 50.5);

        let best = run(&scene, &helpers, SnapElements::EDGE_CENTER, cursor).unwrap();
        assert_eq!(best.kind, SnapItemKind::LINE | SnapItemKind::CENTER);
        assert!(best.coord.length() < 1e-9);

        let best = run(&scene, &helpers, SnapElements::VERT, cursor).unwrap();
        assert_eq!(best.kind, SnapItemKind::POINT);
        assert!(best.coord.distance(DVec3::new(0.5, 0.0, 0.0)) < 1e-9);
    }

    /// Counts index buffer redraws.
    #[derive(Default)]
    struct Counting {
        inner: SoftwareIndexRenderer,
        renders: usize,
    }

    impl PickingBackend for Counting {
        fn render_index_buffer(&mut self, primitives: &[PickPrimitive], view: &View) -> IndexImage {
            self.renders += 1;
            self.inner.render_index_buffer(primitives, view)
        }
    }

    #[test]
    fn test_redraw_on_view_change_and_exclude() {
        let scene_at = |eye: DVec3| {
            let view = View::orthographic(eye, DVec3::new(eye.x, eye.y, 0.0), DVec3::Y, 5.0, 100, 100);
            StaticScene::new(view)
                .with_object(lines(4, DVec3::new(-4.0, 0.0, 0.0), DVec3::new(4.0, 0.0, 0.0)))
                .with_object(lines(5, DVec3::new(-3.0, -4.0, 0.0), DVec3::new(-3.0, 4.0, 0.0)))
        };
        let settings = SnapSettings::default();
        let helpers = HelperRegistry::new();
        let mut engine = RasterEngine::new(Counting::default());

        let detect = |engine: &mut RasterEngine<Counting>, scene: &StaticScene, cursor: DVec2| {
            let ctx = DetectContext::new(scene, &settings, &helpers, SnapElements::EDGE, cursor);
            let mut items = SnapItems::new();
            engine.detect(&ctx, &mut items);
            items.pick_best(TieBreak::ScreenDistance).ok().map(|i| i.target)
        };

        let first = scene_at(DVec3::new(0.0, 0.0, 10.0));
        let ctx = DetectContext::new(&first, &settings, &helpers, SnapElements::EDGE, DVec2::new(60.5, 50.5));
        engine.start(&ctx);
        assert_eq!(detect(&mut engine, &first, DVec2::new(60.5, 50.5)), Some(SnapTarget::Object(ObjectId(4))));
        assert_eq!(detect(&mut engine, &first, DVec2::new(61.5, 50.5)), Some(SnapTarget::Object(ObjectId(4))));
        assert_eq!(engine.backend().renders, 1);

        // Panned up by two units: the horizontal line now sits on row 70.
        let panned = scene_at(DVec3::new(0.0, 2.0, 10.0));
        assert_eq!(detect(&mut engine, &panned, DVec2::new(60.5, 70.5)), Some(SnapTarget::Object(ObjectId(4))));
        assert_eq!(engine.backend().renders, 2);

        engine.exclude(&[ObjectId(4)]);
        assert_eq!(detect(&mut engine, &panned, DVec2::new(60.5, 70.5)), None);
        assert_eq!(engine.backend().renders, 3);
        assert_eq!(detect(&mut engine, &panned, DVec2::new(20.5, 60.5)), Some(SnapTarget::Object(ObjectId(5))));
        assert_eq!(engine.backend().renders, 3);
    }
}
