//! CPU rasterizer for index buffers.

use glam::{DVec2, DVec3};

use cadsnap_geom::geom2d::edge_function;
use cadsnap_geom::View;

use crate::raster::{encode_id, IndexImage, PickPrimitive, PickingBackend, Primitive};

/// Software rasterizer for headless picking.
///
/// Faces are depth tested against each other; lines and points are drawn
/// on top so they stay pickable along silhouettes.
pub struct SoftwareIndexRenderer {
    point_size: u32,
    line_width: u32,
    image: IndexImage,
    depth: Vec<f64>,
}

impl SoftwareIndexRenderer {
    pub fn new(point_size: u32, line_width: u32) -> Self {
        Self {
            point_size: point_size.max(1),
            line_width: line_width.max(1),
            image: IndexImage::new(0, 0),
            depth: Vec::new(),
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.image.width != width || self.image.height != height {
            self.image = IndexImage::new(width, height);
            self.depth = vec![f64::INFINITY; (width as usize) * (height as usize)];
        } else {
            self.image.pixels.fill([0; 4]);
            self.depth.fill(f64::INFINITY);
        }
    }

    fn put(&mut self, x: i64, y: i64, color: [u8; 4]) {
        if x < 0 || y < 0 || x >= self.image.width as i64 || y >= self.image.height as i64 {
            return;
        }
        let idx = y as usize * self.image.width as usize + x as usize;
        self.image.pixels[idx] = color;
    }

    /// Fill a square of side `size` centered on `p`.
    fn splat(&mut self, p: DVec2, size: u32, color: [u8; 4]) {
        let half = (size as i64 - 1) / 2;
        let (cx, cy) = (p.x.floor() as i64, p.y.floor() as i64);
        for y in cy - half..=cy - half + size as i64 - 1 {
            for x in cx - half..=cx - half + size as i64 - 1 {
                self.put(x, y, color);
            }
        }
    }

    /// Rasterize a single triangle using edge functions.
    fn rasterize_triangle(&mut self, v: [DVec3; 3], color: [u8; 4]) {
        let (p0, p1, p2) = (v[0].truncate(), v[1].truncate(), v[2].truncate());
        let area = edge_function(p0, p1, p2);
        if area.abs() < 1e-4 {
            return;
        }
        let inv_area = 1.0 / area;

        let w = self.image.width as f64;
        let h = self.image.height as f64;
        let min_x = p0.x.min(p1.x).min(p2.x).max(0.0) as i64;
        let max_x = p0.x.max(p1.x).max(p2.x).min(w - 1.0) as i64;
        let min_y = p0.y.min(p1.y).min(p2.y).max(0.0) as i64;
        let max_y = p0.y.max(p1.y).max(p2.y).min(h - 1.0) as i64;

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let p = DVec2::new(x as f64 + 0.5, y as f64 + 0.5);
                let w0 = edge_function(p1, p2, p);
                let w1 = edge_function(p2, p0, p);
                let w2 = edge_function(p0, p1, p);

                let inside = (w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0) || (w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0);
                if !inside {
                    continue;
                }

                let z = (w0 * v[0].z + w1 * v[1].z + w2 * v[2].z) * inv_area;
                let idx = y as usize * self.image.width as usize + x as usize;
                if z < self.depth[idx] {
                    self.depth[idx] = z;
                    self.image.pixels[idx] = color;
                }
            }
        }
    }

    fn rasterize_line(&mut self, a: DVec2, b: DVec2, color: [u8; 4]) {
        let steps = (b - a).abs().max_element().ceil().max(1.0) as usize;
        for i in 0..=steps {
            let p = a.lerp(b, i as f64 / steps as f64);
            self.splat(p, self.line_width, color);
        }
    }
}

impl Default for SoftwareIndexRenderer {
    fn default() -> Self {
        Self::new(5, 3)
    }
}

impl PickingBackend for SoftwareIndexRenderer {
    fn render_index_buffer(&mut self, primitives: &[PickPrimitive], view: &View) -> IndexImage {
        self.resize(view.width() as u32, view.height() as u32);

        for (i, pick) in primitives.iter().enumerate() {
            if let Primitive::Tri(corners) = pick.primitive {
                let projected = [
                    view.project_with_depth(corners[0]),
                    view.project_with_depth(corners[1]),
                    view.project_with_depth(corners[2]),
                ];
                if let [Some(a), Some(b), Some(c)] = projected {
                    self.rasterize_triangle([a, b, c], encode_id(i as u32));
                }
            }
        }

        for (i, pick) in primitives.iter().enumerate() {
            if let Primitive::Line(a, b) = pick.primitive {
                if let (Some(a), Some(b)) = (view.project(a), view.project(b)) {
                    self.rasterize_line(a, b, encode_id(i as u32));
                }
            }
        }

        for (i, pick) in primitives.iter().enumerate() {
            if let Primitive::Point(p) = pick.primitive {
                if let Some(p) = view.project(p) {
                    self.splat(p, self.point_size, encode_id(i as u32));
                }
            }
        }

        self.image.clone()
    }
}
