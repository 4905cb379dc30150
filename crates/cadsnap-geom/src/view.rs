//! Camera view: projection to pixels and cursor rays.

use glam::{DMat4, DVec2, DVec3, DVec4};

use crate::geom3d::{safe_normalize, Ray};

/// A snapshot of the viewport camera.
///
/// Pixel coordinates have their origin at the top-left corner, Y down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    view: DMat4,
    projection: DMat4,
    view_projection: DMat4,
    inverse_view_projection: DMat4,
    camera_to_world: DMat4,
    width: f64,
    height: f64,
}

impl View {
    /// Create a view from world-to-camera and projection matrices.
    pub fn new(view: DMat4, projection: DMat4, width: u32, height: u32) -> Self {
        let view_projection = projection * view;
        Self {
            view,
            projection,
            view_projection,
            inverse_view_projection: view_projection.inverse(),
            camera_to_world: view.inverse(),
            width: width.max(1) as f64,
            height: height.max(1) as f64,
        }
    }

    /// Perspective camera looking from `eye` at `target`.
    pub fn look_at(eye: DVec3, target: DVec3, up: DVec3, fov_degrees: f64, width: u32, height: u32) -> Self {
        let aspect = width.max(1) as f64 / height.max(1) as f64;
        Self::new(
            DMat4::look_at_rh(eye, target, up),
            DMat4::perspective_rh(fov_degrees.to_radians(), aspect, 0.01, 1000.0),
            width,
            height,
        )
    }

    /// Orthographic camera showing `half_height` world units above and below the center.
    pub fn orthographic(eye: DVec3, target: DVec3, up: DVec3, half_height: f64, width: u32, height: u32) -> Self {
        let aspect = width.max(1) as f64 / height.max(1) as f64;
        let half_width = half_height * aspect;
        Self::new(
            DMat4::look_at_rh(eye, target, up),
            DMat4::orthographic_rh(-half_width, half_width, -half_height, half_height, 0.01, 1000.0),
            width,
            height,
        )
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn size(&self) -> DVec2 {
        DVec2::new(self.width, self.height)
    }

    pub fn view_matrix(&self) -> DMat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> DMat4 {
        self.projection
    }

    pub fn view_projection(&self) -> DMat4 {
        self.view_projection
    }

    pub fn is_perspective(&self) -> bool {
        self.projection.z_axis.w.abs() > f64::EPSILON
    }

    /// Camera position in world space.
    pub fn camera_origin(&self) -> DVec3 {
        self.camera_to_world.w_axis.truncate()
    }

    /// Unit direction the camera looks along.
    pub fn view_direction(&self) -> DVec3 {
        safe_normalize(-self.camera_to_world.z_axis.truncate()).unwrap_or(DVec3::NEG_Z)
    }

    /// Unit camera-right direction in world space.
    pub fn view_right(&self) -> DVec3 {
        safe_normalize(self.camera_to_world.x_axis.truncate()).unwrap_or(DVec3::X)
    }

    /// Project a world point to pixels with its normalized depth.
    ///
    /// Returns `None` for points behind a perspective camera.
    pub fn project_with_depth(&self, world: DVec3) -> Option<DVec3> {
        let clip = self.view_projection * DVec4::new(world.x, world.y, world.z, 1.0);
        if clip.w <= f64::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        if !ndc.is_finite() {
            return None;
        }
        Some(DVec3::new(
            (ndc.x + 1.0) * 0.5 * self.width,
            (1.0 - ndc.y) * 0.5 * self.height,
            ndc.z,
        ))
    }

    /// Project a world point to pixel coordinates.
    pub fn project(&self, world: DVec3) -> Option<DVec2> {
        self.project_with_depth(world).map(|p| p.truncate())
    }

    /// The ray from the camera through a pixel.
    pub fn ray_from_pixel(&self, pixel: DVec2) -> Ray {
        let ndc_x = pixel.x / self.width * 2.0 - 1.0;
        let ndc_y = 1.0 - pixel.y / self.height * 2.0;
        let near = self.inverse_view_projection.project_point3(DVec3::new(ndc_x, ndc_y, 0.0));
        let mid = self.inverse_view_projection.project_point3(DVec3::new(ndc_x, ndc_y, 0.5));

        let origin = if self.is_perspective() { self.camera_origin() } else { near };
        let direction = safe_normalize(mid - near).unwrap_or_else(|| self.view_direction());
        Ray { origin, direction }
    }

    /// Depth of a point as seen from the camera.
    ///
    /// Distance from the camera origin for perspective views, distance along
    /// the view direction for orthographic ones.
    pub fn view_depth(&self, world: DVec3) -> f64 {
        let origin = self.camera_origin();
        if self.is_perspective() {
            world.distance(origin)
        } else {
            (world - origin).dot(self.view_direction())
        }
    }

    /// World units covered by one pixel at `world`.
    pub fn world_per_pixel(&self, world: DVec3) -> Option<f64> {
        let a = self.project(world)?;
        let b = self.project(world + self.view_right())?;
        let pixels = a.distance(b);
        if pixels > f64::EPSILON {
            Some(1.0 / pixels)
        } else {
            None
        }
    }

    /// True when both views produce identical projections.
    pub fn same_projection(&self, other: &View) -> bool {
        self.view_projection == other.view_projection
            && self.width == other.width
            && self.height == other.height
    }
}
