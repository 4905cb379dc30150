//! Orthonormal pivot frames.

use glam::{DMat3, DMat4, DVec3};

use crate::error::GeomError;
use crate::geom3d::{safe_basis_from_direction_and_guide, safe_normalize, Axis};

/// A pivot frame: an origin plus a right-handed orthonormal basis.
///
/// Every constructor and setter re-normalizes, so scale and shear in an
/// incoming matrix are discarded.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Space {
    matrix: DMat4,
}

impl Default for Space {
    fn default() -> Self {
        Self::WORLD
    }
}

impl Space {
    pub const WORLD: Space = Space {
        matrix: DMat4::IDENTITY,
    };

    /// Create a frame from any affine matrix.
    pub fn new(matrix: DMat4) -> Self {
        Self {
            matrix: orthonormalize(matrix),
        }
    }

    /// World-aligned frame at `origin`.
    pub fn from_origin(origin: DVec3) -> Self {
        Self {
            matrix: DMat4::from_translation(origin),
        }
    }

    /// Frame from an origin and basis columns.
    pub fn from_origin_basis(origin: DVec3, basis: DMat3) -> Self {
        let mut matrix = DMat4::from_mat3(basis);
        matrix.w_axis = origin.extend(1.0);
        Self::new(matrix)
    }

    /// Frame whose Z axis is `normal`, X chosen as close to world X as possible.
    pub fn from_origin_normal(origin: DVec3, normal: DVec3) -> Result<Self, GeomError> {
        let basis = safe_basis_from_direction_and_guide(normal, DVec3::X, Axis::Z, Axis::X)?;
        Ok(Self::from_origin_basis(origin, basis))
    }

    /// Frame with Z along `normal` and X pointing along `x_hint` (projected).
    pub fn from_origin_normal_x(origin: DVec3, normal: DVec3, x_hint: DVec3) -> Result<Self, GeomError> {
        let basis = safe_basis_from_direction_and_guide(normal, x_hint, Axis::Z, Axis::X)?;
        Ok(Self::from_origin_basis(origin, basis))
    }

    pub fn matrix(&self) -> DMat4 {
        self.matrix
    }

    /// Replace the frame, re-normalizing.
    pub fn set(&mut self, matrix: DMat4) {
        self.matrix = orthonormalize(matrix);
    }

    pub fn origin(&self) -> DVec3 {
        self.matrix.w_axis.truncate()
    }

    pub fn set_origin(&mut self, origin: DVec3) {
        self.matrix.w_axis = origin.extend(1.0);
    }

    pub fn with_origin(mut self, origin: DVec3) -> Self {
        self.set_origin(origin);
        self
    }

    pub fn axis(&self, axis: Axis) -> DVec3 {
        self.matrix.col(axis.index()).truncate()
    }

    pub fn x(&self) -> DVec3 {
        self.axis(Axis::X)
    }

    pub fn y(&self) -> DVec3 {
        self.axis(Axis::Y)
    }

    /// The Z axis, used as the frame's plane normal.
    pub fn z(&self) -> DVec3 {
        self.axis(Axis::Z)
    }

    pub fn basis(&self) -> DMat3 {
        DMat3::from_mat4(self.matrix)
    }

    /// World point to frame-local coordinates.
    pub fn to_local(&self, world: DVec3) -> DVec3 {
        self.basis().transpose() * (world - self.origin())
    }

    /// Frame-local coordinates to a world point.
    pub fn to_world(&self, local: DVec3) -> DVec3 {
        self.origin() + self.basis() * local
    }

    /// This frame moved by a world-space delta.
    pub fn transformed(&self, delta: &DMat4) -> Self {
        Self::new(*delta * self.matrix)
    }
}

fn orthonormalize(matrix: DMat4) -> DMat4 {
    let origin = matrix.w_axis.truncate();
    let x = matrix.x_axis.truncate();
    let y = matrix.y_axis.truncate();

    let basis = match safe_normalize(x) {
        Some(x) => safe_basis_from_direction_and_guide(x, y, Axis::X, Axis::Y).ok(),
        None => safe_normalize(matrix.z_axis.truncate())
            .and_then(|z| safe_basis_from_direction_and_guide(z, y, Axis::Z, Axis::Y).ok()),
    }
    .unwrap_or(DMat3::IDENTITY);

    let mut out = DMat4::from_mat3(basis);
    out.w_axis = origin.extend(1.0);
    out
}
