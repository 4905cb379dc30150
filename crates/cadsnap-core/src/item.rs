//! Snap candidates.

use glam::DVec3;
use smallvec::{smallvec, SmallVec};

use cadsnap_geom::geom3d::{safe_normalize, triangle_normal};

use crate::flags::SnapItemKind;
use crate::types::SnapTarget;

/// A candidate snap target found in the current detection pass.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SnapItem {
    /// Resolved 3D point.
    pub coord: DVec3,
    /// Defining points: a vertex, edge endpoints or triangle corners.
    pub coords: SmallVec<[DVec3; 3]>,
    /// Squared pixel distance to the cursor.
    pub distance: f64,
    pub kind: SnapItemKind,
    /// Position along an edge, 0 when not applicable.
    pub fraction: f64,
    pub normal: DVec3,
    /// Distance from the camera.
    pub view_depth: f64,
    /// Ordinal of the ray hit that produced this item (x-ray mode).
    pub ray_depth: u32,
    pub target: SnapTarget,
}

impl SnapItem {
    /// A vertex-like candidate.
    pub fn point(coord: DVec3, target: SnapTarget) -> Self {
        Self {
            coord,
            coords: smallvec![coord],
            distance: 0.0,
            kind: SnapItemKind::POINT,
            fraction: 0.0,
            normal: DVec3::ZERO,
            view_depth: 0.0,
            ray_depth: 0,
            target,
        }
    }

    /// A point on the edge `a`-`b` at `fraction`.
    pub fn line(a: DVec3, b: DVec3, fraction: f64, target: SnapTarget) -> Self {
        Self {
            coord: a.lerp(b, fraction),
            coords: smallvec![a, b],
            distance: 0.0,
            kind: SnapItemKind::LINE,
            fraction,
            normal: DVec3::ZERO,
            view_depth: 0.0,
            ray_depth: 0,
            target,
        }
    }

    /// The midpoint of the edge `a`-`b`.
    pub fn line_center(a: DVec3, b: DVec3, target: SnapTarget) -> Self {
        let mut item = Self::line(a, b, 0.5, target);
        item.kind = SnapItemKind::LINE | SnapItemKind::CENTER;
        item
    }

    /// A point on the triangle `a`,`b`,`c`.
    pub fn tri(coord: DVec3, corners: [DVec3; 3], target: SnapTarget) -> Self {
        let [a, b, c] = corners;
        Self {
            coord,
            coords: SmallVec::from_buf(corners),
            distance: 0.0,
            kind: SnapItemKind::TRI,
            fraction: 0.0,
            normal: triangle_normal(a, b, c).unwrap_or(DVec3::ZERO),
            view_depth: 0.0,
            ray_depth: 0,
            target,
        }
    }

    /// The center of a face spanned by `corners`.
    pub fn tri_center(coord: DVec3, corners: [DVec3; 3], target: SnapTarget) -> Self {
        let mut item = Self::tri(coord, corners, target);
        item.kind = SnapItemKind::TRI | SnapItemKind::CENTER;
        item
    }

    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = distance;
        self
    }

    pub fn with_depths(mut self, view_depth: f64, ray_depth: u32) -> Self {
        self.view_depth = view_depth;
        self.ray_depth = ray_depth;
        self
    }

    pub fn with_normal(mut self, normal: DVec3) -> Self {
        self.normal = normal;
        self
    }

    pub fn is_point(&self) -> bool {
        self.kind.has(SnapItemKind::POINT)
    }

    pub fn is_line(&self) -> bool {
        self.kind.has(SnapItemKind::LINE)
    }

    pub fn is_tri(&self) -> bool {
        self.kind.has(SnapItemKind::TRI)
    }

    pub fn type_priority(&self) -> u8 {
        self.kind.type_priority()
    }

    /// The edge endpoints of a LINE item.
    pub fn segment(&self) -> Option<(DVec3, DVec3)> {
        match self.coords.as_slice() {
            [a, b, ..] if self.is_line() => Some((*a, *b)),
            _ => None,
        }
    }

    /// Unit direction of a LINE item.
    pub fn direction(&self) -> Option<DVec3> {
        let (a, b) = self.segment()?;
        safe_normalize(b - a)
    }

    /// Point and unit normal of a TRI item's plane.
    pub fn plane(&self) -> Option<(DVec3, DVec3)> {
        if !self.is_tri() {
            return None;
        }
        let normal = match self.coords.as_slice() {
            [a, b, c] => triangle_normal(*a, *b, *c),
            _ => None,
        }
        .or_else(|| safe_normalize(self.normal))?;
        Some((self.coord, normal))
    }
}
