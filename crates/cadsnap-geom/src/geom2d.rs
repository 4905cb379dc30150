//! Screen-space helpers.

use std::f64::consts::TAU;

use glam::DVec2;

/// Squared distance between two screen points.
#[inline]
pub fn distance_sq(a: DVec2, b: DVec2) -> f64 {
    (a - b).length_squared()
}

/// Closest point on a 2D segment, with its clamped parameter.
pub fn nearest_point_on_segment(p: DVec2, a: DVec2, b: DVec2) -> (f64, DVec2) {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < f64::EPSILON {
        return (0.0, a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (t, a + ab * t)
}

/// Edge function used for barycentric rasterization.
#[inline]
pub fn edge_function(a: DVec2, b: DVec2, p: DVec2) -> f64 {
    (p.x - a.x) * (b.y - a.y) - (p.y - a.y) * (b.x - a.x)
}

/// Point-in-triangle test, independent of winding.
pub fn point_in_triangle(p: DVec2, a: DVec2, b: DVec2, c: DVec2) -> bool {
    let w0 = edge_function(b, c, p);
    let w1 = edge_function(c, a, p);
    let w2 = edge_function(a, b, p);
    (w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0) || (w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0)
}

/// `count` points evenly spaced on a circle.
pub fn circle_samples(center: DVec2, radius: f64, count: usize) -> impl Iterator<Item = DVec2> {
    (0..count).map(move |i| {
        let angle = TAU * i as f64 / count as f64;
        center + DVec2::new(angle.cos(), angle.sin()) * radius
    })
}

/// Axis-aligned screen rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub min: DVec2,
    pub max: DVec2,
}

impl ScreenRect {
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self { min, max }
    }

    /// Square of half-size `radius` around `center`.
    pub fn around(center: DVec2, radius: f64) -> Self {
        Self {
            min: center - DVec2::splat(radius),
            max: center + DVec2::splat(radius),
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = DVec2>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn intersects(&self, other: &ScreenRect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }
}
