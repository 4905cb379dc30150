//! Stateless 3D geometry queries.
//!
//! All functions are pure. Anything that can be undefined for some input
//! (parallel lines, grazing rays, zero-length vectors) returns `None`.

use std::f64::consts::PI;

use glam::{DMat3, DMat4, DVec3};

use crate::bounds::BoundingBox;
use crate::error::GeomError;

/// Tolerance for coincident points.
pub const EPSILON: f64 = 1e-6;

/// Vectors shorter than this are treated as zero-length.
const LENGTH_EPSILON: f64 = 1e-9;

/// Sanity bound on intersection distances.
pub const MAX_DISTANCE: f64 = 1e6;

/// Angular tolerance for parallelism tests (0.1 degree).
pub const ANGLE_TOLERANCE: f64 = 0.1 * PI / 180.0;

/// A principal axis of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Column index of this axis in a basis matrix.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// World unit vector.
    pub fn unit(self) -> DVec3 {
        match self {
            Axis::X => DVec3::X,
            Axis::Y => DVec3::Y,
            Axis::Z => DVec3::Z,
        }
    }

    /// The next axis in right-handed cyclic order (X -> Y -> Z -> X).
    pub fn next(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::Z,
            Axis::Z => Axis::X,
        }
    }

    /// The two remaining axes, in cyclic order.
    pub fn others(self) -> (Axis, Axis) {
        (self.next(), self.next().next())
    }
}

/// A half-line with a unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray {
    /// Create a ray, normalizing the direction. Returns `None` for a zero direction.
    pub fn new(origin: DVec3, direction: DVec3) -> Option<Self> {
        Some(Self {
            origin,
            direction: safe_normalize(direction)?,
        })
    }

    /// Point at parameter `t` along the ray.
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }

    /// Transform into another space (e.g. world to object-local).
    ///
    /// The direction is renormalized, so parameters are not preserved
    /// across non-uniform scale.
    pub fn transformed(&self, matrix: &DMat4) -> Option<Ray> {
        Ray::new(
            matrix.transform_point3(self.origin),
            matrix.transform_vector3(self.direction),
        )
    }
}

/// Normalize a vector, or `None` if it is (near) zero-length or not finite.
pub fn safe_normalize(v: DVec3) -> Option<DVec3> {
    let len = v.length();
    if len > LENGTH_EPSILON && len.is_finite() {
        Some(v / len)
    } else {
        None
    }
}

/// Unsigned angle between two vectors in `[0, PI]`.
pub fn angle_between(a: DVec3, b: DVec3) -> Option<f64> {
    let a = safe_normalize(a)?;
    let b = safe_normalize(b)?;
    Some(a.dot(b).clamp(-1.0, 1.0).acos())
}

/// True when two directions are within the angular tolerance of (anti)parallel.
pub fn nearly_parallel(a: DVec3, b: DVec3) -> bool {
    match angle_between(a, b) {
        Some(angle) => angle < ANGLE_TOLERANCE || angle > PI - ANGLE_TOLERANCE,
        None => true,
    }
}

/// Intersect a ray (as an infinite line) with a plane.
///
/// Fails when the ray is within 0.1 degree of lying in the plane, or when the
/// hit is farther than [`MAX_DISTANCE`] from the origin.
pub fn intersect_ray_plane(
    origin: DVec3,
    direction: DVec3,
    plane_point: DVec3,
    plane_normal: DVec3,
) -> Option<DVec3> {
    let dir = safe_normalize(direction)?;
    let normal = safe_normalize(plane_normal)?;
    let denom = dir.dot(normal);
    if denom.abs() < ANGLE_TOLERANCE.sin() {
        return None;
    }
    let t = (plane_point - origin).dot(normal) / denom;
    if !t.is_finite() || t.abs() > MAX_DISTANCE {
        return None;
    }
    Some(origin + dir * t)
}

/// Intersect the infinite line through `a` and `b` with a plane.
pub fn intersect_line_plane(
    a: DVec3,
    b: DVec3,
    plane_point: DVec3,
    plane_normal: DVec3,
) -> Option<DVec3> {
    intersect_ray_plane(a, b - a, plane_point, plane_normal)
}

/// Slab test of a ray against an axis-aligned box.
///
/// Returns the entry and exit parameters; entry may be negative when the
/// origin is inside the box.
pub fn intersect_ray_box(origin: DVec3, direction: DVec3, bounds: &BoundingBox) -> Option<(f64, f64)> {
    let dir = safe_normalize(direction)?;
    let mut t_min = f64::NEG_INFINITY;
    let mut t_max = f64::INFINITY;

    for axis in Axis::ALL {
        let i = axis.index();
        let o = origin[i];
        let d = dir[i];
        let (lo, hi) = (bounds.min[i], bounds.max[i]);

        if d.abs() < LENGTH_EPSILON {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let mut t0 = (lo - o) * inv;
        let mut t1 = (hi - o) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }

    if t_max < 0.0 {
        None
    } else {
        Some((t_min, t_max))
    }
}

/// Unclamped projection of `point` on the line through `a` and `b`.
///
/// Returns the parameter along `a -> b` (0 at `a`, 1 at `b`) and the projected
/// point. A degenerate line projects everything onto `a`.
pub fn nearest_point_on_line(point: DVec3, a: DVec3, b: DVec3) -> (f64, DVec3) {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < LENGTH_EPSILON * LENGTH_EPSILON {
        return (0.0, a);
    }
    let t = (point - a).dot(ab) / len_sq;
    (t, a + ab * t)
}

/// Projection of `point` on the segment `a`-`b`, with the parameter clamped to `[0, 1]`.
pub fn nearest_point_on_segment(point: DVec3, a: DVec3, b: DVec3) -> (f64, DVec3) {
    let (t, _) = nearest_point_on_line(point, a, b);
    let t = t.clamp(0.0, 1.0);
    (t, a.lerp(b, t))
}

/// Closest pair of points between the infinite lines `a0`-`a1` and `b0`-`b1`.
///
/// Fails when the lines are within 0.1 degree of parallel. Directions are
/// normalized before solving so that long and short segments lose no precision.
pub fn nearest_points_between_lines(
    a0: DVec3,
    a1: DVec3,
    b0: DVec3,
    b1: DVec3,
) -> Option<(DVec3, DVec3)> {
    let d1 = safe_normalize(a1 - a0)?;
    let d2 = safe_normalize(b1 - b0)?;
    if nearly_parallel(d1, d2) {
        return None;
    }

    let r = a0 - b0;
    let b = d1.dot(d2);
    let c = d1.dot(r);
    let f = d2.dot(r);
    let denom = 1.0 - b * b;

    let s = (b * f - c) / denom;
    let t = (f - b * c) / denom;
    if !s.is_finite() || !t.is_finite() || s.abs() > MAX_DISTANCE || t.abs() > MAX_DISTANCE {
        return None;
    }

    Some((a0 + d1 * s, b0 + d2 * t))
}

/// Point on the line `a`-`b` closest to a ray, with its parameter along `a -> b`.
pub fn nearest_point_between_ray_and_line(
    origin: DVec3,
    direction: DVec3,
    a: DVec3,
    b: DVec3,
) -> Option<(f64, DVec3)> {
    let (_, on_line) = nearest_points_between_lines(origin, origin + direction, a, b)?;
    Some(nearest_point_on_line(on_line, a, b))
}

/// Intersect an infinite line with a triangle (two-sided, Moller-Trumbore).
///
/// Returns the line parameter (in units of `direction`'s length after
/// normalization) and the hit point.
pub fn intersect_line_triangle(
    origin: DVec3,
    direction: DVec3,
    v0: DVec3,
    v1: DVec3,
    v2: DVec3,
) -> Option<(f64, DVec3)> {
    let dir = safe_normalize(direction)?;
    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let h = dir.cross(e2);
    let a = e1.dot(h);
    if a.abs() < LENGTH_EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = origin - v0;
    let u = f * s.dot(h);
    if !(-EPSILON..=1.0 + EPSILON).contains(&u) {
        return None;
    }

    let q = s.cross(e1);
    let v = f * dir.dot(q);
    if v < -EPSILON || u + v > 1.0 + EPSILON {
        return None;
    }

    let t = f * e2.dot(q);
    if !t.is_finite() || t.abs() > MAX_DISTANCE {
        return None;
    }
    Some((t, origin + dir * t))
}

/// Like [`intersect_line_triangle`] but only accepts hits in front of the origin.
pub fn intersect_ray_triangle(
    origin: DVec3,
    direction: DVec3,
    v0: DVec3,
    v1: DVec3,
    v2: DVec3,
) -> Option<(f64, DVec3)> {
    intersect_line_triangle(origin, direction, v0, v1, v2).filter(|(t, _)| *t >= 0.0)
}

/// Line of intersection of two planes, as `(point, unit direction)`.
pub fn intersect_plane_plane(
    p1: DVec3,
    n1: DVec3,
    p2: DVec3,
    n2: DVec3,
) -> Option<(DVec3, DVec3)> {
    let n1 = safe_normalize(n1)?;
    let n2 = safe_normalize(n2)?;
    if nearly_parallel(n1, n2) {
        return None;
    }
    let dir = n1.cross(n2);
    let len_sq = dir.length_squared();
    let d1 = n1.dot(p1);
    let d2 = n2.dot(p2);
    let point = (n2.cross(dir) * d1 + dir.cross(n1) * d2) / len_sq;
    Some((point, dir / len_sq.sqrt()))
}

/// Points on a line at `radius` from `center`, nearest root first.
///
/// The line is given by a point and a direction. Returns `None` when the line
/// does not reach the sphere.
pub fn points_on_line_at_distance(
    line_point: DVec3,
    line_dir: DVec3,
    center: DVec3,
    radius: f64,
) -> Option<(DVec3, DVec3)> {
    let d = safe_normalize(line_dir)?;
    let m = line_point - center;
    let b = m.dot(d);
    let c = m.length_squared() - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let root = disc.sqrt();
    Some((line_point + d * (-b - root), line_point + d * (-b + root)))
}

/// Build an orthonormal, right-handed basis.
///
/// `direction` becomes the `main_axis` column exactly. The `guide_axis` column
/// is the part of `guide` orthogonal to `direction`; when `guide` is parallel to
/// `direction` the world Z, then world Y, are tried instead.
pub fn safe_basis_from_direction_and_guide(
    direction: DVec3,
    guide: DVec3,
    main_axis: Axis,
    guide_axis: Axis,
) -> Result<DMat3, GeomError> {
    if main_axis == guide_axis {
        return Err(GeomError::SameAxis { axis: main_axis });
    }
    let main = safe_normalize(direction).ok_or(GeomError::ZeroLengthDirection)?;

    let guide_dir = [guide, DVec3::Z, DVec3::Y]
        .into_iter()
        .filter(|g| !nearly_parallel(main, *g))
        .find_map(|g| safe_normalize(g - main * g.dot(main)))
        .ok_or(GeomError::DegenerateGuide)?;

    let third = if main_axis.next() == guide_axis {
        main.cross(guide_dir)
    } else {
        guide_dir.cross(main)
    };

    let mut cols = [DVec3::ZERO; 3];
    cols[main_axis.index()] = main;
    cols[guide_axis.index()] = guide_dir;
    let other = Axis::ALL
        .into_iter()
        .find(|a| *a != main_axis && *a != guide_axis)
        .unwrap_or(Axis::Z);
    cols[other.index()] = third;

    Ok(DMat3::from_cols(cols[0], cols[1], cols[2]))
}

/// Unit normal of a triangle (counter-clockwise winding), or `None` if degenerate.
pub fn triangle_normal(a: DVec3, b: DVec3, c: DVec3) -> Option<DVec3> {
    safe_normalize((b - a).cross(c - a))
}

/// Centroid of a triangle.
pub fn triangle_center(a: DVec3, b: DVec3, c: DVec3) -> DVec3 {
    (a + b + c) / 3.0
}

/// Centroid of a point set.
pub fn centroid(points: &[DVec3]) -> Option<DVec3> {
    if points.is_empty() {
        return None;
    }
    Some(points.iter().copied().sum::<DVec3>() / points.len() as f64)
}

/// Drop `point` perpendicularly onto a plane. A zero normal leaves it unchanged.
pub fn project_point_on_plane(point: DVec3, plane_point: DVec3, plane_normal: DVec3) -> DVec3 {
    match safe_normalize(plane_normal) {
        Some(n) => point - n * (point - plane_point).dot(n),
        None => point,
    }
}

/// Drop `point` perpendicularly onto the line through `origin` along `direction`.
pub fn project_point_on_line(point: DVec3, origin: DVec3, direction: DVec3) -> DVec3 {
    nearest_point_on_line(point, origin, origin + direction).1
}

/// Signed angle from `v0` to `v1`, measured counter-clockwise about `plane_normal`.
///
/// Both vectors are first projected onto the plane. The result is in
/// `[-PI, PI]`; degenerate input yields `0.0`.
pub fn signed_angle_in_plane(v0: DVec3, v1: DVec3, plane_normal: DVec3) -> f64 {
    let Some(n) = safe_normalize(plane_normal) else {
        return 0.0;
    };
    let a = v0 - n * v0.dot(n);
    let b = v1 - n * v1.dot(n);
    if a.length_squared() < LENGTH_EPSILON || b.length_squared() < LENGTH_EPSILON {
        return 0.0;
    }
    let angle = n.dot(a.cross(b)).atan2(a.dot(b));
    if angle.is_finite() {
        angle
    } else {
        0.0
    }
}

/// Rotation by `angle` about the axis through `origin` along `axis`.
pub fn rotation_about_point(origin: DVec3, axis: DVec3, angle: f64) -> DMat4 {
    match safe_normalize(axis) {
        Some(axis) => {
            DMat4::from_translation(origin)
                * DMat4::from_axis_angle(axis, angle)
                * DMat4::from_translation(-origin)
        }
        None => DMat4::IDENTITY,
    }
}
