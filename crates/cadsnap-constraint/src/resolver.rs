//! Projection of free positions onto the active constraint.
//!
//! Every branch has a plain perpendicular projection as its fallback, so the
//! resolver always produces a point that satisfies the constraint.

use glam::DVec3;

use cadsnap_core::{ConstraintFlags, SnapItem, TransformAction, TransformKind};
use cadsnap_geom::geom3d::{
    intersect_line_plane, intersect_plane_plane, intersect_ray_plane, nearest_points_between_lines,
    points_on_line_at_distance, project_point_on_line, project_point_on_plane, safe_normalize,
};
use cadsnap_geom::{Axis, Space, EPSILON};

/// Resolve `raw` against the action's constraint about its own pivot.
pub fn constrain(action: &TransformAction, raw: DVec3) -> DVec3 {
    apply(action, raw, action.space())
}

/// The unit axis a rotation turns about: the constrained axis, or Z.
pub fn rotation_axis(action: &TransformAction, about: &Space) -> DVec3 {
    about.axis(action.constraint.axis().unwrap_or(Axis::Z))
}

/// Resolve `raw` against the constraint of `action` about the frame `about`.
///
/// Unconstrained actions return `raw` unchanged.
pub fn apply(action: &TransformAction, raw: DVec3, about: &Space) -> DVec3 {
    let constraint = action.constraint;

    if constraint.intersects(ConstraintFlags::PERPENDICULAR | ConstraintFlags::PARALLEL)
        && action.is(TransformKind::ROTATE)
    {
        let normal = rotation_axis(action, about);
        return oriented_target(action, raw, about).unwrap_or_else(|| {
            tracing::trace!("no oriented target, projecting onto rotation plane");
            project_point_on_plane(raw, about.origin(), normal)
        });
    }

    let Some(axis) = constraint.axis() else {
        return raw;
    };
    let origin = about.origin();
    let direction = about.axis(axis);

    // A rotation constrained to an axis turns in the plane normal to it.
    if constraint.is_plane() || (constraint.is_axis() && action.is(TransformKind::ROTATE)) {
        on_plane(action, raw, origin, direction)
    } else if constraint.is_axis() {
        on_axis(action, raw, origin, direction)
    } else {
        raw
    }
}

fn on_plane(action: &TransformAction, raw: DVec3, origin: DVec3, normal: DVec3) -> DVec3 {
    let resolved = match &action.active_item {
        Some(item) if item.is_line() => {
            if action.along_segment {
                item.segment()
                    .and_then(|(a, b)| intersect_line_plane(a, b, origin, normal))
            } else {
                action
                    .reference_ray
                    .and_then(|ray| intersect_ray_plane(ray.origin, ray.direction, origin, normal))
            }
        }
        Some(item) if item.is_tri() && action.is(TransformKind::ROTATE) => {
            face_at_radius(action, raw, item, origin, normal)
        }
        _ => None,
    };

    resolved.unwrap_or_else(|| {
        if action.active_item.is_some() {
            tracing::trace!("plane resolution degenerate, projecting");
        }
        project_point_on_plane(raw, origin, normal)
    })
}

fn on_axis(action: &TransformAction, raw: DVec3, origin: DVec3, direction: DVec3) -> DVec3 {
    let resolved = match &action.active_item {
        Some(item) if item.is_line() && action.kind.intersects(TransformKind::MOVE | TransformKind::SCALE) => item
            .segment()
            .and_then(|(a, b)| nearest_points_between_lines(origin, origin + direction, a, b))
            .map(|(on_axis, _)| on_axis),
        _ => None,
    };

    resolved.unwrap_or_else(|| {
        if action.active_item.is_some() {
            tracing::trace!("axis resolution degenerate, projecting");
        }
        project_point_on_line(raw, origin, direction)
    })
}

/// Point where the face plane crosses the rotation plane at the radius of `snap_from`.
fn face_at_radius(
    action: &TransformAction,
    raw: DVec3,
    item: &SnapItem,
    origin: DVec3,
    normal: DVec3,
) -> Option<DVec3> {
    let (face_point, face_normal) = item.plane()?;
    let (line_point, line_dir) = intersect_plane_plane(origin, normal, face_point, face_normal)?;
    let radius = project_point_on_plane(action.snap_from, origin, normal).distance(origin);
    if radius < EPSILON {
        return None;
    }
    let (a, b) = points_on_line_at_distance(line_point, line_dir, origin, radius)?;
    Some(if a.distance_squared(raw) <= b.distance_squared(raw) { a } else { b })
}

/// Rotation target perpendicular or parallel to the hovered edge.
///
/// The result lies on the rotation plane at the radius of `snap_from`, on the
/// side of the edge direction nearest the cursor.
fn oriented_target(action: &TransformAction, raw: DVec3, about: &Space) -> Option<DVec3> {
    let edge = action.active_item.as_ref()?.direction()?;
    let origin = about.origin();
    let normal = rotation_axis(action, about);

    let in_plane = safe_normalize(edge - normal * edge.dot(normal))?;
    let target = if action.constraint.has(ConstraintFlags::PERPENDICULAR) {
        normal.cross(in_plane)
    } else {
        in_plane
    };

    let raw_in_plane = project_point_on_plane(raw, origin, normal) - origin;
    let radius = match project_point_on_plane(action.snap_from, origin, normal).distance(origin) {
        r if r > EPSILON => r,
        _ => raw_in_plane.length(),
    };
    if radius <= EPSILON {
        return None;
    }

    let sign = if raw_in_plane.dot(target) >= 0.0 { 1.0 } else { -1.0 };
    Some(origin + target * (sign * radius))
}
