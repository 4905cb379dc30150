//! Building snap helpers from user-selected snap items.
//!
//! Up to three items are held. Edge and face centers count as points; other
//! items count by their shape. Each operation has a fixed set of supported
//! selections, matched on the counts of points, lines and faces.

use glam::DVec3;
use smallvec::SmallVec;

use cadsnap_core::{ContextError, HelperId, SnapItem, SnapItemKind};
use cadsnap_detect::{HelperRegistry, SnapHelper};
use cadsnap_geom::geom3d::{
    centroid, intersect_line_plane, intersect_plane_plane, nearest_point_on_line, nearest_points_between_lines,
    project_point_on_plane,
};
use cadsnap_geom::{Space, EPSILON};

use crate::sequence::pivot_from_three_points;

/// Maximum number of selected items.
pub const MAX_SELECTED: usize = 3;

/// Half-size of planes built from selections that have no natural extent.
const DEFAULT_PLANE_SIZE: f64 = 1.0;

/// What to build from the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextOperation {
    /// Exact crossing of two lines, or of a line and a face plane.
    Intersection,
    /// Nearest pair between the selected entities.
    ClosestPoints,
    /// A custom frame or line from the selection's points, lines and faces.
    CustomSpace,
    /// Centroid of all selected coordinates.
    Average,
}

impl ContextOperation {
    fn name(self) -> &'static str {
        match self {
            ContextOperation::Intersection => "intersection",
            ContextOperation::ClosestPoints => "closest points",
            ContextOperation::CustomSpace => "custom space",
            ContextOperation::Average => "average",
        }
    }
}

/// Selected snap items awaiting a helper operation.
#[derive(Debug, Clone, Default)]
pub struct SnapContext {
    items: SmallVec<[SnapItem; MAX_SELECTED]>,
}

impl SnapContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item, dropping the oldest once full. Returns false if an item
    /// with the same coordinate and shape is already selected.
    pub fn select(&mut self, item: SnapItem) -> bool {
        let duplicate = self
            .items
            .iter()
            .any(|i| i.kind == item.kind && i.coords == item.coords && i.coord.distance(item.coord) < EPSILON);
        if duplicate {
            return false;
        }
        if self.items.len() == MAX_SELECTED {
            self.items.remove(0);
        }
        self.items.push(item);
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[SnapItem] {
        &self.items
    }

    fn is_point_like(item: &SnapItem) -> bool {
        item.is_point() || item.kind.has(SnapItemKind::CENTER)
    }

    pub fn points(&self) -> impl Iterator<Item = DVec3> + '_ {
        self.items.iter().filter(|i| Self::is_point_like(i)).map(|i| i.coord)
    }

    /// Segments of the selected edges.
    pub fn lines(&self) -> impl Iterator<Item = (DVec3, DVec3)> + '_ {
        self.items
            .iter()
            .filter(|i| !Self::is_point_like(i))
            .filter_map(SnapItem::segment)
    }

    /// Point and unit normal of each selected face.
    pub fn tris(&self) -> impl Iterator<Item = (DVec3, DVec3)> + '_ {
        self.items
            .iter()
            .filter(|i| !Self::is_point_like(i))
            .filter_map(SnapItem::plane)
    }

    /// Evaluate `operation` on the current selection.
    pub fn evaluate(&self, operation: ContextOperation) -> Result<SnapHelper, ContextError> {
        let points: SmallVec<[DVec3; MAX_SELECTED]> = self.points().collect();
        let lines: SmallVec<[(DVec3, DVec3); MAX_SELECTED]> = self.lines().collect();
        let tris: SmallVec<[(DVec3, DVec3); MAX_SELECTED]> = self.tris().collect();

        let helper = match operation {
            ContextOperation::Intersection => intersection(&points, &lines, &tris),
            ContextOperation::ClosestPoints => closest_points(&points, &lines, &tris),
            ContextOperation::CustomSpace => custom_space(&points, &lines, &tris),
            ContextOperation::Average => average(self.items.iter().map(|i| i.coord)),
        };

        helper.unwrap_or_else(|| {
            Err(ContextError::Unsupported {
                operation: operation.name().to_string(),
                points: points.len(),
                lines: lines.len(),
                tris: tris.len(),
            })
        })
    }

    /// Evaluate `operation` and register the result, clearing the selection.
    pub fn build(
        &mut self,
        operation: ContextOperation,
        helpers: &mut HelperRegistry,
    ) -> Result<HelperId, ContextError> {
        let helper = self.evaluate(operation)?;
        self.clear();
        Ok(helpers.add(helper))
    }
}

/// `None` when the selection is not supported, `Some(Err)` when it is but the
/// geometry is degenerate.
type Built = Option<Result<SnapHelper, ContextError>>;

fn degenerate(reason: &str) -> ContextError {
    ContextError::Degenerate {
        reason: reason.to_string(),
    }
}

fn point_or_segment(a: DVec3, b: DVec3) -> SnapHelper {
    if a.distance(b) < EPSILON {
        SnapHelper::Point { coord: a.lerp(b, 0.5) }
    } else {
        SnapHelper::Line { a, b }
    }
}

fn intersection(points: &[DVec3], lines: &[(DVec3, DVec3)], tris: &[(DVec3, DVec3)]) -> Built {
    match (points.len(), lines, tris) {
        (0, [(a0, a1), (b0, b1)], []) => Some(
            nearest_points_between_lines(*a0, *a1, *b0, *b1)
                .map(|(p, q)| point_or_segment(p, q))
                .ok_or_else(|| degenerate("lines are parallel")),
        ),
        (0, [(a, b)], [(p, n)]) => Some(
            intersect_line_plane(*a, *b, *p, *n)
                .map(|coord| SnapHelper::Point { coord })
                .ok_or_else(|| degenerate("line is parallel to the face")),
        ),
        (0, [], [(p1, n1), (p2, n2)]) => Some(
            intersect_plane_plane(*p1, *n1, *p2, *n2)
                .map(|(point, dir)| SnapHelper::Line { a: point, b: point + dir })
                .ok_or_else(|| degenerate("faces are parallel")),
        ),
        _ => None,
    }
}

fn closest_points(points: &[DVec3], lines: &[(DVec3, DVec3)], tris: &[(DVec3, DVec3)]) -> Built {
    let pair = match (points, lines, tris) {
        ([], [(a0, a1), (b0, b1)], []) => {
            nearest_points_between_lines(*a0, *a1, *b0, *b1).ok_or_else(|| degenerate("lines are parallel"))
        }
        ([p], [(a, b)], []) => Ok((*p, nearest_point_on_line(*p, *a, *b).1)),
        ([p], [], [(q, n)]) => Ok((*p, project_point_on_plane(*p, *q, *n))),
        ([a, b], [], []) => Ok((*a, *b)),
        _ => return None,
    };
    Some(pair.map(|(a, b)| point_or_segment(a, b)))
}

fn custom_space(points: &[DVec3], lines: &[(DVec3, DVec3)], tris: &[(DVec3, DVec3)]) -> Built {
    let plane = |space: Space| SnapHelper::Plane {
        space,
        size: DEFAULT_PLANE_SIZE,
    };
    let built = match (points, lines, tris) {
        ([p], [], []) => Ok(plane(Space::from_origin(*p))),
        ([p], [(a, b)], []) => Space::from_origin_normal(*p, *b - *a)
            .map(plane)
            .map_err(|_| degenerate("line has no length")),
        ([a, b], [], []) if a.distance(*b) < EPSILON => Err(degenerate("points coincide")),
        ([a, b], [], []) => Ok(SnapHelper::Line { a: *a, b: *b }),
        ([a, b, c], [], []) => {
            if (*b - *a).cross(*c - *a).length() < EPSILON {
                Err(degenerate("points are collinear"))
            } else {
                pivot_from_three_points(&Space::WORLD, *a, Some(*b), Some(*c))
                    .map(|space| SnapHelper::Plane {
                        space,
                        size: a.distance(*b).max(a.distance(*c)),
                    })
                    .map_err(|_| degenerate("points are collinear"))
            }
        }
        ([], [], [(p, n)]) => Space::from_origin_normal(*p, *n)
            .map(plane)
            .map_err(|_| degenerate("face has no normal")),
        _ => return None,
    };
    Some(built)
}

fn average(coords: impl Iterator<Item = DVec3>) -> Built {
    let coords: SmallVec<[DVec3; MAX_SELECTED]> = coords.collect();
    centroid(&coords).map(|coord| Ok(SnapHelper::Point { coord }))
}
