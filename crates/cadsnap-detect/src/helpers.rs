//! User-created snap helpers: points, lines and planes.

use glam::{DMat4, DVec3};
use indexmap::IndexMap;

use cadsnap_core::{HelperId, SnapElements, SnapTarget};
use cadsnap_geom::Space;

use crate::raster::{PickPrimitive, Primitive};
use crate::scene::{Editable, Rasterizable};

/// A construction entity the user can snap to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnapHelper {
    Point { coord: DVec3 },
    Line { a: DVec3, b: DVec3 },
    /// A square of half-size `size` in the XY plane of `space`.
    Plane { space: Space, size: f64 },
}

impl SnapHelper {
    /// Frame usable as a pivot or grid.
    pub fn space(&self) -> Space {
        match self {
            SnapHelper::Point { coord } => Space::from_origin(*coord),
            SnapHelper::Line { a, b } => Space::from_origin_normal(*a, *b - *a).unwrap_or(Space::from_origin(*a)),
            SnapHelper::Plane { space, .. } => *space,
        }
    }

    fn plane_corners(space: &Space, size: f64) -> [DVec3; 4] {
        [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
            .map(|(u, v)| space.to_world(DVec3::new(u * size, v * size, 0.0)))
    }
}

impl Editable for SnapHelper {
    fn handles(&self) -> Vec<DVec3> {
        match self {
            SnapHelper::Point { coord } => vec![*coord],
            SnapHelper::Line { a, b } => vec![*a, *b],
            SnapHelper::Plane { space, size } => {
                vec![space.origin(), space.to_world(DVec3::new(*size, 0.0, 0.0)), space.to_world(DVec3::new(0.0, *size, 0.0))]
            }
        }
    }

    fn transform_handle(&mut self, handle: Option<usize>, delta: &DMat4) {
        match (self, handle) {
            (SnapHelper::Point { coord }, _) => *coord = delta.transform_point3(*coord),
            (SnapHelper::Line { a, .. }, Some(0)) => *a = delta.transform_point3(*a),
            (SnapHelper::Line { b, .. }, Some(1)) => *b = delta.transform_point3(*b),
            (SnapHelper::Line { a, b }, _) => {
                *a = delta.transform_point3(*a);
                *b = delta.transform_point3(*b);
            }
            (SnapHelper::Plane { space, size }, Some(1 | 2)) => {
                let moved = delta.transform_point3(space.to_world(DVec3::new(*size, 0.0, 0.0)));
                let local = space.to_local(moved);
                *size = local.truncate().length().max(f64::EPSILON);
            }
            (SnapHelper::Plane { space, .. }, _) => *space = space.transformed(delta),
        }
    }
}

/// Live snap helpers keyed by id, in creation order.
#[derive(Debug, Clone, Default)]
pub struct HelperRegistry {
    helpers: IndexMap<HelperId, SnapHelper>,
    next_id: u64,
}

impl HelperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, helper: SnapHelper) -> HelperId {
        self.next_id += 1;
        let id = HelperId(self.next_id);
        self.helpers.insert(id, helper);
        tracing::debug!(%id, ?helper, "snap helper added");
        id
    }

    pub fn remove(&mut self, id: HelperId) -> Option<SnapHelper> {
        let removed = self.helpers.shift_remove(&id);
        if removed.is_some() {
            tracing::debug!(%id, "snap helper removed");
        }
        removed
    }

    pub fn get(&self, id: HelperId) -> Option<&SnapHelper> {
        self.helpers.get(&id)
    }

    pub fn get_mut(&mut self, id: HelperId) -> Option<&mut SnapHelper> {
        self.helpers.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (HelperId, &SnapHelper)> {
        self.helpers.iter().map(|(id, h)| (*id, h))
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }

    pub fn clear(&mut self) {
        self.helpers.clear();
    }
}

impl Rasterizable for HelperRegistry {
    fn pick_primitives(&self, _elements: SnapElements, out: &mut Vec<PickPrimitive>) {
        for (id, helper) in self.iter() {
            let target = SnapTarget::Helper(id);
            match helper {
                SnapHelper::Point { coord } => out.push(PickPrimitive::new(Primitive::Point(*coord), target)),
                SnapHelper::Line { a, b } => {
                    out.push(PickPrimitive::new(Primitive::Line(*a, *b), target));
                    out.push(PickPrimitive::new(Primitive::Point(*a), target));
                    out.push(PickPrimitive::new(Primitive::Point(*b), target));
                }
                SnapHelper::Plane { space, size } => {
                    let [c0, c1, c2, c3] = SnapHelper::plane_corners(space, *size);
                    out.push(PickPrimitive::new(Primitive::Tri([c0, c1, c2]), target));
                    out.push(PickPrimitive::new(Primitive::Tri([c0, c2, c3]), target));
                    out.push(PickPrimitive::new(Primitive::Point(space.origin()), target));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_ids_are_stable() {
        let mut reg = HelperRegistry::new();
        let a = reg.add(SnapHelper::Point { coord: DVec3::X });
        let b = reg.add(SnapHelper::Point { coord: DVec3::Y });
        assert_ne!(a, b);
        assert!(reg.remove(a).is_some());
        let c = reg.add(SnapHelper::Point { coord: DVec3::Z });
        assert_ne!(c, a);
        assert_eq!(reg.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![b, c]);
    }

    #[test]
    fn test_line_handle_moves_one_end() {
        let mut line = SnapHelper::Line { a: DVec3::ZERO, b: DVec3::X };
        line.transform_handle(Some(1), &DMat4::from_translation(DVec3::Y));
        assert_eq!(line, SnapHelper::Line { a: DVec3::ZERO, b: DVec3::new(1.0, 1.0, 0.0) });
        line.transform_handle(None, &DMat4::from_translation(DVec3::Z));
        assert_eq!(line.handles(), vec![DVec3::Z, DVec3::new(1.0, 1.0, 1.0)]);
    }

    #[test]
    fn test_plane_resize_handle() {
        let mut plane = SnapHelper::Plane { space: Space::WORLD, size: 1.0 };
        plane.transform_handle(Some(1), &DMat4::from_translation(DVec3::X));
        assert!(matches!(plane, SnapHelper::Plane { size, .. } if (size - 2.0).abs() < 1e-12));
    }

    #[test]
    fn test_registry_primitives_tagged() {
        let mut reg = HelperRegistry::new();
        let id = reg.add(SnapHelper::Line { a: DVec3::ZERO, b: DVec3::X });
        let mut out = Vec::new();
        reg.pick_primitives(SnapElements::HELPER, &mut out);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|p| p.target == SnapTarget::Helper(id)));
    }
}
