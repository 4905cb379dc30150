//! Scene geometry proxies and the scene query contract.

use glam::{DMat4, DVec3};
use indexmap::IndexSet;
use smallvec::SmallVec;

use cadsnap_core::{ObjectId, SnapElements, SnapTarget};
use cadsnap_geom::{BoundingBox, Space, View};

use crate::raster::{PickPrimitive, Primitive};

/// Polygon mesh in object-local coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<DVec3>,
    pub edges: Vec<[u32; 2]>,
    pub faces: Vec<SmallVec<[u32; 4]>>,
}

impl MeshData {
    /// Build from polygons; the edge list is derived from the face loops.
    pub fn new(vertices: Vec<DVec3>, faces: Vec<Vec<u32>>) -> Self {
        let mut edges = IndexSet::new();
        for face in &faces {
            for i in 0..face.len() {
                let a = face[i];
                let b = face[(i + 1) % face.len()];
                if a != b {
                    edges.insert([a.min(b), a.max(b)]);
                }
            }
        }
        Self {
            vertices,
            edges: edges.into_iter().collect(),
            faces: faces.into_iter().map(SmallVec::from_vec).collect(),
        }
    }

    /// Axis-aligned cube of edge length `size` centered at the origin.
    pub fn cube(size: f64) -> Self {
        let h = size / 2.0;
        let vertices = (0..8)
            .map(|i| {
                DVec3::new(
                    if i & 1 == 0 { -h } else { h },
                    if i & 2 == 0 { -h } else { h },
                    if i & 4 == 0 { -h } else { h },
                )
            })
            .collect();
        let faces = vec![
            vec![0, 2, 3, 1], // -Z
            vec![4, 5, 7, 6], // +Z
            vec![0, 1, 5, 4], // -Y
            vec![2, 6, 7, 3], // +Y
            vec![0, 4, 6, 2], // -X
            vec![1, 3, 7, 5], // +X
        ];
        Self::new(vertices, faces)
    }

    /// Local corner positions of a face.
    pub fn face_corners(&self, face: usize) -> impl Iterator<Item = DVec3> + '_ {
        self.faces
            .get(face)
            .into_iter()
            .flat_map(|f| f.iter())
            .filter_map(|&i| self.vertices.get(i as usize).copied())
    }

    /// Fan triangulation of every face, tagged with the face index.
    pub fn triangles(&self) -> impl Iterator<Item = (usize, [DVec3; 3])> + '_ {
        self.faces.iter().enumerate().flat_map(move |(fi, face)| {
            (1..face.len().saturating_sub(1)).filter_map(move |k| {
                let a = *self.vertices.get(face[0] as usize)?;
                let b = *self.vertices.get(face[k] as usize)?;
                let c = *self.vertices.get(face[k + 1] as usize)?;
                Some((fi, [a, b, c]))
            })
        })
    }
}

/// Geometry carried by a detectable.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Points(Vec<DVec3>),
    /// Curves and wire geometry.
    Lines {
        vertices: Vec<DVec3>,
        edges: Vec<[u32; 2]>,
    },
    Mesh(MeshData),
}

impl Geometry {
    pub fn vertices(&self) -> &[DVec3] {
        match self {
            Geometry::Points(v) => v,
            Geometry::Lines { vertices, .. } => vertices,
            Geometry::Mesh(mesh) => &mesh.vertices,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices().len()
    }

    pub fn edges(&self) -> &[[u32; 2]] {
        match self {
            Geometry::Points(_) => &[],
            Geometry::Lines { edges, .. } => edges,
            Geometry::Mesh(mesh) => &mesh.edges,
        }
    }

    pub fn as_mesh(&self) -> Option<&MeshData> {
        match self {
            Geometry::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

/// A scene object registered with the detection engines.
#[derive(Debug, Clone, PartialEq)]
pub struct Detectable {
    pub id: ObjectId,
    pub matrix: DMat4,
    pub geometry: Geometry,
    /// Snap elements this object responds to.
    pub elements: SnapElements,
    bounds: BoundingBox,
}

impl Detectable {
    pub fn new(id: ObjectId, matrix: DMat4, geometry: Geometry) -> Self {
        let bounds = BoundingBox::from_points(geometry.vertices().iter().copied())
            .unwrap_or(BoundingBox::new(DVec3::ZERO, DVec3::ZERO));
        Self {
            id,
            matrix,
            geometry,
            elements: SnapElements::ALL,
            bounds,
        }
    }

    pub fn with_elements(mut self, elements: SnapElements) -> Self {
        self.elements = elements;
        self
    }

    pub fn local_bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Bounding-box corners in world space.
    pub fn world_corners(&self) -> [DVec3; 8] {
        self.bounds.corners().map(|c| self.matrix.transform_point3(c))
    }

    pub fn origin(&self) -> DVec3 {
        self.matrix.w_axis.truncate()
    }

    pub fn world_vertex(&self, index: u32) -> Option<DVec3> {
        self.geometry
            .vertices()
            .get(index as usize)
            .map(|v| self.matrix.transform_point3(*v))
    }

    /// Whether the ray engine handles this object.
    pub fn is_raycastable(&self, max_vertex_count: usize) -> bool {
        matches!(self.geometry, Geometry::Mesh(_)) && self.geometry.vertex_count() <= max_vertex_count
    }
}

/// Something the raster engine can draw into the index buffer.
pub trait Rasterizable {
    fn pick_primitives(&self, elements: SnapElements, out: &mut Vec<PickPrimitive>);
}

/// Something with on-screen handles that can be dragged.
pub trait Editable {
    fn handles(&self) -> Vec<DVec3>;

    /// Move one handle, or the whole thing when `handle` is `None`.
    fn transform_handle(&mut self, handle: Option<usize>, delta: &DMat4);
}

impl Rasterizable for Detectable {
    fn pick_primitives(&self, elements: SnapElements, out: &mut Vec<PickPrimitive>) {
        let elements = elements & self.elements;
        let target = SnapTarget::Object(self.id);
        let world: Vec<DVec3> = self
            .geometry
            .vertices()
            .iter()
            .map(|v| self.matrix.transform_point3(*v))
            .collect();

        if let Some(mesh) = self.geometry.as_mesh() {
            if elements.intersects(SnapElements::FACE | SnapElements::FACE_CENTER) {
                for (_, tri) in mesh.triangles() {
                    let tri = tri.map(|c| self.matrix.transform_point3(c));
                    out.push(PickPrimitive::new(Primitive::Tri(tri), target));
                }
            }
        }

        if elements.intersects(SnapElements::EDGE | SnapElements::EDGE_CENTER) {
            for [a, b] in self.geometry.edges() {
                if let (Some(a), Some(b)) = (world.get(*a as usize), world.get(*b as usize)) {
                    out.push(PickPrimitive::new(Primitive::Line(*a, *b), target));
                }
            }
        }

        if elements.has(SnapElements::VERT) {
            out.extend(world.iter().map(|p| PickPrimitive::new(Primitive::Point(*p), target)));
        }
    }
}

/// Read access to the scene, provided by the host.
pub trait SceneQuery {
    /// Visible candidate geometry.
    fn detectables(&self) -> &[Detectable];

    /// The current camera.
    fn view(&self) -> &View;

    fn cursor(&self) -> Option<DVec3> {
        None
    }

    fn selection_median(&self) -> Option<DVec3> {
        None
    }

    /// The active grid frame; its XY plane is the grid plane.
    fn grid(&self) -> Space {
        Space::WORLD
    }
}

/// An in-memory scene, useful for hosts that snapshot their state per event.
#[derive(Debug, Clone)]
pub struct StaticScene {
    pub objects: Vec<Detectable>,
    pub view: View,
    pub cursor: Option<DVec3>,
    pub median: Option<DVec3>,
    pub grid: Space,
}

impl StaticScene {
    pub fn new(view: View) -> Self {
        Self {
            objects: Vec::new(),
            view,
            cursor: None,
            median: None,
            grid: Space::WORLD,
        }
    }

    pub fn with_object(mut self, object: Detectable) -> Self {
        self.objects.push(object);
        self
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut Detectable> {
        self.objects.iter_mut().find(|o| o.id == id)
    }
}

impl SceneQuery for StaticScene {
    fn detectables(&self) -> &[Detectable] {
        &self.objects
    }

    fn view(&self) -> &View {
        &self.view
    }

    fn cursor(&self) -> Option<DVec3> {
        self.cursor
    }

    fn selection_median(&self) -> Option<DVec3> {
        self.median
    }

    fn grid(&self) -> Space {
        self.grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_topology() {
        let cube = MeshData::cube(2.0);
        assert_eq!(cube.vertices.len(), 8);
        assert_eq!(cube.edges.len(), 12);
        assert_eq!(cube.faces.len(), 6);
        assert_eq!(cube.triangles().count(), 12);
    }

    #[test]
    fn test_routing_by_vertex_count() {
        let cube = Detectable::new(ObjectId(1), DMat4::IDENTITY, Geometry::Mesh(MeshData::cube(1.0)));
        assert!(cube.is_raycastable(100));
        assert!(!cube.is_raycastable(4));
        let curve = Detectable::new(
            ObjectId(2),
            DMat4::IDENTITY,
            Geometry::Lines {
                vertices: vec![DVec3::ZERO, DVec3::X],
                edges: vec![[0, 1]],
            },
        );
        assert!(!curve.is_raycastable(100));
    }

    #[test]
    fn test_pick_primitives_respect_elements() {
        let cube = Detectable::new(ObjectId(1), DMat4::IDENTITY, Geometry::Mesh(MeshData::cube(1.0)));
        let mut out = Vec::new();
        cube.pick_primitives(SnapElements::VERT, &mut out);
        assert_eq!(out.len(), 8);
        out.clear();
        cube.pick_primitives(SnapElements::VERT | SnapElements::EDGE | SnapElements::FACE, &mut out);
        assert_eq!(out.len(), 8 + 12 + 12);
    }

    #[test]
    fn test_world_corners_follow_matrix() {
        let cube = Detectable::new(
            ObjectId(1),
            DMat4::from_translation(DVec3::new(10.0, 0.0, 0.0)),
            Geometry::Mesh(MeshData::cube(2.0)),
        );
        assert_eq!(cube.world_corners()[0], DVec3::new(9.0, -1.0, -1.0));
        assert_eq!(cube.origin(), DVec3::new(10.0, 0.0, 0.0));
    }
}
