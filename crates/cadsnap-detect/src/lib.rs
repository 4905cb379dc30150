//! Snap detection for the cadsnap engine.
//!
//! Three engines contribute candidates to a shared [`SnapItems`] registry on
//! every cursor event:
//! - [`RayEngine`] casts rays against meshes under the vertex threshold
//! - [`RasterEngine`] decodes an index buffer for curves, points, heavy
//!   meshes, helpers and virtual targets (origins, bounds, cursor, median)
//! - [`GridEngine`] snaps to the nearest grid intersection
//!
//! [`Detector`] runs whichever engines the element mask enables and resolves
//! the tie-break.
//!
//! [`SnapItems`]: cadsnap_core::SnapItems

mod engine;
mod grid;
mod helpers;
pub mod raster;
mod ray;
mod scene;
mod software;
mod visibility;

pub use engine::{DetectContext, DetectionEngine, Detector};
pub use grid::{snap_to_grid, GridEngine};
pub use helpers::{HelperRegistry, SnapHelper};
pub use raster::{IndexImage, PickPrimitive, PickingBackend, Primitive, RasterEngine};
pub use ray::RayEngine;
pub use scene::{Detectable, Editable, Geometry, MeshData, Rasterizable, SceneQuery, StaticScene};
pub use software::SoftwareIndexRenderer;
pub use visibility::VisibilityCache;
