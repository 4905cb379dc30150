//! Geometry kernel for precision snapping.
//!
//! This crate provides:
//! - Stateless 3D queries (ray/plane, ray/box, line/line, line/triangle, nearest points)
//! - Safe orthonormal basis construction from under-constrained inputs
//! - 2D screen-space helpers
//! - Bounding boxes
//! - A camera [`View`] that projects points and builds cursor rays
//! - [`Space`], an always-orthonormal pivot frame
//!
//! Functions that can be undefined for some input return `None` rather than
//! producing NaN, so callers can choose a fallback every frame without caching.

mod bounds;
mod error;
pub mod geom2d;
pub mod geom3d;
mod space;
mod view;

pub use bounds::BoundingBox;
pub use error::GeomError;
pub use geom2d::ScreenRect;
pub use geom3d::{Axis, Ray, ANGLE_TOLERANCE, EPSILON, MAX_DISTANCE};
pub use space::Space;
pub use view::View;
