//! Constraint resolution for cadsnap transforms.
//!
//! This crate implements:
//! - Axis and plane projection about a pivot frame
//! - Line-aware resolution (edge/axis intersection, ray/plane crossing)
//! - Radius-preserving resolution over faces during rotation
//! - Perpendicular and parallel rotation targets

mod resolver;

pub use resolver::{apply, constrain, rotation_axis};
