//! Core types for the precision snapping engine.
//!
//! This crate provides the foundational types used across all other cadsnap crates:
//! - Bit-flag newtypes for snap elements, item kinds, transform kinds and constraints
//! - [`SnapItem`] candidates and the per-frame [`SnapItems`] registry with its tie-break
//! - [`TransformAction`], the mutable state of one modal operation
//! - [`SnapSettings`] preferences
//! - The numeric keyboard entry parser
//! - Error types

pub mod action;
pub mod errors;
pub mod flags;
pub mod input;
pub mod item;
pub mod registry;
pub mod settings;
pub mod types;

pub use action::{AngleRounding, TransformAction};
pub use errors::*;
pub use flags::{ConstraintFlags, SnapElements, SnapItemKind, TransformKind};
pub use input::{parse_quantity, NumericEntry, Quantity, QuantityKind};
pub use item::SnapItem;
pub use registry::{SnapItems, TieBreak};
pub use settings::{SnapSettings, UnitSystem};
pub use types::{HelperId, ObjectId, SnapTarget, TargetKind};

pub use cadsnap_geom as geom;
