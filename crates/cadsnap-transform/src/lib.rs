//! Modal transforms driven by snapping.
//!
//! - [`compute_delta`] turns a [`TransformAction`] into a world-space [`Delta`]
//! - [`transition`] is the modal state machine as a lookup table
//! - [`Sequence`] steps through the three-click `BY_3_POINTS` alignment
//! - [`copy_deltas`] splits a transform into evenly spaced copies
//! - [`SnapContext`] builds snap helpers from selected snap items
//! - [`SnappingSession`] ties detection, constraints and deltas together per
//!   host event, and [`TransformOperator`] keeps it to one at a time
//!
//! [`TransformAction`]: cadsnap_core::TransformAction

mod context;
mod copies;
mod delta;
mod machine;
mod operator;
mod sequence;
mod session;
mod target;

pub use context::{ContextOperation, SnapContext, MAX_SELECTED};
pub use copies::copy_deltas;
pub use delta::{compute_delta, resolved_target, Delta};
pub use machine::{transition, Command, Flow, Input, Phase, Transition};
pub use operator::TransformOperator;
pub use sequence::{pivot_from_three_points, Sequence, BY_3_POINTS_STEPS};
pub use session::{KeyInput, SessionEvent, SnappingSession};
pub use target::{EditTarget, SceneWriter};
