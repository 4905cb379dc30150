//! Geometry contract violations.

use thiserror::Error;

use crate::geom3d::Axis;

/// Errors that indicate a caller bug rather than a degenerate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeomError {
    #[error("Cannot build a basis from a zero-length direction")]
    ZeroLengthDirection,

    #[error("Main and guide axis must differ (both are {axis:?})")]
    SameAxis { axis: Axis },

    #[error("No usable guide direction for the requested basis")]
    DegenerateGuide,
}
