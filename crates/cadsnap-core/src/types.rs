//! Identifiers for the scene entities that produce snap candidates.

use std::fmt;

/// Identifier of a scene object, assigned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectId(pub u64);

/// Identifier of a user-created snap helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HelperId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

impl fmt::Display for HelperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "helper#{}", self.0)
    }
}

/// The scene entity a snap candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SnapTarget {
    #[default]
    None,
    /// Real geometry of an object.
    Object(ObjectId),
    /// An object's origin.
    Origin(ObjectId),
    /// A corner of an object's bounding box.
    Bounds(ObjectId),
    Helper(HelperId),
    Grid,
    Cursor,
    /// Median of the selection.
    Median,
}

/// Discriminant of [`SnapTarget`] without the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    None,
    Object,
    Origin,
    Bounds,
    Helper,
    Grid,
    Cursor,
    Median,
}

impl SnapTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            SnapTarget::None => TargetKind::None,
            SnapTarget::Object(_) => TargetKind::Object,
            SnapTarget::Origin(_) => TargetKind::Origin,
            SnapTarget::Bounds(_) => TargetKind::Bounds,
            SnapTarget::Helper(_) => TargetKind::Helper,
            SnapTarget::Grid => TargetKind::Grid,
            SnapTarget::Cursor => TargetKind::Cursor,
            SnapTarget::Median => TargetKind::Median,
        }
    }

    /// The scene object behind this target, if any.
    pub fn object(&self) -> Option<ObjectId> {
        match self {
            SnapTarget::Object(id) | SnapTarget::Origin(id) | SnapTarget::Bounds(id) => Some(*id),
            _ => None,
        }
    }
}
