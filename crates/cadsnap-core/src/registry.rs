//! Per-pass snap candidate registry and tie-break.

use std::cmp::Ordering;

use crate::errors::RegistryError;
use crate::item::SnapItem;

/// Ordering policy used to choose the winning candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// `(type priority, pixel distance, view depth)`.
    #[default]
    ScreenDistance,
    /// `(type priority, ray depth, pixel distance, view depth)`: nearer ray hits
    /// win regardless of screen distance. Used when editing a mesh in x-ray.
    RayDepth,
}

impl TieBreak {
    /// Policy for the current mode.
    pub fn for_mode(edit_mode: bool, xray: bool) -> Self {
        if edit_mode && xray {
            TieBreak::RayDepth
        } else {
            TieBreak::ScreenDistance
        }
    }

    pub fn compare(self, a: &SnapItem, b: &SnapItem) -> Ordering {
        let by_type = a.type_priority().cmp(&b.type_priority());
        let by_screen = || {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.view_depth.total_cmp(&b.view_depth))
        };
        match self {
            TieBreak::ScreenDistance => by_type.then_with(by_screen),
            TieBreak::RayDepth => by_type
                .then_with(|| a.ray_depth.cmp(&b.ray_depth))
                .then_with(by_screen),
        }
    }
}

/// Candidates collected during one detection pass.
#[derive(Debug, Clone, Default)]
pub struct SnapItems {
    items: Vec<SnapItem>,
}

impl SnapItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Append a candidate. Always succeeds.
    pub fn add(&mut self, item: SnapItem) -> bool {
        self.items.push(item);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SnapItem> {
        self.items.iter()
    }

    /// Sort by `tie_break`, return the best candidate and clear the registry.
    ///
    /// The sort is stable, so equal keys keep insertion order.
    pub fn pick_best(&mut self, tie_break: TieBreak) -> Result<SnapItem, RegistryError> {
        if self.items.is_empty() {
            return Err(RegistryError::Empty);
        }
        self.items.sort_by(|a, b| tie_break.compare(a, b));
        let best = self.items.swap_remove(0);
        self.items.clear();
        Ok(best)
    }
}

impl Extend<SnapItem> for SnapItems {
    fn extend<T: IntoIterator<Item = SnapItem>>(&mut self, iter: T) {
        self.items.extend(iter);
    }
}
