//! Snapping preferences.

/// Unit system, which also selects the grid subdivision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnitSystem {
    None,
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    /// Grid subdivisions per main unit.
    pub fn grid_subdivisions(self) -> u32 {
        match self {
            UnitSystem::Imperial => 12,
            UnitSystem::None | UnitSystem::Metric => 10,
        }
    }
}

/// User preferences consumed by detection and the session.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SnapSettings {
    /// Snap radius in pixels (compared squared).
    pub snap_radius: f64,
    /// Meshes with more vertices are left to the raster engine.
    pub max_vertex_count: usize,
    pub xray: bool,
    /// Walk every ray hit even without x-ray.
    pub deep_detection: bool,
    pub max_ray_depth: u32,
    /// Extra rays sampled on the snap-radius circle.
    pub extra_rays: usize,
    /// Fraction window in which an edge snaps to its center.
    pub edge_center_range: (f64, f64),
    pub unit_system: UnitSystem,
    /// Size of one main grid unit.
    pub grid_scale: f64,
    /// Grid steps smaller than this on screen are coarsened.
    pub grid_min_pixels: f64,
    /// Raster pick size for points, in pixels.
    pub point_size: u32,
    /// Raster pick width for lines, in pixels.
    pub line_width: u32,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            snap_radius: 12.0,
            max_vertex_count: 100_000,
            xray: false,
            deep_detection: false,
            max_ray_depth: 100,
            extra_rays: 6,
            edge_center_range: (0.25, 0.75),
            unit_system: UnitSystem::Metric,
            grid_scale: 1.0,
            grid_min_pixels: 8.0,
            point_size: 5,
            line_width: 3,
        }
    }
}

impl SnapSettings {
    pub fn snap_radius_sq(&self) -> f64 {
        self.snap_radius * self.snap_radius
    }

    /// Whether the ray engine keeps more than the closest hit.
    pub fn multi_hit(&self) -> bool {
        self.xray || self.deep_detection
    }

    pub fn in_edge_center_range(&self, fraction: f64) -> bool {
        let (lo, hi) = self.edge_center_range;
        fraction >= lo && fraction <= hi
    }
}
