//! Pager neighborhood: grid extents, bounds and the desired cell set.

use glam::{IVec3, Vec3};

use crate::chunk::Location;
use crate::config::{validate_grid_size, WorldConfig};
use crate::error::ConfigError;

/// Shape of the neighborhood a [`Pager`](crate::Pager) keeps attached.
///
/// ```
/// use glam::Vec3;
/// use voxel_pager::{Location, PagerConfig};
///
/// let config = PagerConfig::new([3, 1, 3], Vec3::splat(16.0)).unwrap();
/// let cells = config.desired_cells(Location::ZERO);
/// assert_eq!(cells.len(), 9);
/// assert_eq!(cells[0], Location::ZERO); // nearest first
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct PagerConfig {
    grid_size: [u32; 3],
    page_size: Vec3,
    lower: Option<Location>,
    upper: Option<Location>,
    evict_on_detach: bool,
}

impl PagerConfig {
    /// Neighborhood of `grid_size` cells (odd on every axis), each cell
    /// spanning `page_size` world units.
    pub fn new(grid_size: [u32; 3], page_size: Vec3) -> Result<Self, ConfigError> {
        validate_grid_size(grid_size)?;
        for scale in page_size.to_array() {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(ConfigError::InvalidBlockScale { scale });
            }
        }
        Ok(Self {
            grid_size,
            page_size,
            lower: None,
            upper: None,
            evict_on_detach: true,
        })
    }

    /// Grid size from the world config; page size is chunk dims times block scale.
    pub fn from_world(world: &WorldConfig) -> Self {
        Self {
            grid_size: world.grid_size(),
            page_size: world.page_size(),
            lower: None,
            upper: None,
            evict_on_detach: true,
        }
    }

    /// Clip the neighborhood to cells within `lower..=upper`.
    ///
    /// Either side may be open.
    pub fn with_bounds(
        mut self,
        lower: Option<Location>,
        upper: Option<Location>,
    ) -> Result<Self, ConfigError> {
        validate_bounds(lower, upper)?;
        self.lower = lower;
        self.upper = upper;
        Ok(self)
    }

    /// Whether detaching a page also evicts its chunk from the cache.
    pub fn with_evict_on_detach(mut self, evict: bool) -> Self {
        self.evict_on_detach = evict;
        self
    }

    pub fn grid_size(&self) -> [u32; 3] {
        self.grid_size
    }

    pub fn page_size(&self) -> Vec3 {
        self.page_size
    }

    pub fn bounds(&self) -> (Option<Location>, Option<Location>) {
        (self.lower, self.upper)
    }

    pub fn evict_on_detach(&self) -> bool {
        self.evict_on_detach
    }

    pub(crate) fn set_bounds(
        &mut self,
        lower: Option<Location>,
        upper: Option<Location>,
    ) -> Result<(), ConfigError> {
        validate_bounds(lower, upper)?;
        self.lower = lower;
        self.upper = upper;
        Ok(())
    }

    /// Cells from the center to the edge of the grid on each axis.
    pub fn half_extent(&self) -> IVec3 {
        IVec3::new(
            ((self.grid_size[0] - 1) / 2) as i32,
            ((self.grid_size[1] - 1) / 2) as i32,
            ((self.grid_size[2] - 1) / 2) as i32,
        )
    }

    /// Cell containing a world-space focus point.
    pub fn center_for(&self, focus: Vec3) -> Location {
        Location::from_world(focus, self.page_size)
    }

    /// Whether a cell passes the bounds.
    pub fn in_bounds(&self, cell: Location) -> bool {
        let above_lower = self
            .lower
            .map_or(true, |l| cell.x >= l.x && cell.y >= l.y && cell.z >= l.z);
        let below_upper = self
            .upper
            .map_or(true, |u| cell.x <= u.x && cell.y <= u.y && cell.z <= u.z);
        above_lower && below_upper
    }

    /// The clipped cube around `center`, nearest cells first.
    pub fn desired_cells(&self, center: Location) -> Vec<Location> {
        let half = self.half_extent();
        let mut cells = Vec::with_capacity(self.grid_size.iter().map(|&n| n as usize).product());
        for dy in -half.y..=half.y {
            for dz in -half.z..=half.z {
                for dx in -half.x..=half.x {
                    let cell = center.offset(dx, dy, dz);
                    if self.in_bounds(cell) {
                        cells.push(cell);
                    }
                }
            }
        }
        cells.sort_by_key(|&cell| (center.distance_squared(cell), cell));
        cells
    }
}

fn validate_bounds(lower: Option<Location>, upper: Option<Location>) -> Result<(), ConfigError> {
    if let (Some(lower), Some(upper)) = (lower, upper) {
        if lower.x > upper.x || lower.y > upper.y || lower.z > upper.z {
            return Err(ConfigError::InvalidBounds { lower, upper });
        }
    }
    Ok(())
}
