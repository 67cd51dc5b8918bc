//! Configuration options for the GeoPack writer.

/// Configuration options for a write run.
#[derive(Debug, Clone)]
pub struct Options {
    /// Bit shift applied to map geometry coordinates before delta
    /// encoding. Larger values trade precision for size.
    /// Default: 5
    pub map_coord_shift: u8,

    /// Bit shift applied to routing geometry coordinates.
    /// Default: 4
    pub route_coord_shift: u8,

    /// Number of low bits masked off the left/top edges of map boxes so
    /// sibling deltas repeat. Right/bottom edges stay exact; masking only
    /// grows a box.
    /// Default: 5
    pub grid_align_bits: u8,

    /// Maximum perpendicular deviation, in tile units, allowed when
    /// thinning geometry points at write time.
    /// Default: 31
    pub thinning_threshold: u32,

    /// Thinning applies only to levels whose maximum zoom is at or below
    /// this gate; detail levels are written untouched.
    /// Default: 15
    pub thin_below_zoom: u8,

    /// Minimum deviation, in tile units, between a natural label point
    /// and the geometry's running mean before the label point is worth
    /// storing explicitly.
    /// Default: 1024
    pub label_deadzone: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            map_coord_shift: 5,
            route_coord_shift: 4,
            grid_align_bits: 5,
            thinning_threshold: 31,
            thin_below_zoom: 15,
            label_deadzone: 1024,
        }
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the map coordinate shift.
    pub fn map_coord_shift(mut self, shift: u8) -> Self {
        self.map_coord_shift = shift;
        self
    }

    /// Sets the routing coordinate shift.
    pub fn route_coord_shift(mut self, shift: u8) -> Self {
        self.route_coord_shift = shift;
        self
    }

    /// Sets the grid alignment bit count for map boxes.
    pub fn grid_align_bits(mut self, bits: u8) -> Self {
        self.grid_align_bits = bits;
        self
    }

    /// Sets the geometry thinning threshold.
    pub fn thinning_threshold(mut self, threshold: u32) -> Self {
        self.thinning_threshold = threshold;
        self
    }

    /// Sets the zoom gate below which thinning applies.
    pub fn thin_below_zoom(mut self, zoom: u8) -> Self {
        self.thin_below_zoom = zoom;
        self
    }

    /// Sets the label point dead-zone.
    pub fn label_deadzone(mut self, deadzone: u32) -> Self {
        self.label_deadzone = deadzone;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.map_coord_shift >= 31 {
            return Err(crate::Error::invalid_argument("map_coord_shift must be < 31"));
        }
        if self.route_coord_shift >= 31 {
            return Err(crate::Error::invalid_argument("route_coord_shift must be < 31"));
        }
        if self.grid_align_bits >= 31 {
            return Err(crate::Error::invalid_argument("grid_align_bits must be < 31"));
        }
        Ok(())
    }
}
