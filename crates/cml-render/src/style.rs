//! The fixed rain-intensity color scale used to render a grid to a PNG
//! (§4.7, §6 "PNG palette").
//!
//! The scale has 15 piecewise intervals: NaN and values below 0.1 mm/h
//! are fully transparent, and the remaining range is split into 14
//! color bands. Band boundaries are derived from the Marshall-Palmer
//! Z-R relationship (`Z = 200 R^1.6`, `dBZ = 10 log10 Z`) sampled every
//! 4 dBZ from 4 to 56 dBZ, the same derivation CHMI-style radar scales
//! use to key rain-rate bands to reflectivity.

/// `dBZ` samples the band boundaries are keyed on.
const DBZ_STEPS: [f64; 14] = [4.0, 8.0, 12.0, 16.0, 20.0, 24.0, 28.0, 32.0, 36.0, 40.0, 44.0, 48.0, 52.0, 56.0];

/// Marshall-Palmer `Z = 200 R^1.6` inverted to give `R` (mm/h) from `dBZ`.
fn marshall_palmer_rain_rate(dbz: f64) -> f64 {
    let z = 10f64.powf(dbz / 10.0);
    (z / 200.0).powf(1.0 / 1.6)
}

/// The 14 color bands, light blue through magenta, matching the visual
/// register of a typical precipitation-intensity radar legend.
const BAND_COLORS: [(u8, u8, u8, u8); 14] = [
    (173, 216, 230, 255),
    (120, 190, 230, 255),
    (80, 170, 220, 255),
    (60, 190, 170, 255),
    (70, 200, 100, 255),
    (130, 210, 60, 255),
    (190, 220, 50, 255),
    (230, 210, 40, 255),
    (240, 170, 30, 255),
    (235, 120, 25, 255),
    (220, 70, 30, 255),
    (200, 30, 40, 255),
    (160, 20, 80, 255),
    (120, 10, 120, 255),
];

/// Below this rain rate (mm/h), a cell renders fully transparent.
pub const TRANSPARENT_BELOW_MM_H: f64 = 0.1;

/// A pre-computed RGBA palette: index 0 is transparent, indices 1..=14
/// are the color bands in ascending rain-rate order.
#[derive(Debug, Clone)]
pub struct PrecomputedPalette {
    pub colors: Vec<(u8, u8, u8, u8)>,
    /// Ascending rain-rate (mm/h) upper edge of each color band, length 14.
    boundaries: Vec<f64>,
}

impl PrecomputedPalette {
    /// Builds the fixed rain-scale palette. There is nothing to
    /// configure: the scale is bit-exact per the design notes.
    pub fn rain_scale() -> Self {
        let mut colors = Vec::with_capacity(15);
        colors.push((0, 0, 0, 0));
        colors.extend_from_slice(&BAND_COLORS);
        let boundaries = DBZ_STEPS.iter().map(|dbz| marshall_palmer_rain_rate(*dbz)).collect();
        Self { colors, boundaries }
    }

    /// Maps a single rain-rate value (mm/h, possibly NaN) to a palette
    /// index. Values at or above the final boundary clamp to the last
    /// color band rather than overflowing.
    pub fn index_for(&self, value: f64) -> u8 {
        if value.is_nan() || value < TRANSPARENT_BELOW_MM_H {
            return 0;
        }
        for (i, edge) in self.boundaries.iter().enumerate() {
            if value < *edge {
                return (i + 1) as u8;
            }
        }
        self.boundaries.len() as u8
    }

    /// Maps a full row-major grid to palette indices, one byte per cell.
    pub fn indices_for_grid(&self, values: &[f64]) -> Vec<u8> {
        values.iter().map(|v| self.index_for(*v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_threshold_values_are_transparent() {
        let palette = PrecomputedPalette::rain_scale();
        assert_eq!(palette.index_for(0.0), 0);
        assert_eq!(palette.index_for(f64::NAN), 0);
        assert_eq!(palette.colors[0].3, 0);
    }

    #[test]
    fn index_increases_monotonically_with_rain_rate() {
        let palette = PrecomputedPalette::rain_scale();
        let low = palette.index_for(1.0);
        let high = palette.index_for(80.0);
        assert!(high >= low);
    }

    #[test]
    fn extreme_values_clamp_to_last_band() {
        let palette = PrecomputedPalette::rain_scale();
        assert_eq!(palette.index_for(10_000.0), 14);
    }

    #[test]
    fn palette_has_fifteen_entries() {
        let palette = PrecomputedPalette::rain_scale();
        assert_eq!(palette.colors.len(), 15);
    }
}
