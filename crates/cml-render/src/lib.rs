//! Renders a rain-rate grid to PNG (C7): a fixed 15-interval color
//! scale applied per cell, encoded as an indexed PNG when the band
//! count allows it.

pub mod png;
pub mod raw;
pub mod style;

pub use style::PrecomputedPalette;

/// Renders a row-major `height x width` grid to PNG bytes using the
/// fixed rain scale. NaN and sub-threshold cells render transparent.
pub fn render_rain_grid(values: &[f64], width: usize, height: usize) -> Result<Vec<u8>, String> {
    let palette = PrecomputedPalette::rain_scale();
    let indices = palette.indices_for_grid(values);
    png::create_png_from_precomputed(&indices, width, height, &palette)
}
