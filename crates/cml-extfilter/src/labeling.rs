//! Palette exclusion, connected-component labelling, and the circular
//! search-disk wetness test over a decoded radar image (§4.9 step 2).

use std::collections::{HashMap, HashSet};

use image::{DynamicImage, GenericImageView, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::config::ImageBounds;

/// Convert a search radius in km to a pixel radius, using the image's
/// diagonal km-per-pixel scale.
pub fn radius_px(radius_km: f64, bounds: &ImageBounds) -> f64 {
    radius_km / bounds.km_per_pixel_diagonal()
}

/// True if any connected component overlapping the disk of `radius_px`
/// pixels centered at `(x, y)` has at least `pixel_threshold` pixels,
/// after excluding transparent pixels and the fixed "text"/"unknown-area"
/// palette colors.
pub fn is_wet_at(image: &DynamicImage, excluded: &[[u8; 4]], x: f64, y: f64, radius_px: f64, pixel_threshold: u32) -> bool {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return false;
    }

    let mut mask = image::GrayImage::new(width, height);
    for (px, py, pixel) in rgba.enumerate_pixels() {
        let is_excluded = pixel[3] == 0 || excluded.iter().any(|c| c == &pixel.0);
        mask.put_pixel(px, py, Luma([if is_excluded { 0 } else { 255 }]));
    }

    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    let mut sizes: HashMap<u32, u32> = HashMap::new();
    for Luma([label]) in labels.pixels() {
        if *label != 0 {
            *sizes.entry(*label).or_insert(0) += 1;
        }
    }

    let radius_sq = radius_px * radius_px;
    let x0 = (x - radius_px).floor().max(0.0) as u32;
    let x1 = ((x + radius_px).ceil().min(width as f64 - 1.0)).max(0.0) as u32;
    let y0 = (y - radius_px).floor().max(0.0) as u32;
    let y1 = ((y + radius_px).ceil().min(height as f64 - 1.0)).max(0.0) as u32;

    let mut seen = HashSet::new();
    for py in y0..=y1 {
        for px in x0..=x1 {
            let dx = px as f64 - x;
            let dy = py as f64 - y;
            if dx * dx + dy * dy > radius_sq {
                continue;
            }
            let label = labels.get_pixel(px, py).0[0];
            if label != 0 && seen.insert(label) && sizes.get(&label).copied().unwrap_or(0) >= pixel_threshold {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid_block(width: u32, height: u32, block: (u32, u32, u32, u32), color: Rgba<u8>) -> DynamicImage {
        let mut img = RgbaImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let in_block = x >= block.0 && x < block.0 + block.2 && y >= block.1 && y < block.1 + block.3;
                img.put_pixel(x, y, if in_block { color } else { Rgba([0, 0, 0, 0]) });
            }
        }
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn large_component_inside_disk_is_wet() {
        let image = solid_block(50, 50, (10, 10, 20, 20), Rgba([0, 0, 255, 255]));
        assert!(is_wet_at(&image, &[], 20.0, 20.0, 15.0, 50));
    }

    #[test]
    fn small_component_below_threshold_is_not_wet() {
        let image = solid_block(50, 50, (10, 10, 2, 2), Rgba([0, 0, 255, 255]));
        assert!(!is_wet_at(&image, &[], 11.0, 11.0, 5.0, 50));
    }

    #[test]
    fn component_outside_disk_is_not_wet() {
        let image = solid_block(50, 50, (40, 40, 8, 8), Rgba([0, 0, 255, 255]));
        assert!(!is_wet_at(&image, &[], 5.0, 5.0, 3.0, 4));
    }

    #[test]
    fn excluded_color_is_ignored() {
        let color = Rgba([255, 255, 255, 255]);
        let image = solid_block(50, 50, (10, 10, 20, 20), color);
        assert!(!is_wet_at(&image, &[color.0], 20.0, 20.0, 15.0, 50));
    }
}
