//! Deployment configuration for the external-wetness filter, mirroring the
//! `external_filter` section of the flat configuration (§6).

use std::time::Duration;

/// Geographic bounds of the upstream radar image, used to project a query
/// point to pixel coordinates (Y inverted, per §4.9).
#[derive(Debug, Clone, Copy)]
pub struct ImageBounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
    pub width_px: u32,
    pub height_px: u32,
}

impl ImageBounds {
    /// Project `(lon, lat)` to `(x, y)` pixel coordinates, Y inverted since
    /// image row 0 is the northern edge.
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let x = (lon - self.min_lon) / (self.max_lon - self.min_lon) * self.width_px as f64;
        let y = (1.0 - (lat - self.min_lat) / (self.max_lat - self.min_lat)) * self.height_px as f64;
        (x, y)
    }

    /// Kilometers per pixel along the image diagonal, used to convert a
    /// search radius in km to a pixel radius.
    pub fn km_per_pixel_diagonal(&self) -> f64 {
        let lon_span_km = cml_common::haversine_km(self.min_lat, self.min_lon, self.min_lat, self.max_lon);
        let lat_span_km = cml_common::haversine_km(self.min_lat, self.min_lon, self.max_lat, self.min_lon);
        let diagonal_km = (lon_span_km.powi(2) + lat_span_km.powi(2)).sqrt();
        let diagonal_px = ((self.width_px as f64).powi(2) + (self.height_px as f64).powi(2)).sqrt();
        diagonal_km / diagonal_px
    }
}

#[derive(Debug, Clone)]
pub struct ExternalFilterSettings {
    /// Base URL the upstream image is fetched from; the 10-minute-snapped
    /// timestamp and `file_prefix` are interpolated into the final request
    /// URL by the caller.
    pub url: String,
    pub file_prefix: String,
    pub image_bounds: ImageBounds,
    /// Minimum labelled-component size (pixels) to count as "wet".
    pub pixel_threshold: u32,
    /// Returned when the upstream image cannot be fetched or decoded.
    pub default_return: bool,
    /// Maximum number of 10-minute backward steps to retry on HTTP
    /// failure when historical lookups are allowed.
    pub max_history_lookups: u32,
    pub cache_dir: std::path::PathBuf,
    pub request_timeout: Duration,
    /// Fixed palette indices (besides the transparent index) excluded from
    /// wetness labelling: text overlays and "unknown area" fill colors.
    pub excluded_colors: Vec<[u8; 4]>,
}
