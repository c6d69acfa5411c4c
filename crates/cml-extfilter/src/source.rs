//! Ties the disk cache, image decode, and connected-component labelling
//! together behind the [`ExternalWetness`] trait the rain-rate pipeline
//! depends on.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use cml_common::external::WetnessQuery;
use cml_common::time::{snap_10min_floor, step_back_10min};
use cml_common::{CmlResult, ExternalWetness};

use crate::cache::ImageCache;
use crate::config::ExternalFilterSettings;
use crate::labeling;

pub struct RadarWetnessSource {
    cache: ImageCache,
    settings: ExternalFilterSettings,
}

impl RadarWetnessSource {
    pub fn new(cache: ImageCache, settings: ExternalFilterSettings) -> Self {
        Self { cache, settings }
    }

    fn url_for(&self, timestamp: DateTime<Utc>) -> String {
        format!("{}/{}{}.png", self.settings.url, self.settings.file_prefix, timestamp.format("%Y%m%d%H%M"))
    }

    /// One 10-minute frame's wetness at `(lat, lon)`, backing off to
    /// earlier frames on fetch failure when `allow_history` permits it,
    /// up to `max_history_lookups` attempts; falls back to
    /// `default_return` once exhausted.
    async fn single_frame_wet(&self, timestamp: DateTime<Utc>, lat: f64, lon: f64, radius_km: f64, allow_history: bool) -> bool {
        let mut t = snap_10min_floor(timestamp);
        let mut attempts = 0u32;
        loop {
            let url = self.url_for(t);
            match self.cache.fetch(t, &url).await {
                Ok(image) => {
                    let (x, y) = self.settings.image_bounds.project(lon, lat);
                    let radius_px = labeling::radius_px(radius_km, &self.settings.image_bounds);
                    return labeling::is_wet_at(&image, &self.settings.excluded_colors, x, y, radius_px, self.settings.pixel_threshold);
                }
                Err(_) if allow_history && attempts < self.settings.max_history_lookups => {
                    attempts += 1;
                    t = step_back_10min(t);
                }
                Err(_) => return self.settings.default_return,
            }
        }
    }
}

#[async_trait]
impl ExternalWetness for RadarWetnessSource {
    async fn is_wet(&self, query: WetnessQuery) -> CmlResult<bool> {
        let wet = self
            .single_frame_wet(query.timestamp, query.lat, query.lon, query.radius_km, query.allow_history_lookup)
            .await;

        if !query.forward_look {
            return Ok(wet);
        }

        let next = query.timestamp + Duration::minutes(10);
        let next_wet = self.single_frame_wet(next, query.lat, query.lon, query.radius_km, false).await;
        Ok(wet || next_wet)
    }
}
