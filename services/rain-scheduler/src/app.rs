//! Wires a loaded [`Config`] into the long-lived objects a calculation
//! needs: the two store connections, the descriptor map, and the static
//! knobs the calculation context carries across iterations (§5 "Global
//! state": the connection and configuration are injected once at
//! startup, not hidden singletons).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use cml_common::CmlDescriptor;
use cml_extfilter::{ExternalFilterSettings, ImageBounds, ImageCache, RadarWetnessSource};
use cml_field::accumulate::GridSpec;
use cml_field::idw::IdwParams;
use cml_rain::pipeline::ExternalFilterConfig;
use cml_segment::SegmentMode;
use cml_store::samples::{SampleStore, SampleStoreConfig};
use cml_store::Catalog;

use crate::calculation::CalculationContext;
use crate::config::Config;

/// Build the metadata store, sample store, and descriptor map from
/// configuration, then assemble the immutable [`CalculationContext`]
/// shared across every iteration of this process.
pub async fn build_context(config: &Config) -> Result<CalculationContext> {
    let catalog = Catalog::connect_with_pool_size(&config.mariadb.database_url(), 10)
        .await
        .context("connecting to metadata store")?;
    catalog.migrate().await.context("running metadata store migrations")?;

    let descriptors = catalog.load_descriptors().await.context("loading CML descriptors")?;
    if descriptors.is_empty() {
        anyhow::bail!("load_descriptors returned zero links; refusing to start with an empty fleet");
    }

    let samples = SampleStore::new(SampleStoreConfig {
        base_url: config.influx2.base_url.clone(),
        old_bucket: config.influx2.bucket_old.clone(),
        new_bucket: config.influx2.bucket_new.clone(),
        out_bucket: config.influx2.bucket_out_cml.clone(),
        old_new_data_border: config.influx2.old_new_data_border,
        request_timeout: Duration::from_secs(config.influx2.request_timeout_s),
    })
    .context("building sample store client")?;

    let tech_policy = cml_assembler::TechPolicy::new(
        config.tech_policy.constant_tx_power.iter().cloned().collect::<HashSet<_>>(),
        config.tech_policy.buggy_tx_power.iter().cloned().collect::<HashSet<_>>(),
    );

    let segment_mode = match config.segmentation.mode.as_str() {
        "linear" => SegmentMode::Linear { seg_size_m: config.segmentation.seg_size_m },
        "intersection" => SegmentMode::IntersectionAware {
            seg_size_m: config.segmentation.seg_size_m,
            fallback_linear: config.segmentation.fallback_linear,
        },
        _ => SegmentMode::Central,
    };

    let bbox = config.rendering.bbox();
    let grid = GridSpec {
        x_min: bbox.min_x,
        x_max: bbox.max_x,
        y_min: bbox.min_y,
        y_max: bbox.max_y,
        resolution: config.realtime.resolution_deg,
    };
    let idw = IdwParams {
        nnear: config.realtime.idw_nnear,
        power: config.realtime.idw_power,
        max_distance: config.realtime.idw_max_distance,
    };

    let external_filter = match &config.external_filter {
        Some(ext) => Some(build_external_filter(ext, &config.directories.ext_filter_cache).context("building external-wetness filter")?),
        None => None,
    };

    let polygons = if config.realtime.crop_to_polygon {
        let filename = config
            .realtime
            .geojson_filename
            .as_ref()
            .context("crop_to_polygon is enabled but geojson_filename is not set")?;
        Some(cml_field::crop::load_polygons(std::path::Path::new(filename)).context("loading crop polygon")?)
    } else {
        None
    };

    Ok(CalculationContext {
        catalog: Arc::new(catalog),
        samples: Arc::new(samples),
        descriptors: Arc::new(descriptors),
        tech_policy,
        segment_mode,
        grid,
        idw,
        min_rain_value: config.rainfields.min_value,
        external_filter,
        polygons,
    })
}

fn build_external_filter(ext: &crate::config::ExternalFilterConfig, cache_dir: &std::path::Path) -> Result<ExternalFilterConfig> {
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("building external-filter HTTP client")?;

    let settings = ExternalFilterSettings {
        url: ext.url.clone(),
        file_prefix: ext.file_prefix.clone(),
        image_bounds: ImageBounds {
            min_lon: ext.image_min_lon,
            min_lat: ext.image_min_lat,
            max_lon: ext.image_max_lon,
            max_lat: ext.image_max_lat,
            width_px: ext.image_width_px,
            height_px: ext.image_height_px,
        },
        pixel_threshold: ext.pixel_threshold,
        default_return: ext.default_return,
        max_history_lookups: ext.max_history_lookups,
        cache_dir: cache_dir.to_path_buf(),
        request_timeout: Duration::from_secs(30),
        excluded_colors: default_excluded_colors(),
    };

    std::fs::create_dir_all(cache_dir).context("creating external-filter cache directory")?;

    let cache = ImageCache::new(client, cache_dir.to_path_buf());
    let source = Arc::new(RadarWetnessSource::new(cache, settings));

    Ok(ExternalFilterConfig {
        source,
        radius_km: ext.radius_km,
        allow_history_lookup: true,
        default_return: ext.default_return,
    })
}

/// Palette indices excluded from wetness labelling: text overlays and the
/// "unknown area" fill color, besides the transparent index itself (§4.9).
fn default_excluded_colors() -> Vec<[u8; 4]> {
    vec![[0, 0, 0, 255], [255, 255, 255, 255], [128, 128, 128, 255]]
}

/// Looks up a descriptor by ID, for callers that need a single record
/// outside of a selection-driven batch (e.g. the link-sets CLI).
pub fn descriptor_ids(descriptors: &std::collections::HashMap<i64, CmlDescriptor>) -> Vec<i64> {
    let mut ids: Vec<i64> = descriptors.keys().copied().collect();
    ids.sort_unstable();
    ids
}
