//! Orchestrates the rain-rate pipeline stages (§4.4) over a batch of
//! [`LinkDataset`] values, in the order the design lays them out: outlier
//! filter, correlation filter/compensation, wet/dry detection, baseline,
//! Schleiss WAA, k-R inversion, then the correlation removal pass.

use std::sync::Arc;

use cml_common::external::WetnessQuery;
use cml_common::model::{Channel, ChannelSeries, LinkDataset};
use cml_common::{CmlResult, ExternalWetness};
use tracing::{info, warn};

use crate::correlation::{self, CorrelationMode};
use crate::wetdry::ConvolutionalDetector;
use crate::{baseline, kr, outlier, wetdry};

/// Which wet/dry strategy to run.
#[derive(Clone)]
pub enum WetDryStrategy {
    RollingStd {
        rolling_hours: f64,
        center: bool,
        sigma: f64,
    },
    Convolutional(Arc<dyn ConvolutionalDetector>),
}

#[derive(Clone)]
pub struct ExternalFilterConfig {
    pub source: Arc<dyn ExternalWetness>,
    pub radius_km: f64,
    /// Disabled in realtime mode per §4.4.
    pub allow_history_lookup: bool,
    /// Fallback wetness when C9 is unreachable (§4.9 `default_return`).
    pub default_return: bool,
}

pub struct PipelineConfig {
    pub step_minutes: i64,
    pub correlation_mode: Option<CorrelationMode>,
    pub correlation_threshold: f64,
    pub wetdry: WetDryStrategy,
    pub baseline_dry_samples: usize,
    pub waa_max: f64,
    pub waa_tau_minutes: f64,
    pub external_filter: Option<ExternalFilterConfig>,
}

/// Run the full pipeline over every dataset in place, dropping any link
/// the correlation filter flagged for removal.
pub async fn run_pipeline(datasets: &mut Vec<LinkDataset>, config: &PipelineConfig) -> CmlResult<()> {
    let mut keep = Vec::with_capacity(datasets.len());
    for mut dataset in datasets.drain(..) {
        let removed = process_link(&mut dataset, config).await?;
        if removed {
            info!(cml_id = dataset.cml_id, "link removed by temperature-correlation filter");
        } else {
            keep.push(dataset);
        }
    }
    *datasets = keep;
    Ok(())
}

/// Returns `true` if the link should be dropped (correlation filter mode).
async fn process_link(dataset: &mut LinkDataset, config: &PipelineConfig) -> CmlResult<bool> {
    for channel in [Channel::ARxBTx, Channel::BRxATx] {
        let series = dataset.channel_mut(channel);
        if series.dummy_channel {
            continue;
        }
        outlier::filter_tsl(&mut series.tsl);
        outlier::filter_rsl(&mut series.rsl);
        outlier::interpolate_linear(&mut series.temperature_rx);
        outlier::interpolate_linear(&mut series.temperature_tx);
        series.trsl = outlier::compute_trsl(&series.tsl, &series.rsl);
    }

    let mut removed = false;
    if let Some(mode) = config.correlation_mode {
        for channel in [Channel::ARxBTx, Channel::BRxATx] {
            let series = dataset.channel_mut(channel);
            if series.dummy_channel {
                continue;
            }
            let verdict = correlation::evaluate_channel(&series.trsl, &series.temperature_tx, config.correlation_threshold);
            if verdict.exceeds_threshold {
                match mode {
                    CorrelationMode::Filter => removed = true,
                    CorrelationMode::Compensate => {
                        correlation::compensate(&mut series.trsl, &series.temperature_tx);
                    }
                }
            }
        }
    }

    apply_wet_dry(dataset, &config.wetdry, config.step_minutes);

    if let Some(filter) = &config.external_filter {
        apply_external_filter(dataset, filter).await?;
    }

    for channel in [Channel::ARxBTx, Channel::BRxATx] {
        let series = dataset.channel_mut(channel);
        if series.dummy_channel {
            continue;
        }
        series.baseline = baseline::constant_baseline(&series.trsl, &series.wet, config.baseline_dry_samples);
    }

    // delta_t = 60/((60/step)*60) minutes = step/60 (§4.4).
    let delta_t = config.step_minutes as f64 / 60.0;
    for channel in [Channel::ARxBTx, Channel::BRxATx] {
        let series = dataset.channel_mut(channel);
        if series.dummy_channel {
            continue;
        }
        let attenuation_signal: Vec<f64> = series
            .trsl
            .iter()
            .zip(&series.baseline)
            .map(|(t, b)| t - b)
            .collect();
        series.waa = crate::waa::schleiss_waa(&attenuation_signal, &series.wet, config.waa_max, delta_t, config.waa_tau_minutes);
        series.attenuation = attenuation_signal
            .iter()
            .zip(&series.waa)
            .map(|(a, w)| a - w)
            .collect();
    }

    let polarization = dataset.polarization;
    let length_km = dataset.length_km;
    let freq_a_ghz = dataset.freq_a_ghz;
    let freq_b_ghz = dataset.freq_b_ghz;
    for channel in [Channel::ARxBTx, Channel::BRxATx] {
        let series = dataset.channel_mut(channel);
        if series.dummy_channel {
            continue;
        }
        // A→B rx means B transmitted, so attenuation on that path is keyed
        // to B's carrier frequency, and vice versa.
        let freq_ghz = match channel {
            Channel::ARxBTx => freq_b_ghz,
            Channel::BRxATx => freq_a_ghz,
        };
        series.rain_rate = series
            .attenuation
            .iter()
            .map(|&a| kr::attenuation_to_rain_rate(a, length_km, freq_ghz, polarization))
            .collect();
    }

    dataset.wet_fraction = wet_fraction(dataset);

    Ok(removed)
}

fn apply_wet_dry(dataset: &mut LinkDataset, strategy: &WetDryStrategy, step_minutes: i64) {
    match strategy {
        WetDryStrategy::RollingStd { rolling_hours, center, sigma } => {
            for channel in [Channel::ARxBTx, Channel::BRxATx] {
                let series = dataset.channel_mut(channel);
                if series.dummy_channel {
                    continue;
                }
                // W = rolling_hours·60/step samples (§4.4).
                let window = (rolling_hours * 60.0 / step_minutes as f64) as usize;
                series.wet = wetdry::detect_wet_rolling_std(&series.trsl, window.max(1), *center, *sigma);
            }
        }
        WetDryStrategy::Convolutional(detector) => {
            let trsl_a = dataset.a_to_b.trsl.clone();
            let trsl_b = dataset.b_to_a.trsl.clone();
            let (wet, trim) = wetdry::detect_wet_convolutional(detector.as_ref(), &trsl_a, &trsl_b);
            if trim > 0 {
                truncate_front(dataset, trim);
            }
            dataset.a_to_b.wet = wet.clone();
            dataset.b_to_a.wet = wet;
        }
    }
}

/// Drop the leading `n` samples from every parallel array on the dataset,
/// used when the convolutional detector cannot classify its warm-up window.
fn truncate_front(dataset: &mut LinkDataset, n: usize) {
    dataset.time.drain(0..n.min(dataset.time.len()));
    for channel in [Channel::ARxBTx, Channel::BRxATx] {
        let series = dataset.channel_mut(channel);
        truncate_channel(series, n);
    }
}

fn truncate_channel(series: &mut ChannelSeries, n: usize) {
    let drain = |v: &mut Vec<f64>| {
        let k = n.min(v.len());
        v.drain(0..k);
    };
    drain(&mut series.tsl);
    drain(&mut series.rsl);
    drain(&mut series.temperature_rx);
    drain(&mut series.temperature_tx);
    drain(&mut series.trsl);
    let k = n.min(series.wet.len());
    series.wet.drain(0..k);
}

async fn apply_external_filter(dataset: &mut LinkDataset, filter: &ExternalFilterConfig) -> CmlResult<()> {
    let (lat, lon) = dataset.midpoint();
    let radius_km = filter.radius_km + dataset.length_km / 2.0;

    for channel in [Channel::ARxBTx, Channel::BRxATx] {
        let len = dataset.channel(channel).len();
        let mut external_wet = Vec::with_capacity(len);
        for i in 0..len {
            let timestamp = dataset.time[i];
            let query = WetnessQuery {
                timestamp,
                lat,
                lon,
                radius_km,
                allow_history_lookup: filter.allow_history_lookup,
                forward_look: false,
            };
            let wet = match filter.source.is_wet(query).await {
                Ok(w) => w,
                Err(err) => {
                    warn!(cml_id = dataset.cml_id, %err, "external-wetness filter unavailable, using configured default");
                    filter.default_return
                }
            };
            external_wet.push(wet);
        }
        let series = dataset.channel_mut(channel);
        if series.dummy_channel {
            continue;
        }
        for (w, ext) in series.wet.iter_mut().zip(external_wet) {
            *w = *w && ext;
        }
    }
    Ok(())
}

fn wet_fraction(dataset: &LinkDataset) -> f64 {
    let real_channels: Vec<&ChannelSeries> = [&dataset.a_to_b, &dataset.b_to_a]
        .into_iter()
        .filter(|c| !c.dummy_channel)
        .collect();
    let total: usize = real_channels.iter().map(|c| c.wet.len()).sum();
    if total == 0 {
        return 0.0;
    }
    let wet_count: usize = real_channels.iter().map(|c| c.wet.iter().filter(|&&w| w).count()).sum();
    wet_count as f64 / total as f64
}
