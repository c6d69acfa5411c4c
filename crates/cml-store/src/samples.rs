//! Sample store (C2): range queries over two historical time-series
//! bucket schemas, per-CML rain time-series writes, and output-bucket
//! maintenance.
//!
//! The store is reached over HTTP via `reqwest`, the same client the rest
//! of this workspace uses for networked collaborators. The wire format is a
//! small windowed-mean query/write API; either schema's bucket can sit
//! behind it, since every field name is normalized at this layer before the
//! rest of the pipeline ever sees it.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use cml_common::{snap_step_ceil, snap_step_floor, CmlError, CmlResult};

/// One endpoint's three measured series, normalized to the canonical field
/// names (`rx_power`, `tx_power`, `temperature`) regardless of which bucket
/// schema produced them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointFields {
    pub rx_power: BTreeMap<i64, f64>,
    pub tx_power: BTreeMap<i64, f64>,
    pub temperature: BTreeMap<i64, f64>,
    pub unit: String,
}

/// Endpoint tag (`ip` or `agent_host`) → its fields.
pub type EndpointSamples = HashMap<String, EndpointFields>;

/// A closed enumeration of realtime lookback windows (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeWindow {
    OneHour,
    ThreeHours,
    SixHours,
    TwelveHours,
    OneDay,
    TwoDays,
    SevenDays,
    ThirtyDays,
}

impl RealtimeWindow {
    pub fn duration(self) -> Duration {
        match self {
            RealtimeWindow::OneHour => Duration::hours(1),
            RealtimeWindow::ThreeHours => Duration::hours(3),
            RealtimeWindow::SixHours => Duration::hours(6),
            RealtimeWindow::TwelveHours => Duration::hours(12),
            RealtimeWindow::OneDay => Duration::days(1),
            RealtimeWindow::TwoDays => Duration::days(2),
            RealtimeWindow::SevenDays => Duration::days(7),
            RealtimeWindow::ThirtyDays => Duration::days(30),
        }
    }
}

/// Which bucket/schema a time range resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemaBucket {
    Old,
    New,
}

/// One outgoing rain-rate data point (§4.2 `write_points`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RainPoint {
    pub cml_id: i64,
    pub rain_intensity: f64,
    /// Second-precision Unix timestamp.
    pub timestamp_s: i64,
}

/// Configuration for bucket names and the old/new schema switchover.
#[derive(Debug, Clone)]
pub struct SampleStoreConfig {
    pub base_url: String,
    pub old_bucket: String,
    pub new_bucket: String,
    pub out_bucket: String,
    pub old_new_data_border: DateTime<Utc>,
    pub request_timeout: StdDuration,
}

/// HTTP client plus connection-state machine, mirroring the metadata
/// store's ping-then-reconnect discipline (§4.1).
pub struct SampleStore {
    client: Client,
    config: SampleStoreConfig,
    healthy: Arc<AtomicBool>,
}

impl SampleStore {
    pub fn new(config: SampleStoreConfig) -> CmlResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CmlError::ConfigMissing(format!("sample store client: {e}")))?;
        Ok(Self {
            client,
            config,
            healthy: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    /// Ping the store; used as the realtime-iteration precondition (§4.8).
    pub async fn check_connection(&self) -> CmlResult<()> {
        let url = format!("{}/health", self.config.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                self.healthy.store(true, Ordering::SeqCst);
                Ok(())
            }
            _ => {
                self.healthy.store(false, Ordering::SeqCst);
                Err(CmlError::StoreUnavailable("sample store unreachable".into()))
            }
        }
    }

    fn bucket_for(&self, end: DateTime<Utc>) -> (&str, SchemaBucket) {
        if end < self.config.old_new_data_border {
            (&self.config.old_bucket, SchemaBucket::Old)
        } else {
            (&self.config.new_bucket, SchemaBucket::New)
        }
    }

    /// Range-query per-endpoint TSL/RSL/temperature over `[start, end]`,
    /// snapping boundaries to `step_minutes` multiples (start up, end down)
    /// and requesting a windowed mean over each `step_minutes` bucket.
    /// Empty windows and nulls for any field are materialized as `0.0`.
    pub async fn query_units(
        &self,
        ips: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step_minutes: i64,
    ) -> CmlResult<EndpointSamples> {
        let start = snap_step_ceil(start, step_minutes);
        let end = snap_step_floor(end, step_minutes);
        let (bucket, schema) = self.bucket_for(end);
        self.query(ips, start, end, step_minutes, bucket, schema).await
    }

    /// Same as [`Self::query_units`] but `end = now`, `start = now − window`.
    pub async fn query_units_realtime(
        &self,
        ips: &[String],
        window: RealtimeWindow,
        step_minutes: i64,
    ) -> CmlResult<EndpointSamples> {
        let end = Utc::now();
        let start = end - window.duration();
        self.query_units(ips, start, end, step_minutes).await
    }

    async fn query(
        &self,
        ips: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step_minutes: i64,
        bucket: &str,
        schema: SchemaBucket,
    ) -> CmlResult<EndpointSamples> {
        let tag = match schema {
            SchemaBucket::Old => "ip",
            SchemaBucket::New => "agent_host",
        };

        let request = WindowedMeanRequest {
            bucket: bucket.to_string(),
            tag: tag.to_string(),
            endpoints: ips.to_vec(),
            start,
            end,
            window_seconds: step_minutes * 60,
        };

        let url = format!("{}/api/query/windowed-mean", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CmlError::StoreUnavailable(format!("query_units: {e}")))?;

        if !response.status().is_success() {
            return Err(CmlError::StoreUnavailable(format!(
                "query_units: store returned {}",
                response.status()
            )));
        }

        let body: WindowedMeanResponse = response
            .json()
            .await
            .map_err(|e| CmlError::StoreUnavailable(format!("query_units decode: {e}")))?;

        Ok(remap_schema(body, schema))
    }

    /// Append per-CML rain-rate points into the output bucket.
    pub async fn write_points(&self, points: &[RainPoint], bucket: &str) -> CmlResult<()> {
        let url = format!("{}/api/write", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("bucket", bucket)])
            .json(&WritePointsRequest {
                points: points.to_vec(),
            })
            .send()
            .await
            .map_err(|e| CmlError::WriterFailure(format!("write_points: {e}")))?;

        if !response.status().is_success() {
            return Err(CmlError::WriterFailure(format!(
                "write_points: store returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Launch a background bulk-delete of the output bucket. The returned
    /// handle must be joined before the next `write_points` call into the
    /// same bucket (forced-rewrite flow, §4.7).
    pub fn wipe_output_bucket(self: &Arc<Self>) -> JoinHandle<CmlResult<()>> {
        let store = Arc::clone(self);
        let bucket = store.config.out_bucket.clone();
        tokio::spawn(async move {
            let url = format!("{}/api/bucket/{}", store.config.base_url, bucket);
            let response = store
                .client
                .delete(&url)
                .send()
                .await
                .map_err(|e| CmlError::WriterFailure(format!("wipe_output_bucket: {e}")))?;
            if !response.status().is_success() {
                return Err(CmlError::WriterFailure(format!(
                    "wipe_output_bucket: store returned {}",
                    response.status()
                )));
            }
            Ok(())
        })
    }
}

#[derive(Debug, Serialize)]
struct WindowedMeanRequest {
    bucket: String,
    tag: String,
    endpoints: Vec<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    window_seconds: i64,
}

/// Raw series keyed by whatever field name the bucket schema used; fields
/// absent at a given timestamp are sent as `null` windows.
#[derive(Debug, Deserialize)]
struct WindowedMeanResponse {
    endpoints: HashMap<String, RawEndpointFields>,
}

#[derive(Debug, Deserialize)]
struct RawEndpointFields {
    #[serde(flatten)]
    fields: HashMap<String, BTreeMap<i64, Option<f64>>>,
    #[serde(default)]
    unit: String,
}

#[derive(Debug, Serialize, Clone)]
struct WritePointsRequest {
    points: Vec<RainPoint>,
}

/// Normalize old/new schema field names to the canonical `rx_power` /
/// `tx_power` / `temperature`, materializing nulls as `0.0` (§4.2).
fn remap_schema(body: WindowedMeanResponse, schema: SchemaBucket) -> EndpointSamples {
    let (rx_key, tx_key, temp_key): (&[&str], &[&str], &[&str]) = match schema {
        SchemaBucket::Old => (&["rx_power"], &["tx_power"], &["temperature"]),
        SchemaBucket::New => (
            &["PrijimanaUroven", "Signal"],
            &["VysilaciVykon", "Vysilany_Vykon"],
            &["Teplota"],
        ),
    };

    let mut out = EndpointSamples::new();
    for (endpoint, raw) in body.endpoints {
        let mut fields = EndpointFields {
            unit: raw.unit.clone(),
            ..Default::default()
        };
        if let Some(series) = find_first(&raw.fields, rx_key) {
            fields.rx_power = materialize(series);
        }
        if let Some(series) = find_first(&raw.fields, tx_key) {
            fields.tx_power = materialize(series);
        }
        if let Some(series) = find_first(&raw.fields, temp_key) {
            fields.temperature = materialize(series);
        }
        out.insert(endpoint, fields);
    }
    out
}

fn find_first<'a>(
    fields: &'a HashMap<String, BTreeMap<i64, Option<f64>>>,
    candidates: &[&str],
) -> Option<&'a BTreeMap<i64, Option<f64>>> {
    candidates.iter().find_map(|k| fields.get(*k))
}

fn materialize(series: &BTreeMap<i64, Option<f64>>) -> BTreeMap<i64, f64> {
    series.iter().map(|(t, v)| (*t, v.unwrap_or(0.0))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_selection_honors_border() {
        let config = SampleStoreConfig {
            base_url: "http://localhost".into(),
            old_bucket: "old".into(),
            new_bucket: "new".into(),
            out_bucket: "out".into(),
            old_new_data_border: Utc::now(),
            request_timeout: StdDuration::from_secs(5),
        };
        let border = config.old_new_data_border;
        let store = SampleStore::new(config).unwrap();

        let (bucket, schema) = store.bucket_for(border - Duration::minutes(1));
        assert_eq!(bucket, "old");
        assert_eq!(schema, SchemaBucket::Old);

        let (bucket, schema) = store.bucket_for(border + Duration::minutes(1));
        assert_eq!(bucket, "new");
        assert_eq!(schema, SchemaBucket::New);
    }

    #[test]
    fn remap_materializes_nulls_as_zero() {
        let mut fields = HashMap::new();
        let mut series = BTreeMap::new();
        series.insert(0, Some(1.5));
        series.insert(60, None);
        fields.insert("rx_power".to_string(), series);

        let mut endpoints = HashMap::new();
        endpoints.insert(
            "10.0.0.1".to_string(),
            RawEndpointFields {
                fields,
                unit: "dBm".into(),
            },
        );

        let remapped = remap_schema(WindowedMeanResponse { endpoints }, SchemaBucket::Old);
        let endpoint = remapped.get("10.0.0.1").unwrap();
        assert_eq!(endpoint.rx_power.get(&0), Some(&1.5));
        assert_eq!(endpoint.rx_power.get(&60), Some(&0.0));
    }
}
