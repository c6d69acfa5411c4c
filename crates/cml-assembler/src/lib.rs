//! Assembler (C3): turns endpoint query results plus link metadata into a
//! list of validated, two-channel [`LinkDataset`] values.
//!
//! Grounded on the metadata/catalog crate's "load once, treat as immutable"
//! posture: the selection map and descriptor map are supplied by the
//! caller and never mutated here.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{TimeZone, Utc};
use tracing::warn;

use cml_common::model::{Channel, ChannelRequest, ChannelSeries, CmlDescriptor, LinkDataset};
use cml_common::LinkSelection;
use cml_store::samples::{EndpointFields, EndpointSamples};

/// Per-technology exception lists referenced by §4.3 step 2.
#[derive(Debug, Clone, Default)]
pub struct TechPolicy {
    /// Both sides use synthetic zero Tx power unconditionally.
    pub constant_tx_power: HashSet<String>,
    /// Missing `tx_power` samples are filled with zeros rather than causing
    /// a skip.
    pub buggy_tx_power: HashSet<String>,
}

impl TechPolicy {
    pub fn new(constant_tx_power: HashSet<String>, buggy_tx_power: HashSet<String>) -> Self {
        Self {
            constant_tx_power,
            buggy_tx_power,
        }
    }

    fn is_constant_tx(&self, tech: &str) -> bool {
        self.constant_tx_power.contains(tech)
    }

    fn is_buggy_tx(&self, tech: &str) -> bool {
        self.buggy_tx_power.contains(tech)
    }
}

/// Why a link was dropped during assembly, for the per-iteration skip log
/// (§4.3 failure semantics, §7 `AssemblyConsistency`).
#[derive(Debug, Clone)]
pub struct SkippedLink {
    pub link_id: i64,
    pub reason: String,
}

/// Result of assembling one selection against one batch of endpoint
/// samples.
#[derive(Debug, Default)]
pub struct AssemblyReport {
    pub datasets: Vec<LinkDataset>,
    pub skipped: Vec<SkippedLink>,
}

/// Assemble every selected link into a [`LinkDataset`], following §4.3 in
/// order. Link iteration order follows `descriptors`' arbitrary map order;
/// callers that need deterministic ordering should sort `datasets`
/// afterward.
pub fn assemble_links(
    selection: &LinkSelection,
    descriptors: &HashMap<i64, CmlDescriptor>,
    samples: &EndpointSamples,
    policy: &TechPolicy,
) -> AssemblyReport {
    let mut report = AssemblyReport::default();

    for (&link_id, &flag) in selection {
        let request = ChannelRequest::from_flag(flag);
        if matches!(request, ChannelRequest::Skip) {
            continue;
        }

        let Some(descriptor) = descriptors.get(&link_id) else {
            report.skipped.push(SkippedLink {
                link_id,
                reason: "no descriptor for selected link".into(),
            });
            continue;
        };

        match assemble_one(descriptor, request, samples, policy) {
            Ok(dataset) => report.datasets.push(dataset),
            Err(reason) => {
                warn!(link_id, %reason, "skipping link during assembly");
                report.skipped.push(SkippedLink { link_id, reason });
            }
        }
    }

    report
}

fn assemble_one(
    descriptor: &CmlDescriptor,
    request: ChannelRequest,
    samples: &EndpointSamples,
    policy: &TechPolicy,
) -> Result<LinkDataset, String> {
    let a_in = samples.contains_key(&descriptor.ip_a);
    let b_in = samples.contains_key(&descriptor.ip_b);

    if !(a_in && b_in) {
        let single_present = a_in ^ b_in;
        if !(single_present && policy.is_constant_tx(&descriptor.tech)) {
            return Err(format!(
                "endpoint(s) missing from samples (a_in={a_in}, b_in={b_in}) and tech {:?} is not on the constant-Tx-power exception list",
                descriptor.tech
            ));
        }
    }

    let wants_a_to_b = matches!(request, ChannelRequest::AtoB | ChannelRequest::Both);
    let wants_b_to_a = matches!(request, ChannelRequest::BtoA | ChannelRequest::Both);

    let a_to_b = if wants_a_to_b {
        Some(build_channel(descriptor, Channel::ARxBTx, samples, policy)?)
    } else {
        None
    };
    let b_to_a = if wants_b_to_a {
        Some(build_channel(descriptor, Channel::BRxATx, samples, policy)?)
    } else {
        None
    };

    let (time, a_to_b, b_to_a) = match (a_to_b, b_to_a) {
        (Some((time, series)), None) => {
            let dummy = ChannelSeries::with_len(series.len(), true);
            (time, series, dummy)
        }
        (None, Some((time, series))) => {
            let dummy = ChannelSeries::with_len(series.len(), true);
            (time, dummy, series)
        }
        (Some((time_a, series_a)), Some((time_b, series_b))) => {
            if time_a.len() != time_b.len() {
                return Err(format!(
                    "channel length mismatch between A→B ({}) and B→A ({})",
                    time_a.len(),
                    time_b.len()
                ));
            }
            (time_a, series_a, series_b)
        }
        (None, None) => return Err("no channel requested".into()),
    };

    Ok(LinkDataset {
        cml_id: descriptor.link_id,
        time,
        a_to_b,
        b_to_a,
        length_km: descriptor.distance_km,
        freq_a_ghz: descriptor.freq_a_ghz(),
        freq_b_ghz: descriptor.freq_b_ghz(),
        polarization: descriptor.polarization,
        lat_a: descriptor.lat_a,
        lon_a: descriptor.lon_a,
        lat_b: descriptor.lat_b,
        lon_b: descriptor.lon_b,
        dummy_lat_a: descriptor.dummy_lat_a,
        dummy_lon_a: descriptor.dummy_lon_a,
        dummy_lat_b: descriptor.dummy_lat_b,
        dummy_lon_b: descriptor.dummy_lon_b,
        wet_fraction: 0.0,
        segment: None,
    })
}

/// Build one directional channel, timestamps taken from the rx endpoint
/// (§4.3 step 4).
fn build_channel(
    descriptor: &CmlDescriptor,
    channel: Channel,
    samples: &EndpointSamples,
    policy: &TechPolicy,
) -> Result<(Vec<chrono::DateTime<Utc>>, ChannelSeries), String> {
    let (rx_ip, tx_ip) = match channel {
        Channel::ARxBTx => (&descriptor.ip_a, &descriptor.ip_b),
        Channel::BRxATx => (&descriptor.ip_b, &descriptor.ip_a),
    };

    let rx_fields = samples.get(rx_ip);
    let tx_fields = samples.get(tx_ip);

    let Some(rx_fields) = rx_fields else {
        return Err(format!("rx endpoint {rx_ip} absent from samples"));
    };

    let time: Vec<_> = rx_fields
        .rx_power
        .keys()
        .map(|&secs| Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now))
        .collect();

    let rsl = to_aligned_vec(&rx_fields.rx_power, rx_fields.rx_power.keys());

    let constant_tx = policy.is_constant_tx(&descriptor.tech);
    let buggy_tx = policy.is_buggy_tx(&descriptor.tech);

    let tsl = if constant_tx {
        vec![0.0; time.len()]
    } else {
        match tx_fields {
            Some(tx) => to_aligned_vec(&tx.tx_power, rx_fields.rx_power.keys()),
            None if buggy_tx => vec![0.0; time.len()],
            None => return Err(format!("tx endpoint {tx_ip} absent from samples")),
        }
    };

    if tsl.len() != rsl.len() {
        return Err(format!(
            "tsl/rsl length mismatch ({} vs {})",
            tsl.len(),
            rsl.len()
        ));
    }

    let temperature_rx = to_aligned_vec(&rx_fields.temperature, rx_fields.rx_power.keys());
    let temperature_tx = tx_fields
        .map(|tx| to_aligned_vec(&tx.temperature, rx_fields.rx_power.keys()))
        .unwrap_or_else(|| vec![0.0; time.len()]);

    let mut series = ChannelSeries::with_len(time.len(), false);
    series.tsl = tsl;
    series.rsl = rsl;
    series.temperature_rx = temperature_rx;
    series.temperature_tx = temperature_tx;

    Ok((time, series))
}

fn to_aligned_vec<'a>(
    source: &BTreeMap<i64, f64>,
    timestamps: impl Iterator<Item = &'a i64>,
) -> Vec<f64> {
    timestamps.map(|t| source.get(t).copied().unwrap_or(0.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cml_common::model::Polarization;
    use std::collections::HashMap as Map;

    fn descriptor(tech: &str) -> CmlDescriptor {
        CmlDescriptor::new(
            1,
            "10.0.0.1".into(),
            "10.0.0.2".into(),
            "A".into(),
            "B".into(),
            tech.into(),
            18000,
            18200,
            'V',
            50.0,
            14.0,
            50.1,
            14.1,
            50.0,
            14.0,
            50.1,
            14.1,
        )
    }

    fn endpoint(rx: &[(i64, f64)], tx: &[(i64, f64)]) -> EndpointFields {
        EndpointFields {
            rx_power: rx.iter().cloned().collect(),
            tx_power: tx.iter().cloned().collect(),
            temperature: rx.iter().map(|(t, _)| (*t, 20.0)).collect(),
            unit: "dBm".into(),
        }
    }

    #[test]
    fn missing_second_endpoint_synthesizes_dummy_channel() {
        let descriptor = descriptor("generic");
        let mut samples = EndpointSamples::new();
        samples.insert(
            "10.0.0.1".into(),
            endpoint(&[(0, -40.0), (60, -41.0)], &[(0, 10.0), (60, 10.0)]),
        );
        let mut descriptors = Map::new();
        descriptors.insert(1, descriptor);

        let mut selection = LinkSelection::new();
        selection.insert(1, 1); // AtoB only, B absent -> dummy synthesized unless A absent triggers skip

        // A is present (rx), B absent -- but selection requests ARxBTx which needs rx at A (present) tx at B (absent).
        let policy = TechPolicy::default();
        let report = assemble_links(&selection, &descriptors, &samples, &policy);
        // Not on constant-tx exception list and B absent entirely -> presence check fails -> skipped
        assert!(report.datasets.is_empty());
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn constant_tx_tech_with_one_side_missing_synthesizes_dummy_second_channel() {
        let descriptor = descriptor("const-tx");
        let mut samples = EndpointSamples::new();
        samples.insert(
            "10.0.0.1".into(),
            endpoint(&[(0, -40.0), (60, -41.0)], &[(0, 10.0), (60, 10.0)]),
        );
        let mut descriptors = Map::new();
        descriptors.insert(1, descriptor);

        let mut selection = LinkSelection::new();
        selection.insert(1, 1); // AtoB only

        let mut policy = TechPolicy::default();
        policy.constant_tx_power.insert("const-tx".into());

        let report = assemble_links(&selection, &descriptors, &samples, &policy);
        assert_eq!(report.datasets.len(), 1);
        let dataset = &report.datasets[0];
        assert!(!dataset.a_to_b.dummy_channel);
        assert!(dataset.b_to_a.dummy_channel);
        assert!(dataset.b_to_a.tsl.iter().all(|&v| v == 0.0));
        assert!(dataset.b_to_a.rsl.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn both_sides_present_assembles_two_real_channels() {
        let descriptor = descriptor("generic");
        let mut samples = EndpointSamples::new();
        samples.insert(
            "10.0.0.1".into(),
            endpoint(&[(0, -40.0), (60, -41.0)], &[(0, 10.0), (60, 10.0)]),
        );
        samples.insert(
            "10.0.0.2".into(),
            endpoint(&[(0, -42.0), (60, -43.0)], &[(0, 11.0), (60, 11.0)]),
        );
        let mut descriptors = Map::new();
        descriptors.insert(1, descriptor);

        let mut selection = LinkSelection::new();
        selection.insert(1, 3);

        let policy = TechPolicy::default();
        let report = assemble_links(&selection, &descriptors, &samples, &policy);
        assert_eq!(report.datasets.len(), 1);
        let dataset = &report.datasets[0];
        assert!(!dataset.a_to_b.dummy_channel);
        assert!(!dataset.b_to_a.dummy_channel);
        assert_eq!(dataset.time.len(), 2);
    }
}
