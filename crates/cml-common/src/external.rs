//! The seam between the rain-rate pipeline (C4) and the external-wetness
//! filter (C9). Kept here, rather than in either crate, so C4 depends only
//! on this trait and never on C9's HTTP/image-decoding internals.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::CmlResult;

/// A query against the external-wetness image service, mirroring §4.9's
/// parameter list minus the fields the caller already fixes per
/// deployment (`image_bounds`, `url_prefix`, `default_return`).
#[derive(Debug, Clone, Copy)]
pub struct WetnessQuery {
    pub timestamp: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub radius_km: f64,
    /// Disabled in realtime mode per §4.4.
    pub allow_history_lookup: bool,
    pub forward_look: bool,
}

#[async_trait]
pub trait ExternalWetness: Send + Sync {
    /// Returns `default_return` (a deployment-configured fallback, not a
    /// `CmlError`) when the backing image is unreachable; never aborts the
    /// caller's pipeline per the `ExternalFilterUnavailable` taxonomy entry.
    async fn is_wet(&self, query: WetnessQuery) -> CmlResult<bool>;
}
