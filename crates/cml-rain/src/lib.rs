//! Rain-rate pipeline (C4): outlier filtering, temperature-correlation
//! handling, wet/dry classification, baseline estimation, Schleiss
//! wet-antenna attenuation, and k-R inversion, applied per link in the
//! order documented in §4.4.

pub mod baseline;
pub mod correlation;
pub mod error;
pub mod kr;
pub mod outlier;
pub mod pipeline;
pub mod waa;
pub mod wetdry;

pub use error::{CmlError, CmlResult};
pub use pipeline::{run_pipeline, ExternalFilterConfig, PipelineConfig, WetDryStrategy};
