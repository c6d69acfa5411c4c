//! Storage abstractions for the CML rainfall services.
//!
//! Provides unified interfaces for:
//! - PostgreSQL for the link/run metadata catalog (C1)
//! - the time-series sample store holding TSL/RSL/temperature and output
//!   rain-rate series (C2)

pub mod catalog;
pub mod samples;

pub use catalog::Catalog;
pub use samples::{
    EndpointFields, EndpointSamples, RainPoint, RealtimeWindow, SampleStore, SampleStoreConfig,
};
