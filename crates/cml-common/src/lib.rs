//! Common types and utilities shared across the CML rainfall services.

pub mod bbox;
pub mod error;
pub mod external;
pub mod geo;
pub mod linkset;
pub mod model;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{CmlError, CmlResult};
pub use external::{ExternalWetness, WetnessQuery};
pub use geo::haversine_km;
pub use linkset::{LinkSelection, LinkSetFile};
pub use model::{CmlDescriptor, Channel, LinkDataset, Polarization, RainGrid, RealtimeRun};
pub use time::{snap_step_ceil, snap_step_floor, StatusEvent};
