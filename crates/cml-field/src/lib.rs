//! Field generator (C6): temporal resampling of per-link rain rate,
//! inverse-distance-weighted spatial interpolation over the segmenter's
//! geometry, and optional cropping to a polygon mask.

pub mod accumulate;
pub mod animate;
pub mod crop;
pub mod error;
pub mod idw;
pub mod resample;

pub use accumulate::{accumulate, link_total_mm, GridSpec};
pub use animate::{build_frames, retain_latest, AnimationConfig, Frame};
pub use error::{CmlError, CmlResult};
pub use idw::IdwParams;
