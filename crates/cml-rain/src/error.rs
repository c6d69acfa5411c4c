//! Thin re-export: the rain-rate pipeline surfaces failures through the
//! shared [`cml_common::CmlError::RainCalcFailure`] variant rather than a
//! crate-local type, since every failure here aborts the iteration the
//! same way (§7).

pub use cml_common::{CmlError, CmlResult};
