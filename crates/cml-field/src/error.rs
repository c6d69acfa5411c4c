//! Thin re-export: field generation surfaces failures through
//! [`cml_common::CmlError::FieldGenFailure`] rather than a crate-local
//! type.

pub use cml_common::{CmlError, CmlResult};
