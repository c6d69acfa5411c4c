//! Shared application state for the rain-grid HTTP API.

use std::path::PathBuf;

use cml_store::Catalog;

/// Shared across every handler: the metadata store connection and the
/// two output directories the writer (C7) populates.
pub struct AppState {
    pub catalog: Catalog,
    pub outputs_web: PathBuf,
    pub outputs_raw: PathBuf,
}

impl AppState {
    pub fn new(catalog: Catalog, outputs_web: PathBuf, outputs_raw: PathBuf) -> Self {
        Self { catalog, outputs_web, outputs_raw }
    }
}
