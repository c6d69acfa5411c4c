//! Error taxonomy for the CML rainfall pipeline.

use thiserror::Error;

/// Result type alias using [`CmlError`].
pub type CmlResult<T> = Result<T, CmlError>;

/// Primary error type shared by every component of the calculation pipeline.
///
/// Variant names follow the error kinds named in the design notes: they
/// describe *why* an operation failed, not which crate raised it.
#[derive(Debug, Error)]
pub enum CmlError {
    /// A required configuration option was not found. Fatal at startup.
    #[error("missing configuration option: {0}")]
    ConfigMissing(String),

    /// The metadata store or sample store could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The link selection resolved to zero links before any I/O was issued.
    #[error("link selection is empty")]
    SelectionEmpty,

    /// Rx/Tx length mismatch or a mandatory series missing for one link.
    #[error("link {link_id} dropped: {reason}")]
    AssemblyConsistency { link_id: i64, reason: String },

    /// A run parameter failed the validation rules in §4.8.
    #[error("invalid run parameters: {0}")]
    InvalidParameters(String),

    /// An unexpected failure inside the rain-rate pipeline (C4).
    #[error("rain calculation failed: {0}")]
    RainCalcFailure(String),

    /// An unexpected failure inside field generation (C6).
    #[error("field generation failed: {0}")]
    FieldGenFailure(String),

    /// A non-fatal failure while persisting a frame or time series (C7).
    #[error("writer failed: {0}")]
    WriterFailure(String),

    /// The external-wetness filter (C9) could not be consulted; callers
    /// should fall back to `default_return` rather than propagate this.
    #[error("external filter unavailable: {0}")]
    ExternalFilterUnavailable(String),

    /// There is no active realtime run to attach a frame to.
    #[error("no active realtime run")]
    NoActiveRun,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CmlError {
    /// A short machine-readable label, used on the `{run_id, kind, message}`
    /// status-event channel described in §7.
    pub fn kind(&self) -> &'static str {
        match self {
            CmlError::ConfigMissing(_) => "ConfigMissing",
            CmlError::StoreUnavailable(_) => "StoreUnavailable",
            CmlError::SelectionEmpty => "SelectionEmpty",
            CmlError::AssemblyConsistency { .. } => "AssemblyConsistency",
            CmlError::InvalidParameters(_) => "InvalidParameters",
            CmlError::RainCalcFailure(_) => "RainCalcFailure",
            CmlError::FieldGenFailure(_) => "FieldGenFailure",
            CmlError::WriterFailure(_) => "WriterFailure",
            CmlError::ExternalFilterUnavailable(_) => "ExternalFilterUnavailable",
            CmlError::NoActiveRun => "NoActiveRun",
            CmlError::Io(_) => "Io",
        }
    }

    /// Whether the iteration should be abandoned outright, vs. recovered
    /// locally (per-link skip) or swallowed behind a default value.
    pub fn is_fatal_to_iteration(&self) -> bool {
        matches!(
            self,
            CmlError::StoreUnavailable(_)
                | CmlError::SelectionEmpty
                | CmlError::InvalidParameters(_)
                | CmlError::RainCalcFailure(_)
                | CmlError::FieldGenFailure(_)
        )
    }

    /// HTTP status code used by the `/api/*` surface (§6).
    pub fn http_status_code(&self) -> u16 {
        match self {
            CmlError::InvalidParameters(_) | CmlError::SelectionEmpty => 400,
            CmlError::NoActiveRun => 404,
            _ => 500,
        }
    }
}

impl From<serde_json::Error> for CmlError {
    fn from(err: serde_json::Error) -> Self {
        CmlError::WriterFailure(format!("json error: {err}"))
    }
}
