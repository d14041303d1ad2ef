//! Domain error types.

/// Boxed error produced by a signal source, kept intact as the `source()` of
/// [`BacksimError::SignalSourceFailure`].
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for backsim.
#[derive(Debug, thiserror::Error)]
pub enum BacksimError {
    #[error("invalid config {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("insufficient data: have {bars} bars, need {minimum}")]
    InsufficientData { bars: usize, minimum: usize },

    #[error("invalid bar at index {index}: {reason}")]
    InvalidData { index: usize, reason: String },

    #[error("signal source failed at bar {index}: {source}")]
    SignalSourceFailure {
        index: usize,
        #[source]
        source: SourceError,
    },

    #[error("run cancelled after {bars_processed} bars")]
    Cancelled { bars_processed: usize },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data format error: {reason}")]
    DataFormat { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BacksimError {
    pub(crate) fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        BacksimError::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&BacksimError> for std::process::ExitCode {
    fn from(err: &BacksimError) -> Self {
        let code: u8 = match err {
            BacksimError::Io(_) | BacksimError::Csv(_) | BacksimError::Json(_) => 1,
            BacksimError::ConfigParse { .. }
            | BacksimError::ConfigInvalid { .. }
            | BacksimError::InvalidConfig { .. } => 2,
            BacksimError::SignalSourceFailure { .. } => 3,
            BacksimError::Cancelled { .. } => 4,
            BacksimError::InsufficientData { .. }
            | BacksimError::InvalidData { .. }
            | BacksimError::DataFormat { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
