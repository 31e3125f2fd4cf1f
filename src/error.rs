use thiserror::Error;

/// Failure of a single backend request.
///
/// - `Transport`: the backend could not be reached, or the body could not be read
/// - `Decode`: a response arrived but did not match the expected shape
/// - `Backend`: the backend answered with a non-success status; `detail`
///   carries its `{"detail": ...}` message when present
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("could not reach backend: {0}")]
    Transport(String),
    #[error("could not decode backend response: {0}")]
    Decode(String),
    #[error("backend returned {status}: {detail}")]
    Backend { status: u16, detail: String },
}

impl GatewayError {
    /// Human-readable detail suitable for a slice's failure state.
    pub fn detail(&self) -> String {
        match self {
            GatewayError::Backend { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Decode(err.to_string())
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

/// A session operation rejected locally; no request was issued.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("layer '{0}' is not part of the current layer list")]
    UnknownLayer(String),
    #[error("select a layer before running a layer-dependent attribution method")]
    MissingLayerSelection,
    #[error("invalid model config: {0}")]
    InvalidModelConfig(String),
    #[error("invalid attribution parameters: {0}")]
    InvalidAttributionParams(String),
}
