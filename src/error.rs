use thiserror::Error;

/// Attachment codec failures. Per-file and non-fatal: a rejected file must
/// not stop the rest of a batch.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unsupported file format: {name}")]
    UnsupportedFormat { name: String },
}

/// Failures surfaced by a generative backend implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Response carried no usable payload")]
    MissingPayload,

    #[error("Long-running operation failed: {message}")]
    OperationFailed { message: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not find data directory")]
    NoDataDir,

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No API key configured. Please add your API key in Settings.")]
    MissingApiKey,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Conversation not found: {id}")]
    NotFound { id: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The one error kind that crosses the exchange boundary. Audio and media
/// failures are absorbed internally; only a failed text generation is fatal
/// for a turn, and its message is what the caller renders as the reply.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("{message}")]
    TextGeneration { message: String },
}

const RATE_LIMIT_MESSAGE: &str =
    "The channel is congested right now. Give it a moment and transmit again.";
const CONNECTIVITY_MESSAGE: &str =
    "Could not reach the network. Check your connection and try again.";

impl ExchangeError {
    /// Normalize a backend failure into a user-presentable reply. Rate-limit
    /// conditions collapse to one fixed string; anything else keeps the
    /// underlying message when there is one.
    pub fn from_backend(err: BackendError) -> Self {
        let raw = err.to_string();
        let message = if raw.contains("429") || raw.contains("RESOURCE_EXHAUSTED") {
            RATE_LIMIT_MESSAGE.to_string()
        } else if raw.trim().is_empty() {
            CONNECTIVITY_MESSAGE.to_string()
        } else {
            raw
        };
        Self::TextGeneration { message }
    }
}
