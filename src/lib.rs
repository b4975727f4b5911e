pub mod error;
pub mod models;
pub mod services;

pub use error::{BackendError, CodecError, ConfigError, ExchangeError, StoreError};
pub use models::*;
pub use services::backend::GenerativeBackend;
pub use services::exchange::{
    exchange, generate_title, ExchangeOutcome, ExchangeRequest, OutputModality,
};
pub use services::genai_client::GenAiClient;
pub use services::reconciler::{ConversationStateReconciler, ReconcileAction, SessionToken};
pub use services::store::{ConversationStore, JsonFileStore};
