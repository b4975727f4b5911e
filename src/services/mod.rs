pub mod attachment_codec;
pub mod backend;
pub mod citations;
pub mod config;
pub mod directives;
pub mod exchange;
pub mod genai_client;
pub mod history;
pub mod reconciler;
pub mod store;
