//! External embedding/chat/rerank HTTP clients, consumed by the task queue
//! and the search path.
//!
//! These are deliberately thin: fixed JSON request/response shapes behind a
//! `reqwest::Client` built once at startup and reused for every call.

mod embedding;
mod mock;

pub use embedding::{ChatProvider, EmbeddingProvider, HttpProvider, RerankMatch};
pub use mock::MockEmbeddingProvider;
