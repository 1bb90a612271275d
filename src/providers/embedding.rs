//! Embedding/chat/rerank HTTP clients against a fixed set of JSON request
//! and response shapes.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::error::RagError;

/// Collaborator boundary for turning text into dense vectors. Implemented by
/// [`HttpProvider`] against the real upstream, and by
/// [`crate::providers::MockEmbeddingProvider`] in tests.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Convenience wrapper for a single input, used by the query-time vector
    /// scorer.
    async fn embed_one(&self, input: &str) -> Result<Vec<f32>, RagError> {
        let mut vectors = self.embed(std::slice::from_ref(&input.to_string())).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::Provider("embedding provider returned no vectors".into()))
    }

    /// Whether credentials are present for this provider. The embedding
    /// task queue checks this up front rather than discovering the absence
    /// one failed request at a time.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Collaborator boundary for the chat/completion endpoint. Out of the core
/// retrieval path, but kept alongside the embedding client since a future
/// summarized-chunk or rerank pass would need the same provider connection.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, RagError>;
}

/// One rerank match returned by the optional `/v1/rerank` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RerankMatch {
    pub index: usize,
    #[serde(rename = "relevance_score")]
    pub relevance_score: f32,
}

/// Real HTTP client against the embedding/chat/rerank provider, sharing a
/// single pooled `reqwest::Client` across every call.
#[derive(Clone)]
pub struct HttpProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    embedding_model: String,
    chat_model: String,
}

impl HttpProvider {
    pub fn new(base_url: String, api_key: Option<String>, embedding_model: String, chat_model: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client with static TLS config builds");
        Self {
            client,
            base_url,
            api_key,
            embedding_model,
            chat_model,
        }
    }

    fn bearer(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, RagError> {
        let key = self
            .api_key
            .as_ref()
            .ok_or_else(|| RagError::Provider("no embedding/chat provider API key configured".into()))?;
        Ok(builder.bearer_auth(key))
    }

    /// `POST {base}/v1/rerank` with `{model, query, documents}`, returning
    /// match indices/scores sorted as the provider returned them.
    pub async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<RerankMatch>, RagError> {
        #[derive(Deserialize)]
        struct RerankResponse {
            data: Vec<RerankMatch>,
        }

        let url = format!("{}/v1/rerank", self.base_url);
        let request = self.bearer(self.client.post(&url))?.json(&json!({
            "model": self.embedding_model,
            "query": query,
            "documents": documents,
        }));

        let response = request.send().await?.error_for_status()?;
        let parsed: RerankResponse = response.json().await?;
        Ok(parsed.data)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpProvider {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        #[derive(Deserialize)]
        struct EmbeddingItem {
            embedding: Vec<f32>,
        }
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum EmbeddingResponse {
            Wrapped { data: Vec<EmbeddingItem> },
            Bare { embedding: Vec<f32> },
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let request = self.bearer(self.client.post(&url))?.json(&json!({
            "model": self.embedding_model,
            "input": inputs,
        }));

        let response = request.send().await?.error_for_status()?;
        let parsed: EmbeddingResponse = response.json().await?;
        Ok(match parsed {
            EmbeddingResponse::Wrapped { data } => data.into_iter().map(|d| d.embedding).collect(),
            EmbeddingResponse::Bare { embedding } => vec![embedding],
        })
    }
}

#[async_trait]
impl ChatProvider for HttpProvider {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, RagError> {
        #[derive(Deserialize)]
        struct ChatChoice {
            message: ChatMessageResponse,
        }
        #[derive(Deserialize)]
        struct ChatMessageResponse {
            content: String,
        }
        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
        }

        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = self.bearer(self.client.post(&url))?.json(&json!({
            "model": self.chat_model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "max_tokens": 1024,
            "temperature": 0.2,
        }));

        let response = request.send().await?.error_for_status()?;
        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| RagError::Provider("chat provider returned no choices".into()))
    }
}
