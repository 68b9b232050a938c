//! Text embedding for semantic memory recall

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Embedding dimension for text-embedding-3-small
pub const EMBEDDING_DIM: usize = 1536;

const DEFAULT_MODEL: &str = "text-embedding-3-small";
const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Anything that can turn text into a vector
#[async_trait]
pub trait Embed: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Text embedder using `OpenAI`'s embedding API
#[derive(Debug)]
pub struct Embedder {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl Embedder {
    /// Create a new embedder with `OpenAI` API key
    ///
    /// # Errors
    ///
    /// Returns error if API key is empty
    pub fn new(api_key: SecretString) -> Result<Self> {
        Self::with_model(api_key, DEFAULT_MODEL.to_string())
    }

    /// Create an embedder with a custom model
    ///
    /// # Errors
    ///
    /// Returns error if API key is empty
    pub fn with_model(api_key: SecretString, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for embeddings".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        })
    }

    /// Generate embeddings for multiple texts
    ///
    /// # Errors
    ///
    /// Returns error if API call fails
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        #[derive(serde::Serialize)]
        struct EmbeddingRequest<'a> {
            model: &'a str,
            input: &'a [&'a str],
        }

        #[derive(serde::Deserialize)]
        struct EmbeddingResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(serde::Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
            index: usize,
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(EMBEDDINGS_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("embedding API error {status}: {body}")));
        }

        let mut result: EmbeddingResponse = response.json().await?;

        // Keep input order
        result.data.sort_by_key(|d| d.index);

        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }

    /// Serialize embedding to bytes for `SQLite` storage
    #[must_use]
    pub fn to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or([0; 4]);
                f32::from_le_bytes(arr)
            })
            .collect()
    }
}

#[async_trait]
impl Embed for Embedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("empty embedding response".to_string()))
    }
}
