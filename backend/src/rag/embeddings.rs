use std::sync::Arc;

use async_trait::async_trait;

use super::Embedder;
use crate::error::ServiceError;
use crate::openai::OpenAIClient;

pub struct OpenAIEmbedder {
    client: Arc<OpenAIClient>,
    model: String,
}

impl OpenAIEmbedder {
    pub fn new(client: Arc<OpenAIClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let embedding = self.client.create_embedding(&self.model, text).await?;
        tracing::debug!("Embedded query into {} dimensions with {}", embedding.len(), self.model);
        Ok(embedding)
    }
}
