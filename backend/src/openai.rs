use std::time::Duration;

use reqwest::Client;

use crate::error::ServiceError;
use crate::models::{ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, ModelList};

const SERVICE: &str = "openai";

/// Client for an OpenAI-compatible API, shared by the embedder and the answer generator.
pub struct OpenAIClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAIClient {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn api_key(&self) -> Result<&str, ServiceError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ServiceError::MissingCredential("OPENAI_API_KEY"))
    }

    pub async fn chat_completion(
        &self,
        request: &ChatRequest,
    ) -> Result<ChatResponse, ServiceError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self.client
            .post(&url)
            .bearer_auth(self.api_key()?)
            .json(request)
            .send()
            .await?;

        let response = check_status(response).await?;
        let chat_response: ChatResponse = response.json().await?;
        Ok(chat_response)
    }

    pub async fn create_embedding(
        &self,
        model: &str,
        input: &str,
    ) -> Result<Vec<f32>, ServiceError> {
        let url = format!("{}/embeddings", self.base_url);

        let response = self.client
            .post(&url)
            .bearer_auth(self.api_key()?)
            .json(&EmbeddingRequest { model, input })
            .send()
            .await?;

        let response = check_status(response).await?;
        let body: EmbeddingResponse = response.json().await?;
        first_embedding(body)
    }

    /// Lists available models; used as the connectivity check.
    pub async fn list_models(&self) -> Result<Vec<String>, ServiceError> {
        let url = format!("{}/models", self.base_url);

        let response = self.client
            .get(&url)
            .bearer_auth(self.api_key()?)
            .send()
            .await?;

        let response = check_status(response).await?;
        let models: ModelList = response.json().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Api {
        service: SERVICE,
        status,
        body,
    })
}

fn first_embedding(body: EmbeddingResponse) -> Result<Vec<f32>, ServiceError> {
    body.data
        .into_iter()
        .min_by_key(|d| d.index)
        .map(|d| d.embedding)
        .ok_or_else(|| ServiceError::invalid(SERVICE, "missing embedding data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_embedding_picks_index_zero() {
        let body: EmbeddingResponse = serde_json::from_value(json!({
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.5, 0.5]},
                {"object": "embedding", "index": 0, "embedding": [0.1, 0.2]}
            ],
            "model": "text-embedding-ada-002"
        }))
        .unwrap();
        assert_eq!(first_embedding(body).unwrap(), vec![0.1, 0.2]);
    }

    #[test]
    fn test_first_embedding_rejects_empty_data() {
        let body: EmbeddingResponse = serde_json::from_value(json!({"data": []})).unwrap();
        assert!(matches!(
            first_embedding(body),
            Err(ServiceError::InvalidResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let client = OpenAIClient::new(
            "http://127.0.0.1:9".to_string(),
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        let err = client.create_embedding("m", "q").await.unwrap_err();
        assert!(matches!(err, ServiceError::MissingCredential("OPENAI_API_KEY")));
    }
}
