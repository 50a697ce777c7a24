use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use super::VectorIndexClient;
use crate::error::ServiceError;
use crate::models::Match;

const SERVICE: &str = "pinecone";
const API_VERSION: &str = "2024-07";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    vector: Vec<f32>,
    top_k: u64,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
}

/// Pinecone serverless/pod index. The data-plane host is resolved once
/// through the control plane and then reused.
pub struct PineconeIndex {
    client: Client,
    controller_url: String,
    api_key: Option<String>,
    index_name: Option<String>,
    host: OnceCell<String>,
}

impl PineconeIndex {
    pub fn new(
        controller_url: String,
        api_key: Option<String>,
        index_name: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            controller_url: controller_url.trim_end_matches('/').to_string(),
            api_key,
            index_name,
            host: OnceCell::new(),
        })
    }

    fn api_key(&self) -> Result<&str, ServiceError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ServiceError::MissingCredential("PINECONE_API_KEY"))
    }

    fn index_name(&self) -> Result<&str, ServiceError> {
        self.index_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or(ServiceError::MissingCredential("PINECONE_INDEX_NAME"))
    }

    async fn describe_index(&self) -> Result<IndexDescription, ServiceError> {
        let url = format!("{}/indexes/{}", self.controller_url, self.index_name()?);

        let response = self.client
            .get(&url)
            .header("Api-Key", self.api_key()?)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn host(&self) -> Result<&str, ServiceError> {
        let host = self
            .host
            .get_or_try_init(|| async {
                let description = self.describe_index().await?;
                tracing::info!("Resolved Pinecone index host: {}", description.host);
                Ok::<_, ServiceError>(query_base_url(&description.host))
            })
            .await?;
        Ok(host.as_str())
    }
}

#[async_trait]
impl VectorIndexClient for PineconeIndex {
    async fn query(&self, vector: Vec<f32>, top_k: u64) -> Result<Vec<Match>, ServiceError> {
        let url = format!("{}/query", self.host().await?);
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };

        let response = self.client
            .post(&url)
            .header("Api-Key", self.api_key()?)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        let response = check_status(response).await?;
        let body: QueryResponse = response.json().await?;
        Ok(body.matches)
    }

    async fn describe(&self) -> Result<(), ServiceError> {
        self.describe_index().await.map(|_| ())
    }
}

fn query_base_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", host.trim_end_matches('/'))
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_request_shape() {
        let request = QueryRequest {
            vector: vec![0.1, 0.2],
            top_k: 5,
            include_metadata: true,
            include_values: false,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "vector": [0.1f32, 0.2f32],
                "topK": 5,
                "includeMetadata": true,
                "includeValues": false
            })
        );
    }

    #[test]
    fn test_query_response_parsing() {
        let body: QueryResponse = serde_json::from_value(json!({
            "matches": [
                {"id": "doc-1", "score": 0.91, "metadata": {"text": "Refunds within 30 days."}},
                {"id": "doc-2", "score": 0.55}
            ],
            "namespace": ""
        }))
        .unwrap();

        assert_eq!(body.matches.len(), 2);
        assert_eq!(body.matches[0].id, "doc-1");
        assert_eq!(body.matches[0].text(), "Refunds within 30 days.");
        assert_eq!(body.matches[1].text(), "");
    }

    #[test]
    fn test_empty_response() {
        let body: QueryResponse = serde_json::from_value(json!({"namespace": ""})).unwrap();
        assert!(body.matches.is_empty());
    }

    #[test]
    fn test_query_base_url() {
        assert_eq!(
            query_base_url("docs-abc123.svc.us-east-1.pinecone.io"),
            "https://docs-abc123.svc.us-east-1.pinecone.io"
        );
        assert_eq!(query_base_url("http://localhost:5081/"), "http://localhost:5081");
    }

    #[tokio::test]
    async fn test_missing_index_name() {
        let index = PineconeIndex::new(
            "http://127.0.0.1:9".to_string(),
            Some("key".to_string()),
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        let err = index.describe().await.unwrap_err();
        assert!(matches!(err, ServiceError::MissingCredential("PINECONE_INDEX_NAME")));
    }
}
