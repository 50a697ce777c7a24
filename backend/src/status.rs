use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ServiceError;
use crate::openai::OpenAIClient;
use crate::rag::VectorIndexClient;

#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Check {
    fn from_result<T>(service: &str, result: Result<T, ServiceError>) -> Self {
        match result {
            Ok(_) => {
                tracing::info!("{} connected", service);
                Check { connected: true, error: None }
            }
            Err(e) => {
                tracing::warn!("{} unavailable: {}", service, e);
                Check { connected: false, error: Some(e.to_string()) }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub openai: Check,
    pub vector_index: Check,
    pub index: String,
    pub checked_at: DateTime<Utc>,
}

/// Checks both hosted services. Failures are reported, never raised.
pub async fn check_services(
    openai: &OpenAIClient,
    index: &dyn VectorIndexClient,
    index_label: &str,
) -> ServiceStatus {
    let (models, described) = tokio::join!(openai.list_models(), index.describe());

    ServiceStatus {
        openai: Check::from_result("OpenAI API", models),
        vector_index: Check::from_result("Vector index", described),
        index: index_label.to_string(),
        checked_at: Utc::now(),
    }
}
