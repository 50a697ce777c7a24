use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Failure of a call to one of the hosted services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} is not configured")]
    MissingCredential(&'static str),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} request failed: {status} - {body}")]
    Api {
        service: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid response from {service}: {reason}")]
    InvalidResponse {
        service: &'static str,
        reason: String,
    },

    #[error("qdrant error: {0}")]
    Qdrant(#[from] qdrant_client::QdrantError),

    #[error("no response within {0:?}")]
    Timeout(Duration),
}

impl ServiceError {
    pub fn invalid(service: &'static str, reason: impl Into<String>) -> Self {
        ServiceError::InvalidResponse {
            service,
            reason: reason.into(),
        }
    }
}

/// Pipeline step in which a query failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embed,
    Search,
    Generate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Embed => "embedding",
            Stage::Search => "vector search",
            Stage::Generate => "answer generation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: ServiceError,
}

impl PipelineError {
    pub fn is_timeout(&self) -> bool {
        matches!(self.source, ServiceError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_names_stage() {
        let err = PipelineError {
            stage: Stage::Search,
            source: ServiceError::MissingCredential("PINECONE_API_KEY"),
        };
        assert_eq!(
            err.to_string(),
            "vector search failed: PINECONE_API_KEY is not configured"
        );
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_timeout_detection() {
        let err = PipelineError {
            stage: Stage::Generate,
            source: ServiceError::Timeout(Duration::from_secs(30)),
        };
        assert!(err.is_timeout());
    }
}
