pub mod context;
pub mod embeddings;
pub mod generator;
pub mod pinecone;
pub mod vector_store;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{PipelineError, ServiceError, Stage};
use crate::models::Match;
use self::context::{build_context, count_tokens};

pub const NO_DOCUMENTS_MESSAGE: &str = "No relevant documents found.";

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;
}

#[async_trait]
pub trait VectorIndexClient: Send + Sync {
    /// Top `top_k` nearest stored vectors, best first. May be empty.
    async fn query(&self, vector: Vec<f32>, top_k: u64) -> Result<Vec<Match>, ServiceError>;

    /// Connectivity check against the configured index.
    async fn describe(&self) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn answer(&self, context: &str, question: &str) -> Result<String, ServiceError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Answered { text: String, context: String },
    NoDocuments,
}

impl Answer {
    /// Text shown to the user: the model answer or the no-results message.
    pub fn message(&self) -> &str {
        match self {
            Answer::Answered { text, .. } => text,
            Answer::NoDocuments => NO_DOCUMENTS_MESSAGE,
        }
    }

    pub fn context(&self) -> Option<&str> {
        match self {
            Answer::Answered { context, .. } => Some(context),
            Answer::NoDocuments => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub top_k: u64,
    pub call_timeout: Duration,
    pub max_context_tokens: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            call_timeout: Duration::from_secs(30),
            max_context_tokens: 6000,
        }
    }
}

/// Embed, search, build context, generate. One query per call, no caching.
pub struct RagPipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndexClient>,
    generator: Arc<dyn AnswerGenerator>,
    config: PipelineConfig,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndexClient>,
        generator: Arc<dyn AnswerGenerator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            generator,
            config,
        }
    }

    pub fn index(&self) -> &Arc<dyn VectorIndexClient> {
        &self.index
    }

    pub async fn run(&self, query: &str) -> Result<Answer, PipelineError> {
        let vector = self
            .bounded(Stage::Embed, self.embedder.embed(query))
            .await?;

        let matches = self
            .bounded(Stage::Search, self.index.query(vector, self.config.top_k))
            .await?;

        if matches.is_empty() {
            tracing::info!("No matches for query, skipping answer generation");
            return Ok(Answer::NoDocuments);
        }

        let context = build_context(&matches);
        tracing::info!("Retrieved {} matches ({} bytes of context)", matches.len(), context.len());
        if let Some(tokens) = count_tokens(&context) {
            if tokens > self.config.max_context_tokens {
                tracing::warn!(
                    "Context is {} tokens, above the {} token budget",
                    tokens,
                    self.config.max_context_tokens
                );
            }
        }

        let text = self
            .bounded(Stage::Generate, self.generator.answer(&context, query))
            .await?;

        Ok(Answer::Answered { text, context })
    }

    async fn bounded<T>(
        &self,
        stage: Stage,
        call: impl Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, PipelineError> {
        let limit = self.config.call_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(PipelineError { stage, source }),
            Err(_) => Err(PipelineError {
                stage,
                source: ServiceError::Timeout(limit),
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use serde_json::{json, Map};

    pub fn text_match(id: &str, text: &str) -> Match {
        let mut metadata = Map::new();
        metadata.insert("text".to_string(), json!(text));
        Match {
            id: id.to_string(),
            score: 0.9,
            metadata,
        }
    }

    pub struct StubEmbedder {
        pub calls: AtomicUsize,
        pub inputs: Mutex<Vec<String>>,
    }

    impl StubEmbedder {
        pub fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                inputs: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inputs.lock().unwrap().push(text.to_string());
            Ok(vec![0.25; 4])
        }
    }

    pub struct StubIndex {
        pub matches: Vec<Match>,
        pub calls: AtomicUsize,
        pub last_top_k: Mutex<Option<u64>>,
    }

    impl StubIndex {
        pub fn returning(matches: Vec<Match>) -> Self {
            Self {
                matches,
                calls: AtomicUsize::new(0),
                last_top_k: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl VectorIndexClient for StubIndex {
        async fn query(&self, _vector: Vec<f32>, top_k: u64) -> Result<Vec<Match>, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_top_k.lock().unwrap() = Some(top_k);
            Ok(self.matches.clone())
        }

        async fn describe(&self) -> Result<(), ServiceError> {
            Ok(())
        }
    }

    pub struct FailingIndex;

    #[async_trait]
    impl VectorIndexClient for FailingIndex {
        async fn query(&self, _vector: Vec<f32>, _top_k: u64) -> Result<Vec<Match>, ServiceError> {
            Err(ServiceError::MissingCredential("PINECONE_API_KEY"))
        }

        async fn describe(&self) -> Result<(), ServiceError> {
            Err(ServiceError::MissingCredential("PINECONE_API_KEY"))
        }
    }

    pub struct StubGenerator {
        pub reply: String,
        pub calls: AtomicUsize,
        pub received: Mutex<Vec<(String, String)>>,
    }

    impl StubGenerator {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
                received: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AnswerGenerator for StubGenerator {
        async fn answer(&self, context: &str, question: &str) -> Result<String, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.received
                .lock()
                .unwrap()
                .push((context.to_string(), question.to_string()));
            Ok(self.reply.clone())
        }
    }

    pub struct SlowGenerator;

    #[async_trait]
    impl AnswerGenerator for SlowGenerator {
        async fn answer(&self, _context: &str, _question: &str) -> Result<String, ServiceError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    pub fn pipeline(
        index: Arc<dyn VectorIndexClient>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> RagPipeline {
        RagPipeline::new(
            Arc::new(StubEmbedder::new()),
            index,
            generator,
            PipelineConfig::default(),
        )
    }
}
