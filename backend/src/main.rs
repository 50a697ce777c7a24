use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use mini_rag::config::{Settings, VectorBackend};
use mini_rag::openai::OpenAIClient;
use mini_rag::rag::embeddings::OpenAIEmbedder;
use mini_rag::rag::generator::OpenAIAnswerGenerator;
use mini_rag::rag::pinecone::PineconeIndex;
use mini_rag::rag::vector_store::QdrantIndex;
use mini_rag::rag::{PipelineConfig, RagPipeline, VectorIndexClient};
use mini_rag::server::{router, AppState};
use mini_rag::session::SessionStore;
use mini_rag::status::check_services;

#[derive(Parser, Debug)]
#[command(name = "mini-rag")]
#[command(
    about = "Answer questions from a document collection using retrieval-augmented generation"
)]
struct Args {
    /// Optional TOML settings file; environment variables take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "BIND_ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;
    let bind_addr = args.bind.unwrap_or_else(|| settings.bind_addr.clone());

    tracing::info!("Using OpenAI endpoint: {}", settings.openai_base_url);
    tracing::info!("Using vector index: {}", settings.index_label());

    let openai = Arc::new(OpenAIClient::new(
        settings.openai_base_url.clone(),
        settings.openai_api_key.clone(),
        settings.call_timeout(),
    )?);

    let index: Arc<dyn VectorIndexClient> = match settings.vector_backend {
        VectorBackend::Pinecone => Arc::new(PineconeIndex::new(
            settings.pinecone_controller_url.clone(),
            settings.pinecone_api_key.clone(),
            settings.pinecone_index_name.clone(),
            settings.call_timeout(),
        )?),
        VectorBackend::Qdrant => Arc::new(QdrantIndex::new(
            &settings.qdrant_url,
            &settings.qdrant_collection,
        )?),
    };

    let pipeline = RagPipeline::new(
        Arc::new(OpenAIEmbedder::new(openai.clone(), settings.embedding_model.clone())),
        index.clone(),
        Arc::new(OpenAIAnswerGenerator::new(openai.clone(), settings.chat_model.clone())),
        PipelineConfig {
            top_k: settings.top_k,
            call_timeout: settings.call_timeout(),
            max_context_tokens: settings.max_context_tokens,
        },
    );

    let index_label = settings.index_label();
    let startup_status = check_services(&openai, index.as_ref(), &index_label).await;

    let sessions = Arc::new(SessionStore::new(settings.session_idle_limit()));
    SessionStore::start_sweeper(sessions.clone(), settings.session_sweep_interval());

    let state = Arc::new(AppState {
        pipeline,
        sessions,
        openai,
        index_label,
        startup_status,
    });

    let app = router(state, &settings.static_dir);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Mini RAG server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
