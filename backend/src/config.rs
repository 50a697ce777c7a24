use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    Pinecone,
    Qdrant,
}

/// Runtime settings, read from an optional TOML file and then the environment.
///
/// Credentials are optional. A missing key fails the first call that needs
/// it and shows up in the service status.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_vector_backend")]
    pub vector_backend: VectorBackend,
    #[serde(default)]
    pub pinecone_api_key: Option<String>,
    #[serde(default)]
    pub pinecone_index_name: Option<String>,
    #[serde(default = "default_pinecone_controller_url")]
    pub pinecone_controller_url: String,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_qdrant_collection")]
    pub qdrant_collection: String,

    #[serde(default = "default_top_k")]
    pub top_k: u64,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}
fn default_chat_model() -> String {
    "gpt-4".to_string()
}
fn default_vector_backend() -> VectorBackend {
    VectorBackend::Pinecone
}
fn default_pinecone_controller_url() -> String {
    "https://api.pinecone.io".to_string()
}
fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}
fn default_qdrant_collection() -> String {
    "documents".to_string()
}
fn default_top_k() -> u64 {
    5
}
fn default_call_timeout_secs() -> u64 {
    30
}
fn default_max_context_tokens() -> usize {
    6000
}
fn default_session_idle_secs() -> u64 {
    30 * 60
}
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

impl Settings {
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize::<Settings>()
            .context("Invalid configuration")?;

        if settings.top_k == 0 {
            anyhow::bail!("TOP_K must be at least 1");
        }
        Ok(settings)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn session_idle_limit(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    /// How often idle chat sessions are swept: once a minute, or sooner for short limits.
    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs.clamp(1, 60))
    }

    /// Identifier of the configured index, for status display.
    pub fn index_label(&self) -> String {
        match self.vector_backend {
            VectorBackend::Pinecone => format!(
                "pinecone:{}",
                self.pinecone_index_name.as_deref().unwrap_or("<unset>")
            ),
            VectorBackend::Qdrant => format!("qdrant:{}", self.qdrant_collection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(text: &str) -> Settings {
        config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = from_toml("");
        assert_eq!(settings.embedding_model, "text-embedding-ada-002");
        assert_eq!(settings.chat_model, "gpt-4");
        assert_eq!(settings.vector_backend, VectorBackend::Pinecone);
        assert_eq!(settings.top_k, 5);
        assert_eq!(settings.call_timeout(), Duration::from_secs(30));
        assert!(settings.openai_api_key.is_none());
        assert_eq!(settings.session_idle_limit(), Duration::from_secs(1800));
        assert_eq!(settings.session_sweep_interval(), Duration::from_secs(60));
        assert_eq!(settings.index_label(), "pinecone:<unset>");
    }

    #[test]
    fn test_qdrant_backend() {
        let settings = from_toml(
            r#"
            vector_backend = "qdrant"
            qdrant_collection = "manuals"
            top_k = 3
            session_idle_secs = 20
            "#,
        );
        assert_eq!(settings.vector_backend, VectorBackend::Qdrant);
        assert_eq!(settings.top_k, 3);
        assert_eq!(settings.index_label(), "qdrant:manuals");
        assert_eq!(settings.session_sweep_interval(), Duration::from_secs(20));
    }
}
