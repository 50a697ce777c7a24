use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use uuid::Uuid;

// OpenAI-compatible wire types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ReplyMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Assistant message in a completion. `content` is null for refusals and tool calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest<'a> {
    pub model: &'a str,
    pub input: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingData {
    #[serde(default)]
    pub index: usize,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    pub id: String,
}

// Retrieval types

/// One result of a vector index query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: JsonMap<String, JsonValue>,
}

impl Match {
    /// Stored chunk text, or `""` when the `text` field is absent or not a string.
    pub fn text(&self) -> &str {
        self.metadata
            .get("text")
            .and_then(JsonValue::as_str)
            .unwrap_or("")
    }
}

// Chat transcript types

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

// HTTP API types

#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AskStatus {
    Answered,
    NoDocuments,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub status: AskStatus,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionCreated {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionTranscript {
    pub id: Uuid,
    pub turns: Vec<ChatTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_match_text_defaults_to_empty() {
        let m: Match = serde_json::from_value(json!({"id": "a", "score": 0.5})).unwrap();
        assert_eq!(m.text(), "");

        let m: Match =
            serde_json::from_value(json!({"id": "b", "score": 0.5, "metadata": {"text": 7}}))
                .unwrap();
        assert_eq!(m.text(), "");
    }

    #[test]
    fn test_chat_request_omits_unset_options() {
        let request = ChatRequest {
            model: "gpt-4".to_string(),
            messages: vec![Message::user("hi")],
            temperature: None,
            max_tokens: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("temperature").is_none());
        assert!(value.get("max_tokens").is_none());
    }

    #[test]
    fn test_reply_content_may_be_null() {
        let choice: Choice = serde_json::from_value(json!({
            "index": 0,
            "message": {"role": "assistant", "content": null, "refusal": "no"},
            "finish_reason": "stop"
        }))
        .unwrap();
        assert!(choice.message.content.is_none());
    }

    #[test]
    fn test_ask_status_serialization() {
        assert_eq!(
            serde_json::to_value(AskStatus::NoDocuments).unwrap(),
            json!("no_documents")
        );
        assert_eq!(serde_json::to_value(Role::Assistant).unwrap(), json!("assistant"));
    }
}
