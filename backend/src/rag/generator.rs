use std::sync::Arc;

use async_trait::async_trait;

use super::AnswerGenerator;
use crate::error::ServiceError;
use crate::models::{ChatRequest, ChatResponse, Message};
use crate::openai::OpenAIClient;

pub const NOT_AVAILABLE: &str = "The answer is not available in the available documents.";

/// Fixed instruction restricting the model to the retrieved context.
pub fn system_prompt() -> String {
    format!(
        "You are a helpful AI assistant.\n\
         Answer the user's question based only on the provided context. \
         Write your answer in bullet points. Do not write in paragraphs.\n\
         If the answer is not contained in the context, say '{}'.",
        NOT_AVAILABLE
    )
}

pub fn user_prompt(context: &str, question: &str) -> String {
    format!("Context:\n{}\n\nQuestion: {}", context, question)
}

pub fn build_request(model: &str, context: &str, question: &str) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: vec![
            Message::system(system_prompt()),
            Message::user(user_prompt(context, question)),
        ],
        temperature: Some(0.0),
        max_tokens: None,
    }
}

pub struct OpenAIAnswerGenerator {
    client: Arc<OpenAIClient>,
    model: String,
}

impl OpenAIAnswerGenerator {
    pub fn new(client: Arc<OpenAIClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl AnswerGenerator for OpenAIAnswerGenerator {
    async fn answer(&self, context: &str, question: &str) -> Result<String, ServiceError> {
        let request = build_request(&self.model, context, question);
        let response = self.client.chat_completion(&request).await?;
        first_choice_text(response)
    }
}

fn first_choice_text(response: ChatResponse) -> Result<String, ServiceError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::invalid("openai", "no choices in completion"))?;

    let content = choice
        .message
        .content
        .ok_or_else(|| ServiceError::invalid("openai", "completion has no text content"))?;

    Ok(content.trim().to_string())
}
