use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::AssistantBackend;
use crate::config::{GeminiConfig, PLACEHOLDER_GEMINI_API_KEY, is_unset};
use crate::error::{LocatorError, Result};
use crate::models::{
    ConversationMessage, GeminiContent, GeminiPart, GenerateContentRequest,
    GenerateContentResponse, GenerationConfig, JobStatus,
};
use crate::prompts::PromptStyle;

/// Local state of one prompt/answer exchange.
#[derive(Debug, Default)]
struct Exchange {
    prompt: Option<String>,
    answer: Option<String>,
    status: Option<JobStatus>,
}

/// Gemini `generateContent`: a single completion call stands in for the job.
///
/// Conversations exist only in `exchanges`, keyed by a fresh UUID per lookup,
/// and are dropped once the answer has been read, the call failed, or the
/// run released them.
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_output_tokens: u32,
    exchanges: Mutex<HashMap<String, Exchange>>,
}

impl GeminiBackend {
    pub fn new(cfg: &GeminiConfig) -> Result<Self> {
        if is_unset(&cfg.api_key, PLACEHOLDER_GEMINI_API_KEY) {
            return Err(LocatorError::Config(
                "GEMINI_API_KEY must be set for the Gemini backend".to_string(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            temperature: cfg.temperature,
            max_output_tokens: cfg.max_output_tokens,
            exchanges: Mutex::new(HashMap::new()),
        })
    }

    fn exchanges(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Exchange>>> {
        self.exchanges
            .lock()
            .map_err(|_| LocatorError::Internal("Gemini exchange table poisoned".to_string()))
    }

    fn unknown(conversation_id: &str) -> LocatorError {
        LocatorError::Internal(format!("Unknown conversation: {conversation_id}"))
    }

    async fn generate(&self, prompt: &str) -> Result<GenerateContentResponse> {
        let request = GenerateContentRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LocatorError::Http {
                operation: "Failed to generate content".to_string(),
                status: status.as_u16(),
                body,
            });
        }
        response.json().await.map_err(|e| {
            LocatorError::Internal(format!("Failed to parse Gemini response: {e}"))
        })
    }
}

#[async_trait]
impl AssistantBackend for GeminiBackend {
    fn prompt_style(&self) -> PromptStyle {
        PromptStyle::SelfContained
    }

    async fn create_conversation(&self) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.exchanges()?.insert(id.clone(), Exchange::default());
        Ok(id)
    }

    async fn post_message(&self, conversation_id: &str, content: &str) -> Result<()> {
        let mut exchanges = self.exchanges()?;
        let exchange = exchanges
            .get_mut(conversation_id)
            .ok_or_else(|| Self::unknown(conversation_id))?;
        exchange.prompt = Some(content.to_string());
        Ok(())
    }

    async fn start_job(&self, conversation_id: &str) -> Result<String> {
        let prompt = self
            .exchanges()?
            .get(conversation_id)
            .ok_or_else(|| Self::unknown(conversation_id))?
            .prompt
            .clone()
            .ok_or_else(|| {
                LocatorError::Internal(format!("No prompt posted to {conversation_id}"))
            })?;

        let response = self.generate(&prompt).await?;
        let answer = response.first_text();
        if answer.is_none() {
            let finish_reason = response
                .candidates
                .first()
                .and_then(|c| c.finish_reason.as_deref())
                .unwrap_or("none");
            tracing::error!(
                conversation_id,
                finish_reason,
                "Gemini returned no candidate text"
            );
        }

        let mut exchanges = self.exchanges()?;
        let exchange = exchanges
            .get_mut(conversation_id)
            .ok_or_else(|| Self::unknown(conversation_id))?;
        exchange.status = Some(if answer.is_some() {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        });
        exchange.answer = answer;
        Ok(conversation_id.to_string())
    }

    async fn get_job_status(&self, conversation_id: &str, _job_id: &str) -> Result<JobStatus> {
        let mut exchanges = self.exchanges()?;
        let status = exchanges
            .get(conversation_id)
            .ok_or_else(|| Self::unknown(conversation_id))?
            .status
            .unwrap_or(JobStatus::InProgress);
        if status == JobStatus::Failed {
            exchanges.remove(conversation_id);
        }
        Ok(status)
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<ConversationMessage>> {
        let exchange = self
            .exchanges()?
            .remove(conversation_id)
            .ok_or_else(|| Self::unknown(conversation_id))?;

        let mut messages = Vec::new();
        if let Some(answer) = exchange.answer {
            messages.push(ConversationMessage::assistant(answer));
        }
        if let Some(prompt) = exchange.prompt {
            messages.push(ConversationMessage::user(prompt));
        }
        Ok(messages)
    }

    fn release(&self, conversation_id: &str) {
        if let Ok(mut exchanges) = self.exchanges.lock() {
            if exchanges.remove(conversation_id).is_some() {
                tracing::debug!(conversation_id, "Released unfinished Gemini exchange");
            }
        }
    }
}
