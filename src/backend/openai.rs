use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use super::AssistantBackend;
use crate::config::{
    OpenAiAssistantConfig, PLACEHOLDER_ASSISTANT_ID, PLACEHOLDER_OPENAI_API_KEY, is_unset,
};
use crate::error::{LocatorError, Result};
use crate::models::{
    ConversationMessage, CreateMessageRequest, CreateRunRequest, JobStatus, MessageList,
    MessageRole, RunObject, ThreadObject,
};
use crate::prompts::PromptStyle;

const ASSISTANTS_BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

/// OpenAI Assistants v2: threads are conversations, runs are jobs.
pub struct OpenAiAssistantBackend {
    client: Client,
    api_key: String,
    assistant_id: String,
    base_url: String,
}

impl OpenAiAssistantBackend {
    pub fn new(cfg: &OpenAiAssistantConfig) -> Result<Self> {
        if is_unset(&cfg.api_key, PLACEHOLDER_OPENAI_API_KEY) {
            return Err(LocatorError::Config(
                "OPENAI_API_KEY must be set for the OpenAI assistant backend".to_string(),
            ));
        }
        if is_unset(&cfg.assistant_id, PLACEHOLDER_ASSISTANT_ID) {
            return Err(LocatorError::Config(
                "OPENAI_ASSISTANT_ID must be set for the OpenAI assistant backend".to_string(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            api_key: cfg.api_key.clone(),
            assistant_id: cfg.assistant_id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .header(ASSISTANTS_BETA_HEADER.0, ASSISTANTS_BETA_HEADER.1)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .header(ASSISTANTS_BETA_HEADER.0, ASSISTANTS_BETA_HEADER.1)
    }

    async fn send<T: DeserializeOwned>(&self, operation: &str, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LocatorError::Http {
                operation: operation.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        response.json().await.map_err(|e| {
            LocatorError::Internal(format!("{operation}: unreadable response body: {e}"))
        })
    }
}

#[async_trait]
impl AssistantBackend for OpenAiAssistantBackend {
    fn prompt_style(&self) -> PromptStyle {
        PromptStyle::Instructed
    }

    async fn create_conversation(&self) -> Result<String> {
        let thread: ThreadObject = self
            .send(
                "Failed to create thread",
                self.post("/threads").json(&serde_json::json!({})),
            )
            .await?;
        Ok(thread.id)
    }

    async fn post_message(&self, conversation_id: &str, content: &str) -> Result<()> {
        let _: serde_json::Value = self
            .send(
                "Failed to add message",
                self.post(&format!("/threads/{conversation_id}/messages"))
                    .json(&CreateMessageRequest {
                        role: "user",
                        content,
                    }),
            )
            .await?;
        Ok(())
    }

    async fn start_job(&self, conversation_id: &str) -> Result<String> {
        let run: RunObject = self
            .send(
                "Failed to run assistant",
                self.post(&format!("/threads/{conversation_id}/runs"))
                    .json(&CreateRunRequest {
                        assistant_id: &self.assistant_id,
                    }),
            )
            .await?;
        Ok(run.id)
    }

    async fn get_job_status(&self, conversation_id: &str, job_id: &str) -> Result<JobStatus> {
        let run: RunObject = self
            .send(
                "Failed to check run status",
                self.get(&format!("/threads/{conversation_id}/runs/{job_id}")),
            )
            .await?;
        let status = JobStatus::from_run_status(&run.status);
        if status == JobStatus::Failed {
            let (code, message) = run
                .last_error
                .map(|e| (e.code, e.message))
                .unwrap_or((None, None));
            tracing::error!(
                run_id = %run.id,
                remote_status = %run.status,
                code = code.as_deref().unwrap_or("none"),
                message = message.as_deref().unwrap_or("none"),
                "Assistant run failed"
            );
        }
        Ok(status)
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<ConversationMessage>> {
        let list: MessageList = self
            .send(
                "Failed to get messages",
                self.get(&format!("/threads/{conversation_id}/messages")),
            )
            .await?;
        Ok(list
            .data
            .iter()
            .map(|message| ConversationMessage {
                role: MessageRole::from_wire(&message.role),
                text: message.first_text(),
            })
            .collect())
    }

    fn release(&self, _conversation_id: &str) {
        // nothing is held locally for a thread
    }
}
