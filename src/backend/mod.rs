/// Assistant backends the job client can drive
pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{BackendConfig, BackendProvider};
use crate::error::Result;
use crate::models::{ConversationMessage, JobStatus};
use crate::prompts::PromptStyle;

pub use gemini::GeminiBackend;
pub use openai::OpenAiAssistantBackend;

#[cfg(test)]
use mockall::automock;

/// The remote conversation protocol the job client speaks.
///
/// Stateful assistant services map onto it directly; single-shot completion
/// services keep the conversation locally and answer in one call.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    fn prompt_style(&self) -> PromptStyle;
    async fn create_conversation(&self) -> Result<String>;
    async fn post_message(&self, conversation_id: &str, content: &str) -> Result<()>;
    async fn start_job(&self, conversation_id: &str) -> Result<String>;
    async fn get_job_status(&self, conversation_id: &str, job_id: &str) -> Result<JobStatus>;
    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<ConversationMessage>>;
    /// Drops local state kept for the conversation. Called once when a run
    /// ends, whatever the outcome, and must tolerate unknown ids.
    fn release(&self, conversation_id: &str);
}

/// Builds the backend selected by `cfg.provider`.
pub fn build_backend(cfg: &BackendConfig) -> Result<Arc<dyn AssistantBackend>> {
    let backend: Arc<dyn AssistantBackend> = match cfg.provider {
        BackendProvider::OpenaiAssistant => Arc::new(OpenAiAssistantBackend::new(&cfg.openai)?),
        BackendProvider::Gemini => Arc::new(GeminiBackend::new(&cfg.gemini)?),
    };
    tracing::info!(provider = ?cfg.provider, "Assistant backend ready");
    Ok(backend)
}
