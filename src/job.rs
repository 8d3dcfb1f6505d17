use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::backend::AssistantBackend;
use crate::config::{Config, PollingConfig};
use crate::error::{LocatorError, Result};
use crate::models::{JobStatus, LookupKind, MessageRole, RemoteJob};
use crate::prompts::PromptBuilder;
use crate::retry::RetryPolicy;

/// Releases the backend conversation when a run ends, including when the
/// run future is dropped mid-flight.
struct ConversationLease<'a> {
    backend: &'a dyn AssistantBackend,
    conversation_id: String,
}

impl Drop for ConversationLease<'_> {
    fn drop(&mut self) {
        self.backend.release(&self.conversation_id);
    }
}

/// Runs one remote assistant job per call and returns the raw answer text.
///
/// Each network step is retried on its own; a failed or timed-out job is
/// not. Nothing carries over between calls.
pub struct AssistantJobClient {
    backend: Arc<dyn AssistantBackend>,
    retry: RetryPolicy,
    prompts: PromptBuilder,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl AssistantJobClient {
    pub fn new(
        backend: Arc<dyn AssistantBackend>,
        retry: RetryPolicy,
        prompts: PromptBuilder,
        polling: &PollingConfig,
    ) -> Self {
        Self {
            backend,
            retry,
            prompts,
            poll_interval: Duration::from_millis(polling.interval_ms),
            max_poll_attempts: polling.max_attempts,
        }
    }

    pub fn from_config(backend: Arc<dyn AssistantBackend>, cfg: &Config) -> Self {
        Self::new(
            backend,
            RetryPolicy::from_config(&cfg.retry),
            PromptBuilder::new(cfg.nearby.radius_miles),
            &cfg.polling,
        )
    }

    pub async fn run(&self, kind: LookupKind, coordinates: &str) -> Result<String> {
        let backend = self.backend.as_ref();
        let content = self
            .prompts
            .build(kind, coordinates, backend.prompt_style());

        tracing::info!(?kind, "Creating conversation");
        let conversation_id = self
            .retry
            .execute("create_conversation", || backend.create_conversation())
            .await?;
        tracing::info!(%conversation_id, "Conversation created");
        let lease = ConversationLease {
            backend,
            conversation_id,
        };
        let conversation_id = lease.conversation_id.as_str();

        self.retry
            .execute("post_message", || backend.post_message(conversation_id, &content))
            .await?;

        let job_id = self
            .retry
            .execute("start_job", || backend.start_job(conversation_id))
            .await?;
        tracing::info!(conversation_id, %job_id, "Job started");

        let mut job = RemoteJob::new(conversation_id.to_string(), job_id);
        self.await_completion(&mut job).await?;

        let messages = self
            .retry
            .execute("get_messages", || backend.get_messages(conversation_id))
            .await?;

        let answer = messages
            .into_iter()
            .find(|message| message.role == MessageRole::Assistant)
            .and_then(|message| message.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LocatorError::EmptyResponse)?;

        tracing::debug!(job_id = %job.job_id, answer = %answer, "Assistant response");
        Ok(answer)
    }

    /// Polls until the job completes, fails, or the attempt cap is hit.
    async fn await_completion(&self, job: &mut RemoteJob) -> Result<()> {
        let backend = self.backend.as_ref();
        while job.status != JobStatus::Completed && job.attempt_count < self.max_poll_attempts {
            sleep(self.poll_interval).await;

            job.status = self
                .retry
                .execute("get_job_status", || {
                    backend.get_job_status(&job.conversation_id, &job.job_id)
                })
                .await?;
            job.attempt_count += 1;
            tracing::debug!(
                job_id = %job.job_id,
                status = ?job.status,
                attempt = job.attempt_count,
                "Job status"
            );

            if job.status == JobStatus::Failed {
                tracing::error!(job_id = %job.job_id, "Assistant run failed");
                return Err(LocatorError::JobFailed {
                    job_id: job.job_id.clone(),
                });
            }
        }

        if job.status != JobStatus::Completed {
            tracing::error!(
                job_id = %job.job_id,
                attempts = job.attempt_count,
                "Assistant run timed out"
            );
            return Err(LocatorError::JobTimeout {
                attempts: job.attempt_count,
            });
        }
        Ok(())
    }
}
