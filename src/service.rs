use std::sync::Arc;

use crate::backend::{AssistantBackend, build_backend};
use crate::config::Config;
use crate::coordinates::parse_coordinates;
use crate::error::{LocatorError, Result};
use crate::job::AssistantJobClient;
use crate::models::{LookupKind, PsapRecord};
use crate::parser::{parse_multiple, parse_single};

/// Caller-facing PSAP lookups.
///
/// Cheap to share behind an `Arc`; concurrent lookups run as independent
/// conversations.
pub struct PsapLocator {
    jobs: AssistantJobClient,
}

impl PsapLocator {
    pub fn new(jobs: AssistantJobClient) -> Self {
        Self { jobs }
    }

    /// Wires the configured backend, retry policy and polling budget.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let backend = build_backend(&cfg.backend)?;
        Ok(Self::with_backend(backend, cfg))
    }

    pub fn with_backend(backend: Arc<dyn AssistantBackend>, cfg: &Config) -> Self {
        Self::new(AssistantJobClient::from_config(backend, cfg))
    }

    /// Finds the PSAP responsible for the given position.
    pub async fn lookup_primary(&self, coordinates: &str) -> Result<PsapRecord> {
        tracing::info!(coordinates, "Starting PSAP lookup");
        let answer = self
            .fetch(LookupKind::Primary, coordinates)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "PSAP lookup failed");
                LocatorError::PrimaryLookup(Box::new(e))
            })?;
        let record = parse_single(&answer);
        tracing::info!(name = %record.name, phones = record.phone_numbers.len(), "PSAP lookup successful");
        Ok(record)
    }

    /// Finds backup PSAPs around the given position, primary first.
    pub async fn lookup_nearby(&self, coordinates: &str) -> Result<Vec<PsapRecord>> {
        tracing::info!(coordinates, "Starting nearby PSAP lookup");
        let answer = self
            .fetch(LookupKind::Nearby, coordinates)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Nearby PSAP lookup failed");
                LocatorError::NearbyLookup(Box::new(e))
            })?;
        let records = parse_multiple(&answer);
        tracing::info!(count = records.len(), "Nearby PSAP lookup successful");
        Ok(records)
    }

    async fn fetch(&self, kind: LookupKind, coordinates: &str) -> Result<String> {
        let coordinates = coordinates.trim();
        if coordinates.is_empty() {
            return Err(LocatorError::InvalidInput(
                "Coordinates are required".to_string(),
            ));
        }
        if parse_coordinates(coordinates).is_none() {
            // the assistant may still resolve free-form locations
            tracing::warn!(coordinates, "Coordinates not in a recognized format");
        }
        self.jobs.run(kind, coordinates).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockAssistantBackend;
    use crate::backend::testing::answering_backend;
    use crate::models::{JobStatus, PhoneNumber};
    use crate::prompts::PromptStyle;

    fn locator(backend: MockAssistantBackend) -> PsapLocator {
        PsapLocator::with_backend(Arc::new(backend), &Config::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_primary_parses_answer() {
        let locator = locator(answering_backend(
            "PSAP: Boston Police 911\nPhone: 911, 617-343-4911\nJurisdiction: City of Boston",
        ));
        let record = locator
            .lookup_primary("42.3601, -71.0589")
            .await
            .expect("lookup should succeed");
        assert_eq!(record.name, "Boston Police 911");
        assert_eq!(
            record.phone_numbers,
            vec![PhoneNumber::emergency("911"), PhoneNumber::emergency("617-343-4911")]
        );
        assert_eq!(record.jurisdiction, "City of Boston");
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_nearby_keeps_named_sections() {
        let locator = locator(answering_backend(
            "PSAP: Primary Center\nPhone: 911\n\nPSAP: Backup Center\nPhone: 555-0100\n\nThese are estimates.",
        ));
        let records = locator
            .lookup_nearby("42.3601 N, 71.0589 W")
            .await
            .expect("nearby lookup should succeed");
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Primary Center", "Backup Center"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_errors_are_prefixed() {
        let mut backend = MockAssistantBackend::new();
        backend.expect_release().return_const(());
        backend
            .expect_prompt_style()
            .return_const(PromptStyle::Instructed);
        backend
            .expect_create_conversation()
            .returning(|| Ok("thread_1".to_string()));
        backend.expect_post_message().returning(|_, _| Ok(()));
        backend
            .expect_start_job()
            .returning(|_| Ok("run_1".to_string()));
        backend
            .expect_get_job_status()
            .returning(|_, _| Ok(JobStatus::Failed));
        let locator = locator(backend);

        let err = locator
            .lookup_primary("40.7128, -74.0060")
            .await
            .expect_err("failed job should fail lookup");
        assert_eq!(err.to_string(), "Failed to lookup PSAP: Assistant run failed");
        assert!(matches!(err.root(), LocatorError::JobFailed { .. }));

        let err = locator
            .lookup_nearby("40.7128, -74.0060")
            .await
            .expect_err("failed job should fail nearby lookup");
        assert_eq!(err.to_string(), "Failed to find nearby PSAPs: Assistant run failed");
    }

    #[tokio::test]
    async fn test_blank_coordinates_rejected_without_network() {
        let mut backend = MockAssistantBackend::new();
        backend.expect_create_conversation().never();
        let err = locator(backend)
            .lookup_primary("   ")
            .await
            .expect_err("blank input should be rejected");
        assert!(matches!(err.root(), LocatorError::InvalidInput(_)));
    }
}
