//! CashID Service
//!
//! Ties the protocol crates together for a host application: configuration,
//! challenge issuance with nonce registration, and response validation with
//! an optional time budget.
//!
//! # Usage
//!
//! ```rust,ignore
//! let service = CashIdService::with_in_memory_store(config, Arc::new(Ed25519Verifier))?;
//! let challenge = service.create_request(Some("login"), None)?;
//! // ... client signs challenge.uri and posts a response ...
//! let outcome = service.validate_json(&body);
//! ```

pub mod config;
pub mod error;

pub use config::ServiceConfig;
pub use error::{RootError, RootResult};

use cashid_core::{
    BuiltRequest, NonceStore, RequestBuilder, Response, SignatureVerifier, StatusCode,
};
use cashid_store::InMemoryNonceStore;
use cashid_verify::{ValidationBudget, ValidationEngine, ValidationOutcome};
use std::sync::Arc;
use std::time::Duration;

/// A configured CashID service: issues challenges and validates responses.
pub struct CashIdService {
    config: ServiceConfig,
    builder: RequestBuilder,
    store: Arc<dyn NonceStore>,
    engine: Arc<ValidationEngine>,
}

impl CashIdService {
    pub fn new(
        config: ServiceConfig,
        verifier: Arc<dyn SignatureVerifier>,
        store: Arc<dyn NonceStore>,
    ) -> RootResult<Self> {
        config.validate()?;
        let builder = config.builder()?;
        let engine = ValidationEngine::new(config.domain.clone(), verifier, Arc::clone(&store))
            .with_user_action_policy(config.user_actions);

        tracing::info!(
            domain = %config.domain,
            path = %config.path,
            nonce_ttl_secs = config.nonce_ttl_secs,
            "cashid service initialized"
        );

        Ok(Self {
            config,
            builder,
            store,
            engine: Arc::new(engine),
        })
    }

    /// Build a service backed by a fresh process-local nonce store.
    pub fn with_in_memory_store(
        config: ServiceConfig,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> RootResult<Self> {
        Self::new(config, verifier, Arc::new(InMemoryNonceStore::new()))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn NonceStore> {
        &self.store
    }

    /// Build a challenge with the configured metadata and register its nonce
    /// for the configured TTL.
    pub fn create_request(&self, action: Option<&str>, data: Option<&str>) -> RootResult<BuiltRequest> {
        let built = self
            .builder
            .build(action, data, Some(&self.config.metadata))?;
        self.store
            .issue(built.request.nonce, &built.uri, self.config.nonce_ttl())?;

        tracing::info!(
            nonce = %built.request.nonce,
            action = action.unwrap_or(""),
            "issued cashid challenge"
        );
        Ok(built)
    }

    pub fn validate(&self, response: &Response) -> ValidationOutcome {
        self.engine.validate(response)
    }

    pub fn validate_json(&self, body: &str) -> ValidationOutcome {
        self.engine.validate_json(body)
    }

    /// Validate on a blocking task, giving up after `timeout`.
    ///
    /// A validation that runs out of time reports `ServiceInternalError` and
    /// leaves the nonce unconsumed, so the client may retry the same
    /// response. A validation that already reached the consume step when the
    /// time ran out is awaited and its outcome returned.
    pub async fn validate_with_timeout(
        &self,
        response: Response,
        timeout: Duration,
    ) -> ValidationOutcome {
        let engine = Arc::clone(&self.engine);
        let budget = Arc::new(ValidationBudget::new());
        let task_budget = Arc::clone(&budget);
        let mut task =
            tokio::task::spawn_blocking(move || engine.validate_within(&response, &task_budget));

        let joined = match tokio::time::timeout(timeout, &mut task).await {
            Ok(joined) => joined,
            Err(_) if budget.abandon() => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "validation timed out"
                );
                return ValidationOutcome::rejected(StatusCode::ServiceInternalError);
            }
            Err(_) => {
                tracing::debug!("validation committed before timeout, awaiting its outcome");
                task.await
            }
        };

        joined.unwrap_or_else(|e| {
            tracing::error!(error = %e, "validation task failed");
            ValidationOutcome::rejected(StatusCode::ServiceInternalError)
        })
    }

    /// `validate_with_timeout` using `validation_timeout_ms` from the config.
    pub async fn validate_with_configured_timeout(&self, response: Response) -> ValidationOutcome {
        self.validate_with_timeout(response, self.config.validation_timeout())
            .await
    }
}
