//! Entry point shared by the network and batch surfaces

use crate::classify::ResultClassifier;
use crate::isolation::{ResourceLimiter, RestrictedEnvironment, RestrictedEnvironmentBuilder};
use crate::request::{EntryPoint, RequestValidator};
use crate::worker::{Worker, WorkerSpec};
use crate::{ExecutionRequest, ExecutionResult, ExecutorConfig, Result};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Validates submissions and runs each one in a fresh worker.
///
/// Holds only immutable, startup-time state plus two counters, so one
/// instance is shared (behind an `Arc`) by every concurrent request.
#[derive(Debug)]
pub struct Executor {
    config: ExecutorConfig,
    validator: RequestValidator,
    environment: RestrictedEnvironment,
    limiter: ResourceLimiter,
    classifier: ResultClassifier,
    next_worker_id: AtomicU64,
    active: AtomicUsize,
}

impl Executor {
    /// Check the config and render the restricted environment once
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        config.validate()?;
        let environment = RestrictedEnvironmentBuilder::new(&config.allowlist)?.build()?;

        tracing::info!(
            python = %config.python_path.display(),
            memory_mb = config.memory_limit_mb(),
            cpu_secs = config.limits.cpu_seconds,
            max_processes = config.limits.max_processes,
            allowed_modules = config.allowlist.len(),
            "executor ready"
        );

        Ok(Self {
            validator: RequestValidator::new(&config),
            limiter: ResourceLimiter::new(config.limits),
            classifier: ResultClassifier::new(&config),
            environment,
            config,
            next_worker_id: AtomicU64::new(1),
            active: AtomicUsize::new(0),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    #[must_use]
    pub const fn validator(&self) -> &RequestValidator {
        &self.validator
    }

    /// Workers currently alive
    #[must_use]
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Parse, validate and run a raw request body
    pub async fn execute_body(&self, body: &[u8], entry: EntryPoint) -> Result<ExecutionResult> {
        let request = self.validator.parse(body, entry)?;
        self.execute(&request).await
    }

    /// Run an already validated request in its own worker
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let _active = ActiveWorker::enter(&self.active);

        let spec = WorkerSpec {
            config: &self.config,
            environment: &self.environment,
            limiter: self.limiter,
            classifier: self.classifier,
        };
        Worker::new(id).run(spec, request).await
    }
}

/// Counts a worker as active until dropped, including on cancellation
struct ActiveWorker<'a>(&'a AtomicUsize);

impl<'a> ActiveWorker<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for ActiveWorker<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExecutorError, ValidationError};

    #[test]
    fn rejects_invalid_config() {
        let config = ExecutorConfig::builder().max_output_bytes(0).build();
        assert!(matches!(Executor::new(config), Err(ExecutorError::Config(_))));
    }

    #[tokio::test]
    async fn invalid_body_never_starts_a_worker() {
        let executor = Executor::new(ExecutorConfig::default()).unwrap();
        let err = executor
            .execute_body(br#"{"code":""}"#, EntryPoint::Network)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::Validation(ValidationError::MissingCode)
        ));
        assert!(err.is_client_error());
        assert_eq!(executor.active_workers(), 0);
    }
}
