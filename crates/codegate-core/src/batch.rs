//! Bounded concurrent batch runner
//!
//! Tasks share the pipeline (policy store and sandbox) and nothing else.
//! Each task gets a child of the batch cancellation token, so cancelling the
//! batch reaches every in-flight sandbox.

use crate::config::GatekeeperConfig;
use crate::controller::{CandidateSource, IterationController, TaskReport, TaskRequest};
use crate::error::PipelineError;
use crate::pipeline::ValidationPipeline;
use codegate_sandbox::SandboxRuntime;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Entry point for running validation tasks
#[derive(Debug, Clone)]
pub struct Gatekeeper {
    controller: IterationController,
    max_concurrent_tasks: usize,
}

impl Gatekeeper {
    /// Create gatekeeper over a controller
    #[must_use]
    pub fn new(controller: IterationController, max_concurrent_tasks: usize) -> Self {
        Self {
            controller,
            max_concurrent_tasks: max_concurrent_tasks.max(1),
        }
    }

    /// Build from configuration with the process sandbox
    ///
    /// # Errors
    /// Returns `PipelineError` if the configuration is invalid or the policy
    /// table cannot be loaded.
    pub fn from_config(
        config: &GatekeeperConfig,
        source: Arc<dyn CandidateSource>,
    ) -> Result<Self, PipelineError> {
        let sandbox: Arc<dyn SandboxRuntime> = Arc::new(config.process_sandbox());
        Self::with_sandbox(config, source, sandbox)
    }

    /// Build from configuration with a caller-supplied sandbox
    ///
    /// # Errors
    /// Returns `PipelineError` if the configuration is invalid or the policy
    /// table cannot be loaded.
    pub fn with_sandbox(
        config: &GatekeeperConfig,
        source: Arc<dyn CandidateSource>,
        sandbox: Arc<dyn SandboxRuntime>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let store = Arc::new(config.policy_store()?);
        info!(
            policy_version = store.version(),
            max_concurrent_tasks = config.max_concurrent_tasks,
            "Gatekeeper initialized"
        );
        let pipeline = ValidationPipeline::new(store, sandbox).with_budget(config.sandbox.budget);
        let controller = IterationController::new(Arc::new(pipeline), source);
        Ok(Self::new(controller, config.max_concurrent_tasks))
    }

    /// Controller in use
    #[inline]
    #[must_use]
    pub fn controller(&self) -> &IterationController {
        &self.controller
    }

    /// Concurrency bound
    #[inline]
    #[must_use]
    pub fn max_concurrent_tasks(&self) -> usize {
        self.max_concurrent_tasks
    }

    /// Run a single task
    ///
    /// # Errors
    /// Returns `PipelineError` on infrastructure failure or cancellation.
    pub async fn run_task(
        &self,
        request: TaskRequest,
        cancel: &CancellationToken,
    ) -> Result<TaskReport, PipelineError> {
        self.controller.run(request, cancel).await
    }

    /// Run many tasks, at most `max_concurrent_tasks` at a time
    ///
    /// Results come back in input order. A task still waiting for a permit
    /// when `cancel` fires yields `PipelineError::Cancelled` without
    /// starting.
    pub async fn run_batch(
        &self,
        requests: Vec<TaskRequest>,
        cancel: &CancellationToken,
    ) -> Vec<Result<TaskReport, PipelineError>> {
        let total = requests.len();
        info!(tasks = total, "Batch started");

        let permits = Arc::new(Semaphore::new(self.max_concurrent_tasks));
        let mut set = JoinSet::new();

        for (index, request) in requests.into_iter().enumerate() {
            let controller = self.controller.clone();
            let permits = Arc::clone(&permits);
            let token = cancel.child_token();
            set.spawn(async move {
                let result = tokio::select! {
                    permit = permits.acquire_owned() => match permit {
                        Ok(_permit) => {
                            debug!(index, "Task admitted");
                            controller.run(request, &token).await
                        }
                        Err(_) => Err(PipelineError::Cancelled),
                    },
                    () = token.cancelled() => Err(PipelineError::Cancelled),
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<TaskReport, PipelineError>>> =
            (0..total).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(err) => tracing::error!(error = %err, "Batch task failed to join"),
            }
        }

        let results: Vec<_> = results
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err(PipelineError::Join("task panicked".to_string())))
            })
            .collect();
        let passed = results
            .iter()
            .filter(|r| matches!(r, Ok(report) if report.passed()))
            .count();
        info!(tasks = total, passed, "Batch finished");
        results
    }
}
