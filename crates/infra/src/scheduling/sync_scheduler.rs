//! Periodic calendar synchronization scheduler.
//!
//! Runs [`SyncOrchestrator::sync_connections_until`] on a cron schedule.
//! Lifecycle operations are wrapped in timeouts. A tick that overruns its
//! timeout, or is interrupted by [`SyncScheduler::stop`], is cancelled
//! cooperatively and awaited so its in-flight runs finish their current
//! entry and are still recorded.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use calsync_core::SyncOrchestrator;
//! use calsync_infra::scheduling::{SchedulerResult, SyncScheduler, SyncSchedulerConfig};
//!
//! # async fn example(orchestrator: Arc<SyncOrchestrator>) -> SchedulerResult<()> {
//! let mut scheduler = SyncScheduler::with_config(
//!     SyncSchedulerConfig {
//!         cron_expression: "0 */15 * * * *".into(), // every 15 minutes
//!         ..Default::default()
//!     },
//!     orchestrator,
//! );
//!
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use calsync_core::{ConnectionOutcome, SyncOrchestrator};
use calsync_domain::{SyncConfig, SyncTrigger};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the sync scheduler.
#[derive(Debug, Clone)]
pub struct SyncSchedulerConfig {
    /// Six-field cron expression describing the execution schedule.
    pub cron_expression: String,
    /// Connections synchronized concurrently per tick.
    pub max_concurrency: usize,
    /// Time after which a tick is cancelled.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task and any running tick.
    pub join_timeout: Duration,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: "0 */15 * * * *".into(), // every 15 minutes
            max_concurrency: 4,
            job_timeout: Duration::from_secs(600),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&SyncConfig> for SyncSchedulerConfig {
    fn from(sync: &SyncConfig) -> Self {
        Self {
            cron_expression: sync.cron_expression.clone(),
            max_concurrency: sync.max_concurrent_connections,
            ..Default::default()
        }
    }
}

/// Tally of one scheduled tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub synced: usize,
    pub busy: usize,
    pub failed: usize,
}

impl TickSummary {
    fn from_outcomes(outcomes: &[ConnectionOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut summary, outcome| {
            match &outcome.outcome {
                Ok(Some(_)) => summary.synced += 1,
                Ok(None) => summary.busy += 1,
                Err(_) => summary.failed += 1,
            }
            summary
        })
    }
}

/// Cron-driven sync scheduler with explicit lifecycle management.
pub struct SyncScheduler {
    scheduler: Option<JobScheduler>,
    config: SyncSchedulerConfig,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    /// Held shared by every running tick; `stop` takes it exclusively to
    /// wait for them.
    ticks: Arc<RwLock<()>>,
    orchestrator: Arc<SyncOrchestrator>,
}

impl SyncScheduler {
    /// Create a scheduler with the default timeouts.
    pub fn new(cron_expression: String, orchestrator: Arc<SyncOrchestrator>) -> Self {
        let config = SyncSchedulerConfig { cron_expression, ..Default::default() };
        Self::with_config(config, orchestrator)
    }

    /// Create a scheduler with a custom configuration.
    pub fn with_config(config: SyncSchedulerConfig, orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self {
            scheduler: None,
            config,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            ticks: Arc::new(RwLock::new(())),
            orchestrator,
        }
    }

    /// Start the scheduler, spawning the monitoring task.
    #[instrument(skip(self), fields(cron = %self.config.cron_expression))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler_instance = self.build_scheduler().await?;
        let start_timeout = self.config.start_timeout;

        let start_result = tokio::time::timeout(start_timeout, scheduler_instance.start())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?;

        start_result.map_err(|source| SchedulerError::StartFailed { source })?;

        self.scheduler = Some(scheduler_instance);

        let cancel = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            Self::monitor_task(cancel).await;
        });

        self.monitor_handle = Some(handle);
        info!("Sync scheduler started");
        Ok(())
    }

    /// Stop the scheduler, cancel running ticks and wait for them and the
    /// monitor task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let mut scheduler = match self.scheduler.take() {
            Some(scheduler) => scheduler,
            None => return Err(SchedulerError::NotRunning),
        };

        let stop_timeout = self.config.stop_timeout;
        let stop_result =
            tokio::time::timeout(stop_timeout, async move { scheduler.shutdown().await })
                .await
                .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?;

        stop_result.map_err(|source| SchedulerError::StopFailed { source })?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??
        }

        let join_timeout = self.config.join_timeout;
        tokio::time::timeout(join_timeout, self.ticks.write())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })?;

        info!("Sync scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when a scheduler instance is active.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Run one tick immediately, outside the cron schedule.
    pub async fn run_now(&self) -> TickSummary {
        Self::run_tick(
            Arc::clone(&self.orchestrator),
            self.config.max_concurrency,
            self.config.job_timeout,
            self.cancellation.clone(),
            Arc::clone(&self.ticks),
        )
        .await
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|source| SchedulerError::CreationFailed { source })?;
        let cron_expr = self.config.cron_expression.clone();
        let orchestrator = Arc::clone(&self.orchestrator);
        let max_concurrency = self.config.max_concurrency;
        let job_timeout = self.config.job_timeout;
        let shutdown = self.cancellation.clone();
        let ticks = Arc::clone(&self.ticks);

        let job_definition = Job::new_async(cron_expr.as_str(), move |_id, _lock| {
            let orchestrator = Arc::clone(&orchestrator);
            let shutdown = shutdown.clone();
            let ticks = Arc::clone(&ticks);
            Box::pin(async move {
                Self::run_tick(orchestrator, max_concurrency, job_timeout, shutdown, ticks).await;
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        let job_id = job_definition.guid();
        scheduler
            .add(job_definition)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        debug!(cron = %self.config.cron_expression, job_id = %job_id, "Registered sync job");
        Ok(scheduler)
    }

    async fn run_tick(
        orchestrator: Arc<SyncOrchestrator>,
        max_concurrency: usize,
        job_timeout: Duration,
        shutdown: CancellationToken,
        ticks: Arc<RwLock<()>>,
    ) -> TickSummary {
        let _running = ticks.read().await;
        let started = Instant::now();
        let cancel = shutdown.child_token();

        let fan_out =
            orchestrator.sync_connections_until(max_concurrency, SyncTrigger::Scheduled, &cancel);
        tokio::pin!(fan_out);

        let outcome = tokio::select! {
            outcome = &mut fan_out => outcome,
            _ = tokio::time::sleep(job_timeout) => {
                warn!(timeout_secs = job_timeout.as_secs(), "Scheduled sync timed out, cancelling");
                cancel.cancel();
                fan_out.await
            }
        };

        match outcome {
            Ok(outcomes) => {
                let summary = TickSummary::from_outcomes(&outcomes);
                for failure in outcomes.iter().filter(|o| o.outcome.is_err()) {
                    if let Err(err) = &failure.outcome {
                        warn!(
                            connection_id = failure.connection_id,
                            error = %err,
                            "Connection sync failed"
                        );
                    }
                }
                info!(
                    synced = summary.synced,
                    busy = summary.busy,
                    failed = summary.failed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Scheduled sync finished"
                );
                summary
            }
            Err(err) => {
                error!(error = %err, "Scheduled sync could not list connections");
                TickSummary::default()
            }
        }
    }

    async fn monitor_task(cancel: CancellationToken) {
        cancel.cancelled().await;
        debug!("Sync scheduler monitor cancelled");
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("SyncScheduler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
