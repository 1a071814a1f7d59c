//! Sync scheduler
//!
//! Owns the periodic per-store sync loops and the concurrency cap:
//! at most `max_concurrent_syncs` runs execute at once, excess work
//! queues on the semaphore. Each run is tracked as a [`SyncJob`]
//! (pending → running → completed/failed); a failed run retries in place
//! with a bounded retry count. Manual syncs share the same path through
//! a channel handle. A running platform call is never cancelled
//! mid-flight — shutdown waits for in-progress runs.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use shared::models::store::StoreConfig;
use shared::models::sync_job::{JobType, SyncJob};

use crate::engine::{OrderSyncEngine, SyncDirection, SyncOptions, SyncReport};
use crate::store::SyncJobStore;
use crate::utils::{SyncError, SyncResult};

/// Scheduler tuning
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between periodic syncs per store
    pub sync_interval: Duration,
    /// Concurrent sync cap across all stores
    pub max_concurrent_syncs: usize,
    /// Startup jitter range, seconds (spreads store loops apart)
    pub startup_jitter_secs: u64,
    /// In-place retries for a failed run
    pub max_job_retries: u32,
    /// Delay between those retries
    pub retry_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(900),
            max_concurrent_syncs: 3,
            startup_jitter_secs: 30,
            max_job_retries: 2,
            retry_delay: Duration::from_secs(30),
        }
    }
}

struct ManualSyncRequest {
    store_id: String,
    response: mpsc::Sender<SyncResult<SyncReport>>,
}

/// Handle for triggering an immediate sync of one store
#[derive(Clone)]
pub struct ManualSyncHandle {
    tx: mpsc::Sender<ManualSyncRequest>,
}

impl ManualSyncHandle {
    pub async fn trigger_sync(&self, store_id: &str) -> SyncResult<SyncReport> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.tx
            .send(ManualSyncRequest {
                store_id: store_id.to_string(),
                response: response_tx,
            })
            .await
            .map_err(|_| SyncError::sync("Scheduler not running"))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| SyncError::sync("No response from scheduler"))?
    }
}

pub struct SyncScheduler {
    config: SchedulerConfig,
    engine: Arc<OrderSyncEngine>,
    jobs: Arc<dyn SyncJobStore>,
    stores: Vec<StoreConfig>,
    options: SyncOptions,
    semaphore: Arc<Semaphore>,
    shutdown: CancellationToken,
    manual_tx: mpsc::Sender<ManualSyncRequest>,
    manual_rx: mpsc::Receiver<ManualSyncRequest>,
}

impl SyncScheduler {
    pub fn new(
        config: SchedulerConfig,
        engine: Arc<OrderSyncEngine>,
        jobs: Arc<dyn SyncJobStore>,
        stores: Vec<StoreConfig>,
        options: SyncOptions,
        shutdown: CancellationToken,
    ) -> Self {
        let (manual_tx, manual_rx) = mpsc::channel(32);
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_syncs.max(1)));

        Self {
            config,
            engine,
            jobs,
            stores,
            options,
            semaphore,
            shutdown,
            manual_tx,
            manual_rx,
        }
    }

    pub fn manual_handle(&self) -> ManualSyncHandle {
        ManualSyncHandle {
            tx: self.manual_tx.clone(),
        }
    }

    /// Run the scheduler until shutdown
    pub async fn run(mut self) {
        let active: Vec<StoreConfig> = self
            .stores
            .iter()
            .filter(|s| s.sync_enabled)
            .cloned()
            .collect();
        tracing::info!(
            stores = active.len(),
            max_concurrent = self.config.max_concurrent_syncs,
            interval_secs = self.config.sync_interval.as_secs(),
            "Sync scheduler started"
        );

        let mut handles = Vec::new();
        for store in active {
            let engine = self.engine.clone();
            let jobs = self.jobs.clone();
            let semaphore = self.semaphore.clone();
            let config = self.config.clone();
            let options = self.options.clone();
            let shutdown = self.shutdown.clone();

            handles.push(tokio::spawn(async move {
                Self::run_store_loop(engine, jobs, semaphore, config, store, options, shutdown)
                    .await;
            }));
        }

        // Manual requests + shutdown
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Sync scheduler shutting down");
                    break;
                }
                Some(request) = self.manual_rx.recv() => {
                    self.handle_manual(request).await;
                }
            }
        }

        for handle in handles {
            let _ = handle.await;
        }
        tracing::info!("Sync scheduler stopped");
    }

    /// Periodic loop for one store: jittered start, then fixed interval
    async fn run_store_loop(
        engine: Arc<OrderSyncEngine>,
        jobs: Arc<dyn SyncJobStore>,
        semaphore: Arc<Semaphore>,
        config: SchedulerConfig,
        store: StoreConfig,
        options: SyncOptions,
        shutdown: CancellationToken,
    ) {
        let jitter = if config.startup_jitter_secs > 0 {
            rand::thread_rng().gen_range(0..config.startup_jitter_secs)
        } else {
            0
        };
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(Duration::from_secs(jitter)) => {}
        }

        let mut ticker = tokio::time::interval(config.sync_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!(store = %store.id, "Store sync loop stopping");
                    return;
                }
                _ = ticker.tick() => {
                    let result = Self::run_store_job(
                        &engine, &jobs, &semaphore, &config, &store, &options,
                    ).await;
                    if let Err(e) = result {
                        tracing::error!(store = %store.id, error = %e, "Store sync failed");
                    }
                }
            }
        }
    }

    async fn handle_manual(&self, request: ManualSyncRequest) {
        let Some(store) = self
            .stores
            .iter()
            .find(|s| s.id == request.store_id)
            .cloned()
        else {
            tracing::warn!(store = %request.store_id, "Manual sync for unknown store");
            let _ = request
                .response
                .send(Err(SyncError::config(format!(
                    "Unknown store {}",
                    request.store_id
                ))))
                .await;
            return;
        };

        tracing::info!(store = %store.id, "Manual sync triggered");
        let result = Self::run_store_job(
            &self.engine,
            &self.jobs,
            &self.semaphore,
            &self.config,
            &store,
            &self.options,
        )
        .await;
        let _ = request.response.send(result).await;
    }

    /// One tracked sync run: job bookkeeping + concurrency cap + bounded
    /// in-place retries
    async fn run_store_job(
        engine: &Arc<OrderSyncEngine>,
        jobs: &Arc<dyn SyncJobStore>,
        semaphore: &Arc<Semaphore>,
        config: &SchedulerConfig,
        store: &StoreConfig,
        options: &SyncOptions,
    ) -> SyncResult<SyncReport> {
        let job_type = match options.direction {
            SyncDirection::Pull => JobType::Pull,
            SyncDirection::Push => JobType::Push,
            SyncDirection::Bidirectional => JobType::Full,
        };
        let job = SyncJob::pending(&store.id, job_type);
        let job_id = job.id;
        jobs.insert(job).await?;

        // Excess work queues here rather than executing
        let _permit = semaphore
            .acquire()
            .await
            .map_err(|_| SyncError::sync("Scheduler semaphore closed"))?;

        jobs.mark_running(job_id).await?;

        let mut attempt = 0u32;
        loop {
            match engine.sync_store(store, options).await {
                Ok(report) => {
                    jobs.complete(
                        job_id,
                        report.total_processed,
                        report.total_processed.saturating_sub(report.failed),
                        report.failed,
                    )
                    .await?;
                    return Ok(report);
                }
                Err(e) if attempt < config.max_job_retries && e.is_retryable() => {
                    attempt += 1;
                    jobs.record_retry(job_id).await?;
                    tracing::warn!(
                        store = %store.id,
                        job = %job_id,
                        attempt,
                        error = %e,
                        "Sync attempt failed, retrying"
                    );
                    tokio::time::sleep(config.retry_delay).await;
                }
                Err(e) => {
                    jobs.fail(job_id, &e.to_string()).await?;
                    return Err(e);
                }
            }
        }
    }
}
