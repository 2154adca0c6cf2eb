//! Polling workers. Each stage owns one job status; a [`Worker`] drives a
//! stage by claiming the oldest job in that status, running the stage, and
//! writing the resulting status back.

pub mod chain;
pub mod hasher;
pub mod transcoder;
pub mod uploader;

use crate::common::format::format_elapsed;
use crate::error::{PipelineError, PipelineResult};
use crate::modules::jobs::{Job, JobStatus, JobStore, JobUpdate, StoreResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use chain::ChainStage;
pub use hasher::HashStage;
pub use transcoder::TranscodeStage;
pub use uploader::UploadStage;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Stage: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Status of the jobs this stage picks up.
    fn source_status(&self) -> JobStatus;

    /// Status written when a job is claimed, before any work starts.
    fn claim_status(&self) -> Option<JobStatus> {
        None
    }

    /// Jobs updated more recently than this are left alone for now.
    fn min_age(&self) -> Option<Duration> {
        None
    }

    /// Runs the side effect and returns the write that completes the stage.
    async fn process(&self, job: &Job) -> PipelineResult<JobUpdate>;
}

/// What one tick of a worker did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// Nothing to do; the store was not written.
    Idle,
    Advanced { job_id: Uuid, status: JobStatus },
    Failed { job_id: Uuid },
    /// The job left the expected status before this worker could write it.
    Lost { job_id: Uuid },
}

pub struct Worker<S> {
    stage: S,
    store: Arc<dyn JobStore>,
    interval: Duration,
}

impl<S: Stage> Worker<S> {
    pub fn new(stage: S, store: Arc<dyn JobStore>, interval: Duration) -> Self {
        Self {
            stage,
            store,
            interval,
        }
    }

    /// One job per tick, then a flat sleep regardless of outcome. Returns once
    /// `shutdown` fires; a tick already in progress is finished first.
    pub async fn start(self, shutdown: CancellationToken) {
        let name = self.stage.name();
        info!(worker = name, "🚀 Worker started");
        while !shutdown.is_cancelled() {
            self.process_next_job().await;
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!(worker = name, "Worker stopped");
    }

    pub async fn get_next_job(
        &self,
        status: JobStatus,
        min_age: Option<Duration>,
    ) -> StoreResult<Option<Job>> {
        let updated_before = min_age.map(|age| OffsetDateTime::now_utc() - age);
        self.store.find_oldest(status, updated_before).await
    }

    pub async fn process_next_job(&self) -> Tick {
        let name = self.stage.name();
        let source = self.stage.source_status();

        let job = match self.get_next_job(source, self.stage.min_age()).await {
            Ok(Some(job)) => job,
            Ok(None) => return Tick::Idle,
            Err(e) => {
                error!(worker = name, status = %source, "Failed to poll for jobs: {}", e);
                return Tick::Idle;
            }
        };

        let job_id = job.id;
        info!(worker = name, %job_id, "Processing job");
        let started = Instant::now();

        let mut current = source;
        if let Some(claim) = self.stage.claim_status() {
            match self.store.transition(job_id, source, &JobUpdate::new(claim)).await {
                Ok(true) => current = claim,
                Ok(false) => {
                    warn!(worker = name, %job_id, "Job was claimed elsewhere");
                    return Tick::Lost { job_id };
                }
                Err(e) => {
                    error!(worker = name, %job_id, "Failed to claim job: {}", e);
                    return Tick::Idle;
                }
            }
        }

        let outcome = self.stage.process(&job).await.and_then(|update| {
            if current.can_transition_to(update.status) {
                Ok(update)
            } else {
                Err(PipelineError::IllegalTransition {
                    from: current,
                    to: update.status,
                })
            }
        });

        match outcome {
            Ok(update) => {
                let next = update.status;
                match self.store.transition(job_id, current, &update).await {
                    Ok(true) => {
                        info!(
                            worker = name,
                            %job_id,
                            status = %next,
                            "Job advanced in {}",
                            format_elapsed(started.elapsed())
                        );
                        Tick::Advanced {
                            job_id,
                            status: next,
                        }
                    }
                    Ok(false) => {
                        warn!(worker = name, %job_id, "Job changed status while processing");
                        Tick::Lost { job_id }
                    }
                    Err(e) => {
                        error!(worker = name, %job_id, "Failed to record job: {}", e);
                        self.mark_failed(job_id, current).await
                    }
                }
            }
            Err(e) => {
                error!(worker = name, %job_id, "Error processing job: {}", e);
                self.mark_failed(job_id, current).await
            }
        }
    }

    async fn mark_failed(&self, job_id: Uuid, current: JobStatus) -> Tick {
        match self.store.transition(job_id, current, &JobUpdate::failed()).await {
            Ok(true) => Tick::Failed { job_id },
            Ok(false) => Tick::Lost { job_id },
            Err(e) => {
                error!(%job_id, "Failed to mark job as failed: {}", e);
                Tick::Failed { job_id }
            }
        }
    }
}

/// Handles of the four stage loops.
pub struct WorkerHandles {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerHandles {
    /// Stops every loop between ticks and waits for them to return.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Worker task ended abnormally: {}", e);
            }
        }
    }
}

pub struct Stages {
    pub transcode: TranscodeStage,
    pub hash: HashStage,
    pub chain: ChainStage,
    pub upload: UploadStage,
}

/// Launches one independent loop per stage. One instance per stage type.
pub fn spawn_workers(stages: Stages, store: Arc<dyn JobStore>, interval: Duration) -> WorkerHandles {
    debug!("Spawning workers with a {:?} interval", interval);
    let shutdown = CancellationToken::new();
    let handles = vec![
        tokio::spawn(Worker::new(stages.transcode, store.clone(), interval).start(shutdown.clone())),
        tokio::spawn(Worker::new(stages.hash, store.clone(), interval).start(shutdown.clone())),
        tokio::spawn(Worker::new(stages.chain, store.clone(), interval).start(shutdown.clone())),
        tokio::spawn(Worker::new(stages.upload, store, interval).start(shutdown.clone())),
    ];
    WorkerHandles { shutdown, handles }
}
