use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vodserve_transcoder::TranscodeInvoker;

use crate::JobError;
use crate::publish::Publisher;
use crate::reaper::SchedulerHandle;
use crate::store::JobStore;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of background workers consuming the job queue.
    pub workers: usize,
    /// Queue bound; enqueueing backpressures once this many jobs wait.
    pub queue_depth: usize,
    /// How long finished jobs stay queryable before eviction.
    pub retention: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_depth: 64,
            retention: Duration::from_secs(15 * 60),
        }
    }
}

/// Pipeline outcome, broadcast so callers and tests can observe completion
/// or failure instead of losing it inside a detached task.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", content = "data")]
pub enum JobEvent {
    #[serde(rename = "job_completed")]
    Completed { job_id: Uuid },
    #[serde(rename = "job_failed")]
    Failed { job_id: Uuid, error: String },
}

/// Background conversion pipeline: a bounded work queue of job ids drained
/// by a pool of workers. Per job: convert → publish → clean local
/// artifacts → schedule delayed removal. Publish is skipped on conversion
/// failure; cleanup and scheduling always run. No retries: one failure is
/// terminal for that job, never for the service.
pub struct JobWorkerPool {
    tx: async_channel::Sender<Uuid>,
    events: broadcast::Sender<JobEvent>,
    workers: Vec<JoinHandle<()>>,
}

impl JobWorkerPool {
    pub fn start(
        store: JobStore,
        invoker: TranscodeInvoker,
        publisher: Arc<dyn Publisher>,
        scheduler: SchedulerHandle,
        config: PipelineConfig,
    ) -> Self {
        let (tx, rx) = async_channel::bounded(config.queue_depth.max(1));
        let (events, _) = broadcast::channel(64);

        let workers = (0..config.workers.max(1))
            .map(|worker| {
                let rx = rx.clone();
                let store = store.clone();
                let invoker = invoker.clone();
                let publisher = publisher.clone();
                let scheduler = scheduler.clone();
                let events = events.clone();
                let retention = config.retention;
                tokio::spawn(async move {
                    while let Ok(job_id) = rx.recv().await {
                        run_job(
                            &store, &invoker, publisher.as_ref(), &scheduler, retention, &events,
                            job_id,
                        )
                        .await;
                    }
                    debug!(worker, "job worker stopped");
                })
            })
            .collect();

        Self { tx, events, workers }
    }

    /// Hand a job to the background workers.
    pub async fn enqueue(&self, job_id: Uuid) -> Result<(), JobError> {
        self.tx
            .send(job_id)
            .await
            .map_err(|_| JobError::QueueClosed)
    }

    /// Observe pipeline outcomes.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Close the queue and wait for in-flight jobs to finish.
    pub async fn close(self) {
        self.tx.close();
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn run_job(
    store: &JobStore,
    invoker: &TranscodeInvoker,
    publisher: &dyn Publisher,
    scheduler: &SchedulerHandle,
    retention: Duration,
    events: &broadcast::Sender<JobEvent>,
    job_id: Uuid,
) {
    let outcome = convert_and_publish(store, invoker, publisher, job_id).await;

    // Failed jobs leave residue exactly like successful ones: clean it and
    // schedule the record's eviction either way.
    if let Err(e) = store.clean_artifacts(job_id).await {
        warn!(job_id = %job_id, error = %e, "artifact cleanup failed");
    }
    scheduler.schedule_removal(job_id, retention);

    let event = match outcome {
        Ok(()) => {
            info!(job_id = %job_id, "pipeline completed");
            JobEvent::Completed { job_id }
        }
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "pipeline failed");
            JobEvent::Failed {
                job_id,
                error: e.to_string(),
            }
        }
    };
    let _ = events.send(event);
}

async fn convert_and_publish(
    store: &JobStore,
    invoker: &TranscodeInvoker,
    publisher: &dyn Publisher,
    job_id: Uuid,
) -> Result<(), JobError> {
    let ticket = store.begin_conversion(job_id).await?;

    let result = invoker
        .invoke_with_cancel(
            &ticket.video_path,
            &ticket.playlist_path,
            &ticket.stream_dir,
            ticket.cancel.clone(),
        )
        .await;
    // The process has exited either way; anyone waiting to remove the job
    // may proceed once the store reflects that.
    ticket.finish();

    match result {
        Ok(r) if r.success => store.complete_conversion(job_id, r.segments).await?,
        Ok(r) => {
            store.fail_conversion(job_id).await?;
            return Err(JobError::TranscodeFailed {
                exit_code: r.exit_code,
                log_lines: r.log_lines,
            });
        }
        Err(e) => {
            store.fail_conversion(job_id).await?;
            return Err(e.into());
        }
    }

    store.publish_converted_video(job_id, publisher).await?;
    Ok(())
}
