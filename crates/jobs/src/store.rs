use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vodserve_core::types::JobSummary;

use crate::JobError;
use crate::publish::Publisher;

/// One job record. Mutated only under the store lock; each lifecycle flag
/// is owned by exactly one stage (upload → video_saved, conversion →
/// stream_ready, publish → published).
struct JobRecord {
    id: Uuid,
    created_at: DateTime<Utc>,
    job_dir: PathBuf,
    video_path: PathBuf,
    stream_dir: PathBuf,
    playlist_path: PathBuf,
    segments: Vec<String>,
    video_saved: bool,
    video_saved_at: Option<DateTime<Utc>>,
    stream_ready: bool,
    stream_ready_at: Option<DateTime<Utc>>,
    published: bool,
    published_at: Option<DateTime<Utc>>,
    /// Present only while the transcoder runs for this job.
    guard: Option<ConvertGuard>,
}

impl JobRecord {
    fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            created_at: self.created_at,
            video_saved: self.video_saved,
            video_saved_at: self.video_saved_at,
            stream_ready: self.stream_ready,
            stream_ready_at: self.stream_ready_at,
            published: self.published,
            published_at: self.published_at,
            segments: self.segments.clone(),
        }
    }
}

/// Handle onto an in-flight conversion, kept in the record so removal can
/// terminate the process and wait for it to die before touching files.
struct ConvertGuard {
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

/// Granted by [`JobStore::begin_conversion`]; carries the resolved paths
/// and the cancellation token the invoker must honor. [`finish`] must be
/// called once the transcoder process has exited.
///
/// [`finish`]: ConversionTicket::finish
pub struct ConversionTicket {
    pub job_id: Uuid,
    pub video_path: PathBuf,
    pub playlist_path: PathBuf,
    pub stream_dir: PathBuf,
    pub cancel: CancellationToken,
    done_tx: watch::Sender<bool>,
}

impl ConversionTicket {
    /// Signal that the transcoder process has fully exited.
    pub fn finish(&self) {
        let _ = self.done_tx.send(true);
    }
}

struct Registry {
    jobs: HashMap<Uuid, JobRecord>,
    /// Creation order for listings.
    order: Vec<Uuid>,
}

/// In-memory job registry and lifecycle state machine.
///
/// All mutation serializes through one lock; the lock is never held across
/// filesystem awaits (paths are cloned out first), so removal can never
/// interleave with a record mutation.
#[derive(Clone)]
pub struct JobStore {
    work_dir: PathBuf,
    inner: Arc<Mutex<Registry>>,
}

impl JobStore {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            inner: Arc::new(Mutex::new(Registry {
                jobs: HashMap::new(),
                order: Vec::new(),
            })),
        }
    }

    pub fn work_dir(&self) -> &PathBuf {
        &self.work_dir
    }

    /// Allocate a new job with canonical paths under the work directory.
    pub async fn create_job(&self) -> JobSummary {
        let id = Uuid::new_v4();
        let job_dir = self.work_dir.join(id.to_string());
        let record = JobRecord {
            id,
            created_at: Utc::now(),
            video_path: job_dir.join("video.mp4"),
            playlist_path: job_dir.join("playlist.m3u8"),
            stream_dir: job_dir.clone(),
            job_dir,
            segments: Vec::new(),
            video_saved: false,
            video_saved_at: None,
            stream_ready: false,
            stream_ready_at: None,
            published: false,
            published_at: None,
            guard: None,
        };
        let summary = record.summary();

        let mut reg = self.inner.lock().await;
        reg.order.push(id);
        reg.jobs.insert(id, record);
        info!(job_id = %id, "job created");
        summary
    }

    /// Persist the uploaded video bytes. Requires a freshly created job.
    pub async fn save_uploaded_video(&self, id: Uuid, bytes: &[u8]) -> Result<(), JobError> {
        let (job_dir, video_path) = {
            let reg = self.inner.lock().await;
            let record = reg.jobs.get(&id).ok_or(JobError::NotFound(id))?;
            if record.video_saved {
                return Err(JobError::InvalidState("video already saved".into()));
            }
            (record.job_dir.clone(), record.video_path.clone())
        };

        tokio::fs::create_dir_all(&job_dir).await?;
        tokio::fs::write(&video_path, bytes).await?;

        let mut reg = self.inner.lock().await;
        let record = reg.jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        record.video_saved = true;
        record.video_saved_at = Some(Utc::now());
        info!(job_id = %id, bytes = bytes.len(), "video saved");
        Ok(())
    }

    /// Claim the conversion stage for a job. Rejects jobs whose video has
    /// not been saved, jobs already converted, and jobs with a conversion
    /// currently in flight.
    pub async fn begin_conversion(&self, id: Uuid) -> Result<ConversionTicket, JobError> {
        let mut reg = self.inner.lock().await;
        let record = reg.jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        if !record.video_saved {
            return Err(JobError::InvalidState(
                "video must be saved before conversion".into(),
            ));
        }
        if record.guard.is_some() {
            return Err(JobError::InvalidState(
                "conversion already in progress".into(),
            ));
        }
        if record.stream_ready {
            return Err(JobError::InvalidState("stream already created".into()));
        }

        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);
        record.guard = Some(ConvertGuard {
            cancel: cancel.clone(),
            done: done_rx,
        });

        Ok(ConversionTicket {
            job_id: id,
            video_path: record.video_path.clone(),
            playlist_path: record.playlist_path.clone(),
            stream_dir: record.stream_dir.clone(),
            cancel,
            done_tx,
        })
    }

    /// Record a successful conversion: the job becomes stream-ready and
    /// keeps the ordered segment list.
    pub async fn complete_conversion(
        &self,
        id: Uuid,
        segments: Vec<String>,
    ) -> Result<(), JobError> {
        let mut reg = self.inner.lock().await;
        let record = reg.jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        record.guard = None;
        record.segments = segments;
        record.stream_ready = true;
        record.stream_ready_at = Some(Utc::now());
        info!(job_id = %id, segments = record.segments.len(), "stream ready");
        Ok(())
    }

    /// Record a failed conversion. The job stays at video-saved; no forward
    /// progress is possible (a new job is required to retry).
    pub async fn fail_conversion(&self, id: Uuid) -> Result<(), JobError> {
        let mut reg = self.inner.lock().await;
        let record = reg.jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        record.guard = None;
        Ok(())
    }

    /// Push the converted stream to the publishing collaborator and mark
    /// the job published. Requires a stream-ready job.
    pub async fn publish_converted_video(
        &self,
        id: Uuid,
        publisher: &dyn Publisher,
    ) -> Result<(), JobError> {
        let summary = {
            let reg = self.inner.lock().await;
            let record = reg.jobs.get(&id).ok_or(JobError::NotFound(id))?;
            if !record.stream_ready {
                return Err(JobError::InvalidState(
                    "stream must be created before publishing".into(),
                ));
            }
            record.summary()
        };

        publisher.publish(&summary).await?;

        let mut reg = self.inner.lock().await;
        let record = reg.jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        record.published = true;
        record.published_at = Some(Utc::now());
        info!(job_id = %id, "published");
        Ok(())
    }

    /// Delete the job's on-disk artifacts. The record stays queryable until
    /// the scheduler removes it; a missing directory is fine.
    pub async fn clean_artifacts(&self, id: Uuid) -> Result<(), JobError> {
        let job_dir = {
            let reg = self.inner.lock().await;
            match reg.jobs.get(&id) {
                Some(record) => record.job_dir.clone(),
                None => {
                    debug!(job_id = %id, "clean requested for unknown job");
                    return Ok(());
                }
            }
        };
        remove_dir_if_present(&job_dir).await;
        info!(job_id = %id, "artifacts cleaned");
        Ok(())
    }

    /// Remove the job entirely: terminate any in-flight conversion (and
    /// wait for the process to die), delete on-disk residue, drop the
    /// record. Idempotent: unknown or already-removed ids are a no-op.
    pub async fn remove_job(&self, id: Uuid) {
        let (job_dir, guard) = {
            let mut reg = self.inner.lock().await;
            match reg.jobs.get_mut(&id) {
                Some(record) => (record.job_dir.clone(), record.guard.take()),
                None => {
                    debug!(job_id = %id, "remove requested for unknown job");
                    return;
                }
            }
        };

        if let Some(guard) = guard {
            info!(job_id = %id, "cancelling in-flight conversion");
            guard.cancel.cancel();
            let mut done = guard.done;
            // Err means the ticket was dropped, which also implies the
            // process is no longer running.
            let _ = done.wait_for(|exited| *exited).await;
        }

        remove_dir_if_present(&job_dir).await;

        let mut reg = self.inner.lock().await;
        reg.jobs.remove(&id);
        reg.order.retain(|jid| *jid != id);
        info!(job_id = %id, "job removed");
    }

    /// Snapshot one job.
    pub async fn status(&self, id: Uuid) -> Option<JobSummary> {
        let reg = self.inner.lock().await;
        reg.jobs.get(&id).map(JobRecord::summary)
    }

    /// Snapshot all jobs in creation order.
    pub async fn list(&self) -> Vec<JobSummary> {
        let reg = self.inner.lock().await;
        reg.order
            .iter()
            .filter_map(|id| reg.jobs.get(id))
            .map(JobRecord::summary)
            .collect()
    }

    /// Startup sweep: delete every pre-existing entry under the work
    /// directory. No job state survives a restart.
    pub async fn purge_work_dir(&self) -> Result<(), JobError> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let mut entries = tokio::fs::read_dir(&self.work_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            info!(path = %path.display(), "purging stale job directory");
            let removed = if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            if let Err(e) = removed {
                warn!(path = %path.display(), error = %e, "failed to purge entry");
            }
        }
        Ok(())
    }
}

async fn remove_dir_if_present(dir: &PathBuf) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %dir.display(), error = %e, "failed to delete job directory"),
    }
}
