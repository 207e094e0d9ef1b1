pub mod pipeline;
pub mod publish;
pub mod reaper;
pub mod store;

use thiserror::Error;
use uuid::Uuid;

pub use pipeline::{JobEvent, JobWorkerPool, PipelineConfig};
pub use publish::{NoopPublisher, PublishError, Publisher};
pub use reaper::{CleanupScheduler, SchedulerHandle};
pub use store::JobStore;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(Uuid),

    /// An operation was requested while the job was not in the required
    /// lifecycle state. Never retried; surfaced to the caller.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The transcoder exited nonzero. Terminal for the job; the captured
    /// diagnostic lines ride along for postmortem.
    #[error("transcode failed with exit code {exit_code:?}")]
    TranscodeFailed {
        exit_code: Option<i32>,
        log_lines: Vec<String>,
    },

    #[error(transparent)]
    Transcode(#[from] vodserve_transcoder::TranscodeError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    /// The worker pool has been closed; no new jobs can be enqueued.
    #[error("job queue closed")]
    QueueClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
