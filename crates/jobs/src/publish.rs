use thiserror::Error;
use tracing::debug;

use vodserve_core::types::JobSummary;

#[derive(Debug, Error)]
#[error("publish failed: {0}")]
pub struct PublishError(pub String);

/// Destination for finished VOD packages.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    /// Push the job's playlist and segments to the destination.
    async fn publish(&self, job: &JobSummary) -> Result<(), PublishError>;
}

/// Placeholder publisher: the object-storage push lives outside this
/// service, so the default target just acknowledges.
pub struct NoopPublisher;

#[async_trait::async_trait]
impl Publisher for NoopPublisher {
    async fn publish(&self, job: &JobSummary) -> Result<(), PublishError> {
        debug!(job_id = %job.id, segments = job.segments.len(), "publish acknowledged");
        Ok(())
    }
}
