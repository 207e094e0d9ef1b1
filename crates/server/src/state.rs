use std::sync::Arc;

use vodserve_jobs::{JobStore, JobWorkerPool};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: JobStore,
    pub pool: Arc<JobWorkerPool>,
}
