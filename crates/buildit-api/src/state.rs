//! Shared application state for the HTTP façade (§6.1): the report store,
//! the waitboard, and a client for the pipeline queue.

use std::sync::Arc;

use buildit_cache::Waitboard;
use buildit_db::ReportRepo;
use buildit_queue::QueueClient;

#[derive(Clone)]
pub struct AppState {
    pub reports: Arc<dyn ReportRepo>,
    pub waitboard: Arc<Waitboard>,
    pub queue: Arc<QueueClient>,
    pub pipeline_queue_name: String,
}

impl AppState {
    pub fn new(
        reports: Arc<dyn ReportRepo>,
        waitboard: Waitboard,
        queue: QueueClient,
        pipeline_queue_name: impl Into<String>,
    ) -> Self {
        Self {
            reports,
            waitboard: Arc::new(waitboard),
            queue: Arc::new(queue),
            pipeline_queue_name: pipeline_queue_name.into(),
        }
    }
}
