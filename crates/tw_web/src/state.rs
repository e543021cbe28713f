use std::sync::Arc;
use tw_core::ArticleStore;
use tw_crawler::{CrawlController, JobRegistry};

/// Shared by every handler. The registry belongs to the application, not to a request.
pub struct AppState {
    pub store: Arc<dyn ArticleStore>,
    pub controller: Arc<CrawlController>,
    pub registry: Arc<JobRegistry>,
}

impl AppState {
    pub fn new(controller: Arc<CrawlController>, registry: Arc<JobRegistry>) -> Self {
        Self {
            store: controller.store().clone(),
            controller,
            registry,
        }
    }
}
