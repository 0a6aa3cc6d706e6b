//! Shared application state

use std::path::PathBuf;

use mirage_pipeline::GenerationPipeline;
use mirage_store::ResultStore;

use crate::RateLimiter;

pub struct AppState {
    pub pipeline: GenerationPipeline,
    /// Entries per `POST /history` page
    pub history_page_size: usize,
    pub rate_limiter: RateLimiter,
    /// Root served for every path no route claims
    pub public_dir: PathBuf,
}

impl AppState {
    pub fn new(
        pipeline: GenerationPipeline,
        history_page_size: usize,
        rate_limiter: RateLimiter,
        public_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pipeline,
            history_page_size,
            rate_limiter,
            public_dir: public_dir.into(),
        }
    }

    pub fn store(&self) -> &ResultStore {
        self.pipeline.store()
    }
}
