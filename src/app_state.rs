use sqlx::PgPool;
use std::sync::Arc;

use crate::db::queries::PgStore;
use crate::services::queue::JobQueue;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub store: Arc<PgStore>,
    pub queue: Arc<JobQueue>,
    /// Default caching behaviour for submissions that do not choose one.
    pub use_cache: bool,
}

impl AppState {
    pub fn new(db: PgPool, queue: JobQueue, use_cache: bool) -> Self {
        Self {
            store: Arc::new(PgStore::new(db.clone())),
            db,
            queue: Arc::new(queue),
            use_cache,
        }
    }
}
