use std::sync::Arc;

use crate::blob_store::BlobStore;
use crate::ingest::Ingestor;
use crate::store::ScreeningStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ScreeningStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub ingestor: Ingestor,
}
