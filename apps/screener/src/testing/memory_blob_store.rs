use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::blob_store::{BlobError, BlobStore};

/// Keeps objects in a map. Blob references are the keys themselves;
/// signed URLs are `memory://{key}?signed`.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Bytes>>,
    fail_uploads: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().expect("blob map poisoned").contains_key(key)
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn is_configured(&self) -> bool {
        true
    }

    async fn upload(
        &self,
        key: &str,
        content: Bytes,
        _content_type: Option<&str>,
    ) -> Result<String, BlobError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(BlobError::S3("simulated upload failure".to_string()));
        }
        self.objects
            .lock()
            .expect("blob map poisoned")
            .insert(key.to_string(), content);
        Ok(key.to_string())
    }

    async fn signed_url(&self, blob_ref: &str) -> String {
        format!("memory://{blob_ref}?signed")
    }

    async fn download(&self, blob_ref: &str) -> Result<Bytes, BlobError> {
        self.objects
            .lock()
            .expect("blob map poisoned")
            .get(blob_ref)
            .cloned()
            .ok_or_else(|| BlobError::S3(format!("no such key: {blob_ref}")))
    }
}
