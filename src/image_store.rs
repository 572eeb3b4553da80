//! In-memory image store keyed by opaque tokens.
//!
//! The first pipeline stage stores the uploaded photo here so later stages
//! can re-inspect it without re-uploading. Retention is an explicit
//! constructor parameter rather than an ambient process-lifetime default.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ImageStoreError {
    #[error("image token not found: {0}")]
    NotFound(String),
}

/// A stored image. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

/// How long stored images are retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Entries live for the process lifetime (the source system's behavior).
    KeepForever,
    /// Entries older than the given duration are swept on the next `put`.
    ExpireAfter(Duration),
}

/// Concurrent token -> image mapping. One instance per orchestrator
/// deployment; multiple pipeline runs store and read distinct tokens
/// simultaneously.
#[derive(Debug)]
pub struct ImageStore {
    entries: RwLock<HashMap<String, Arc<ImageRecord>>>,
    retention: RetentionPolicy,
}

impl ImageStore {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            retention,
        }
    }

    /// Store an image and return a fresh opaque token. Always succeeds.
    pub fn put(&self, bytes: Vec<u8>, mime_type: &str) -> String {
        self.put_record(Arc::new(ImageRecord {
            bytes,
            mime_type: mime_type.to_string(),
            created_at: Utc::now(),
        }))
    }

    /// Store an already-built record. Used when the record is inspected
    /// before the caller commits to keeping it.
    pub fn put_record(&self, record: Arc<ImageRecord>) -> String {
        let token = Uuid::new_v4().simple().to_string();

        let mut entries = self.entries.write().unwrap();
        if let RetentionPolicy::ExpireAfter(ttl) = self.retention {
            let cutoff = Utc::now()
                - chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
            entries.retain(|_, r| r.created_at >= cutoff);
        }
        entries.insert(token.clone(), record);
        tracing::debug!(token = %token, count = entries.len(), "image stored");
        token
    }

    /// Look up a stored image. Expired entries report `NotFound`.
    pub fn get(&self, token: &str) -> Result<Arc<ImageRecord>, ImageStoreError> {
        let entries = self.entries.read().unwrap();
        let record = entries
            .get(token)
            .ok_or_else(|| ImageStoreError::NotFound(token.to_string()))?;

        if let RetentionPolicy::ExpireAfter(ttl) = self.retention {
            let age = Utc::now() - record.created_at;
            if age.to_std().map(|a| a > ttl).unwrap_or(false) {
                return Err(ImageStoreError::NotFound(token.to_string()));
            }
        }
        Ok(Arc::clone(record))
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
