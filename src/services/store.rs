use crate::models::{MediaRecord, MediaType};
use indexmap::IndexMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Errors reported by a media store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record {media_type}/{tmdb_id} is invalid: {reason}")]
    InvalidRecord {
        media_type: MediaType,
        tmdb_id: i64,
        reason: String,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence collaborator for availability records
///
/// Implementations only need to be safe to share across tasks; callers
/// serialize writes to the same title through
/// [`KeyedLock`](crate::services::KeyedLock).
#[cfg_attr(test, mockall::automock)]
pub trait MediaStore: Send + Sync {
    fn find(&self, media_type: MediaType, tmdb_id: i64) -> Result<Option<MediaRecord>, StoreError>;

    fn save(&self, record: MediaRecord) -> Result<(), StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Store kept in memory, in insertion order
#[derive(Debug, Default)]
pub struct InMemoryMediaStore {
    records: RwLock<IndexMap<(MediaType, i64), MediaRecord>>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, in the order they were first saved
    pub fn records(&self) -> Vec<MediaRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl MediaStore for InMemoryMediaStore {
    fn find(&self, media_type: MediaType, tmdb_id: i64) -> Result<Option<MediaRecord>, StoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(&(media_type, tmdb_id)).cloned())
    }

    fn save(&self, record: MediaRecord) -> Result<(), StoreError> {
        if record.media_type == MediaType::Movie && !record.seasons.is_empty() {
            return Err(StoreError::InvalidRecord {
                media_type: record.media_type,
                tmdb_id: record.tmdb_id,
                reason: "movies cannot have seasons".to_string(),
            });
        }

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.insert((record.media_type, record.tmdb_id), record);
        Ok(())
    }

    fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
