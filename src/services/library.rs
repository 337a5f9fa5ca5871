use crate::metrics::ScanMetrics;
use crate::models::{
    AvailabilityStatus, MediaIds, MediaRecord, MediaType, ProcessOptions, ScannerSettings,
    SeasonFact, SeasonRecord,
};
use crate::services::lock::KeyedLock;
use crate::services::reconcile::{aggregate_status, reconcile};
use crate::services::scanner::ScanError;
use crate::services::store::{MediaStore, StoreError};
use chrono::Utc;
use std::sync::Arc;

/// Writes observed availability into the media store
///
/// Every write for a title runs under a [`KeyedLock`] keyed by its TMDB id, so
/// concurrent items that resolve to the same title (for example the standard
/// and high-quality copies of a show) are applied one after another.
pub struct LibraryReconciler {
    name: String,
    store: Arc<dyn MediaStore>,
    lock: KeyedLock<i64>,
    enable_hq_movie: bool,
    enable_hq_show: bool,
    metrics: Arc<ScanMetrics>,
}

impl LibraryReconciler {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn MediaStore>,
        settings: &ScannerSettings,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            lock: KeyedLock::new(),
            enable_hq_movie: settings.enable_hq_movie,
            enable_hq_show: settings.enable_hq_show,
            metrics: Arc::new(ScanMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ScanMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn lock(&self) -> &KeyedLock<i64> {
        &self.lock
    }

    /// Reconcile a show's seasons and save the result
    ///
    /// Seasons present in `seasons` replace the stored ones with the same
    /// number; stored seasons that were not observed are kept. Whole-title
    /// statuses are folded over the merged season list, while rating keys
    /// are attached from the observed seasons only.
    pub async fn process_show(
        &self,
        ids: MediaIds,
        seasons: Vec<SeasonFact>,
        options: ProcessOptions,
    ) -> Result<(), ScanError> {
        let tmdb_id = ids.tmdb_id;
        self.lock
            .dispatch(tmdb_id, || async {
                let reconciled = reconcile(
                    &seasons,
                    self.enable_hq_show,
                    options.rating_key.as_deref(),
                );

                let mut record = self
                    .store
                    .find(MediaType::Tv, tmdb_id)?
                    .unwrap_or_else(|| MediaRecord::new(MediaType::Tv, &ids));

                merge_seasons(&mut record.seasons, reconciled.seasons);
                // Title statuses cover every stored season, not just this observation
                record.status = aggregate_status(record.seasons.iter().map(|s| s.status));
                record.status_hq = if self.enable_hq_show {
                    aggregate_status(record.seasons.iter().map(|s| s.status_hq))
                } else {
                    AvailabilityStatus::Unknown
                };
                if reconciled.rating_key.is_some() {
                    record.rating_key = reconciled.rating_key;
                }
                if reconciled.rating_key_hq.is_some() {
                    record.rating_key_hq = reconciled.rating_key_hq;
                }
                fill_ids(&mut record, &ids);
                record.apply_service(&options);
                if record.media_added_at.is_none() {
                    record.media_added_at = options.media_added_at;
                }
                record.updated_at = Utc::now();

                tracing::debug!(
                    scanner = %self.name,
                    "Show {} ({}): {} / hq {}",
                    options.title(),
                    tmdb_id,
                    record.status,
                    record.status_hq
                );

                self.store.save(record)?;
                self.metrics.record_saved();
                tracing::debug!(scanner = %self.name, "Saved {}", options.title());
                Ok::<(), StoreError>(())
            })
            .await
            .map_err(|source| lock_error(tmdb_id, source))
    }

    /// Mark a movie as available (or processing) on the axis it was seen on
    ///
    /// High-quality observations are ignored unless the high-quality movie
    /// variant is enabled. An `Available` status is never moved back to
    /// `Processing`.
    pub async fn process_movie(
        &self,
        ids: MediaIds,
        options: ProcessOptions,
    ) -> Result<(), ScanError> {
        if options.is_hq && !self.enable_hq_movie {
            tracing::debug!(
                scanner = %self.name,
                "Skipping {}: high-quality movies are disabled",
                options.title()
            );
            return Ok(());
        }

        let tmdb_id = ids.tmdb_id;
        self.lock
            .dispatch(tmdb_id, || async {
                let mut record = self
                    .store
                    .find(MediaType::Movie, tmdb_id)?
                    .unwrap_or_else(|| MediaRecord::new(MediaType::Movie, &ids));

                let observed = if options.processing {
                    AvailabilityStatus::Processing
                } else {
                    AvailabilityStatus::Available
                };

                let (status, rating_key) = if options.is_hq {
                    (&mut record.status_hq, &mut record.rating_key_hq)
                } else {
                    (&mut record.status, &mut record.rating_key)
                };
                if *status != AvailabilityStatus::Available {
                    *status = observed;
                }
                if options.rating_key.is_some() {
                    rating_key.clone_from(&options.rating_key);
                }

                fill_ids(&mut record, &ids);
                record.apply_service(&options);
                if record.media_added_at.is_none() {
                    record.media_added_at = options.media_added_at;
                }
                record.updated_at = Utc::now();

                self.store.save(record)?;
                self.metrics.record_saved();
                tracing::debug!(scanner = %self.name, "Saved {}", options.title());
                Ok::<(), StoreError>(())
            })
            .await
            .map_err(|source| lock_error(tmdb_id, source))
    }
}

fn lock_error(tmdb_id: i64, source: StoreError) -> ScanError {
    ScanError::LockOperation {
        key: tmdb_id.to_string(),
        source: Box::new(source),
    }
}

fn fill_ids(record: &mut MediaRecord, ids: &MediaIds) {
    if record.imdb_id.is_none() {
        record.imdb_id.clone_from(&ids.imdb_id);
    }
    if record.tvdb_id.is_none() {
        record.tvdb_id = ids.tvdb_id;
    }
}

fn merge_seasons(existing: &mut Vec<SeasonRecord>, observed: Vec<SeasonRecord>) {
    for season in observed {
        match existing
            .iter_mut()
            .find(|s| s.season_number == season.season_number)
        {
            Some(slot) => *slot = season,
            None => existing.push(season),
        }
    }
    existing.sort_by_key(|s| s.season_number);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::{InMemoryMediaStore, MockMediaStore};

    fn reconciler(store: Arc<dyn MediaStore>, hq: bool) -> LibraryReconciler {
        let settings = ScannerSettings {
            enable_hq_movie: hq,
            enable_hq_show: hq,
            ..ScannerSettings::default()
        };
        LibraryReconciler::new("Test", store, &settings)
    }

    fn show_options(rating_key: &str) -> ProcessOptions {
        ProcessOptions {
            rating_key: Some(rating_key.to_string()),
            title: Some("Test Show".to_string()),
            ..ProcessOptions::default()
        }
    }

    #[tokio::test]
    async fn test_process_show_creates_record() {
        let store = Arc::new(InMemoryMediaStore::new());
        let reconciler = reconciler(store.clone(), false);

        reconciler
            .process_show(
                MediaIds {
                    tmdb_id: 10,
                    tvdb_id: Some(99),
                    imdb_id: None,
                },
                vec![SeasonFact::new(1, 10, 10), SeasonFact::new(2, 8, 3)],
                show_options("rk-10"),
            )
            .await
            .unwrap();

        let record = store.find(MediaType::Tv, 10).unwrap().unwrap();
        assert_eq!(record.status, AvailabilityStatus::PartiallyAvailable);
        assert_eq!(record.status_hq, AvailabilityStatus::Unknown);
        assert_eq!(record.rating_key.as_deref(), Some("rk-10"));
        assert_eq!(record.rating_key_hq, None);
        assert_eq!(record.tvdb_id, Some(99));
        assert_eq!(record.seasons.len(), 2);
        assert_eq!(reconciler.lock().active_keys(), 0);
    }

    #[tokio::test]
    async fn test_process_show_keeps_unobserved_seasons() {
        let store = Arc::new(InMemoryMediaStore::new());
        let reconciler = reconciler(store.clone(), false);

        reconciler
            .process_show(
                MediaIds::tmdb(5),
                vec![SeasonFact::new(1, 4, 4), SeasonFact::new(2, 4, 0)],
                show_options("rk"),
            )
            .await
            .unwrap();
        reconciler
            .process_show(
                MediaIds::tmdb(5),
                vec![SeasonFact::new(2, 4, 4)],
                ProcessOptions::default(),
            )
            .await
            .unwrap();

        let record = store.find(MediaType::Tv, 5).unwrap().unwrap();
        assert_eq!(record.seasons.len(), 2);
        assert_eq!(record.seasons[1].status, AvailabilityStatus::Available);
        assert_eq!(record.status, AvailabilityStatus::Available);
        // No new rating key: the stored one is kept
        assert_eq!(record.rating_key.as_deref(), Some("rk"));
    }

    #[tokio::test]
    async fn test_title_status_covers_stored_seasons() {
        let store = Arc::new(InMemoryMediaStore::new());
        let reconciler = reconciler(store.clone(), false);

        reconciler
            .process_show(
                MediaIds::tmdb(12),
                vec![SeasonFact::new(1, 10, 3), SeasonFact::new(2, 10, 0)],
                show_options("rk"),
            )
            .await
            .unwrap();
        reconciler
            .process_show(
                MediaIds::tmdb(12),
                vec![SeasonFact::new(2, 10, 10)],
                show_options("rk"),
            )
            .await
            .unwrap();

        let record = store.find(MediaType::Tv, 12).unwrap().unwrap();
        let statuses: Vec<AvailabilityStatus> = record.seasons.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![
                AvailabilityStatus::PartiallyAvailable,
                AvailabilityStatus::Available
            ]
        );
        // Season 1 is still incomplete, so the title is not available
        assert_eq!(record.status, AvailabilityStatus::PartiallyAvailable);
    }

    #[tokio::test]
    async fn test_process_show_hq_axis() {
        let store = Arc::new(InMemoryMediaStore::new());
        let reconciler = reconciler(store.clone(), true);

        reconciler
            .process_show(
                MediaIds::tmdb(8),
                vec![SeasonFact::new(1, 6, 0).with_hq(6)],
                ProcessOptions {
                    is_hq: true,
                    service_id: Some(2),
                    ..show_options("rk-hq")
                },
            )
            .await
            .unwrap();

        let record = store.find(MediaType::Tv, 8).unwrap().unwrap();
        assert_eq!(record.status, AvailabilityStatus::Unknown);
        assert_eq!(record.status_hq, AvailabilityStatus::Available);
        assert_eq!(record.rating_key, None);
        assert_eq!(record.rating_key_hq.as_deref(), Some("rk-hq"));
        assert_eq!(record.service_id_hq, Some(2));
        assert_eq!(record.service_id, None);
    }

    #[tokio::test]
    async fn test_process_movie_available() {
        let store = Arc::new(InMemoryMediaStore::new());
        let reconciler = reconciler(store.clone(), false);

        reconciler
            .process_movie(
                MediaIds::tmdb(603),
                ProcessOptions {
                    rating_key: Some("m-rk".to_string()),
                    ..ProcessOptions::default()
                },
            )
            .await
            .unwrap();

        let record = store.find(MediaType::Movie, 603).unwrap().unwrap();
        assert_eq!(record.status, AvailabilityStatus::Available);
        assert_eq!(record.rating_key.as_deref(), Some("m-rk"));
    }

    #[tokio::test]
    async fn test_process_movie_never_downgrades_available() {
        let store = Arc::new(InMemoryMediaStore::new());
        let reconciler = reconciler(store.clone(), false);

        reconciler
            .process_movie(MediaIds::tmdb(1), ProcessOptions::default())
            .await
            .unwrap();
        reconciler
            .process_movie(
                MediaIds::tmdb(1),
                ProcessOptions {
                    processing: true,
                    ..ProcessOptions::default()
                },
            )
            .await
            .unwrap();

        let record = store.find(MediaType::Movie, 1).unwrap().unwrap();
        assert_eq!(record.status, AvailabilityStatus::Available);
    }

    #[tokio::test]
    async fn test_process_movie_processing() {
        let store = Arc::new(InMemoryMediaStore::new());
        let reconciler = reconciler(store.clone(), false);

        reconciler
            .process_movie(
                MediaIds::tmdb(2),
                ProcessOptions {
                    processing: true,
                    ..ProcessOptions::default()
                },
            )
            .await
            .unwrap();

        let record = store.find(MediaType::Movie, 2).unwrap().unwrap();
        assert_eq!(record.status, AvailabilityStatus::Processing);
    }

    #[tokio::test]
    async fn test_hq_movie_skipped_when_disabled() {
        let mut store = MockMediaStore::new();
        store.expect_find().never();
        store.expect_save().never();
        let reconciler = reconciler(Arc::new(store), false);

        reconciler
            .process_movie(
                MediaIds::tmdb(3),
                ProcessOptions {
                    is_hq: true,
                    ..ProcessOptions::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_store_failure_is_lock_operation_error() {
        let mut store = MockMediaStore::new();
        store.expect_find().returning(|_, _| Ok(None));
        store
            .expect_save()
            .times(1)
            .returning(|_| Err(StoreError::Unavailable("disk full".to_string())));
        let reconciler = reconciler(Arc::new(store), false);

        let result = reconciler
            .process_show(
                MediaIds::tmdb(77),
                vec![SeasonFact::new(1, 1, 1)],
                ProcessOptions::default(),
            )
            .await;

        assert!(matches!(
            result,
            Err(ScanError::LockOperation { ref key, .. }) if key == "77"
        ));
        assert_eq!(reconciler.lock().active_keys(), 0);
    }

    #[tokio::test]
    async fn test_find_failure_skips_save() {
        let mut store = MockMediaStore::new();
        store
            .expect_find()
            .withf(|media_type, tmdb_id| *media_type == MediaType::Movie && *tmdb_id == 4)
            .returning(|_, _| Err(StoreError::Unavailable("offline".to_string())));
        store.expect_save().never();
        let reconciler = reconciler(Arc::new(store), false);

        let result = reconciler
            .process_movie(MediaIds::tmdb(4), ProcessOptions::default())
            .await;

        assert!(matches!(result, Err(ScanError::LockOperation { .. })));
    }
}
