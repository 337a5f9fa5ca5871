//! Integration tests for scanning a catalog into a media store
//!
//! These tests verify:
//! - Scanner + LibraryReconciler write one record per title
//! - Items for the same title in one bundle do not lose each other's writes
//! - A store failure surfaces as a lock operation error and ends the run
//! - Catalog files load into scannable items

use camino::Utf8PathBuf;
use libscan::models::{
    CatalogMovie, CatalogShow, MediaIds, MediaType, ProcessOptions, ScannerSettings,
};
use libscan::services::{InMemoryMediaStore, MediaStore, StoreError};
use libscan::{
    AvailabilityStatus, ConfigManager, LibraryReconciler, RunOptions, ScanError, ScanMetrics,
    Scanner, SeasonFact,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tempfile::TempDir;

fn settings() -> ScannerSettings {
    ScannerSettings {
        bundle_size: 4,
        update_rate_ms: 0,
        enable_hq_movie: true,
        enable_hq_show: true,
    }
}

fn show(tmdb_id: i64, title: &str, is_hq: bool, seasons: Vec<SeasonFact>) -> CatalogShow {
    CatalogShow {
        ids: MediaIds::tmdb(tmdb_id),
        title: title.to_string(),
        rating_key: Some(format!("rk-{tmdb_id}")),
        is_hq,
        seasons,
    }
}

async fn scan_shows(
    scanner: &Scanner,
    reconciler: &Arc<LibraryReconciler>,
    shows: Vec<CatalogShow>,
) -> Result<(), ScanError> {
    let reconciler = Arc::clone(reconciler);
    scanner
        .run(
            shows,
            move |show| {
                let reconciler = Arc::clone(&reconciler);
                async move {
                    let options = ProcessOptions {
                        is_hq: show.is_hq,
                        rating_key: show.rating_key,
                        title: Some(show.title),
                        ..ProcessOptions::default()
                    };
                    reconciler.process_show(show.ids, show.seasons, options).await?;
                    Ok(())
                }
            },
            RunOptions::default(),
        )
        .await
}

#[tokio::test]
async fn test_show_scan_writes_records() {
    let store = Arc::new(InMemoryMediaStore::new());
    let metrics = Arc::new(ScanMetrics::new());
    let reconciler = Arc::new(
        LibraryReconciler::new("Library", store.clone(), &settings())
            .with_metrics(Arc::clone(&metrics)),
    );
    let scanner = Scanner::new("Show Scan", &settings()).with_metrics(Arc::clone(&metrics));

    let shows = vec![
        show(1, "Complete", false, vec![SeasonFact::new(1, 10, 10)]),
        show(2, "Partial", false, vec![SeasonFact::new(1, 10, 10), SeasonFact::new(2, 8, 3)]),
        show(3, "Downloading", false, vec![SeasonFact::new(1, 6, 0).processing()]),
        show(4, "Nothing", false, vec![SeasonFact::new(1, 6, 0)]),
        show(5, "Empty", false, Vec::new()),
    ];
    scan_shows(&scanner, &reconciler, shows).await.unwrap();

    let expected = [
        (1, AvailabilityStatus::Available, Some("rk-1")),
        (2, AvailabilityStatus::PartiallyAvailable, Some("rk-2")),
        (3, AvailabilityStatus::Processing, None),
        (4, AvailabilityStatus::Unknown, None),
        (5, AvailabilityStatus::Unknown, None),
    ];
    for (tmdb_id, status, rating_key) in expected {
        let record = store.find(MediaType::Tv, tmdb_id).unwrap().unwrap();
        assert_eq!(record.status, status, "tmdb {tmdb_id}");
        assert_eq!(record.rating_key.as_deref(), rating_key, "tmdb {tmdb_id}");
    }

    assert_eq!(store.len(), 5);
    assert_eq!(metrics.records_saved.load(Ordering::Relaxed), 5);
    assert_eq!(metrics.bundles_completed.load(Ordering::Relaxed), 2);
    assert_eq!(reconciler.lock().active_keys(), 0);
}

#[tokio::test]
async fn test_same_title_in_one_bundle_keeps_both_writes() {
    let store = Arc::new(InMemoryMediaStore::new());
    let reconciler = Arc::new(LibraryReconciler::new("Library", store.clone(), &settings()));
    let scanner = Scanner::new("Show Scan", &settings());

    // Standard and high-quality libraries each report a different season
    let shows = vec![
        show(70, "Split Show", false, vec![SeasonFact::new(1, 10, 10)]),
        show(70, "Split Show", true, vec![SeasonFact::new(2, 5, 0).with_hq(5)]),
        show(71, "Other", false, vec![SeasonFact::new(1, 2, 1)]),
    ];
    scan_shows(&scanner, &reconciler, shows).await.unwrap();

    let record = store.find(MediaType::Tv, 70).unwrap().unwrap();
    let numbers: Vec<u32> = record.seasons.iter().map(|s| s.season_number).collect();
    assert_eq!(numbers, vec![1, 2]);
    assert_eq!(record.seasons[0].status, AvailabilityStatus::Available);
    assert_eq!(record.seasons[1].status_hq, AvailabilityStatus::Available);
    assert_eq!(record.rating_key_hq.as_deref(), Some("rk-70"));
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_movie_scan_respects_hq_switch() {
    let store = Arc::new(InMemoryMediaStore::new());
    let no_hq = ScannerSettings {
        enable_hq_movie: false,
        ..settings()
    };
    let reconciler = Arc::new(LibraryReconciler::new("Library", store.clone(), &no_hq));
    let scanner = Scanner::new("Movie Scan", &no_hq);

    let movies = vec![
        CatalogMovie {
            ids: MediaIds::tmdb(603),
            title: "Standard".to_string(),
            rating_key: Some("m-603".to_string()),
            is_hq: false,
            processing: false,
        },
        CatalogMovie {
            ids: MediaIds::tmdb(604),
            title: "High Quality Only".to_string(),
            rating_key: Some("m-604".to_string()),
            is_hq: true,
            processing: false,
        },
    ];

    let handle = Arc::clone(&reconciler);
    scanner
        .run(
            movies,
            move |movie| {
                let reconciler = Arc::clone(&handle);
                async move {
                    let options = ProcessOptions {
                        is_hq: movie.is_hq,
                        rating_key: movie.rating_key,
                        processing: movie.processing,
                        title: Some(movie.title),
                        ..ProcessOptions::default()
                    };
                    reconciler.process_movie(movie.ids, options).await?;
                    Ok(())
                }
            },
            RunOptions::default(),
        )
        .await
        .unwrap();

    let record = store.find(MediaType::Movie, 603).unwrap().unwrap();
    assert_eq!(record.status, AvailabilityStatus::Available);
    assert_eq!(store.find(MediaType::Movie, 604).unwrap(), None);
}

/// Store that rejects every save
struct ReadOnlyStore;

impl MediaStore for ReadOnlyStore {
    fn find(
        &self,
        _media_type: MediaType,
        _tmdb_id: i64,
    ) -> Result<Option<libscan::models::MediaRecord>, StoreError> {
        Ok(None)
    }

    fn save(&self, _record: libscan::models::MediaRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("read-only".to_string()))
    }

    fn len(&self) -> usize {
        0
    }
}

#[tokio::test]
async fn test_store_failure_ends_run_with_lock_error() {
    let reconciler = Arc::new(LibraryReconciler::new(
        "Library",
        Arc::new(ReadOnlyStore),
        &settings(),
    ));
    let scanner = Scanner::new("Show Scan", &settings());

    let shows = (1..=6)
        .map(|id| show(id, "Show", false, vec![SeasonFact::new(1, 1, 1)]))
        .collect();
    let result = scan_shows(&scanner, &reconciler, shows).await;

    // The lock error passes through the item wrapper unchanged
    match result {
        Err(ScanError::LockOperation { key, source }) => {
            assert!((1..=4).map(|id: i64| id.to_string()).any(|k| k == key));
            assert!(source.to_string().contains("read-only"));
        }
        other => panic!("expected LockOperation, got {other:?}"),
    }
    assert!(!scanner.status().running);
    assert_eq!(scanner.status().progress, 0);
}

#[tokio::test]
async fn test_catalog_file_scan() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    let manager = ConfigManager::new(&config_dir).unwrap();

    std::fs::write(
        config_dir.join("catalog.yaml"),
        r#"
shows:
  - tmdb_id: 1399
    tvdb_id: 121361
    title: Example Show
    rating_key: "501"
    seasons:
      - season_number: 1
        total_episodes: 10
        available_episodes: 10
      - season_number: 2
        total_episodes: 10
        available_episodes: 4
movies:
  - tmdb_id: 603
    title: Example Movie
    processing: true
"#,
    )
    .unwrap();

    let catalog = manager.load_catalog("catalog.yaml").unwrap();
    assert_eq!(catalog.shows.len(), 1);
    assert_eq!(catalog.movies.len(), 1);

    let store = Arc::new(InMemoryMediaStore::new());
    let reconciler = Arc::new(LibraryReconciler::new("Library", store.clone(), &settings()));
    let scanner = Scanner::new("Show Scan", &settings());
    scan_shows(&scanner, &reconciler, catalog.shows).await.unwrap();

    let record = store.find(MediaType::Tv, 1399).unwrap().unwrap();
    assert_eq!(record.status, AvailabilityStatus::PartiallyAvailable);
    assert_eq!(record.tvdb_id, Some(121361));
    assert_eq!(record.rating_key.as_deref(), Some("501"));
    assert!(catalog.movies[0].processing);
}
