//! libscan - bundled library reconciliation scanner
//!
//! Main entry point. Loads settings, sets up logging, reads a catalog file and
//! scans its shows and movies into an in-memory media store.
//!
//! # Execution Flow
//!
//! 1. Load settings from `libscan Data/libscan.yaml` (+ `LIBSCAN__*` env overrides)
//! 2. Initialize logging → logs/libscan.<date>
//! 3. Create a current-thread tokio runtime (all item work is interleaved
//!    cooperatively on one thread)
//! 4. Read the catalog given as the first argument (default `catalog.yaml`
//!    inside the data directory)
//! 5. Run the show scan, then the movie scan; Ctrl-C cancels the active scan
//!    at its next bundle boundary
//! 6. Log a metrics summary
//!
//! # Usage
//!
//! ```text
//! libscan [catalog.yaml]
//! ```

use anyhow::Result;
use libscan::models::{Catalog, ProcessOptions, ScannerSettings};
use libscan::services::{InMemoryMediaStore, MediaStore, RunOptions};
use libscan::{APP_NAME, ConfigManager, LibraryReconciler, ScanMetrics, Scanner, VERSION};
use std::sync::Arc;

const DATA_DIR: &str = "libscan Data";
const DEFAULT_CATALOG: &str = "catalog.yaml";

fn main() -> Result<()> {
    let config_manager = ConfigManager::new(DATA_DIR)?;
    let settings = config_manager.load_settings()?;

    let _guard = libscan::logging::setup_from_settings(&settings.logging)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let catalog_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CATALOG.to_string());
    let catalog = config_manager.load_catalog(catalog_path.as_str())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let metrics = Arc::new(ScanMetrics::new());
    let store = Arc::new(InMemoryMediaStore::new());

    runtime.block_on(scan_catalog(
        catalog,
        &settings.scanner,
        Arc::clone(&store),
        Arc::clone(&metrics),
    ));

    tracing::info!("{} records in store", store.len());
    metrics.log_summary();
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Run the show scan and then the movie scan. Failures are logged; the
/// next invocation simply scans again.
async fn scan_catalog(
    catalog: Catalog,
    settings: &ScannerSettings,
    store: Arc<InMemoryMediaStore>,
    metrics: Arc<ScanMetrics>,
) {
    let reconciler = Arc::new(
        LibraryReconciler::new("Library", store, settings).with_metrics(Arc::clone(&metrics)),
    );

    let show_scanner =
        Arc::new(Scanner::new("Show Scan", settings).with_metrics(Arc::clone(&metrics)));
    let movie_scanner =
        Arc::new(Scanner::new("Movie Scan", settings).with_metrics(Arc::clone(&metrics)));

    let cancel_watch = {
        let show_scanner = Arc::clone(&show_scanner);
        let movie_scanner = Arc::clone(&movie_scanner);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received - cancelling scans");
                show_scanner.cancel();
                movie_scanner.cancel();
            }
        })
    };

    let shows = {
        let reconciler = Arc::clone(&reconciler);
        show_scanner.run(
            catalog.shows,
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
    };
    if let Err(error) = shows.await {
        tracing::error!("Show scan ended early: {}", error);
    }

    let movies = {
        let reconciler = Arc::clone(&reconciler);
        movie_scanner.run(
            catalog.movies,
            move |movie| {
                let reconciler = Arc::clone(&reconciler);
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
    };
    if let Err(error) = movies.await {
        tracing::error!("Movie scan ended early: {}", error);
    }

    cancel_watch.abort();
}
