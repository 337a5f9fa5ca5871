//! Services module - the scanning and reconciliation engine.
//!
//! Nothing here performs network I/O or decides what to scan; callers supply
//! the items and the per-item work.
//!
//! # Components
//!
//! - [`Scanner`]: the bundled scan loop. Walks an item list in fixed-size
//!   bundles, fans each bundle out as tokio tasks, pauses between bundles and
//!   checks its session at every boundary.
//! - [`KeyedLock`]: per-key FIFO mutual exclusion, so two updates of the same
//!   title never interleave.
//! - [`reconcile()`]: pure aggregation of per-season facts into whole-title
//!   statuses on the standard and high-quality axes.
//! - [`LibraryReconciler`]: per-item processors for shows and movies that
//!   combine the lock, the aggregation and a [`MediaStore`].
//!
//! # Usage Example
//!
//! ```ignore
//! use libscan::services::{LibraryReconciler, RunOptions, Scanner};
//!
//! let scanner = Scanner::new("Shows", &settings.scanner);
//! let reconciler = Arc::new(LibraryReconciler::new("Shows", store, &settings.scanner));
//!
//! scanner
//!     .run(shows, move |show| {
//!         let reconciler = Arc::clone(&reconciler);
//!         async move {
//!             reconciler.process_show(show.ids, show.seasons, options).await?;
//!             Ok(())
//!         }
//!     }, RunOptions::default())
//!     .await?;
//! ```
//!
//! # Errors
//!
//! [`ScanError`] keeps the four ways a scan can end early apart: cancellation,
//! supersession by a newer session, a failing item, and a failing operation
//! under the keyed lock.

pub mod library;
pub mod lock;
pub mod reconcile;
pub mod scanner;
pub mod store;

pub use library::LibraryReconciler;
pub use lock::KeyedLock;
pub use reconcile::{Reconciliation, aggregate_status, reconcile, season_status};
pub use scanner::{BoxError, RunOptions, ScanError, Scanner};
pub use store::{InMemoryMediaStore, MediaStore, StoreError};
