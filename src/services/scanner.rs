use crate::metrics::ScanMetrics;
use crate::models::{ScanProgress, ScannerSettings, SessionId};
use crate::state::ScanStateManager;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Conditions that end a scan early
#[derive(Error, Debug)]
pub enum ScanError {
    /// The running flag was cleared between bundles
    #[error("Scan was aborted")]
    Aborted,

    /// A newer session replaced this loop's session
    #[error("New session was started, old session aborted")]
    Superseded,

    /// An item's processor failed; the rest of its bundle was discarded
    #[error("Processing item {index} failed: {source}")]
    ItemProcessing {
        index: usize,
        #[source]
        source: BoxError,
    },

    /// An operation run under the keyed lock failed
    #[error("Operation for key {key} failed: {source}")]
    LockOperation {
        key: String,
        #[source]
        source: BoxError,
    },
}

impl ScanError {
    /// True for `Aborted` and `Superseded`
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Aborted | Self::Superseded)
    }

    /// Classify a processor failure; a `ScanError` raised by the processor
    /// itself is passed through unchanged.
    pub fn from_item(index: usize, error: anyhow::Error) -> Self {
        match error.downcast::<ScanError>() {
            Ok(scan_error) => scan_error,
            Err(error) => Self::ItemProcessing {
                index,
                source: error.into(),
            },
        }
    }
}

/// Per-run overrides of the scanner's pacing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub bundle_size: Option<usize>,
    pub inter_bundle_delay: Option<Duration>,
}

impl RunOptions {
    pub fn with_bundle_size(mut self, bundle_size: usize) -> Self {
        self.bundle_size = Some(bundle_size);
        self
    }

    pub fn with_inter_bundle_delay(mut self, delay: Duration) -> Self {
        self.inter_bundle_delay = Some(delay);
        self
    }
}

/// Bundled scan loop
///
/// Drives an item list through a caller-supplied processor in fixed-size
/// bundles. Items inside a bundle run concurrently as tokio tasks; bundles run
/// strictly one after another with a pause in between. At every bundle
/// boundary the loop checks its session through [`ScanStateManager`] and
/// stops with [`ScanError::Aborted`] or [`ScanError::Superseded`].
///
/// The scanner holds no items itself, so one instance can scan any item type.
#[derive(Debug)]
pub struct Scanner {
    name: String,
    bundle_size: usize,
    update_rate: Duration,
    state: ScanStateManager,
    metrics: Arc<ScanMetrics>,
}

impl Scanner {
    pub fn new(name: impl Into<String>, settings: &ScannerSettings) -> Self {
        let name = name.into();
        Self {
            state: ScanStateManager::new(name.clone()),
            name,
            bundle_size: settings.bundle_size.max(1),
            update_rate: settings.update_rate(),
            metrics: Arc::new(ScanMetrics::new()),
        }
    }

    /// Share a metrics sink with other components
    pub fn with_metrics(mut self, metrics: Arc<ScanMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default bundle size
    pub fn bundle_size(&self) -> usize {
        self.bundle_size
    }

    /// Default delay between bundles
    pub fn update_rate(&self) -> Duration {
        self.update_rate
    }

    pub fn state(&self) -> &ScanStateManager {
        &self.state
    }

    pub fn metrics(&self) -> &Arc<ScanMetrics> {
        &self.metrics
    }

    /// Begin a new session, superseding any run still in flight
    pub fn start_run(&self) -> SessionId {
        let session = self.state.start_run();
        self.metrics.record_run_started();
        tracing::info!(scanner = %self.name, %session, "Scan starting");
        session
    }

    /// Finish `session`; ignored when a newer session has taken over
    pub fn end_run(&self, session: SessionId) {
        if !self.state.end_run(session) {
            tracing::debug!(
                scanner = %self.name,
                %session,
                "Ignoring end of superseded session"
            );
        }
    }

    /// Stop the current run at its next bundle boundary
    pub fn cancel(&self) {
        tracing::info!(scanner = %self.name, "Scan cancellation requested");
        self.state.cancel();
    }

    pub fn status(&self) -> ScanProgress {
        self.state.status()
    }

    /// Start a session, scan every item, then end the session
    ///
    /// The session is ended whatever the outcome. A superseded run's
    /// `end_run` is a no-op, so the newer run keeps its running flag.
    pub async fn run<T, F, Fut>(
        &self,
        items: Vec<T>,
        process: F,
        options: RunOptions,
    ) -> Result<(), ScanError>
    where
        T: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let session = self.start_run();
        let started = Instant::now();

        let result = self.scan_loop(session, items, process, options).await;

        self.metrics.record_scan_time(started.elapsed());
        self.end_run(session);
        result
    }

    /// Scan `items` on behalf of `session`
    ///
    /// Progress is set to each bundle's starting index before the bundle is
    /// dispatched. The first failing item ends the wait for its bundle; the
    /// other tasks of that bundle are detached and keep running, but their
    /// results are dropped and nothing they wrote is rolled back.
    pub async fn scan_loop<T, F, Fut>(
        &self,
        session: SessionId,
        items: Vec<T>,
        process: F,
        options: RunOptions,
    ) -> Result<(), ScanError>
    where
        T: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let bundle_size = options.bundle_size.unwrap_or(self.bundle_size).max(1);
        let delay = options.inter_bundle_delay.unwrap_or(self.update_rate);

        let result = self
            .drive(session, items, &process, bundle_size, delay)
            .await;
        self.record_outcome(session, &result);
        result
    }

    async fn drive<T, F, Fut>(
        &self,
        session: SessionId,
        items: Vec<T>,
        process: &F,
        bundle_size: usize,
        delay: Duration,
    ) -> Result<(), ScanError>
    where
        T: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let total = items.len();
        self.state.set_total(session, total);

        let mut remaining = items.into_iter();
        let mut start = 0;

        loop {
            let progress = (start < total).then_some(start);
            self.state.checkpoint(session, progress)?;

            if start >= total {
                return Ok(());
            }

            let bundle: Vec<T> = remaining.by_ref().take(bundle_size).collect();
            let bundle_len = bundle.len();
            tracing::debug!(
                scanner = %self.name,
                %session,
                "Processing items {}..{} of {}",
                start,
                start + bundle_len,
                total
            );

            self.process_bundle(start, bundle, process).await?;
            self.metrics.record_bundle_completed();

            start += bundle_len;
            if start < total {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn process_bundle<T, F, Fut>(
        &self,
        start: usize,
        bundle: Vec<T>,
        process: &F,
    ) -> Result<(), ScanError>
    where
        T: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut tasks = JoinSet::new();
        // A panicking task returns no index of its own; map its task id back
        let mut task_indices = HashMap::new();

        for (offset, item) in bundle.into_iter().enumerate() {
            let index = start + offset;
            let work = process(item);
            let handle = tasks.spawn(async move { (index, work.await) });
            task_indices.insert(handle.id(), index);
        }

        while let Some(joined) = tasks.join_next().await {
            let error = match joined {
                Ok((_, Ok(()))) => {
                    self.metrics.record_item_processed();
                    continue;
                }
                Ok((index, Err(error))) => ScanError::from_item(index, error),
                Err(join_error) => ScanError::ItemProcessing {
                    index: task_indices
                        .get(&join_error.id())
                        .copied()
                        .unwrap_or(start),
                    source: format!("item task failed: {join_error}").into(),
                },
            };

            self.metrics.record_item_failed();
            tracing::error!(scanner = %self.name, "Bundle at {} failed: {}", start, error);

            // Siblings keep running; only their results are discarded
            tasks.detach_all();
            return Err(error);
        }

        Ok(())
    }

    fn record_outcome(&self, session: SessionId, result: &Result<(), ScanError>) {
        match result {
            Ok(()) => {
                self.metrics.record_run_completed();
                tracing::info!(
                    scanner = %self.name,
                    %session,
                    "Scan complete ({} items)",
                    self.state.status().total
                );
            }
            Err(ScanError::Aborted) => {
                self.metrics.record_run_aborted();
                tracing::warn!(scanner = %self.name, %session, "Scan aborted");
            }
            Err(ScanError::Superseded) => {
                self.metrics.record_run_superseded();
                tracing::warn!(
                    scanner = %self.name,
                    %session,
                    "Scan superseded by a newer session"
                );
            }
            Err(error) => {
                self.metrics.record_run_failed();
                tracing::error!(scanner = %self.name, %session, "Scan failed: {}", error);
            }
        }
    }
}
