//! Extraction orchestration
//!
//! One run spawns a producer task per [`ResourceClass`]. Each producer fetches
//! its whole listing, then persists items one at a time. Outcomes are sent as
//! [`StatsUpdate`]s to a single aggregator task that owns the
//! [`ExtractionStats`] and hands them back once every producer has dropped its
//! sender.
//!
//! A fetch failure is fatal: the remaining producers are aborted and the run
//! returns an [`ExtractionFailure`] carrying the partial stats. A persistence
//! failure only counts as an error.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::cancel::SharedCancellation;
use crate::config::STATS_CHANNEL_CAPACITY;
use crate::fetcher::{FetcherError, FetcherResult, ResourceSource};
use crate::metrics::{record_item, ExtractionMetrics};
use crate::storage::{Storage, StorageResult};
use crate::{Project, User};

pub mod stats;

pub use stats::{ExtractionStats, ResourceClass, StatsUpdate};

/// Fatal extraction errors
#[derive(Debug, thiserror::Error)]
pub enum ExtractorError {
    /// Cancellation was observed
    #[error("extraction cancelled")]
    Cancelled,

    /// A listing could not be fetched
    #[error("{} API failure: {source}", .class.singular())]
    Fetch {
        /// Class whose listing failed
        class: ResourceClass,
        /// Underlying fetcher error
        #[source]
        source: FetcherError,
    },

    /// A producer task panicked or was aborted unexpectedly
    #[error("extraction task failed: {0}")]
    Task(String),
}

impl ExtractorError {
    fn from_fetch(class: ResourceClass, source: FetcherError) -> Self {
        if source.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Fetch { class, source }
        }
    }

    /// Whether the run stopped because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A failed run: the first fatal error and whatever was counted before it.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ExtractionFailure {
    /// Stats accumulated until the failure
    pub partial: ExtractionStats,
    /// First fatal error observed
    #[source]
    pub error: ExtractorError,
}

/// Item that a producer can persist.
trait Extractable: Send + Sync + 'static {
    fn gid(&self) -> &str;
    fn persist(&self, storage: &dyn Storage) -> StorageResult<()>;
}

impl Extractable for User {
    fn gid(&self) -> &str {
        &self.gid
    }

    fn persist(&self, storage: &dyn Storage) -> StorageResult<()> {
        storage.write_user(self)
    }
}

impl Extractable for Project {
    fn gid(&self) -> &str {
        &self.gid
    }

    fn persist(&self, storage: &dyn Storage) -> StorageResult<()> {
        storage.write_project(self)
    }
}

/// Runs full extractions against a source and a storage.
#[derive(Clone)]
pub struct Extractor {
    source: Arc<dyn ResourceSource>,
    storage: Arc<dyn Storage>,
}

impl Extractor {
    /// Create an extractor over the given collaborators.
    pub fn new(source: Arc<dyn ResourceSource>, storage: Arc<dyn Storage>) -> Self {
        Self { source, storage }
    }

    /// Perform one full extraction.
    ///
    /// # Errors
    /// Returns [`ExtractionFailure`] on cancellation or on the first listing
    /// that could not be fetched.
    pub async fn run(&self, cancel: &SharedCancellation) -> Result<ExtractionStats, ExtractionFailure> {
        self.run_inner(cancel)
            .instrument(info_span!("extraction"))
            .await
    }

    async fn run_inner(&self, cancel: &SharedCancellation) -> Result<ExtractionStats, ExtractionFailure> {
        let started = Instant::now();
        let metrics = ExtractionMetrics::start();
        info!("Starting extraction");

        let (updates, receiver) = mpsc::channel(STATS_CHANNEL_CAPACITY);
        let aggregator = tokio::spawn(aggregate(receiver));

        let mut producers = JoinSet::new();
        for class in ResourceClass::ALL {
            let producer = Producer {
                class,
                source: Arc::clone(&self.source),
                storage: Arc::clone(&self.storage),
                cancel: Arc::clone(cancel),
                updates: updates.clone(),
            };
            producers.spawn(producer.run().instrument(info_span!("producer", class = class.as_str())));
        }
        // Producers hold the only senders; the aggregator ends when they are gone.
        drop(updates);

        let mut fatal = None;
        while let Some(joined) = producers.join_next().await {
            let result = joined.unwrap_or_else(|e| Err(ExtractorError::Task(e.to_string())));
            if let Err(error) = result {
                warn!(error = %error, "Aborting remaining producers");
                producers.shutdown().await;
                fatal = Some(error);
                break;
            }
        }

        let mut stats = match aggregator.await {
            Ok(stats) => stats,
            Err(e) => {
                fatal.get_or_insert(ExtractorError::Task(e.to_string()));
                ExtractionStats::default()
            }
        };
        stats.duration = started.elapsed();

        match fatal {
            None => {
                metrics.record_success(stats.total_extracted(), stats.errors);
                Ok(stats)
            }
            Some(error) => {
                metrics.record_failure(&error.to_string());
                Err(ExtractionFailure { partial: stats, error })
            }
        }
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor").finish_non_exhaustive()
    }
}

/// Sole owner of the run's stats.
async fn aggregate(mut updates: mpsc::Receiver<StatsUpdate>) -> ExtractionStats {
    let mut stats = ExtractionStats::default();
    while let Some(update) = updates.recv().await {
        stats.apply(update);
    }
    stats
}

struct Producer {
    class: ResourceClass,
    source: Arc<dyn ResourceSource>,
    storage: Arc<dyn Storage>,
    cancel: SharedCancellation,
    updates: mpsc::Sender<StatsUpdate>,
}

impl Producer {
    async fn run(self) -> Result<(), ExtractorError> {
        self.check_cancelled()?;
        match self.class {
            ResourceClass::Users => {
                let users = self.fetched(self.source.fetch_users(&self.cancel).await)?;
                self.persist_all(users).await
            }
            ResourceClass::Projects => {
                let projects = self.fetched(self.source.fetch_projects(&self.cancel).await)?;
                self.persist_all(projects).await
            }
        }
    }

    fn fetched<T>(&self, result: FetcherResult<Vec<T>>) -> Result<Vec<T>, ExtractorError> {
        let items = result.map_err(|source| ExtractorError::from_fetch(self.class, source))?;
        info!(items = items.len(), "Fetched listing");
        Ok(items)
    }

    async fn persist_all<T: Extractable>(&self, items: Vec<T>) -> Result<(), ExtractorError> {
        for item in &items {
            self.check_cancelled()?;

            let update = match item.persist(self.storage.as_ref()) {
                Ok(()) => {
                    record_item(self.class, true);
                    StatsUpdate::Extracted(self.class)
                }
                Err(e) => {
                    warn!(gid = item.gid(), error = %e, "Failed to persist item");
                    record_item(self.class, false);
                    StatsUpdate::Failed(self.class)
                }
            };

            if self.updates.send(update).await.is_err() {
                return Err(ExtractorError::Task("stats aggregator stopped".to_string()));
            }
        }
        debug!(items = items.len(), "Persistence loop complete");
        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), ExtractorError> {
        if self.cancel.is_cancelled() {
            Err(ExtractorError::Cancelled)
        } else {
            Ok(())
        }
    }
}
