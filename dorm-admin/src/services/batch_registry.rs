use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

use crate::meter::{BatchProgress, BatchSubmitter, ConfirmedBatch};
use crate::services::MeterApi;

/// How long a finished batch stays readable when nobody polls it.
const DEFAULT_RETENTION: Duration = Duration::from_secs(10 * 60);

/// Running and recently finished batches, keyed by the id handed to the
/// browser for progress polling.
#[derive(Clone)]
pub struct BatchRegistry {
    batches: Arc<DashMap<Uuid, watch::Receiver<BatchProgress>>>,
    retention: Duration,
}

impl Default for BatchRegistry {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finished batches are dropped `retention` after they end, read or not.
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            batches: Arc::new(DashMap::new()),
            retention,
        }
    }

    /// Spawn the batch and return its id. Once started a batch runs to
    /// completion or abort; there is no cancellation.
    pub fn start<A>(&self, api: A, batch: ConfirmedBatch) -> Uuid
    where
        A: MeterApi + 'static,
    {
        let id = Uuid::new_v4();
        let (sender, receiver) = batch.progress_channel();
        self.batches.insert(id, receiver);

        let batches = Arc::clone(&self.batches);
        let retention = self.retention;
        let span = tracing::info_span!("meter_batch", batch_id = %id, rooms = batch.plan().len());
        tokio::spawn(
            async move {
                let submitter = BatchSubmitter::new(api);
                let outcome = match submitter.run(batch, &sender).await {
                    Ok(_) => "completed",
                    Err(e) => {
                        tracing::error!(error = %e, "Meter reading batch aborted");
                        "aborted"
                    }
                };
                metrics::counter!("meter_batches_total", "outcome" => outcome).increment(1);

                tokio::time::sleep(retention).await;
                if batches.remove(&id).is_some() {
                    tracing::debug!("Evicted unread batch progress");
                }
            }
            .instrument(span),
        );

        id
    }

    /// Latest progress of a batch. A finished batch is forgotten after its
    /// final state has been returned once.
    pub fn progress(&self, id: &Uuid) -> Option<BatchProgress> {
        let progress = self.batches.get(id)?.borrow().clone();
        if progress.status.is_finished() {
            self.batches.remove(id);
        }
        Some(progress)
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
