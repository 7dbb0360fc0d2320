use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use super::filter::RoomGroup;
use super::form::MeterForm;
use super::usage::{parse_reading, Utility};
use crate::models::{ActiveContracts, BillingPeriod, GenerateInvoice, NewMeterReading};
use crate::services::{ApiError, MeterApi};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("nothing to submit")]
    NothingToSubmit,
    #[error("room {room_number}: {} reading is not a number", .utility.as_str())]
    InvalidInput {
        room_number: String,
        utility: Utility,
    },
    #[error("batch was not confirmed")]
    NotConfirmed,
    #[error("saving meter readings stopped at room {room_number} ({saved} saved)")]
    ReadingFailed {
        room_number: String,
        saved: usize,
        #[source]
        source: ApiError,
    },
}

/// A room whose two readings are filled in and numeric.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchCandidate {
    pub room_id: String,
    pub room_number: String,
    pub water: f64,
    pub electric: f64,
    pub has_contract: bool,
}

/// Validated, not yet confirmed set of rooms to submit, in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    period: BillingPeriod,
    candidates: Vec<BatchCandidate>,
}

impl BatchPlan {
    /// Candidates are the visible rooms with both inputs filled. A filled but
    /// non-numeric input rejects the whole plan.
    pub fn build(
        groups: &[RoomGroup<'_>],
        form: &MeterForm,
        contracts: &ActiveContracts,
        period: BillingPeriod,
    ) -> Result<Self, BatchError> {
        let mut candidates = Vec::new();

        for room in groups.iter().flat_map(|g| g.rooms.iter()) {
            let input = form.input(&room.id);
            if !input.is_complete() {
                continue;
            }

            let parse = |utility: Utility| {
                parse_reading(input.value(utility)).ok_or_else(|| BatchError::InvalidInput {
                    room_number: room.number.clone(),
                    utility,
                })
            };

            candidates.push(BatchCandidate {
                room_id: room.id.clone(),
                room_number: room.number.clone(),
                water: parse(Utility::Water)?,
                electric: parse(Utility::Electric)?,
                has_contract: contracts.has_active(&room.id),
            });
        }

        if candidates.is_empty() {
            return Err(BatchError::NothingToSubmit);
        }

        Ok(Self { period, candidates })
    }

    pub fn period(&self) -> BillingPeriod {
        self.period
    }

    pub fn candidates(&self) -> &[BatchCandidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// The only way to obtain a [`ConfirmedBatch`].
    pub fn confirm(self, confirm: &impl Confirm) -> Result<ConfirmedBatch, BatchError> {
        if confirm.confirm(self.len()) {
            Ok(ConfirmedBatch { plan: self })
        } else {
            Err(BatchError::NotConfirmed)
        }
    }
}

/// Asks the operator whether `count` rooms should be saved.
pub trait Confirm {
    fn confirm(&self, count: usize) -> bool;
}

/// Answer given ahead of time, e.g. the `confirmed` field of a posted form.
#[derive(Debug, Clone, Copy)]
pub struct PreConfirmed(pub bool);

impl Confirm for PreConfirmed {
    fn confirm(&self, _count: usize) -> bool {
        self.0
    }
}

/// A plan the operator agreed to run.
#[derive(Debug, Clone)]
pub struct ConfirmedBatch {
    plan: BatchPlan,
}

impl ConfirmedBatch {
    pub fn plan(&self) -> &BatchPlan {
        &self.plan
    }

    pub fn initial_progress(&self) -> BatchProgress {
        BatchProgress::new(&self.plan)
    }

    pub fn progress_channel(&self) -> (watch::Sender<BatchProgress>, watch::Receiver<BatchProgress>) {
        watch::channel(self.initial_progress())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceOutcome {
    Generated,
    Failed,
    /// No active contract, nothing to bill.
    Skipped,
}

impl InvoiceOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceOutcome::Generated => "generated",
            InvoiceOutcome::Failed => "failed",
            InvoiceOutcome::Skipped => "skipped",
        }
    }
}

/// Per-room submission state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    ReadingSubmitted,
    InvoiceAttempted(InvoiceOutcome),
    Done(InvoiceOutcome),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemEvent {
    ReadingSaved,
    ReadingRejected(String),
    InvoiceSettled(InvoiceOutcome),
    Finished,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot apply {event:?} to an item in state {state:?}")]
pub struct InvalidTransition {
    pub state: ItemState,
    pub event: ItemEvent,
}

impl ItemState {
    pub fn apply(self, event: ItemEvent) -> Result<ItemState, InvalidTransition> {
        match (self, event) {
            (ItemState::Pending, ItemEvent::ReadingSaved) => Ok(ItemState::ReadingSubmitted),
            (ItemState::Pending, ItemEvent::ReadingRejected(message)) => {
                Ok(ItemState::Failed(message))
            }
            (ItemState::ReadingSubmitted, ItemEvent::InvoiceSettled(outcome)) => {
                Ok(ItemState::InvoiceAttempted(outcome))
            }
            (ItemState::InvoiceAttempted(outcome), ItemEvent::Finished) => {
                Ok(ItemState::Done(outcome))
            }
            (state, event) => Err(InvalidTransition { state, event }),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ItemState::Pending => "pending",
            ItemState::ReadingSubmitted => "reading saved",
            ItemState::InvoiceAttempted(_) => "invoicing",
            ItemState::Done(InvoiceOutcome::Generated) => "done",
            ItemState::Done(InvoiceOutcome::Skipped) => "done, no contract",
            ItemState::Done(InvoiceOutcome::Failed) => "done, invoice failed",
            ItemState::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemProgress {
    pub room_id: String,
    pub room_number: String,
    pub state: ItemState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStatus {
    Running,
    Completed,
    Aborted { room_number: String, message: String },
}

impl BatchStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, BatchStatus::Running)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchProgress {
    pub period: BillingPeriod,
    pub total: usize,
    pub completed: usize,
    pub readings_created: usize,
    pub invoices_generated: usize,
    pub invoice_failures: usize,
    pub status: BatchStatus,
    pub items: Vec<ItemProgress>,
}

impl BatchProgress {
    fn new(plan: &BatchPlan) -> Self {
        Self {
            period: plan.period,
            total: plan.len(),
            completed: 0,
            readings_created: 0,
            invoices_generated: 0,
            invoice_failures: 0,
            status: BatchStatus::Running,
            items: plan
                .candidates
                .iter()
                .map(|c| ItemProgress {
                    room_id: c.room_id.clone(),
                    room_number: c.room_number.clone(),
                    state: ItemState::Pending,
                })
                .collect(),
        }
    }

    pub fn percent(&self) -> u8 {
        if self.status == BatchStatus::Completed {
            return 100;
        }
        if self.total == 0 {
            return 0;
        }
        (self.completed * 100 / self.total).min(100) as u8
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            period: self.period,
            readings_created: self.readings_created,
            invoices_generated: self.invoices_generated,
            invoice_failures: self.invoice_failures,
        }
    }

    fn advance(&mut self, index: usize, event: ItemEvent) {
        let Some(item) = self.items.get_mut(index) else {
            return;
        };
        let state = std::mem::replace(&mut item.state, ItemState::Pending);
        item.state = match state.apply(event) {
            Ok(next) => next,
            Err(err) => {
                tracing::error!(room_id = %item.room_id, error = %err, "Batch item transition rejected");
                err.state
            }
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub period: BillingPeriod,
    pub readings_created: usize,
    pub invoices_generated: usize,
    pub invoice_failures: usize,
}

/// Runs a confirmed batch one room at a time: the next room is not started
/// until the previous room's reading and invoice attempt have settled.
pub struct BatchSubmitter<A> {
    api: A,
}

impl<A: MeterApi> BatchSubmitter<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Confirm and run in one go, for callers that need no progress feed.
    pub async fn submit(
        &self,
        plan: BatchPlan,
        confirm: &impl Confirm,
    ) -> Result<BatchSummary, BatchError> {
        let batch = plan.confirm(confirm)?;
        let (progress, _receiver) = batch.progress_channel();
        self.run(batch, &progress).await
    }

    pub async fn run(
        &self,
        batch: ConfirmedBatch,
        progress: &watch::Sender<BatchProgress>,
    ) -> Result<BatchSummary, BatchError> {
        let plan = batch.plan;
        let period = plan.period;
        tracing::info!(rooms = plan.len(), period = %period, "Starting meter reading batch");

        for (index, candidate) in plan.candidates.iter().enumerate() {
            let reading = NewMeterReading {
                room_id: candidate.room_id.clone(),
                month: period.month(),
                year: period.year(),
                water_reading: candidate.water,
                electric_reading: candidate.electric,
            };

            if let Err(source) = self.api.create_meter_reading(&reading).await {
                tracing::error!(
                    room_id = %candidate.room_id,
                    room_number = %candidate.room_number,
                    error = %source,
                    "Saving meter reading failed, aborting batch"
                );
                progress.send_modify(|p| {
                    p.advance(index, ItemEvent::ReadingRejected(source.to_string()));
                    p.status = BatchStatus::Aborted {
                        room_number: candidate.room_number.clone(),
                        message: format!(
                            "Saving meter readings failed at room {}",
                            candidate.room_number
                        ),
                    };
                });
                return Err(BatchError::ReadingFailed {
                    room_number: candidate.room_number.clone(),
                    saved: progress.borrow().readings_created,
                    source,
                });
            }

            metrics::counter!("meter_readings_created_total").increment(1);
            progress.send_modify(|p| {
                p.readings_created += 1;
                p.advance(index, ItemEvent::ReadingSaved);
            });

            let outcome = if candidate.has_contract {
                self.invoice(candidate, period).await
            } else {
                tracing::debug!(room_id = %candidate.room_id, "No active contract, invoice skipped");
                InvoiceOutcome::Skipped
            };
            metrics::counter!("invoice_generation_total", "outcome" => outcome.as_str())
                .increment(1);

            progress.send_modify(|p| {
                match outcome {
                    InvoiceOutcome::Generated => p.invoices_generated += 1,
                    InvoiceOutcome::Failed => p.invoice_failures += 1,
                    InvoiceOutcome::Skipped => {}
                }
                p.advance(index, ItemEvent::InvoiceSettled(outcome));
                p.advance(index, ItemEvent::Finished);
                p.completed += 1;
            });
        }

        progress.send_modify(|p| p.status = BatchStatus::Completed);
        let summary = progress.borrow().summary();

        tracing::info!(
            period = %period,
            readings_created = summary.readings_created,
            invoices_generated = summary.invoices_generated,
            invoice_failures = summary.invoice_failures,
            "Meter reading batch completed"
        );
        Ok(summary)
    }

    async fn invoice(&self, candidate: &BatchCandidate, period: BillingPeriod) -> InvoiceOutcome {
        let request = GenerateInvoice {
            room_id: candidate.room_id.clone(),
            month: period.month(),
            year: period.year(),
        };
        match self.api.generate_invoice(&request).await {
            Ok(()) => InvoiceOutcome::Generated,
            Err(e) => {
                tracing::warn!(
                    room_id = %candidate.room_id,
                    room_number = %candidate.room_number,
                    error = %e,
                    "Invoice generation failed"
                );
                InvoiceOutcome::Failed
            }
        }
    }
}
