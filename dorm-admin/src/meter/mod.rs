//! Meter-reading workflow: form state, usage deltas, room ordering and the
//! batch submission that turns readings into invoices.

pub mod batch;
pub mod filter;
pub mod form;
pub mod usage;
pub mod view;

pub use batch::{
    BatchCandidate, BatchError, BatchPlan, BatchProgress, BatchStatus, BatchSubmitter,
    BatchSummary, Confirm, ConfirmedBatch, InvalidTransition, InvoiceOutcome, ItemEvent,
    ItemProgress, ItemState, PreConfirmed,
};
pub use filter::{visible_rooms, AnnexRule, RoomFilter, RoomGroup};
pub use form::{MeterForm, MeterFormFields, PreviousReadings, ReadingInput};
pub use usage::{format_units, parse_reading, UsageDelta, Utility};
pub use view::{meter_sections, BuildingSection, MeterRow};
