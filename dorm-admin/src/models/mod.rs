pub mod chat;
pub mod contract;
mod de;
pub mod invoice;
pub mod maintenance;
pub mod meter_reading;
pub mod period;
pub mod room;
pub mod staff;

pub use chat::RecentChat;
pub use contract::{ActiveContracts, Contract};
pub use invoice::{GenerateInvoice, Invoice, InvoiceStatus};
pub use maintenance::{
    MaintenanceDetails, MaintenanceRequest, MaintenanceStatus, NewMaintenanceRequest,
    ReportChannel,
};
pub use meter_reading::{MeterReading, MeterReadingQuery, NewMeterReading};
pub use period::{BillingPeriod, PeriodError};
pub use room::{Building, Room, RoomStatus};
pub use staff::{Capability, Role, StaffLookup, StaffProfile};
