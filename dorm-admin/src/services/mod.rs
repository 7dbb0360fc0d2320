pub mod api_client;
pub mod batch_registry;

pub use api_client::{ApiClient, ApiError, MeterApi, StaffDirectory};
pub use batch_registry::BatchRegistry;
