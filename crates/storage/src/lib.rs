pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::MemoryStore;
pub use record::{
    ProvisioningOutcome, ProvisioningRecord, ResourceHandle, ServiceTag, TagResult,
};
pub use traits::RequestStore;
