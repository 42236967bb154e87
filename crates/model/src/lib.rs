pub mod lease;
pub mod records;

pub use lease::{ConcurrencyToken, ContinuationToken, Lease};
pub use records::{ChangeBatch, ChangeRecord};
