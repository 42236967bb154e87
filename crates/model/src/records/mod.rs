pub mod batch;
pub mod change;

pub use batch::ChangeBatch;
pub use change::ChangeRecord;
