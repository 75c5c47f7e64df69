mod guard;
mod storage;
mod types;

pub use guard::{GuardLease, StorageGuard};
pub use storage::MessageStore;
pub use types::*;
