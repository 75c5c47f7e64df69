mod assembler;
mod queue;
mod types;
mod worker;

pub use assembler::{Assembler, CompletedMessage};
pub use queue::{DEFAULT_CAPACITY, Received, RelayItem, RelayReceiver, RelaySender, channel};
pub use types::Fragment;
pub use worker::{ReassemblyWorker, WorkerHandle};
