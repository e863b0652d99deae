//! Worker nodes and the thread pool that hosts them

pub mod actor;
pub mod node;

pub use actor::{Pending, WorkerCommand, WorkerError, WorkerHandle, WorkerPool};
pub use node::{WorkerId, WorkerNode, WorkerSettings, WorkerStats};
