//! Task execution
//!
//! This module provides the worker pool and its collaborators:
//! - The execution environment boundary
//! - Per-task retry and state bookkeeping
//! - The worker loop with proxy feedback and cooperative shutdown

pub mod environment;
pub mod ledger;
pub mod pool;


pub use environment::Environment;
pub use ledger::{RetryDecision, TaskLedger};
pub use pool::WorkerPool;
