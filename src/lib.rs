//! Browser Pool - concurrent task execution over rotating proxies
//!
//! Runs a growing set of independent tasks against an unreliable browsing
//! environment reached through a pool of proxies.
//!
//! ## Features
//!
//! - Fixed-size worker pool with immediate retry and terminal-failure accounting
//! - Work queue with join semantics covering retried tasks
//! - Random proxy selection with whitelist preference and blacklist reset
//! - Proxy suppliers for ProxyScrape, GeoNode and static list files
//! - Cooperative shutdown that releases in-flight execution contexts

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod proxy;
pub mod queue;
pub mod worker;

pub use config::{BlacklistPolicy, Config, PoolConfig};
pub use error::{PoolError, Result};
pub use models::{FailedTask, Handler, Proxy, ProxySettings, Task, TaskId, TaskOutput, TaskState};
pub use proxy::ProxyManager;
pub use queue::WorkQueue;
pub use worker::{Environment, WorkerPool};
