//! Proxy resource management
//!
//! This module provides:
//! - The registry of known proxies with blacklist and whitelist tracking
//! - The manager that selects proxies and refills the registry
//! - Supplier adapters for remote lists and static files

pub mod manager;
pub mod registry;
pub mod supplier;

pub use manager::ProxyManager;
pub use registry::ProxyRegistry;
pub use supplier::{
    FixedSupplier, GeoNodeSupplier, ProxyScrapeSupplier, ProxySupplier, StaticFileSupplier,
};
