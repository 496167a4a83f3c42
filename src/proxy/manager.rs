//! Proxy resource manager
//!
//! Owns the registry behind a mutex and refills it from the configured
//! suppliers. Workers share one manager through an `Arc`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use super::registry::ProxyRegistry;
use super::supplier::{GeoNodeSupplier, ProxyScrapeSupplier, ProxySupplier, StaticFileSupplier};
use crate::config::ProxySourceConfig;
use crate::error::{PoolError, Result};
use crate::models::Proxy;

pub struct ProxyManager {
    registry: Mutex<ProxyRegistry>,
    suppliers: Vec<Arc<dyn ProxySupplier>>,
    /// Serialises refills so concurrent callers trigger a single fetch
    refill_lock: tokio::sync::Mutex<()>,
}

impl ProxyManager {
    pub fn new(suppliers: Vec<Arc<dyn ProxySupplier>>) -> Self {
        Self {
            registry: Mutex::new(ProxyRegistry::new()),
            suppliers,
            refill_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Manager with a fixed list and no suppliers
    pub fn with_proxies(proxies: Vec<Proxy>) -> Self {
        let manager = Self::new(Vec::new());
        manager.set_proxies(proxies);
        manager
    }

    /// Build the configured suppliers: static file, ProxyScrape, then GeoNode
    pub fn from_config(config: &ProxySourceConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.fetch_timeout_secs);
        let mut suppliers: Vec<Arc<dyn ProxySupplier>> = Vec::new();

        if let Some(path) = &config.proxy_file {
            suppliers.push(Arc::new(StaticFileSupplier::new(path.clone())));
        }
        if let Some(url) = &config.proxyscrape_url {
            suppliers.push(Arc::new(ProxyScrapeSupplier::new(url.as_str(), timeout)?));
        }
        if let Some(url) = &config.geonode_url {
            suppliers.push(Arc::new(GeoNodeSupplier::new(
                url.as_str(),
                config.max_response_time_ms,
                timeout,
            )?));
        }

        if suppliers.is_empty() {
            warn!("No proxy suppliers configured; every selection will be exhausted");
        }

        Ok(Self::new(suppliers))
    }

    /// Pick a usable proxy, refilling the registry first when it is empty
    pub async fn get_random_proxy(&self) -> Result<Proxy> {
        if self.registry.lock().is_empty() {
            self.refill().await;
        }

        let mut registry = self.registry.lock();
        let proxy = registry
            .select(&mut rand::thread_rng())
            .ok_or(PoolError::ResourceExhausted)?;

        debug!(proxy = %proxy, "Selected proxy");
        Ok(proxy)
    }

    pub fn add_to_blacklist(&self, proxy: &Proxy) {
        if self.registry.lock().blacklist(proxy) {
            info!(proxy = %proxy, "Adding proxy to blacklist");
        }
    }

    pub fn add_to_whitelist(&self, proxy: &Proxy) {
        if self.registry.lock().whitelist(proxy) {
            debug!(proxy = %proxy, "Adding proxy to whitelist");
        }
    }

    /// Re-fetch every supplier and replace the candidate list
    #[instrument(skip(self))]
    pub async fn reload(&self) -> usize {
        let _guard = self.refill_lock.lock().await;
        self.fetch_and_replace().await
    }

    /// Replace the candidate list directly
    pub fn set_proxies(&self, proxies: Vec<Proxy>) {
        self.registry.lock().replace(dedup(proxies));
    }

    pub fn count(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn blacklist_len(&self) -> usize {
        self.registry.lock().blacklist_len()
    }

    pub fn whitelist_len(&self) -> usize {
        self.registry.lock().whitelist_len()
    }

    pub fn is_blacklisted(&self, proxy: &Proxy) -> bool {
        self.registry.lock().is_blacklisted(proxy)
    }

    pub fn is_whitelisted(&self, proxy: &Proxy) -> bool {
        self.registry.lock().is_whitelisted(proxy)
    }

    async fn refill(&self) {
        let _guard = self.refill_lock.lock().await;

        // Another caller may have refilled while we waited for the lock.
        if !self.registry.lock().is_empty() {
            return;
        }

        self.fetch_and_replace().await;
    }

    async fn fetch_and_replace(&self) -> usize {
        let batches =
            futures::future::join_all(self.suppliers.iter().map(|s| async move {
                let proxies = s.fetch().await;
                debug!(supplier = s.name(), count = proxies.len(), "Supplier fetch complete");
                proxies
            }))
            .await;

        let proxies = dedup(batches.into_iter().flatten().collect());
        let count = proxies.len();

        self.registry.lock().replace(proxies);
        info!("Loaded {} proxies from {} suppliers", count, self.suppliers.len());
        count
    }
}

/// Drop repeated `(ip, port)` pairs, keeping the first occurrence
fn dedup(proxies: Vec<Proxy>) -> Vec<Proxy> {
    let mut seen = HashSet::new();
    proxies
        .into_iter()
        .filter(|p| seen.insert(p.clone()))
        .collect()
}
