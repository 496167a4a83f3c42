//! Proxy suppliers
//!
//! Adapters that produce candidate proxies for the registry. A supplier never
//! fails outward: transport errors, bad status codes and malformed payloads are
//! logged and turned into an empty candidate list.

pub mod geonode;
pub mod proxyscrape;
pub mod static_file;

pub use geonode::GeoNodeSupplier;
pub use proxyscrape::ProxyScrapeSupplier;
pub use static_file::StaticFileSupplier;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::error::{PoolError, Result};
use crate::models::Proxy;

/// Source of candidate proxies
#[async_trait]
pub trait ProxySupplier: Send + Sync {
    /// Fetch the full candidate list. Failures yield an empty list.
    async fn fetch(&self) -> Vec<Proxy>;

    /// Supplier name, used in logs
    fn name(&self) -> &str;
}

/// Supplier backed by an in-memory list
#[derive(Debug, Clone, Default)]
pub struct FixedSupplier {
    proxies: Vec<Proxy>,
}

impl FixedSupplier {
    pub fn new(proxies: Vec<Proxy>) -> Self {
        Self { proxies }
    }
}

#[async_trait]
impl ProxySupplier for FixedSupplier {
    async fn fetch(&self) -> Vec<Proxy> {
        self.proxies.clone()
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Build an HTTP client for JSON suppliers
pub(crate) fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PoolError::InvalidConfig(format!("failed to build HTTP client: {}", e)))
}

/// GET a JSON document, collapsing every failure into `None`
pub(crate) async fn get_json(client: &reqwest::Client, supplier: &str, url: &str) -> Option<Value> {
    let response = match client.get(url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(supplier, url, "Proxy supplier request failed: {}", e);
            return None;
        }
    };

    let status = response.status();
    if !status.is_success() {
        warn!(supplier, url, %status, "Proxy supplier returned non-success status");
        return None;
    }

    match response.json::<Value>().await {
        Ok(body) => Some(body),
        Err(e) => {
            warn!(supplier, url, "Proxy supplier returned malformed JSON: {}", e);
            None
        }
    }
}

/// Decode each array entry independently, skipping the ones that do not fit
pub(crate) fn decode_entries<T, F>(supplier: &str, entries: &[Value], mut convert: F) -> Vec<Proxy>
where
    T: serde::de::DeserializeOwned,
    F: FnMut(T) -> Result<Option<Proxy>>,
{
    entries
        .iter()
        .filter_map(|entry| {
            let decoded = serde_json::from_value::<T>(entry.clone())
                .map_err(|e| PoolError::MalformedProxyEntry(e.to_string()))
                .and_then(&mut convert);

            match decoded {
                Ok(proxy) => proxy,
                Err(e) => {
                    warn!(supplier, "Skipping proxy entry: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// Ports arrive either as numbers or as numeric strings
pub(crate) fn port_from_any<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Number(u16),
        Text(String),
    }

    match RawPort::deserialize(deserializer)? {
        RawPort::Number(port) => Ok(port),
        RawPort::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProxyProtocol;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Entry {
        ip: String,
        #[serde(deserialize_with = "port_from_any")]
        port: u16,
    }

    fn convert(entry: Entry) -> Result<Option<Proxy>> {
        Proxy::new(entry.ip, entry.port, [ProxyProtocol::Http]).map(Some)
    }

    #[tokio::test]
    async fn test_fixed_supplier_returns_its_list() {
        let proxy = Proxy::new("1.1.1.1", 80, [ProxyProtocol::Http]).unwrap();
        let supplier = FixedSupplier::new(vec![proxy.clone()]);
        assert_eq!(supplier.fetch().await, vec![proxy]);
        assert_eq!(supplier.name(), "fixed");
    }

    #[test]
    fn test_decode_entries_skips_malformed() {
        let entries = vec![
            json!({"ip": "1.1.1.1", "port": 80}),
            json!({"ip": "2.2.2.2", "port": "8080"}),
            json!({"ip": "3.3.3.3", "port": "not-a-port"}),
            json!({"port": 80}),
            json!({"ip": "", "port": 80}),
        ];

        let proxies = decode_entries("test", &entries, convert);
        assert_eq!(proxies.len(), 2);
        assert_eq!(proxies[1].port, 8080);
    }
}
