//! GeoNode proxy list
//!
//! Payload: `{"data": [{"ip", "port", "protocols": [...], "responseTime", "country"}]}`.
//! Entries slower than the configured response-time ceiling are dropped.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::{decode_entries, get_json, http_client, port_from_any, ProxySupplier};
use crate::error::{PoolError, Result};
use crate::models::{Proxy, ProxyProtocol};

/// Response-time ceiling in milliseconds
pub const DEFAULT_MAX_RESPONSE_TIME_MS: f64 = 500.0;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Entry {
    ip: String,
    #[serde(deserialize_with = "port_from_any")]
    port: u16,
    #[serde(default)]
    protocols: Vec<String>,
    response_time: f64,
    #[serde(default)]
    country: Option<String>,
}

fn convert(entry: Entry, max_response_time: f64) -> Result<Option<Proxy>> {
    if entry.response_time > max_response_time {
        return Ok(None);
    }

    let protocols: Vec<ProxyProtocol> = entry
        .protocols
        .iter()
        .filter_map(|p| ProxyProtocol::from_str(p))
        .collect();
    if protocols.is_empty() {
        return Err(PoolError::MalformedProxyEntry(format!(
            "{}:{} lists no supported protocol ({:?})",
            entry.ip, entry.port, entry.protocols
        )));
    }

    let proxy = Proxy::new(entry.ip, entry.port, protocols)?
        .with_response_time(entry.response_time)
        .with_country_code(entry.country);

    Ok(Some(proxy))
}

/// Map a GeoNode response body to proxies at or under `max_response_time` ms
pub fn parse_response(body: &Value, max_response_time: f64) -> Vec<Proxy> {
    match body.get("data").and_then(Value::as_array) {
        Some(entries) => decode_entries("geonode", entries, |entry: Entry| {
            convert(entry, max_response_time)
        }),
        None => {
            warn!(supplier = "geonode", "Response has no data array");
            Vec::new()
        }
    }
}

pub struct GeoNodeSupplier {
    url: String,
    max_response_time: f64,
    client: reqwest::Client,
}

impl GeoNodeSupplier {
    pub fn new(url: impl Into<String>, max_response_time: f64, timeout: Duration) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            max_response_time,
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl ProxySupplier for GeoNodeSupplier {
    #[instrument(skip(self), fields(supplier = "geonode"))]
    async fn fetch(&self) -> Vec<Proxy> {
        let Some(body) = get_json(&self.client, self.name(), &self.url).await else {
            return Vec::new();
        };

        let proxies = parse_response(&body, self.max_response_time);
        debug!(
            "Fetched {} proxies under {}ms",
            proxies.len(),
            self.max_response_time
        );
        proxies
    }

    fn name(&self) -> &str {
        "geonode"
    }
}
