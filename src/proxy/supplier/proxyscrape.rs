//! ProxyScrape free proxy list
//!
//! Payload: `{"proxies": [{"ip", "port", "protocol", "alive", "timeout", "ip_data"}]}`,
//! where `ip_data` carries the `countryCode`.
//! Only entries reported alive are kept.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::{decode_entries, get_json, http_client, port_from_any, ProxySupplier};
use crate::error::{PoolError, Result};
use crate::models::{Proxy, ProxyProtocol};

#[derive(Debug, Deserialize)]
struct Entry {
    ip: String,
    #[serde(deserialize_with = "port_from_any")]
    port: u16,
    protocol: String,
    #[serde(default)]
    alive: bool,
    #[serde(default)]
    timeout: Option<f64>,
    #[serde(default)]
    ip_data: Option<IpData>,
}

#[derive(Debug, Deserialize)]
struct IpData {
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
}

fn convert(entry: Entry) -> Result<Option<Proxy>> {
    if !entry.alive {
        return Ok(None);
    }

    let protocol = ProxyProtocol::from_str(&entry.protocol).ok_or_else(|| {
        PoolError::MalformedProxyEntry(format!("unknown protocol {:?}", entry.protocol))
    })?;

    let proxy = Proxy::new(entry.ip, entry.port, [protocol])?
        .with_response_time(entry.timeout.unwrap_or_default())
        .with_country_code(entry.ip_data.and_then(|d| d.country_code));

    Ok(Some(proxy))
}

/// Map a ProxyScrape response body to proxies
pub fn parse_response(body: &Value) -> Vec<Proxy> {
    match body.get("proxies").and_then(Value::as_array) {
        Some(entries) => decode_entries("proxyscrape", entries, convert),
        None => {
            warn!(supplier = "proxyscrape", "Response has no proxies array");
            Vec::new()
        }
    }
}

pub struct ProxyScrapeSupplier {
    url: String,
    client: reqwest::Client,
}

impl ProxyScrapeSupplier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl ProxySupplier for ProxyScrapeSupplier {
    #[instrument(skip(self), fields(supplier = "proxyscrape"))]
    async fn fetch(&self) -> Vec<Proxy> {
        let Some(body) = get_json(&self.client, self.name(), &self.url).await else {
            return Vec::new();
        };

        let proxies = parse_response(&body);
        debug!("Fetched {} live proxies", proxies.len());
        proxies
    }

    fn name(&self) -> &str {
        "proxyscrape"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_keeps_only_alive_entries() {
        let body = json!({
            "proxies": [
                {"ip": "1.1.1.1", "port": 8080, "protocol": "http", "alive": true,
                 "timeout": 312.5, "ip_data": {"countryCode": "US"}},
                {"ip": "2.2.2.2", "port": 1080, "protocol": "socks5", "alive": false,
                 "timeout": 90.0, "ip_data": {"countryCode": "DE"}}
            ]
        });

        let proxies = parse_response(&body);
        assert_eq!(proxies.len(), 1);

        let proxy = &proxies[0];
        assert_eq!(proxy.address(), "1.1.1.1:8080");
        assert!(proxy.supports(ProxyProtocol::Http));
        assert_eq!(proxy.response_time, 312.5);
        assert_eq!(proxy.country_code.as_deref(), Some("US"));
    }

    #[test]
    fn test_parse_skips_unknown_protocol_and_missing_ip_data() {
        let body = json!({
            "proxies": [
                {"ip": "1.1.1.1", "port": 8080, "protocol": "ftp", "alive": true},
                {
                    "ip": "3.3.3.3", "port": "3128", "protocol": "HTTPS",
                    "alive": true, "ip_data": null
                }
            ]
        });

        let proxies = parse_response(&body);
        assert_eq!(proxies.len(), 1);
        assert_eq!(proxies[0].port, 3128);
        assert!(proxies[0].country_code.is_none());
    }

    #[test]
    fn test_parse_without_proxies_array() {
        assert!(parse_response(&json!({"error": "rate limited"})).is_empty());
    }
}
