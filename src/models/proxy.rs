use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, Result};

/// Proxy protocol type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    Http,
    Https,
    Socks4,
    Socks5,
}

impl ProxyProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Https => "https",
            ProxyProtocol::Socks4 => "socks4",
            ProxyProtocol::Socks5 => "socks5",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "http" => Some(ProxyProtocol::Http),
            "https" => Some(ProxyProtocol::Https),
            "socks4" => Some(ProxyProtocol::Socks4),
            "socks5" => Some(ProxyProtocol::Socks5),
            _ => None,
        }
    }

    pub fn is_socks(&self) -> bool {
        matches!(self, ProxyProtocol::Socks4 | ProxyProtocol::Socks5)
    }
}

impl std::fmt::Display for ProxyProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Username/password pair for authenticated proxies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyCredentials {
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

/// Proxy entity
///
/// Identity is the `(ip, port)` pair; the remaining fields are descriptive and
/// never take part in equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proxy {
    pub ip: String,
    pub port: u16,
    pub protocols: BTreeSet<ProxyProtocol>,
    pub credentials: Option<ProxyCredentials>,
    /// Measured response time in milliseconds, 0.0 when unknown
    pub response_time: f64,
    pub country_code: Option<String>,
}

impl Proxy {
    /// Create a proxy, rejecting an empty protocol set
    pub fn new(
        ip: impl Into<String>,
        port: u16,
        protocols: impl IntoIterator<Item = ProxyProtocol>,
    ) -> Result<Self> {
        let ip = ip.into();
        let protocols: BTreeSet<ProxyProtocol> = protocols.into_iter().collect();

        if ip.trim().is_empty() {
            return Err(PoolError::MalformedProxyEntry("empty host".into()));
        }
        if protocols.is_empty() {
            return Err(PoolError::MalformedProxyEntry(format!(
                "{}:{} has no protocols",
                ip, port
            )));
        }

        Ok(Proxy {
            ip,
            port,
            protocols,
            credentials: None,
            response_time: 0.0,
            country_code: None,
        })
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(ProxyCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_response_time(mut self, response_time: f64) -> Self {
        self.response_time = response_time;
        self
    }

    pub fn with_country_code(mut self, country_code: Option<String>) -> Self {
        self.country_code = country_code.filter(|c| !c.trim().is_empty());
        self
    }

    /// Parse one line of a static proxy list: `host:port` or `host:port:username:password`
    pub fn parse_line(line: &str) -> Result<Self> {
        let line = line.trim();
        let parts: Vec<&str> = line.split(':').collect();

        let (host, port) = match parts.as_slice() {
            [host, port] | [host, port, _, _] => (*host, *port),
            _ => {
                return Err(PoolError::MalformedProxyEntry(format!(
                    "expected host:port[:username:password], got {:?}",
                    line
                )))
            }
        };

        let port: u16 = port.parse().map_err(|_| {
            PoolError::MalformedProxyEntry(format!("invalid port in {:?}", line))
        })?;

        let proxy = Proxy::new(host, port, [ProxyProtocol::Http])?;

        match parts.as_slice() {
            [_, _, username, password] => Ok(proxy.with_credentials(*username, *password)),
            _ => Ok(proxy),
        }
    }

    /// `ip:port` form, used in logs
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// Scheme the executor should dial the proxy with
    pub fn scheme(&self) -> &'static str {
        if self.supports(ProxyProtocol::Http) || self.supports(ProxyProtocol::Https) {
            "http"
        } else if self.supports(ProxyProtocol::Socks5) {
            "socks5"
        } else {
            "socks4"
        }
    }

    pub fn supports(&self, protocol: ProxyProtocol) -> bool {
        self.protocols.contains(&protocol)
    }

    /// Connection parameters handed to the execution environment
    pub fn to_settings(&self) -> ProxySettings {
        ProxySettings {
            server: format!("{}://{}", self.scheme(), self.address()),
            username: self.credentials.as_ref().map(|c| c.username.clone()),
            password: self.credentials.as_ref().map(|c| c.password.clone()),
        }
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.ip == other.ip && self.port == other.port
    }
}

impl Eq for Proxy {}

impl Hash for Proxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ip.hash(state);
        self.port.hash(state);
    }
}

impl std::fmt::Display for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.scheme(), self.address())
    }
}

/// Proxy connection parameters in the shape browsers expect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    pub server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_proxy_protocol_parsing_and_helpers() {
        assert_eq!(ProxyProtocol::from_str("HTTP"), Some(ProxyProtocol::Http));
        assert_eq!(ProxyProtocol::from_str(" https "), Some(ProxyProtocol::Https));
        assert_eq!(ProxyProtocol::from_str("SOCKS5"), Some(ProxyProtocol::Socks5));
        assert_eq!(ProxyProtocol::from_str("socks4a"), None);

        assert!(ProxyProtocol::Socks4.is_socks());
        assert!(!ProxyProtocol::Https.is_socks());
        assert_eq!(ProxyProtocol::Socks4.to_string(), "socks4");
    }

    #[test]
    fn test_proxy_requires_protocols() {
        let err = Proxy::new("1.2.3.4", 8080, Vec::new()).unwrap_err();
        assert!(matches!(err, PoolError::MalformedProxyEntry(_)));

        let err = Proxy::new("  ", 8080, [ProxyProtocol::Http]).unwrap_err();
        assert!(matches!(err, PoolError::MalformedProxyEntry(_)));
    }

    #[test]
    fn test_proxy_identity_is_ip_and_port() {
        let a = Proxy::new("1.2.3.4", 8080, [ProxyProtocol::Http])
            .unwrap()
            .with_response_time(120.0);
        let b = Proxy::new("1.2.3.4", 8080, [ProxyProtocol::Socks5])
            .unwrap()
            .with_country_code(Some("DE".to_string()));
        let c = Proxy::new("1.2.3.4", 8081, [ProxyProtocol::Http]).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<Proxy> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_serialized_proxy_reads_back_without_password() {
        let proxy = Proxy::parse_line("10.0.0.1:3128:user:secret").unwrap();
        let json = serde_json::to_value(&proxy).unwrap();
        assert!(json["credentials"].get("password").is_none());

        let restored: Proxy = serde_json::from_value(json).unwrap();
        assert_eq!(restored, proxy);
        let creds = restored.credentials.unwrap();
        assert_eq!(creds.username, "user");
        assert_eq!(creds.password, "");
    }

    #[test]
    fn test_parse_line_formats() {
        let proxy = Proxy::parse_line("10.0.0.1:3128").unwrap();
        assert_eq!(proxy.ip, "10.0.0.1");
        assert_eq!(proxy.port, 3128);
        assert!(proxy.credentials.is_none());

        let proxy = Proxy::parse_line("10.0.0.1:3128:user:pass\n").unwrap();
        let creds = proxy.credentials.unwrap();
        assert_eq!(creds.username, "user");
        assert_eq!(creds.password, "pass");
    }

    #[test]
    fn test_parse_line_rejects_malformed() {
        for line in ["10.0.0.1", "10.0.0.1:3128:user", "10.0.0.1:port", ":3128", "a:1:b:c:d"] {
            let err = Proxy::parse_line(line).unwrap_err();
            assert!(
                matches!(err, PoolError::MalformedProxyEntry(_)),
                "{:?} should be malformed",
                line
            );
        }
    }

    #[test]
    fn test_to_settings_scheme_preference() {
        let proxy =
            Proxy::new("1.2.3.4", 1234, [ProxyProtocol::Socks5, ProxyProtocol::Https]).unwrap();
        assert_eq!(proxy.to_settings().server, "http://1.2.3.4:1234");

        let proxy =
            Proxy::new("1.2.3.4", 1234, [ProxyProtocol::Socks4, ProxyProtocol::Socks5]).unwrap();
        assert_eq!(proxy.to_settings().server, "socks5://1.2.3.4:1234");

        let proxy = Proxy::new("1.2.3.4", 1234, [ProxyProtocol::Socks4]).unwrap();
        assert_eq!(proxy.to_settings().server, "socks4://1.2.3.4:1234");
    }

    #[test]
    fn test_to_settings_with_auth() {
        let settings = Proxy::parse_line("1.2.3.4:1234:user:pass").unwrap().to_settings();
        assert_eq!(
            settings,
            ProxySettings {
                server: "http://1.2.3.4:1234".to_string(),
                username: Some("user".to_string()),
                password: Some("pass".to_string()),
            }
        );

        let settings = Proxy::parse_line("1.2.3.4:1234").unwrap().to_settings();
        assert!(settings.username.is_none());
        assert!(settings.password.is_none());
    }
}
