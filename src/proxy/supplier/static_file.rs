//! Static proxy list file, one `host:port[:username:password]` per line

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::ProxySupplier;
use crate::models::Proxy;

/// Parse a static list, skipping blank lines, `#` comments and malformed entries
pub fn parse_list(contents: &str) -> Vec<Proxy> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .filter_map(|(index, line)| match Proxy::parse_line(line) {
            Ok(proxy) => Some(proxy),
            Err(e) => {
                warn!(line = index + 1, "Skipping proxy entry: {}", e);
                None
            }
        })
        .collect()
}

pub struct StaticFileSupplier {
    path: PathBuf,
}

impl StaticFileSupplier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ProxySupplier for StaticFileSupplier {
    #[instrument(skip(self), fields(supplier = "file", path = %self.path.display()))]
    async fn fetch(&self) -> Vec<Proxy> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let proxies = parse_list(&contents);
                debug!("Loaded {} proxies from file", proxies.len());
                proxies
            }
            Err(e) => {
                warn!("Failed to read proxy file: {}", e);
                Vec::new()
            }
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_skips_comments_and_bad_lines() {
        let contents = "\
# residential pool
10.0.0.1:8080
10.0.0.2:8080:user:secret

not-a-proxy
10.0.0.3:99999
";
        let proxies = parse_list(contents);
        assert_eq!(proxies.len(), 2);
        assert_eq!(proxies[0].address(), "10.0.0.1:8080");
        assert_eq!(
            proxies[1].credentials.as_ref().map(|c| c.username.as_str()),
            Some("user")
        );
    }

    #[tokio::test]
    async fn test_fetch_reads_file() {
        let path = std::env::temp_dir().join(format!("browser-pool-{}.txt", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "127.0.0.1:3128\n127.0.0.2:3128\n")
            .await
            .unwrap();

        let supplier = StaticFileSupplier::new(&path);
        let proxies = supplier.fetch().await;
        assert_eq!(proxies.len(), 2);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_yields_empty_list() {
        let supplier = StaticFileSupplier::new("/nonexistent/browser-pool/proxies.txt");
        assert!(supplier.fetch().await.is_empty());
    }
}
