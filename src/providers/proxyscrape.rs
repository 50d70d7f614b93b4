use super::fetch_listing;
use crate::error::SourceError;
use crate::provider::Provider;
use crate::proxy::{Proxy, ProxyType};
use async_trait::async_trait;
use log::debug;

pub const PROXYSCRAPE_URL: &str = "https://api.proxyscrape.com/v2/?request=getproxies&protocol=http&timeout=10000&country=all&ssl=all&anonymity=all";

pub struct ProxyScrape {
    url: String,
}

impl ProxyScrape {
    pub fn new() -> Self {
        Self::with_url(PROXYSCRAPE_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for ProxyScrape {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for ProxyScrape {
    async fn list(&self) -> Result<Vec<Proxy>, SourceError> {
        let body = fetch_listing(&self.url).await?;
        let proxies = parse_lines(&body);
        debug!("{} lines parsed from {}", proxies.len(), self.url);
        Ok(proxies)
    }

    fn name(&self) -> &str {
        "api.proxyscrape.com"
    }
}

/// One `host:port` per line; anything else is ignored.
pub fn parse_lines(body: &str) -> Vec<Proxy> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains("://"))
        .filter_map(|line| line.parse::<Proxy>().ok())
        .map(|p| Proxy::new(ProxyType::Http, p.host(), p.port()))
        .collect()
}
