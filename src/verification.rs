use crate::error::ValidationError;
use crate::providers::new_client;
use crate::proxy::Proxy;
use crate::user_agent::random_user_agent;
use async_trait::async_trait;
use log::{debug, warn};
use moka::future::Cache;
use reqwest::header::USER_AGENT;
use reqwest::StatusCode;
use std::net::IpAddr;
use std::time::{Duration, Instant};

pub const DEFAULT_TEST_URL: &str = "https://www.google.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Decides whether a candidate currently forwards traffic.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Returns the proxy unchanged when usable.
    async fn validate(&self, proxy: Proxy) -> Option<Proxy>;

    /// Drops anything remembered about `proxy`, so the next `validate`
    /// probes it again.
    async fn forget(&self, _proxy: &Proxy) {}
}

fn is_safe_ip(ip: IpAddr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() {
        return false;
    }

    match ip {
        IpAddr::V4(ipv4) => {
            !(ipv4.is_private() || ipv4.is_link_local() || ipv4.is_broadcast())
        }
        IpAddr::V6(ipv6) => {
            // unique local (fc00::/7)
            if (ipv6.segments()[0] & 0xfe00) == 0xfc00 {
                return false;
            }
            // link-local (fe80::/10)
            (ipv6.segments()[0] & 0xffc0) != 0xfe80
        }
    }
}

/// Probes candidates with a GET through the proxy to a fixed target.
pub struct HttpValidator {
    test_url: String,
    timeout: Duration,
    cache: Cache<Proxy, bool>,
}

impl HttpValidator {
    pub fn new(test_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            test_url: test_url.into(),
            timeout,
            cache: Cache::builder()
                .time_to_live(Duration::from_secs(20 * 60))
                .build(),
        }
    }

    /// One probe, no caching. Returns the round-trip latency on HTTP 200.
    pub async fn probe(&self, proxy: &Proxy) -> Result<Duration, ValidationError> {
        if let Ok(ip) = proxy.host().parse::<IpAddr>() {
            if !is_safe_ip(ip) {
                return Err(ValidationError::UnsafeAddress(ip));
            }
        }

        let client = new_client(Some(proxy), self.timeout).map_err(ValidationError::Client)?;

        let start = Instant::now();
        let resp = client
            .get(&self.test_url)
            .header(USER_AGENT, random_user_agent())
            .send()
            .await
            .map_err(ValidationError::Request)?;

        if resp.status() != StatusCode::OK {
            return Err(ValidationError::Status(resp.status().as_u16()));
        }
        Ok(start.elapsed())
    }
}

impl Default for HttpValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TEST_URL, DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl Validator for HttpValidator {
    async fn validate(&self, proxy: Proxy) -> Option<Proxy> {
        if let Some(ok) = self.cache.get(&proxy).await {
            debug!("cached verdict for {}: {}", proxy, ok);
            return ok.then_some(proxy);
        }

        let ok = match self.probe(&proxy).await {
            Ok(latency) => {
                debug!("proxy usable: {} ({:?})", proxy, latency);
                true
            }
            Err(e) => {
                warn!("proxy unusable: {}: {}", proxy, e);
                false
            }
        };

        self.cache.insert(proxy.clone(), ok).await;
        ok.then_some(proxy)
    }

    async fn forget(&self, proxy: &Proxy) {
        self.cache.invalidate(proxy).await;
    }
}
