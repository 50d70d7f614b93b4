use crate::error::{FetchError, TransportError};
use crate::pool::ProxyPool;
use crate::providers::new_client;
use crate::proxy::Proxy;
use crate::user_agent::random_user_agent;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::header::USER_AGENT;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Page {
    pub status: u16,
    pub body: String,
}

/// One GET, optionally routed through a proxy.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, proxy: Option<&Proxy>) -> Result<Page, TransportError>;
}

pub struct HttpTransport {
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_TIMEOUT)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, proxy: Option<&Proxy>) -> Result<Page, TransportError> {
        let client = new_client(proxy, self.timeout).map_err(TransportError::Client)?;
        let resp = client
            .get(url)
            .header(USER_AGENT, random_user_agent())
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(Page { status, body })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    HttpError(u16),
    NetworkError,
}

#[derive(Debug, Clone)]
pub struct FetchAttempt {
    pub target_url: String,
    pub chosen_proxy: Option<Proxy>,
    pub outcome: Outcome,
    pub attempt_number: u32,
}

/// Fetches pages through the pool, evicting every proxy that fails once.
pub struct Fetcher {
    pool: Arc<ProxyPool>,
    transport: Arc<dyn Transport>,
    retry_delay: Duration,
}

impl Fetcher {
    pub fn new(pool: Arc<ProxyPool>, transport: Arc<dyn Transport>, retry_delay: Duration) -> Self {
        Self {
            pool,
            transport,
            retry_delay,
        }
    }

    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }

    /// GETs `url` until a 200 arrives or `max_attempts` tries fail, then
    /// hands the body to `parse`.
    ///
    /// Any failure counts against the proxy that carried it: non-200 and
    /// transport errors alike remove the proxy from the pool. With an empty
    /// pool the request goes out directly.
    pub async fn fetch<T, F>(&self, url: &str, max_attempts: u32, parse: F) -> Result<T, FetchError>
    where
        F: FnOnce(&str) -> T,
    {
        for attempt_number in 1..=max_attempts {
            let proxy = self.pool.get_random().await;
            match &proxy {
                Some(p) => info!("fetching {} via {} (attempt {})", url, p, attempt_number),
                None => warn!("no proxy available, fetching {} directly", url),
            }

            let (outcome, body) = match self.transport.get(url, proxy.as_ref()).await {
                Ok(page) if page.status == 200 => (Outcome::Success, Some(page.body)),
                Ok(page) => {
                    warn!("{} answered with status {}", url, page.status);
                    (Outcome::HttpError(page.status), None)
                }
                Err(e) => {
                    warn!("request to {} failed: {}", url, e);
                    (Outcome::NetworkError, None)
                }
            };

            let attempt = FetchAttempt {
                target_url: url.to_string(),
                chosen_proxy: proxy,
                outcome,
                attempt_number,
            };
            debug!("{:?}", attempt);

            if let Some(body) = body {
                return Ok(parse(&body));
            }

            if let Some(p) = &attempt.chosen_proxy {
                self.pool.remove(p).await;
            }

            if attempt_number < max_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        error!("{} failed {} times, giving up", url, max_attempts);
        Err(FetchError::AttemptsExhausted {
            url: url.to_string(),
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pool::tests::{proxies, quick, StubValidator};
    use crate::store::{SnapshotStore, DEFAULT_MAX_AGE};
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;

    /// Plays back canned answers; once they run out every call gets a 500.
    #[derive(Default)]
    pub struct ScriptedTransport {
        pub answers: Mutex<VecDeque<Result<Page, TransportError>>>,
        pub calls: Mutex<Vec<(String, Option<Proxy>)>>,
    }

    impl ScriptedTransport {
        pub fn new(answers: Vec<Result<Page, TransportError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<(String, Option<Proxy>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    pub fn page(status: u16, body: &str) -> Result<Page, TransportError> {
        Ok(Page {
            status,
            body: body.to_string(),
        })
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, url: &str, proxy: Option<&Proxy>) -> Result<Page, TransportError> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), proxy.cloned()));
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| page(500, ""))
        }
    }

    pub async fn pool_with(dir: &tempfile::TempDir, count: u16) -> Arc<ProxyPool> {
        let store = SnapshotStore::new(dir.path().join("pool.json"), DEFAULT_MAX_AGE);
        let pool = ProxyPool::new(store, Arc::new(StubValidator(None))).with_options(quick());
        pool.insert_all(proxies(1..count + 1)).await;
        Arc::new(pool)
    }

    #[tokio::test]
    async fn always_failing_target_uses_every_attempt_and_evicts() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(&dir, 5).await;
        let transport = Arc::new(ScriptedTransport::default());
        let fetcher = Fetcher::new(pool.clone(), transport.clone(), Duration::ZERO);

        let result = fetcher.fetch("http://target/", 3, |body| body.to_string()).await;
        assert!(matches!(
            result,
            Err(FetchError::AttemptsExhausted { attempts: 3, .. })
        ));

        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        let used: HashSet<Proxy> = calls.into_iter().filter_map(|(_, p)| p).collect();
        assert_eq!(used.len(), 3);

        let left = pool.proxies().await;
        assert_eq!(left.len(), 2);
        assert!(used.iter().all(|p| !left.contains(p)));
        assert_eq!(pool.load().await.len(), 2);
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(&dir, 5).await;
        let transport = Arc::new(ScriptedTransport::new(vec![
            page(503, "busy"),
            page(200, "hello"),
            page(200, "never"),
        ]));
        let fetcher = Fetcher::new(pool.clone(), transport.clone(), Duration::ZERO);

        let result = fetcher.fetch("http://target/", 3, |body| body.to_uppercase()).await;
        assert_eq!(result.unwrap(), "HELLO");
        assert_eq!(transport.calls().len(), 2);
        assert_eq!(pool.len().await, 4);
    }

    #[tokio::test]
    async fn transport_error_evicts_the_proxy_in_use() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(&dir, 1).await;
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(TransportError::Connect("refused".into())),
            page(200, "direct"),
        ]));
        let fetcher = Fetcher::new(pool.clone(), transport.clone(), Duration::ZERO);

        let result = fetcher.fetch("http://target/", 2, |body| body.to_string()).await;
        assert_eq!(result.unwrap(), "direct");

        let calls = transport.calls();
        assert_eq!(calls[0].1, Some("http://8.8.8.8:1".parse().unwrap()));
        assert_eq!(calls[1].1, None);
        assert!(pool.is_empty().await);
        assert!(pool.load().await.is_empty());
    }

    #[tokio::test]
    async fn empty_pool_goes_direct() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(&dir, 0).await;
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(TransportError::Timeout),
            page(200, "ok"),
        ]));
        let fetcher = Fetcher::new(pool, transport.clone(), Duration::ZERO);

        let result = fetcher.fetch("http://target/", 3, |body| body.len()).await;
        assert_eq!(result.unwrap(), 2);
        assert!(transport.calls().iter().all(|(_, p)| p.is_none()));
    }
}
