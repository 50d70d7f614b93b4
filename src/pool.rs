use crate::error::StoreError;
use crate::provider::Provider;
use crate::proxy::Proxy;
use crate::store::SnapshotStore;
use crate::verification::Validator;

use futures::stream::{self, StreamExt};
use log::{error, info, warn};
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Concurrent validation probes.
    pub workers: usize,
    /// Pause between build rounds.
    pub round_delay: Duration,
    /// Pause between sources within a round.
    pub source_delay: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            workers: 10,
            round_delay: Duration::from_secs(5),
            source_delay: Duration::from_secs(2),
        }
    }
}

/// The set of currently trusted proxies, backed by a snapshot file.
///
/// Every change that drops a proxy is written through to the file, so a
/// restarted process never sees a proxy that was already found dead.
pub struct ProxyPool {
    proxies: Mutex<Vec<Proxy>>,
    store: SnapshotStore,
    providers: Vec<Arc<dyn Provider>>,
    validator: Arc<dyn Validator>,
    options: PoolOptions,
}

impl ProxyPool {
    pub fn new(store: SnapshotStore, validator: Arc<dyn Validator>) -> Self {
        Self {
            proxies: Mutex::new(Vec::new()),
            store,
            providers: Vec::new(),
            validator,
            options: PoolOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PoolOptions) -> Self {
        self.options = options;
        self
    }

    pub fn add_provider<P: Provider + 'static>(&mut self, provider: P) {
        self.providers.push(Arc::new(provider));
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub async fn len(&self) -> usize {
        self.proxies.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.proxies.lock().await.is_empty()
    }

    pub async fn proxies(&self) -> Vec<Proxy> {
        self.proxies.lock().await.clone()
    }

    /// Appends proxies not already pooled. Returns how many were added.
    pub async fn insert_all<I>(&self, candidates: I) -> usize
    where
        I: IntoIterator<Item = Proxy>,
    {
        let mut proxies = self.proxies.lock().await;
        let mut seen: HashSet<Proxy> = proxies.iter().cloned().collect();
        let before = proxies.len();
        for proxy in candidates {
            if seen.insert(proxy.clone()) {
                proxies.push(proxy);
            }
        }
        proxies.len() - before
    }

    /// Proxies from the snapshot file, or nothing when the file is missing,
    /// unreadable or older than the freshness window.
    pub async fn load(&self) -> Vec<Proxy> {
        match self.store.read().await {
            Ok(snapshot) => {
                info!(
                    "loaded {} proxies from {}",
                    snapshot.proxies.len(),
                    self.store.path().display()
                );
                snapshot.proxies
            }
            Err(e @ (StoreError::NotFound(_) | StoreError::Stale { .. })) => {
                info!("{}, fetching fresh proxies", e);
                Vec::new()
            }
            Err(e) => {
                error!("cannot load {}: {}", self.store.path().display(), e);
                Vec::new()
            }
        }
    }

    pub async fn persist(&self) -> Result<(), StoreError> {
        let proxies = self.proxies.lock().await;
        self.store.write(&proxies).await?;
        info!("saved {} proxies to {}", proxies.len(), self.store.path().display());
        Ok(())
    }

    async fn persist_logged(&self) {
        if let Err(e) = self.persist().await {
            error!("cannot save {}: {}", self.store.path().display(), e);
        }
    }

    pub async fn get_random(&self) -> Option<Proxy> {
        let proxies = self.proxies.lock().await;
        let mut rng = rand::thread_rng();
        proxies.choose(&mut rng).cloned()
    }

    /// Drops a proxy and rewrites the snapshot. Returns false when the proxy
    /// was not pooled, in which case nothing is written.
    pub async fn remove(&self, proxy: &Proxy) -> bool {
        let mut proxies = self.proxies.lock().await;
        let Some(index) = proxies.iter().position(|p| p == proxy) else {
            return false;
        };
        proxies.remove(index);
        info!("removed dead proxy {}, {} left", proxy, proxies.len());
        self.validator.forget(proxy).await;

        if let Err(e) = self.store.write(&proxies).await {
            error!("cannot save {}: {}", self.store.path().display(), e);
        }
        true
    }

    /// Probes candidates concurrently and returns the survivors in
    /// completion order.
    pub async fn validate_all(&self, candidates: Vec<Proxy>) -> Vec<Proxy> {
        stream::iter(candidates)
            .map(|proxy| {
                let validator = self.validator.clone();
                async move { validator.validate(proxy).await }
            })
            .buffer_unordered(self.options.workers.max(1))
            .filter_map(|verdict| async move { verdict })
            .collect()
            .await
    }

    /// Raw candidates from every source. A failing source contributes
    /// nothing.
    pub async fn fetch_candidates(&self) -> Vec<Proxy> {
        let mut all = Vec::new();
        for (i, provider) in self.providers.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.options.source_delay).await;
            }
            match provider.list().await {
                Ok(found) => {
                    info!("{} found {} proxies", provider.name(), found.len());
                    all.extend(found);
                }
                Err(e) => warn!("cannot list proxies from {}: {}", provider.name(), e),
            }
        }
        all
    }

    /// Brings the pool up to `min_size` validated proxies.
    ///
    /// Stored proxies are re-validated first. If that is not enough, up to
    /// `max_rounds` fetch-and-validate rounds run, each one counting whether
    /// or not it found anything. Returns whether `min_size` was reached; the
    /// pool stays usable either way.
    pub async fn ensure_min_size(&self, min_size: usize, max_rounds: u32) -> bool {
        let stored = self.load().await;
        if !stored.is_empty() {
            info!("re-validating {} stored proxies", stored.len());
            let survivors = self.validate_all(stored).await;
            {
                let mut proxies = self.proxies.lock().await;
                proxies.clear();
            }
            let kept = self.insert_all(survivors).await;
            info!("{} stored proxies still usable", kept);

            if kept >= min_size {
                self.persist_logged().await;
                return true;
            }
        }

        let mut round = 0;
        while self.len().await < min_size && round < max_rounds {
            if round > 0 {
                tokio::time::sleep(self.options.round_delay).await;
            }
            round += 1;

            let candidates = self.fetch_candidates().await;
            if candidates.is_empty() {
                warn!("round {}/{}: no candidates found", round, max_rounds);
                continue;
            }

            let valid = self.validate_all(candidates).await;
            let added = self.insert_all(valid).await;
            info!(
                "round {}/{}: {} new proxies, pool size {}",
                round,
                max_rounds,
                added,
                self.len().await
            );
            if added > 0 {
                self.persist_logged().await;
            }
        }

        self.persist_logged().await;

        let size = self.len().await;
        if size >= min_size {
            info!("proxy pool ready with {} proxies", size);
            true
        } else {
            error!(
                "proxy pool has only {} proxies, fewer than the required {}",
                size, min_size
            );
            false
        }
    }
}
