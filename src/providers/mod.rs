pub mod free_proxy_list;
pub mod proxyscrape;

use crate::error::SourceError;
use crate::proxy::{Proxy, ProxyType};
use crate::user_agent::random_user_agent;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::time::Duration;

pub const LISTING_TIMEOUT: Duration = Duration::from_secs(10);

/// Maps a pool entry onto the upstream reqwest should tunnel through.
pub fn upstream(proxy: &Proxy) -> reqwest::Result<reqwest::Proxy> {
    match proxy.kind() {
        // Listing sites report whether a proxy handles TLS targets, not that
        // it speaks TLS itself, so both go through plain CONNECT.
        ProxyType::Http | ProxyType::Https => {
            reqwest::Proxy::all(format!("http://{}", proxy.addr()))
        }
        ProxyType::Socks5 => reqwest::Proxy::all(proxy.to_string()),
    }
}

pub fn new_client(proxy: Option<&Proxy>, timeout: Duration) -> reqwest::Result<Client> {
    let mut builder = Client::builder()
        .timeout(timeout)
        // One-off clients, nothing to reuse.
        .pool_max_idle_per_host(0);

    builder = match proxy {
        Some(p) => builder.proxy(upstream(p)?),
        // Proxy-less means direct, whatever the environment says.
        None => builder.no_proxy(),
    };

    builder.build()
}

/// GETs a listing page directly and returns its body on HTTP 200.
pub(crate) async fn fetch_listing(url: &str) -> Result<String, SourceError> {
    let client = new_client(None, LISTING_TIMEOUT).map_err(SourceError::Client)?;

    let resp = client
        .get(url)
        .header(USER_AGENT, random_user_agent())
        .header("Accept-Language", "en-US,en;q=0.8")
        .send()
        .await
        .map_err(|source| SourceError::Request {
            url: url.to_string(),
            source,
        })?;

    log::info!("requested proxy listing {} -> {}", url, resp.status());
    if resp.status() != reqwest::StatusCode::OK {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: resp.status().as_u16(),
        });
    }

    resp.text().await.map_err(|source| SourceError::Request {
        url: url.to_string(),
        source,
    })
}
