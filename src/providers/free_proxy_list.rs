use super::fetch_listing;
use crate::error::SourceError;
use crate::provider::Provider;
use crate::proxy::{Proxy, ProxyType};
use async_trait::async_trait;
use log::debug;
use scraper::{ElementRef, Html, Selector};

pub const FREE_PROXY_LIST_URL: &str = "https://free-proxy-list.net/";

// ip, port, code, country, anonymity, google, https
const MIN_COLUMNS: usize = 7;
const HTTPS_COLUMN: usize = 6;

pub struct FreeProxyList {
    url: String,
}

impl FreeProxyList {
    pub fn new() -> Self {
        Self::with_url(FREE_PROXY_LIST_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for FreeProxyList {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for FreeProxyList {
    async fn list(&self) -> Result<Vec<Proxy>, SourceError> {
        let body = fetch_listing(&self.url).await?;
        let proxies = parse_table(&body);
        debug!("{} rows parsed from {}", proxies.len(), self.url);
        Ok(proxies)
    }

    fn name(&self) -> &str {
        "free-proxy-list.net"
    }
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Reads proxy rows out of the listing table. Rows that are too short or
/// whose address does not parse are skipped.
pub fn parse_table(body: &str) -> Vec<Proxy> {
    let doc = Html::parse_document(body);
    let row_selector = Selector::parse("table.table-striped tbody tr").unwrap();
    let row_selector_alt = Selector::parse("table tbody tr").unwrap();
    let td_selector = Selector::parse("td").unwrap();

    let mut rows: Vec<_> = doc.select(&row_selector).collect();
    if rows.is_empty() {
        rows = doc.select(&row_selector_alt).collect();
    }

    let mut result = Vec::new();
    for row in rows {
        let cols: Vec<_> = row.select(&td_selector).collect();
        if cols.len() < MIN_COLUMNS {
            continue;
        }

        let ip = cell_text(&cols[0]);
        let port = cell_text(&cols[1]);
        let kind = if cell_text(&cols[HTTPS_COLUMN]).eq_ignore_ascii_case("yes") {
            ProxyType::Https
        } else {
            ProxyType::Http
        };

        match port.parse::<u16>() {
            Ok(port) if !ip.is_empty() => result.push(Proxy::new(kind, ip, port)),
            _ => continue,
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <table class="table table-striped table-bordered">
          <thead><tr><th>IP Address</th><th>Port</th></tr></thead>
          <tbody>
            <tr><td>1.2.3.4</td><td>8080</td><td>US</td><td>United States</td><td>elite proxy</td><td>no</td><td>yes</td><td>1 min ago</td></tr>
            <tr><td>5.6.7.8</td><td>3128</td><td>DE</td><td>Germany</td><td>anonymous</td><td>no</td><td>no</td><td>2 mins ago</td></tr>
            <tr><td>9.9.9.9</td><td>80</td><td>FR</td></tr>
            <tr><td>10.0.0.1</td><td>port</td><td>FR</td><td>France</td><td>anonymous</td><td>no</td><td>no</td></tr>
          </tbody>
        </table>
        </body></html>
    "#;

    #[test]
    fn parses_rows_and_skips_partial_ones() {
        let proxies = parse_table(PAGE);
        let listed: Vec<String> = proxies.iter().map(|p| p.to_string()).collect();
        assert_eq!(listed, vec!["https://1.2.3.4:8080", "http://5.6.7.8:3128"]);
    }

    #[test]
    fn no_table_means_no_candidates() {
        assert!(parse_table("<html><body><p>blocked</p></body></html>").is_empty());
    }
}
