use crate::fetch::Fetcher;

use log::info;
use scraper::{Html, Selector};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageTitle {
    pub url: String,
    pub title: String,
}

/// Records the `<title>` of each URL.
pub struct TitleCrawler {
    fetcher: Fetcher,
    max_attempts: u32,
}

impl TitleCrawler {
    pub fn new(fetcher: Fetcher, max_attempts: u32) -> Self {
        Self {
            fetcher,
            max_attempts,
        }
    }

    pub async fn crawl(&self, urls: &[String]) -> Vec<PageTitle> {
        let mut titles = Vec::new();
        for url in urls {
            match self.fetcher.fetch(url, self.max_attempts, extract_title).await {
                Ok(title) => {
                    info!("{} -> {:?}", url, title);
                    titles.push(PageTitle {
                        url: url.clone(),
                        title,
                    });
                }
                Err(e) => log::error!("skipping {}: {}", url, e),
            }
        }
        titles
    }
}

pub fn extract_title(html: &str) -> String {
    let doc = Html::parse_document(html);
    let selector = Selector::parse("title").unwrap();
    doc.select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::{page, pool_with, ScriptedTransport};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn extracts_trimmed_title() {
        assert_eq!(extract_title("<html><head><title>\n Hello </title></head></html>"), "Hello");
        assert_eq!(extract_title("<p>no title</p>"), "");
    }

    #[tokio::test]
    async fn keeps_only_fetched_pages() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(&dir, 4).await;
        let transport = Arc::new(ScriptedTransport::new(vec![
            page(404, ""),
            page(404, ""),
            page(200, "<title>B</title>"),
        ]));
        let crawler = TitleCrawler::new(Fetcher::new(pool, transport, Duration::ZERO), 2);

        let urls = vec!["http://a.test/".to_string(), "http://b.test/".to_string()];
        let titles = crawler.crawl(&urls).await;
        assert_eq!(
            titles,
            vec![PageTitle {
                url: "http://b.test/".into(),
                title: "B".into()
            }]
        );
    }
}
