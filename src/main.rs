use ippool::configuration::Settings;
use ippool::crawler::douban::DoubanCrawler;
use ippool::crawler::titles::TitleCrawler;
use ippool::crawler::{save_records, Target};
use ippool::fetch::HttpTransport;
use ippool::providers::free_proxy_list::FreeProxyList;
use ippool::providers::proxyscrape::ProxyScrape;
use ippool::store::SnapshotStore;
use ippool::verification::HttpValidator;
use ippool::{Fetcher, ProxyPool};

use dialoguer::Select;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::builder()
        .filter_level(log::LevelFilter::Warn) // Default warn
        .filter_module("ippool", log::LevelFilter::Debug) // ippool debug
        .init();

    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Settings::default()
        }
    };

    let labels: Vec<String> = Target::ALL.iter().map(ToString::to_string).collect();
    let choice = Select::new()
        .with_prompt("Crawl target")
        .items(&labels)
        .default(0)
        .interact()?;
    let target = Target::ALL[choice];

    let validator = HttpValidator::new(
        &settings.validator.test_url,
        Duration::from_secs(settings.validator.timeout_secs),
    );
    let store = SnapshotStore::new(&settings.pool.file, settings.pool.max_age());
    let mut pool = ProxyPool::new(store, Arc::new(validator)).with_options(settings.pool.options());

    if settings.providers.free_proxy_list.enabled {
        pool.add_provider(FreeProxyList::with_url(settings.providers.free_proxy_list_url()));
    }
    if settings.providers.proxyscrape.enabled {
        pool.add_provider(ProxyScrape::with_url(settings.providers.proxyscrape_url()));
    }

    info!("building proxy pool");
    let ready = pool
        .ensure_min_size(settings.pool.min_size, settings.pool.max_rounds)
        .await;
    if !ready && pool.is_empty().await {
        error!("proxy pool is empty, nothing to crawl with");
        return Ok(());
    }

    // A short pool is still worth crawling with.
    let transport = HttpTransport::new(Duration::from_secs(settings.fetch.timeout_secs));
    let fetcher = Fetcher::new(
        Arc::new(pool),
        Arc::new(transport),
        Duration::from_secs(settings.fetch.retry_delay_secs),
    );

    match target {
        Target::DoubanTop250 => {
            let douban = &settings.douban;
            let (min_delay, max_delay) = douban.page_delay();
            let crawler = DoubanCrawler::new(fetcher, douban.pages, settings.fetch.max_attempts)
                .with_page_delay(min_delay, max_delay);
            let movies = crawler.crawl_top250().await;
            if movies.is_empty() {
                warn!("no movies to save");
            } else {
                save_records(&douban.output, &movies).await?;
            }
        }
        Target::PageTitles => {
            if settings.titles.urls.is_empty() {
                warn!("no urls configured under [titles]");
                return Ok(());
            }
            let crawler = TitleCrawler::new(fetcher, settings.fetch.max_attempts);
            let titles = crawler.crawl(&settings.titles.urls).await;
            save_records(&settings.titles.output, &titles).await?;
        }
    }

    Ok(())
}
