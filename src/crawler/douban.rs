use crate::fetch::Fetcher;

use log::{debug, info};
use rand::Rng;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::time::Duration;

pub const TOP250_URL: &str = "https://movie.douban.com/top250";
pub const PAGE_SIZE: u32 = 25;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Movie {
    pub rank: String,
    pub title: String,
    pub original_title: String,
    pub other_title: String,
    pub director_actors: String,
    pub details: String,
    pub rating: String,
    pub rating_people: String,
    pub quote: String,
}

pub struct DoubanCrawler {
    fetcher: Fetcher,
    base_url: String,
    pages: u32,
    max_attempts: u32,
    page_delay: (Duration, Duration),
}

impl DoubanCrawler {
    pub fn new(fetcher: Fetcher, pages: u32, max_attempts: u32) -> Self {
        Self {
            fetcher,
            base_url: TOP250_URL.to_string(),
            pages,
            max_attempts,
            page_delay: (Duration::from_secs(3), Duration::from_secs(6)),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Random pause between pages, drawn from `[min, max]`.
    pub fn with_page_delay(mut self, min: Duration, max: Duration) -> Self {
        self.page_delay = (min, max.max(min));
        self
    }

    pub fn page_url(&self, page: u32) -> String {
        format!("{}?start={}", self.base_url, (page.max(1) - 1) * PAGE_SIZE)
    }

    fn page_pause(&self) -> Duration {
        let (min, max) = self.page_delay;
        if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        }
    }

    /// Crawls every page. A page that cannot be fetched contributes nothing
    /// and the crawl moves on.
    pub async fn crawl_top250(&self) -> Vec<Movie> {
        let mut movies = Vec::new();

        for page in 1..=self.pages {
            info!("crawling page {}/{}", page, self.pages);
            let url = self.page_url(page);

            match self.fetcher.fetch(&url, self.max_attempts, parse_page).await {
                Ok(found) => movies.extend(found),
                Err(e) => log::error!("skipping page {}: {}", page, e),
            }

            if page < self.pages {
                let pause = self.page_pause();
                info!("page {} done, sleeping {:.2}s", page, pause.as_secs_f64());
                tokio::time::sleep(pause).await;
            }
        }

        info!("crawl finished with {} movies", movies.len());
        movies
    }
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn strip_separator(s: &str) -> String {
    s.trim().trim_start_matches('/').trim_end_matches('/').trim().to_string()
}

/// Extracts movies from one list page. Items without a rank are skipped.
pub fn parse_page(html: &str) -> Vec<Movie> {
    let doc = Html::parse_document(html);
    let item_sel = Selector::parse(".grid_view li").unwrap();
    let rank_sel = Selector::parse(".pic em").unwrap();
    let title_sel = Selector::parse(".hd a .title").unwrap();
    let other_sel = Selector::parse(".hd a .other").unwrap();
    let info_sel = Selector::parse(".bd p").unwrap();
    let rating_sel = Selector::parse(".rating_num").unwrap();
    let people_sel = Selector::parse(".star span:last-child").unwrap();
    let quote_sel = Selector::parse(".quote .inq").unwrap();
    let digits = Regex::new(r"\d+").unwrap();

    let items: Vec<_> = doc.select(&item_sel).collect();
    debug!("found {} movie items", items.len());

    let mut movies = Vec::new();
    for item in items {
        let Some(rank) = item.select(&rank_sel).next().map(text_of) else {
            continue;
        };

        let titles: Vec<String> = item.select(&title_sel).map(text_of).collect();
        let (director_actors, details) = match item.select(&info_sel).next() {
            Some(info) => {
                let raw = info.text().collect::<String>();
                let mut lines = raw.lines().map(str::trim).filter(|l| !l.is_empty());
                (
                    lines.next().unwrap_or_default().to_string(),
                    lines.next().unwrap_or_default().to_string(),
                )
            }
            None => (String::new(), String::new()),
        };

        let rating_people = item
            .select(&people_sel)
            .next()
            .map(text_of)
            .and_then(|t| digits.find(&t).map(|m| m.as_str().to_string()))
            .unwrap_or_else(|| "0".to_string());

        let movie = Movie {
            rank,
            title: titles.first().cloned().unwrap_or_default(),
            original_title: titles.get(1).map(|t| strip_separator(t)).unwrap_or_default(),
            other_title: item
                .select(&other_sel)
                .next()
                .map(|el| strip_separator(&text_of(el)))
                .unwrap_or_default(),
            director_actors,
            details,
            rating: item
                .select(&rating_sel)
                .next()
                .map(text_of)
                .unwrap_or_else(|| "0.0".to_string()),
            rating_people,
            quote: item.select(&quote_sel).next().map(text_of).unwrap_or_default(),
        };
        debug!("parsed #{} {}", movie.rank, movie.title);
        movies.push(movie);
    }

    movies
}
