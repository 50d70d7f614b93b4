use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use anyhow::{Context, Result};

use crate::pool::PoolOptions;
use crate::store::DEFAULT_MAX_AGE;
use crate::providers::free_proxy_list::FREE_PROXY_LIST_URL;
use crate::providers::proxyscrape::PROXYSCRAPE_URL;
use crate::verification::DEFAULT_TEST_URL;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pool: PoolSettings,
    pub validator: ValidatorSettings,
    pub fetch: FetchSettings,
    pub providers: Providers,
    pub douban: DoubanSettings,
    pub titles: TitleSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub file: String,
    pub max_age_hours: u64,
    pub min_size: usize,
    pub max_rounds: u32,
    pub round_delay_secs: u64,
    pub source_delay_secs: u64,
    pub workers: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            file: "proxy_pool.json".to_string(),
            max_age_hours: 24,
            min_size: 5,
            max_rounds: 5,
            round_delay_secs: 5,
            source_delay_secs: 2,
            workers: 10,
        }
    }
}

impl PoolSettings {
    /// Falls back to the default window when the hour count overflows.
    pub fn max_age(&self) -> Duration {
        self.max_age_hours
            .checked_mul(60 * 60)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_MAX_AGE)
    }

    pub fn options(&self) -> PoolOptions {
        PoolOptions {
            workers: self.workers,
            round_delay: Duration::from_secs(self.round_delay_secs),
            source_delay: Duration::from_secs(self.source_delay_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ValidatorSettings {
    pub test_url: String,
    pub timeout_secs: u64,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            test_url: DEFAULT_TEST_URL.to_string(),
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_secs: 2,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Providers {
    pub free_proxy_list: ProviderConfig,
    pub proxyscrape: ProviderConfig,
}

impl Default for Providers {
    fn default() -> Self {
        Self {
            free_proxy_list: ProviderConfig {
                enabled: true,
                url: None,
            },
            proxyscrape: ProviderConfig {
                enabled: false,
                url: None,
            },
        }
    }
}

fn enabled_by_default() -> bool {
    true
}

/// Listing `enabled` is optional; a section on its own turns the source on.
#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub url: Option<String>,
}

impl Providers {
    pub fn free_proxy_list_url(&self) -> &str {
        self.free_proxy_list.url.as_deref().unwrap_or(FREE_PROXY_LIST_URL)
    }

    pub fn proxyscrape_url(&self) -> &str {
        self.proxyscrape.url.as_deref().unwrap_or(PROXYSCRAPE_URL)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DoubanSettings {
    pub pages: u32,
    pub min_page_delay_secs: f64,
    pub max_page_delay_secs: f64,
    pub output: String,
}

fn secs_or(secs: f64, default: Duration) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(default)
}

impl DoubanSettings {
    /// `(min, max)` pause between pages. Negative, infinite or NaN values
    /// fall back to 3s and 6s.
    pub fn page_delay(&self) -> (Duration, Duration) {
        (
            secs_or(self.min_page_delay_secs, Duration::from_secs(3)),
            secs_or(self.max_page_delay_secs, Duration::from_secs(6)),
        )
    }
}

impl Default for DoubanSettings {
    fn default() -> Self {
        Self {
            pages: 10,
            min_page_delay_secs: 3.0,
            max_page_delay_secs: 6.0,
            output: "douban_top250.csv".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TitleSettings {
    pub urls: Vec<String>,
    pub output: String,
}

impl Default for TitleSettings {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            output: "page_titles.csv".to_string(),
        }
    }
}

impl Settings {
    /// Reads `config.toml` from the working directory. A missing file gives
    /// the defaults.
    pub fn new() -> Result<Self> {
        Self::from_path(CONFIG_FILE)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Settings::default()),
            Err(e) => return Err(e).with_context(|| format!("cannot read {}", path.display())),
        };

        Self::parse(&config_data).with_context(|| format!("invalid {}", path.display()))
    }

    pub fn parse(config_data: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(config_data)?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_gives_defaults() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings.pool.min_size, 5);
        assert_eq!(settings.pool.max_age(), Duration::from_secs(24 * 3600));
        assert_eq!(settings.fetch.max_attempts, 3);
        assert!(settings.providers.free_proxy_list.enabled);
        assert!(!settings.providers.proxyscrape.enabled);
        assert_eq!(settings.providers.free_proxy_list_url(), FREE_PROXY_LIST_URL);
        assert_eq!(settings.douban.pages, 10);
    }

    #[test]
    fn overrides_apply_per_key() {
        let settings = Settings::parse(
            r#"
            [pool]
            min_size = 8
            workers = 3

            [providers.proxyscrape]
            url = "http://example.test/list.txt"

            [titles]
            urls = ["https://example.com/"]
            "#,
        )
        .unwrap();

        assert_eq!(settings.pool.min_size, 8);
        assert_eq!(settings.pool.options().workers, 3);
        assert_eq!(settings.pool.max_rounds, 5);
        assert!(settings.providers.proxyscrape.enabled);
        assert_eq!(settings.providers.proxyscrape_url(), "http://example.test/list.txt");
        assert!(settings.providers.free_proxy_list.enabled);
        assert_eq!(settings.titles.urls, vec!["https://example.com/"]);
    }

    #[test]
    fn out_of_range_durations_fall_back() {
        let settings = Settings::parse(
            r#"
            [pool]
            max_age_hours = 9223372036854775807

            [douban]
            min_page_delay_secs = inf
            max_page_delay_secs = -1.0
            "#,
        )
        .unwrap();

        assert_eq!(settings.pool.max_age(), DEFAULT_MAX_AGE);
        assert_eq!(
            settings.douban.page_delay(),
            (Duration::from_secs(3), Duration::from_secs(6))
        );
    }

    #[test]
    fn page_delay_uses_configured_values() {
        let settings = Settings::parse("[douban]\nmin_page_delay_secs = 0.5\nmax_page_delay_secs = 1.5\n").unwrap();
        assert_eq!(
            settings.douban.page_delay(),
            (Duration::from_millis(500), Duration::from_millis(1500))
        );
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::from_path(dir.path().join("config.toml")).unwrap();
        assert_eq!(settings.validator.test_url, DEFAULT_TEST_URL);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pool\nmin_size = ").unwrap();
        assert!(Settings::from_path(&path).is_err());
    }
}
