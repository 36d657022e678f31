//! Blocking HTTP fetcher with an optional on-disk page cache
//!
//! Cached pages are served without touching the network, which also makes
//! offline re-parsing of previously fetched seasons possible.

use super::Fetcher;
use crate::{HoopsError, Result, ScrapeConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    /// Optional cache directory for fetched HTML
    cache_dir: Option<PathBuf>,
    /// If true, only use cache (no network requests)
    offline_only: bool,
}

impl HttpFetcher {
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(HttpFetcher {
            client,
            cache_dir: None,
            offline_only: false,
        })
    }

    pub fn with_cache<P: AsRef<Path>>(mut self, cache_dir: P) -> Self {
        self.cache_dir = Some(cache_dir.as_ref().to_path_buf());
        self
    }

    /// Serve only cached pages; a cache miss is a fetch failure
    pub fn offline_only(mut self, offline: bool) -> Self {
        self.offline_only = offline;
        self
    }

    fn cache_path(&self, url: &str) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|dir| dir.join(cache_file_name(url)))
    }

    fn load_from_cache(&self, url: &str) -> Option<String> {
        let path = self.cache_path(url)?;
        if path.exists() {
            log::debug!("Loading from cache: {}", path.display());
            std::fs::read_to_string(&path).ok()
        } else {
            None
        }
    }

    fn save_to_cache(&self, url: &str, html: &str) -> Result<()> {
        if let Some(path) = self.cache_path(url) {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, html)?;
            log::debug!("Saved to cache: {}", path.display());
        }
        Ok(())
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_html(&self, url: &str) -> Result<String> {
        if let Some(cached) = self.load_from_cache(url) {
            return Ok(cached);
        }
        if self.offline_only {
            return Err(HoopsError::Fetch {
                url: url.to_string(),
                reason: "not cached (offline mode)".to_string(),
            });
        }

        log::info!("GET {}", url);
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(HoopsError::Fetch {
                url: url.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }

        let html = response.text()?;
        if let Err(e) = self.save_to_cache(url, &html) {
            log::warn!("Could not cache {}: {}", url, e);
        }
        Ok(html)
    }
}

/// Flatten a URL into a file name
fn cache_file_name(url: &str) -> String {
    let trimmed = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    let mut name: String = trimmed
        .chars()
        .map(|c| match c {
            '/' | '?' | '&' | '=' | ':' => '_',
            c => c,
        })
        .collect();
    if !name.ends_with(".html") {
        name.push_str(".html");
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    fn temp_cache(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hoopstats-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_cache_file_names() {
        assert_eq!(
            cache_file_name("https://www.basketball-reference.com/boxscores/202501010LAL.html"),
            "www.basketball-reference.com_boxscores_202501010LAL.html"
        );
        assert_eq!(
            cache_file_name("https://www.basketball-reference.com/players/j/jamesle01/gamelog/2025/"),
            "www.basketball-reference.com_players_j_jamesle01_gamelog_2025.html"
        );
    }

    #[test]
    fn test_offline_serves_cached_page() {
        let dir = temp_cache("offline-hit");
        let url = "https://www.basketball-reference.com/leagues/";
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(cache_file_name(url)), "<table id=\"stats\"></table>").unwrap();

        let fetcher = HttpFetcher::new(&Config::default().scrape)
            .unwrap()
            .with_cache(&dir)
            .offline_only(true);
        let html = fetcher.fetch_html(url).unwrap();
        assert!(html.contains("stats"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_offline_miss_is_fetch_failure() {
        let dir = temp_cache("offline-miss");
        let fetcher = HttpFetcher::new(&Config::default().scrape)
            .unwrap()
            .with_cache(&dir)
            .offline_only(true);
        let err = fetcher.fetch_html("https://www.basketball-reference.com/teams/").unwrap_err();
        assert!(err.is_fetch_failure());
    }
}
