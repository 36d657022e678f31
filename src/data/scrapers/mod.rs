//! Page fetching
//!
//! The [`Fetcher`] trait is the only place the pipeline touches the network.
//! Everything downstream works on the parsed document it returns.

pub mod bbref;
pub mod http;

pub use bbref::BasketballReference;
pub use http::HttpFetcher;

use crate::{HoopsError, Result};
use rand::Rng;
use scraper::Html;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Source of raw HTML pages
pub trait Fetcher {
    /// Fetch the body of `url`
    fn fetch_html(&self, url: &str) -> Result<String>;

    /// Fetch and parse `url`
    fn fetch(&self, url: &str) -> Result<Html> {
        let html = self.fetch_html(url)?;
        Ok(Html::parse_document(&html))
    }
}

impl<F: Fetcher + ?Sized> Fetcher for &F {
    fn fetch_html(&self, url: &str) -> Result<String> {
        (**self).fetch_html(url)
    }
}

/// Delays around page fetches
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Lower bound of the pause before the first request
    pub min_delay: Duration,
    /// Upper bound of the pause before the first request
    pub max_delay: Duration,
    /// Backoff unit: retry `n` waits `backoff_secs * 2^(n-1)` seconds plus jitter
    pub backoff_secs: f64,
    /// Add up to one second of random delay to the backoff
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 2,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(1000),
            backoff_secs: 0.8,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// No pauses at all (offline parsing, tests)
    pub fn immediate() -> Self {
        RetryPolicy {
            max_attempts: 2,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_secs: 0.0,
            jitter: false,
        }
    }

    /// Randomized pause before the first request
    pub fn initial_delay(&self) -> Duration {
        if !self.jitter || self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        let spread = (self.max_delay - self.min_delay).as_secs_f64();
        self.min_delay + Duration::from_secs_f64(rand::thread_rng().gen::<f64>() * spread)
    }

    /// Pause after failed attempt number `attempt` (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = 2f64.powi(attempt.saturating_sub(1) as i32);
        let jitter = if self.jitter {
            rand::thread_rng().gen::<f64>()
        } else {
            0.0
        };
        Duration::from_secs_f64((self.backoff_secs * exp + jitter).max(0.0))
    }
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

/// Fetch `url`, falling back to `alternate` after a failed attempt.
///
/// The first attempt always uses `url`; later attempts use `alternate` when
/// given. Only transport failures are retried.
pub fn fetch_with_fallback<F: Fetcher + ?Sized>(
    fetcher: &F,
    url: &str,
    alternate: Option<&str>,
    policy: &RetryPolicy,
) -> Result<Html> {
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    pause(policy.initial_delay());

    for attempt in 1..=max_attempts {
        let target = if attempt == 1 {
            url
        } else {
            alternate.unwrap_or(url)
        };

        match fetcher.fetch(target) {
            Ok(document) => {
                log::debug!("Fetched {} on attempt {}", target, attempt);
                return Ok(document);
            }
            Err(e) if e.is_fetch_failure() => {
                log::warn!("Attempt {} failed on {}: {}", attempt, target, e);
                last_error = Some(e);
                if attempt < max_attempts {
                    let next = alternate.unwrap_or(url);
                    log::info!("Retrying at {}", next);
                    pause(policy.backoff_delay(attempt));
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| HoopsError::Fetch {
        url: url.to_string(),
        reason: "no attempts made".to_string(),
    }))
}

/// Serves pages from memory; used for fixtures and offline parsing
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    requests: RefCell<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// Make every request for `url` fail as a transport error
    pub fn with_failure(mut self, url: impl Into<String>) -> Self {
        self.failing.insert(url.into());
        self
    }

    /// URLs requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch_html(&self, url: &str) -> Result<String> {
        self.requests.borrow_mut().push(url.to_string());

        if self.failing.contains(url) {
            return Err(HoopsError::Fetch {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        self.pages.get(url).cloned().ok_or_else(|| HoopsError::Fetch {
            url: url.to_string(),
            reason: "HTTP 404".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<html><body><table id=\"t\"></table></body></html>";

    #[test]
    fn test_first_attempt_success_uses_primary() {
        let fetcher = MemoryFetcher::new().with_page("https://a/x", PAGE);
        let doc = fetch_with_fallback(&fetcher, "https://a/x", Some("https://a/y"), &RetryPolicy::immediate());
        assert!(doc.is_ok());
        assert_eq!(fetcher.requests(), vec!["https://a/x"]);
    }

    #[test]
    fn test_falls_back_to_alternate() {
        let fetcher = MemoryFetcher::new()
            .with_failure("https://a/LAL.html")
            .with_page("https://a/BOS.html", PAGE);
        let doc = fetch_with_fallback(
            &fetcher,
            "https://a/LAL.html",
            Some("https://a/BOS.html"),
            &RetryPolicy::immediate(),
        );
        assert!(doc.is_ok());
        assert_eq!(fetcher.requests(), vec!["https://a/LAL.html", "https://a/BOS.html"]);
    }

    #[test]
    fn test_both_attempts_fail() {
        let fetcher = MemoryFetcher::new();
        let result = fetch_with_fallback(&fetcher, "https://a/1", Some("https://a/2"), &RetryPolicy::immediate());
        match result {
            Err(HoopsError::Fetch { url, .. }) => assert_eq!(url, "https://a/2"),
            other => panic!("expected fetch error, got {:?}", other.map(|_| ())),
        }
        assert_eq!(fetcher.requests().len(), 2);
    }

    #[test]
    fn test_retries_primary_without_alternate() {
        let fetcher = MemoryFetcher::new().with_failure("https://a/1");
        let result = fetch_with_fallback(&fetcher, "https://a/1", None, &RetryPolicy::immediate());
        assert!(result.is_err());
        assert_eq!(fetcher.requests(), vec!["https://a/1", "https://a/1"]);
    }

    #[test]
    fn test_backoff_without_jitter() {
        let policy = RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_delay(1), Duration::from_secs_f64(0.8));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs_f64(1.6));
        assert_eq!(policy.initial_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_jittered_delays_stay_in_range() {
        let policy = RetryPolicy::default();
        for _ in 0..20 {
            let initial = policy.initial_delay();
            assert!(initial >= Duration::from_millis(500) && initial <= Duration::from_millis(1000));

            let backoff = policy.backoff_delay(1).as_secs_f64();
            assert!((0.8..1.8).contains(&backoff));
        }
    }
}
