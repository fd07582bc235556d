//! Construction-time server options

use crate::retry::RetryConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Default seconds between polls
pub const DEFAULT_POLL_INTERVAL: u64 = 1;

/// Default ceiling on cached entries across all categories
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Options fixed for the lifetime of a `MailServer`
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Seconds between polls; zero falls back to [`DEFAULT_POLL_INTERVAL`]
    pub poll_interval_secs: u64,

    /// Print a banner when the runner starts
    pub banner: bool,

    /// Banner template to print instead of the built-in one
    pub banner_path: Option<PathBuf>,

    /// Log and swallow handler and fetch failures instead of stopping
    pub suppress_errors: bool,

    /// Whether `log()` emits anything
    pub enable_logging: bool,

    pub cache_capacity: usize,

    /// Retry policy for each poll fetch
    pub retry: RetryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL,
            banner: true,
            banner_path: None,
            suppress_errors: false,
            enable_logging: false,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            retry: RetryConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    pub fn with_banner(mut self, banner: bool) -> Self {
        self.banner = banner;
        self
    }

    pub fn with_banner_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.banner_path = Some(path.into());
        self
    }

    pub fn with_suppress_errors(mut self, suppress: bool) -> Self {
        self.suppress_errors = suppress;
        self
    }

    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Replace out-of-range values with defaults
    ///
    /// Returns the names of the fields that were changed.
    pub fn normalize(&mut self) -> Vec<&'static str> {
        let mut adjusted = Vec::new();
        if self.poll_interval_secs == 0 {
            self.poll_interval_secs = DEFAULT_POLL_INTERVAL;
            adjusted.push("poll_interval_secs");
        }
        if self.cache_capacity == 0 {
            self.cache_capacity = DEFAULT_CACHE_CAPACITY;
            adjusted.push("cache_capacity");
        }
        adjusted
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}
