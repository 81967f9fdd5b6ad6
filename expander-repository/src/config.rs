//! Connection settings for the sink implementations.

use std::time::Duration;

/// Default Solr base URL.
pub const DEFAULT_SOLR_URL: &str = "http://localhost:8983";

/// Default per-request timeout for Solr updates.
pub const DEFAULT_SOLR_TIMEOUT: Duration = Duration::from_secs(1200);

/// Path of the update handler, relative to the Solr base URL.
pub const SOLR_UPDATE_PATH: &str = "solr/update";

/// Default Redis URL.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Settings for the Solr provider.
///
/// Add and delete requests share one timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolrConfig {
    /// Base URL of the Solr server, e.g. `http://localhost:8983`.
    pub url: String,
    /// How long a single update request may stay outstanding.
    pub timeout: Duration,
}

impl Default for SolrConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOLR_URL.to_string(),
            timeout: DEFAULT_SOLR_TIMEOUT,
        }
    }
}

impl SolrConfig {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

/// Settings for the Redis store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
        }
    }
}
