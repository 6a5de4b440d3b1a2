//! Connection configuration for the OpenSearch provider.

use std::time::Duration;

/// Default OpenSearch URL.
pub const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Configuration for the OpenSearch connection.
#[derive(Debug, Clone)]
pub struct SearchIndexConfig {
    /// Server URL (e.g., "http://localhost:9200").
    pub url: String,
    /// Transport-level request timeout. `None` leaves the client default.
    pub request_timeout: Option<Duration>,
}

impl Default for SearchIndexConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_OPENSEARCH_URL.to_string(),
            request_timeout: None,
        }
    }
}

impl SearchIndexConfig {
    /// Create a config for the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout: None,
        }
    }

    /// Set the transport-level request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}
