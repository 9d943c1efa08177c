//! Failure taxonomy for fetch cycles and configuration.

use std::time::Duration;

use thiserror::Error;

/// Why a fetch (or one metric inside it) failed. Never reaches consumers as a fault;
/// the adapter turns it into an `error` string next to still-renderable data.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed response: {0}")]
    Parse(String),

    /// The response parsed, but not one block in it was usable.
    #[error("no valid blocks in response")]
    NoValidBlocks,

    /// Upstream answered with an explicit failure status (`status: "0"`).
    #[error("upstream rejected request: {0}")]
    RateLimit(String),

    #[error("metric {metric} unavailable: {reason}")]
    PartialMetric {
        metric: &'static str,
        reason: String,
    },
}

impl FetchError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Timeout(_) => "timeout",
            FetchError::Parse(_) => "parse",
            FetchError::NoValidBlocks => "no_valid_blocks",
            FetchError::RateLimit(_) => "rate_limit",
            FetchError::PartialMetric { .. } => "partial_metric",
        }
    }

    /// A batch with nothing renderable in it is replaced by the fallback dataset
    /// outright instead of the last good cache.
    pub fn replaces_cache(&self) -> bool {
        matches!(self, FetchError::NoValidBlocks)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL in {var}: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid value {value:?} for {var}")]
    InvalidValue { var: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_empty_batches_replace_the_cache() {
        assert!(FetchError::NoValidBlocks.replaces_cache());
        assert!(!FetchError::parse("expected value at line 1 column 1").replaces_cache());
        assert!(!FetchError::Network("reset".into()).replaces_cache());
        assert!(!FetchError::RateLimit("Max rate limit reached".into()).replaces_cache());
        assert_eq!(FetchError::Timeout(Duration::from_secs(10)).kind(), "timeout");
    }
}
