use std::sync::Arc;
use std::time::Duration;

use crate::data::codec::{JsonCodec, SerdeJsonCodec};

/// Configuration shared by every request a [`Fetcher`](crate::Fetcher) runs.
///
/// One value is injected at construction; [`FetchConfig::default`] is the
/// stock instance and each setter derives a new one from it.
///
/// # Examples
///
/// ```
/// use hauler_fetch::FetchConfig;
/// use std::time::Duration;
///
/// let config = FetchConfig::default()
///     .max_connections(16)
///     .max_retry(3)
///     .default_timeout(Duration::from_secs(10));
/// assert_eq!(config.max_connections, 16);
/// ```
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Timeout for requests that do not set their own.
    ///
    /// Default: 5s
    pub default_timeout: Duration,

    /// Timeout of the metadata probe that precedes a concurrent fetch.
    ///
    /// Independent of [`default_timeout`](Self::default_timeout) and of the
    /// request template's own timeout.
    ///
    /// Default: 30s
    pub probe_timeout: Duration,

    /// Upper bound on concurrent connections per fetch.
    ///
    /// Requested connection counts above this are clamped.
    ///
    /// Default: 8
    pub max_connections: usize,

    /// How many times one byte range may be retried.
    ///
    /// A range that fails `max_retry + 1` times aborts the whole fetch.
    ///
    /// Default: 8
    pub max_retry: u32,

    /// Largest payload a worker emits in one result.
    ///
    /// Default: 1 MiB
    pub max_read_buffer: usize,

    /// Base delay before a retried range is requested again.
    ///
    /// The delay for retry N is `retry_backoff * 2^(N-1)`, capped at
    /// [`max_retry_backoff`](Self::max_retry_backoff).
    ///
    /// Default: 50ms
    pub retry_backoff: Duration,

    /// Cap on the retry delay.
    ///
    /// Default: 2s
    pub max_retry_backoff: Duration,

    /// Codec used by [`Fetcher::json_body`](crate::Fetcher::json_body) and
    /// [`Fetcher::decode_json`](crate::Fetcher::decode_json).
    ///
    /// Default: [`SerdeJsonCodec`]
    pub json: Arc<dyn JsonCodec>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            default_timeout:   Duration::from_secs(5),
            probe_timeout:     Duration::from_secs(30),
            max_connections:   8,
            max_retry:         8,
            max_read_buffer:   1024 * 1024,
            retry_backoff:     Duration::from_millis(50),
            max_retry_backoff: Duration::from_secs(2),
            json:              Arc::new(SerdeJsonCodec),
        }
    }
}

impl FetchConfig {
    #[must_use]
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    #[must_use]
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the connection cap; zero is treated as one.
    #[must_use]
    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    #[must_use]
    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// Set the per-result payload cap; zero is treated as one byte.
    #[must_use]
    pub fn max_read_buffer(mut self, max_read_buffer: usize) -> Self {
        self.max_read_buffer = max_read_buffer.max(1);
        self
    }

    /// Set base and cap of the retry delay. Zero disables the delay.
    #[must_use]
    pub fn retry_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.retry_backoff = base;
        self.max_retry_backoff = max;
        self
    }

    #[must_use]
    pub fn json_codec(mut self, codec: impl JsonCodec + 'static) -> Self {
        self.json = Arc::new(codec);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.default_timeout, Duration::from_secs(5));
        assert_eq!(config.probe_timeout, Duration::from_secs(30));
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.max_retry, 8);
        assert_eq!(config.max_read_buffer, 1024 * 1024);
    }

    #[test]
    fn test_setters_clamp_zero() {
        let config = FetchConfig::default().max_connections(0).max_read_buffer(0);
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.max_read_buffer, 1);
    }

    #[test]
    fn test_setters_do_not_touch_the_source() {
        let base = FetchConfig::default();
        let custom = base.clone().max_retry(2);
        assert_eq!(base.max_retry, 8);
        assert_eq!(custom.max_retry, 2);
    }
}
