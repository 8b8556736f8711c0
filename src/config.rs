use std::time::Duration;

/// Default deadline for one reconciled query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of queries a crawl keeps in flight.
pub const DEFAULT_CRAWL_WORKERS: usize = 4;

#[derive(Debug, Clone)]
/// Query and crawl configurations
pub struct Config {
    /// How long to wait for the DHT client to complete one get.
    ///
    /// The longer this duration is, the longer an unreachable reflector stalls
    /// its part of a crawl. The shorter it is, the more likely a slow get is
    /// cut off before every replica answered; whatever was reconciled so far
    /// is still returned with the timeout error.
    ///
    /// Defaults to [DEFAULT_QUERY_TIMEOUT]
    pub query_timeout: Duration,
    /// Number of Peers queries a crawl runs concurrently.
    ///
    /// One reproduces a strictly serial crawl. Zero is treated as one.
    ///
    /// Defaults to [DEFAULT_CRAWL_WORKERS]
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            workers: DEFAULT_CRAWL_WORKERS,
        }
    }
}
