//! Outbound market-data clients behind the provider traits in `bias-core`.
//!
//! Every fetch is bounded by a client timeout and retried with linear
//! backoff; exhaustion surfaces as a `SourceError` that callers treat as a
//! silent factor miss.

mod fred;
mod options;
mod retry;
mod yahoo;

pub use fred::FredClient;
pub use options::YahooOptionsClient;
pub use retry::with_retries;
pub use yahoo::YahooClient;

/// Default HTTP timeout for provider calls.
pub const HTTP_TIMEOUT_SECS: u64 = 20;

/// Fetch attempts before giving up on a source.
pub const RETRY_ATTEMPTS: u32 = 3;

/// Base backoff between attempts; multiplied by the attempt number.
pub const RETRY_BACKOFF_SECS: u64 = 2;

/// TTL for the shared KV price cache.
pub const PRICE_CACHE_TTL_SECS: u64 = 900;
