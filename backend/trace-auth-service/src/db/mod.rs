/// Credential and trace binding persistence
///
/// Each store has a Redis implementation for deployments and an in-process
/// implementation for local runs and tests. Both honour the same TTL rules.
pub mod memory;
pub mod token_store;
pub mod trace_store;

pub use memory::{MemoryTokenStore, MemoryTraceStore};
pub use token_store::{RedisTokenStore, TokenStore, TokenUpdate};
pub use trace_store::{RedisTraceStore, TraceStore};

/// Prefix for per-subject credential hashes
pub const TOKEN_KEY_PREFIX: &str = "auth:tokens";

/// Prefix for per-trace bindings
pub const TRACE_KEY_PREFIX: &str = "auth:trace";

/// Hash field holding the current access token
pub const ACCESS_FIELD: &str = "access";

/// Hash field holding the current refresh token
pub const REFRESH_FIELD: &str = "refresh";

pub fn token_key(subject: &str) -> String {
    format!("{}:{}", TOKEN_KEY_PREFIX, subject)
}

pub fn trace_key(trace_id: &str) -> String {
    format!("{}:{}", TRACE_KEY_PREFIX, trace_id)
}

/// Whole seconds for Redis `EX`/`EXPIRE`, never zero
pub(crate) fn ttl_secs(ttl: std::time::Duration) -> u64 {
    ttl.as_secs().max(1)
}
