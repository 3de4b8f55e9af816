/// Trace id to access token bindings
///
/// Bindings hold the SHA-256 hex digest of the access token, never the
/// token itself. A binding is written once and expires after the trace TTL.
use crate::db::{trace_key, ttl_secs};
use crate::error::Result;
use async_trait::async_trait;
use redis_utils::SharedConnectionManager;
use std::time::Duration;

#[async_trait]
pub trait TraceStore: Send + Sync {
    /// Write the binding if no unexpired binding exists
    ///
    /// Returns `false` when the trace is already bound. Atomic with respect
    /// to concurrent callers.
    async fn bind_once(&self, trace_id: &str, token_digest: &str) -> Result<bool>;

    /// Digest bound to the trace, if any
    async fn find(&self, trace_id: &str) -> Result<Option<String>>;
}

/// Redis string `auth:trace:{trace_id}` written with `SET NX EX`
pub struct RedisTraceStore {
    redis: SharedConnectionManager,
    ttl: Duration,
    response_timeout: Duration,
}

impl RedisTraceStore {
    pub fn new(redis: SharedConnectionManager, ttl: Duration, response_timeout: Duration) -> Self {
        Self {
            redis,
            ttl,
            response_timeout,
        }
    }
}

#[async_trait]
impl TraceStore for RedisTraceStore {
    async fn bind_once(&self, trace_id: &str, token_digest: &str) -> Result<bool> {
        let key = trace_key(trace_id);
        let mut conn = self.redis.lock().await.clone();

        // Nil reply means the key already exists
        let reply = redis_utils::with_deadline(self.response_timeout, async {
            redis::cmd("SET")
                .arg(&key)
                .arg(token_digest)
                .arg("NX")
                .arg("EX")
                .arg(ttl_secs(self.ttl))
                .query_async::<_, Option<String>>(&mut conn)
                .await
        })
        .await?;

        Ok(reply.is_some())
    }

    async fn find(&self, trace_id: &str) -> Result<Option<String>> {
        let key = trace_key(trace_id);
        let mut conn = self.redis.lock().await.clone();

        let digest = redis_utils::with_deadline(self.response_timeout, async {
            redis::cmd("GET")
                .arg(&key)
                .query_async::<_, Option<String>>(&mut conn)
                .await
        })
        .await?;

        Ok(digest.filter(|d| !d.is_empty()))
    }
}
