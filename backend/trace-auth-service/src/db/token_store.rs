/// Per-subject credential storage
///
/// One record per subject holds the current access and refresh credential.
/// Any write resets the expiry of the whole record to the refresh lifetime,
/// so an access-only rotation also extends the life of the refresh token.
use crate::db::{token_key, ttl_secs, ACCESS_FIELD, REFRESH_FIELD};
use crate::error::{AuthError, Result};
use async_trait::async_trait;
use redis_utils::SharedConnectionManager;
use std::time::Duration;
use tracing::{debug, error};

/// Fields to upsert in a subject's credential record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUpdate {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

impl TokenUpdate {
    pub fn pair(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: Some(access.into()),
            refresh: Some(refresh.into()),
        }
    }

    pub fn access_only(access: impl Into<String>) -> Self {
        Self {
            access: Some(access.into()),
            refresh: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none()
    }
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Upsert the given fields and reset the record TTL to the refresh lifetime
    async fn save(&self, subject: &str, update: TokenUpdate) -> Result<()>;

    /// Current access token for a subject whose stored refresh token is `refresh`
    ///
    /// Fails with [`AuthError::RefreshNotRecognized`] when the record is gone
    /// or holds a different refresh token.
    async fn lookup_access_by_refresh(&self, subject: &str, refresh: &str) -> Result<String>;

    /// Whether `access` is the subject's current access token
    ///
    /// Backend errors are logged and reported as `false`.
    async fn access_token_matches(&self, subject: &str, access: &str) -> bool;
}

/// Redis hash `auth:tokens:{subject}` with `access` and `refresh` fields
pub struct RedisTokenStore {
    redis: SharedConnectionManager,
    record_ttl: Duration,
    response_timeout: Duration,
}

impl RedisTokenStore {
    pub fn new(
        redis: SharedConnectionManager,
        record_ttl: Duration,
        response_timeout: Duration,
    ) -> Self {
        Self {
            redis,
            record_ttl,
            response_timeout,
        }
    }

    async fn fetch_access(&self, subject: &str) -> Result<Option<String>> {
        let key = token_key(subject);
        let mut conn = self.redis.lock().await.clone();

        let access = redis_utils::with_deadline(self.response_timeout, async {
            redis::cmd("HGET")
                .arg(&key)
                .arg(ACCESS_FIELD)
                .query_async::<_, Option<String>>(&mut conn)
                .await
        })
        .await?;

        Ok(access)
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn save(&self, subject: &str, update: TokenUpdate) -> Result<()> {
        let key = token_key(subject);
        let ttl = ttl_secs(self.record_ttl);

        let mut pipe = redis::pipe();
        pipe.atomic();

        if !update.is_empty() {
            let mut hset = redis::cmd("HSET");
            hset.arg(&key);
            if let Some(access) = &update.access {
                hset.arg(ACCESS_FIELD).arg(access);
            }
            if let Some(refresh) = &update.refresh {
                hset.arg(REFRESH_FIELD).arg(refresh);
            }
            pipe.add_command(hset).ignore();
        }
        pipe.cmd("EXPIRE").arg(&key).arg(ttl).ignore();

        let mut conn = self.redis.lock().await.clone();
        redis_utils::with_deadline(self.response_timeout, async {
            pipe.query_async::<_, ()>(&mut conn).await
        })
        .await?;

        debug!(
            subject = %subject,
            access = update.access.is_some(),
            refresh = update.refresh.is_some(),
            ttl_secs = ttl,
            "Credential record saved"
        );
        Ok(())
    }

    async fn lookup_access_by_refresh(&self, subject: &str, refresh: &str) -> Result<String> {
        let key = token_key(subject);
        let mut conn = self.redis.lock().await.clone();

        let (access, stored_refresh) = redis_utils::with_deadline(self.response_timeout, async {
            redis::cmd("HMGET")
                .arg(&key)
                .arg(ACCESS_FIELD)
                .arg(REFRESH_FIELD)
                .query_async::<_, (Option<String>, Option<String>)>(&mut conn)
                .await
        })
        .await?;

        match (access, stored_refresh) {
            (Some(access), Some(stored)) if stored == refresh => Ok(access),
            _ => Err(AuthError::RefreshNotRecognized),
        }
    }

    async fn access_token_matches(&self, subject: &str, access: &str) -> bool {
        match self.fetch_access(subject).await {
            Ok(Some(stored)) => stored == access,
            Ok(None) => false,
            Err(e) => {
                error!(subject = %subject, error = %e, "Failed to read credential record");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_update_constructors() {
        let pair = TokenUpdate::pair("a", "r");
        assert_eq!(pair.access.as_deref(), Some("a"));
        assert_eq!(pair.refresh.as_deref(), Some("r"));

        let access = TokenUpdate::access_only("a2");
        assert!(access.refresh.is_none());
        assert!(!access.is_empty());

        assert!(TokenUpdate::default().is_empty());
    }

    #[test]
    fn test_keys() {
        assert_eq!(token_key("alice"), "auth:tokens:alice");
        assert_eq!(crate::db::trace_key("abc"), "auth:trace:abc");
    }
}
