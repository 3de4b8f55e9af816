//! In-process stores backed by `DashMap`
//!
//! Same TTL semantics as the Redis stores. Expired entries are treated as
//! absent on read and dropped by [`MemoryTokenStore::purge_expired`] /
//! [`MemoryTraceStore::purge_expired`].

use crate::db::token_store::{TokenStore, TokenUpdate};
use crate::db::trace_store::TraceStore;
use crate::error::{AuthError, Result};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CredentialRecord {
    access: Option<String>,
    refresh: Option<String>,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
struct Binding {
    digest: String,
    expires_at: Instant,
}

pub struct MemoryTokenStore {
    records: DashMap<String, CredentialRecord>,
    record_ttl: Duration,
}

impl MemoryTokenStore {
    pub fn new(record_ttl: Duration) -> Self {
        Self {
            records: DashMap::new(),
            record_ttl,
        }
    }

    /// Drop expired records, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.records.len();
        self.records.retain(|_, record| record.expires_at > now);
        before.saturating_sub(self.records.len())
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn live_record(&self, subject: &str) -> Option<CredentialRecord> {
        let now = Instant::now();
        self.records
            .get(subject)
            .filter(|record| record.expires_at > now)
            .map(|record| record.value().clone())
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn save(&self, subject: &str, update: TokenUpdate) -> Result<()> {
        let now = Instant::now();
        let expires_at = now + self.record_ttl;

        match self.records.entry(subject.to_string()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.expires_at <= now {
                    record.access = None;
                    record.refresh = None;
                }
                if let Some(access) = update.access {
                    record.access = Some(access);
                }
                if let Some(refresh) = update.refresh {
                    record.refresh = Some(refresh);
                }
                record.expires_at = expires_at;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CredentialRecord {
                    access: update.access,
                    refresh: update.refresh,
                    expires_at,
                });
            }
        }

        Ok(())
    }

    async fn lookup_access_by_refresh(&self, subject: &str, refresh: &str) -> Result<String> {
        match self.live_record(subject) {
            Some(CredentialRecord {
                access: Some(access),
                refresh: Some(stored),
                ..
            }) if stored == refresh => Ok(access),
            _ => Err(AuthError::RefreshNotRecognized),
        }
    }

    async fn access_token_matches(&self, subject: &str, access: &str) -> bool {
        self.live_record(subject)
            .and_then(|record| record.access)
            .is_some_and(|stored| stored == access)
    }
}

pub struct MemoryTraceStore {
    bindings: DashMap<String, Binding>,
    ttl: Duration,
}

impl MemoryTraceStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            bindings: DashMap::new(),
            ttl,
        }
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.bindings.len();
        self.bindings.retain(|_, binding| binding.expires_at > now);
        before.saturating_sub(self.bindings.len())
    }
}

#[async_trait]
impl TraceStore for MemoryTraceStore {
    async fn bind_once(&self, trace_id: &str, token_digest: &str) -> Result<bool> {
        let now = Instant::now();
        let binding = Binding {
            digest: token_digest.to_string(),
            expires_at: now + self.ttl,
        };

        // The shard lock held by the entry makes check-and-insert atomic
        match self.bindings.entry(trace_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > now {
                    return Ok(false);
                }
                occupied.insert(binding);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(binding);
                Ok(true)
            }
        }
    }

    async fn find(&self, trace_id: &str) -> Result<Option<String>> {
        let now = Instant::now();
        Ok(self
            .bindings
            .get(trace_id)
            .filter(|binding| binding.expires_at > now)
            .map(|binding| binding.digest.clone()))
    }
}
