//! Shared fixtures for trace-auth-service integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use crypto_core::{JwtCodec, TokenLifetimes};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use trace_auth_service::db::{MemoryTokenStore, MemoryTraceStore};
use trace_auth_service::services::{
    IdentityCheck, IdentityClientError, IdentityVerifier, Verification,
};
use trace_auth_service::AppState;

// FOR TESTING ONLY
pub const TEST_SECRET: &str = "k9#Qv2!mZ7@pL4$wX8^tR1&nB6*yH3(eJ5)uF0_sD8+gA2=cW7~oN4|iM1}rT6{b";

pub const TRACE_A: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
pub const TRACE_B: &str = "80f198ee56343ba864fe8b2a57d3eff7";

/// W3C `traceparent` value carrying `trace_id`
pub fn traceparent(trace_id: &str) -> String {
    format!("00-{}-00f067aa0ba902b7-01", trace_id)
}

/// In-process stand-in for the identity service
#[derive(Default)]
pub struct FakeIdentity {
    users: DashMap<String, String>,
    calls: AtomicUsize,
}

impl FakeIdentity {
    pub fn with_user(login: &str, password: &str) -> Self {
        let identity = Self::default();
        identity.add_user(login, password);
        identity
    }

    pub fn add_user(&self, login: &str, password: &str) {
        self.users.insert(login.to_string(), password.to_string());
    }

    pub fn remove_user(&self, login: &str) {
        self.users.remove(login);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityVerifier for FakeIdentity {
    async fn verify(&self, check: &IdentityCheck) -> Result<Verification, IdentityClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let Some(stored) = self.users.get(&check.login) else {
            return Ok(Verification::NotFound);
        };

        match &check.password {
            Some(password) if password != stored.value() => Ok(Verification::Invalid),
            _ => Ok(Verification::Ok),
        }
    }
}

pub struct TestApp {
    pub state: AppState,
    pub identity: Arc<FakeIdentity>,
    pub codec: JwtCodec,
}

pub struct Lifetimes {
    pub access: Duration,
    pub refresh: Duration,
    pub trace: Duration,
}

impl Default for Lifetimes {
    fn default() -> Self {
        Self {
            access: Duration::from_secs(900),
            refresh: Duration::from_secs(3600),
            trace: Duration::from_secs(300),
        }
    }
}

pub fn codec(access: Duration, refresh: Duration) -> JwtCodec {
    JwtCodec::new(TEST_SECRET.as_bytes(), TokenLifetimes::new(access, refresh))
}

/// App state over in-memory stores with `alice`/`wonderland` and `bob`/`builder`
pub fn test_app(lifetimes: Lifetimes) -> TestApp {
    let identity = Arc::new(FakeIdentity::with_user("alice", "wonderland"));
    identity.add_user("bob", "builder");

    let codec = codec(lifetimes.access, lifetimes.refresh);
    let state = AppState::new(
        codec.clone(),
        Arc::new(MemoryTokenStore::new(lifetimes.refresh)),
        Arc::new(MemoryTraceStore::new(lifetimes.trace)),
        identity.clone(),
    );

    TestApp {
        state,
        identity,
        codec,
    }
}
