//! Trace authorization service
//!
//! Issues access/refresh credential pairs for logins vouched for by the
//! identity service, and binds a validated access token to exactly one
//! distributed trace id.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;

pub use error::{AuthError, Result};

use crate::db::{TokenStore, TraceStore};
use crate::services::{IdentityVerifier, TokenService, TraceService};
use crypto_core::JwtCodec;
use std::sync::Arc;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub traces: Arc<TraceService>,
}

impl AppState {
    pub fn new(
        codec: JwtCodec,
        token_store: Arc<dyn TokenStore>,
        trace_store: Arc<dyn TraceStore>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(codec, token_store, identity));
        let traces = Arc::new(TraceService::new(tokens.clone(), trace_store));
        Self { tokens, traces }
    }
}
