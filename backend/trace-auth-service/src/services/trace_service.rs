/// Binds a validated access token to a single trace id
///
/// A trace may be authorized once per binding lifetime. Downstream hops then
/// call `check_trace_auth` with the same token to prove they belong to the
/// authorized call chain.
use crate::db::TraceStore;
use crate::error::{AuthError, Result};
use crate::metrics;
use crate::services::TokenService;
use crypto_core::hash::hash_token;
use std::sync::Arc;
use tracing::{info, warn};

pub struct TraceService {
    tokens: Arc<TokenService>,
    store: Arc<dyn TraceStore>,
}

impl TraceService {
    pub fn new(tokens: Arc<TokenService>, store: Arc<dyn TraceStore>) -> Self {
        Self { tokens, store }
    }

    /// Validate `access` and bind it to `trace_id`
    ///
    /// Validation failures propagate unchanged. A valid token presented for
    /// an already bound trace fails with [`AuthError::TraceAlreadyAuthorized`].
    pub async fn authorize_trace(&self, trace_id: &str, access: &str) -> Result<()> {
        let result = self.authorize_trace_inner(trace_id, access).await;
        record("authorize", &result);
        result
    }

    async fn authorize_trace_inner(&self, trace_id: &str, access: &str) -> Result<()> {
        let claims = self.tokens.validate_access_token(access).await?;

        // Write-if-absent; concurrent callers get exactly one winner
        if !self.store.bind_once(trace_id, &hash_token(access)).await? {
            warn!(trace_id = %trace_id, subject = %claims.sub, "Trace already authorized");
            return Err(AuthError::TraceAlreadyAuthorized(trace_id.to_string()));
        }

        info!(trace_id = %trace_id, subject = %claims.sub, "Authorized trace");
        Ok(())
    }

    /// Succeeds only if `access` is the token bound to `trace_id`
    pub async fn check_trace_auth(&self, trace_id: &str, access: &str) -> Result<()> {
        let result = self.check_trace_auth_inner(trace_id, access).await;
        record("check", &result);
        result
    }

    async fn check_trace_auth_inner(&self, trace_id: &str, access: &str) -> Result<()> {
        let bound = self
            .store
            .find(trace_id)
            .await?
            .ok_or_else(|| AuthError::TraceNotAuthorized(trace_id.to_string()))?;

        if bound != hash_token(access) {
            warn!(trace_id = %trace_id, "Token does not match trace binding");
            return Err(AuthError::AccessDenied);
        }

        Ok(())
    }
}

fn record(operation: &str, result: &Result<()>) {
    let outcome = match result {
        Ok(()) => "success",
        Err(e) => e.reason(),
    };
    metrics::record_trace_operation(operation, outcome);
}
