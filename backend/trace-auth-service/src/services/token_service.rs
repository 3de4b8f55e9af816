/// Credential issuance, rotation and validation
///
/// ## Lifecycle
///
/// - `create_tokens` is the only path that creates a refresh token
/// - `refresh_token` rotates the access token once the previous one expired
/// - `validate_access_token` accepts only the subject's current access token,
///   so a rotated-out token stops validating even before its `exp`
use crate::db::{TokenStore, TokenUpdate};
use crate::error::{AuthError, Result};
use crate::metrics;
use crate::models::TokenPair;
use crate::services::identity_client::{IdentityCheck, IdentityVerifier, Verification};
use crypto_core::{Claims, CodecError, JwtCodec, TokenKind};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct TokenService {
    codec: JwtCodec,
    store: Arc<dyn TokenStore>,
    identity: Arc<dyn IdentityVerifier>,
}

impl TokenService {
    pub fn new(
        codec: JwtCodec,
        store: Arc<dyn TokenStore>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            codec,
            store,
            identity,
        }
    }

    pub fn codec(&self) -> &JwtCodec {
        &self.codec
    }

    /// Verify the login against the identity service and issue a fresh pair
    ///
    /// Overwrites any pair previously stored for the subject.
    pub async fn create_tokens(&self, login: &str, password: &str) -> Result<TokenPair> {
        let result = self.create_tokens_inner(login, password).await;
        record("create", &result);
        result
    }

    async fn create_tokens_inner(&self, login: &str, password: &str) -> Result<TokenPair> {
        self.verify_identity(IdentityCheck::with_password(login, password))
            .await?;

        let access_token = self.issue(login, TokenKind::Access)?;
        let refresh_token = self.issue(login, TokenKind::Refresh)?;

        self.store
            .save(
                login,
                TokenUpdate::pair(access_token.clone(), refresh_token.clone()),
            )
            .await?;

        info!(subject = %login, "Issued credential pair");
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Issue a new access token for a refresh token
    ///
    /// The previous access token must already be expired. Only the access
    /// field is rewritten, which also resets the record TTL.
    pub async fn refresh_token(&self, refresh: &str) -> Result<String> {
        let result = self.refresh_token_inner(refresh).await;
        record("refresh", &result);
        result
    }

    async fn refresh_token_inner(&self, refresh: &str) -> Result<String> {
        let claims = self.codec.parse(refresh).map_err(|e| match e {
            CodecError::Expired => AuthError::RefreshTokenExpired,
            CodecError::Malformed(reason) => {
                debug!(reason = %reason, "Rejected malformed refresh token");
                AuthError::MalformedToken
            }
            CodecError::Signing(reason) => AuthError::Internal(reason),
        })?;
        let subject = claims.sub.as_str();

        let current_access = self.store.lookup_access_by_refresh(subject, refresh).await?;
        match self.codec.parse(&current_access) {
            Ok(_) => return Err(AuthError::AccessTokenNotExpired),
            Err(CodecError::Expired) => {}
            // An unreadable stored token cannot be in use either
            Err(e) => warn!(subject = %subject, error = %e, "Stored access token is unreadable"),
        }

        self.verify_identity(IdentityCheck::existence(subject))
            .await?;

        if claims.token_type != TokenKind::Refresh {
            return Err(AuthError::InvalidTokenType {
                expected: TokenKind::Refresh,
                actual: claims.token_type,
            });
        }

        let access_token = self.issue(subject, TokenKind::Access)?;
        self.store
            .save(subject, TokenUpdate::access_only(access_token.clone()))
            .await?;

        info!(subject = %subject, "Rotated access token");
        Ok(access_token)
    }

    /// Check that `access` is a live access token and the subject's current one
    pub async fn validate_access_token(&self, access: &str) -> Result<Claims> {
        let result = self.validate_access_token_inner(access).await;
        record("validate", &result);
        result
    }

    async fn validate_access_token_inner(&self, access: &str) -> Result<Claims> {
        let claims = self.codec.parse(access).map_err(|e| {
            debug!(error = %e, "Access token failed to parse");
            AuthError::AccessTokenInvalid
        })?;

        if claims.token_type != TokenKind::Access {
            return Err(AuthError::InvalidTokenType {
                expected: TokenKind::Access,
                actual: claims.token_type,
            });
        }

        self.verify_identity(IdentityCheck::existence(&claims.sub))
            .await?;

        if !self.store.access_token_matches(&claims.sub, access).await {
            debug!(subject = %claims.sub, "Access token is not the current one");
            return Err(AuthError::AccessTokenInvalid);
        }

        Ok(claims)
    }

    async fn verify_identity(&self, check: IdentityCheck) -> Result<()> {
        match self.identity.verify(&check).await {
            Ok(Verification::Ok) => Ok(()),
            Ok(Verification::NotFound) => {
                info!(login = %check.login, "Identity service does not know login");
                Err(AuthError::AuthenticationFailed("user not found".to_string()))
            }
            Ok(Verification::Invalid) => {
                info!(login = %check.login, "Identity service rejected credentials");
                Err(AuthError::AuthenticationFailed(
                    "invalid credentials".to_string(),
                ))
            }
            Err(e) => {
                warn!(login = %check.login, error = %e, "Identity verification failed");
                Err(AuthError::AuthenticationFailed(e.to_string()))
            }
        }
    }

    fn issue(&self, subject: &str, kind: TokenKind) -> Result<String> {
        let token = self
            .codec
            .issue(subject, kind)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        metrics::record_token_issued(kind);
        Ok(token)
    }
}

fn record<T>(operation: &str, result: &Result<T>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => e.reason(),
    };
    metrics::record_token_operation(operation, outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryTokenStore;
    use crate::services::identity_client::IdentityClientError;
    use async_trait::async_trait;
    use crypto_core::TokenLifetimes;
    use mockall::mock;
    use std::time::Duration;

    const SECRET: &[u8] = b"k9#Qv2!mZ7@pL4$wX8^tR1&nB6*yH3(e";

    mock! {
        pub Identity {}

        #[async_trait]
        impl IdentityVerifier for Identity {
            async fn verify(&self, check: &IdentityCheck) -> std::result::Result<Verification, IdentityClientError>;
        }
    }

    fn codec(access: Duration, refresh: Duration) -> JwtCodec {
        JwtCodec::new(SECRET, TokenLifetimes::new(access, refresh))
    }

    fn default_codec() -> JwtCodec {
        codec(Duration::from_secs(900), Duration::from_secs(3600))
    }

    /// Same secret, tokens are born expired
    fn expired_codec() -> JwtCodec {
        codec(Duration::ZERO, Duration::ZERO)
    }

    fn accepting_identity() -> MockIdentity {
        let mut identity = MockIdentity::new();
        identity
            .expect_verify()
            .returning(|_| Ok(Verification::Ok));
        identity
    }

    fn service_with(identity: MockIdentity) -> (TokenService, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::new(Duration::from_secs(3600)));
        let service = TokenService::new(default_codec(), store.clone(), Arc::new(identity));
        (service, store)
    }

    /// Seed a record whose access token has already expired
    async fn seed_expired_access(store: &MemoryTokenStore, subject: &str) -> (String, String) {
        let access = expired_codec().issue(subject, TokenKind::Access).unwrap();
        let refresh = default_codec().issue(subject, TokenKind::Refresh).unwrap();
        store
            .save(subject, TokenUpdate::pair(access.clone(), refresh.clone()))
            .await
            .unwrap();
        (access, refresh)
    }

    // ============================================
    // create_tokens
    // ============================================

    #[tokio::test]
    async fn test_create_tokens_issues_pair() {
        let mut identity = MockIdentity::new();
        identity
            .expect_verify()
            .withf(|check| check.login == "alice" && check.password.as_deref() == Some("pw"))
            .times(1)
            .returning(|_| Ok(Verification::Ok));
        let (service, store) = service_with(identity);

        let pair = service.create_tokens("alice", "pw").await.unwrap();

        let access = service.codec().parse(&pair.access_token).unwrap();
        let refresh = service.codec().parse(&pair.refresh_token).unwrap();
        assert_eq!(access.sub, "alice");
        assert_eq!(refresh.sub, "alice");
        assert_eq!(access.token_type, TokenKind::Access);
        assert_eq!(refresh.token_type, TokenKind::Refresh);

        assert!(store.access_token_matches("alice", &pair.access_token).await);
        assert_eq!(
            store
                .lookup_access_by_refresh("alice", &pair.refresh_token)
                .await
                .unwrap(),
            pair.access_token
        );
    }

    #[tokio::test]
    async fn test_create_tokens_unknown_login() {
        let mut identity = MockIdentity::new();
        identity
            .expect_verify()
            .returning(|_| Ok(Verification::NotFound));
        let (service, store) = service_with(identity);

        let err = service.create_tokens("ghost", "pw").await.unwrap_err();

        assert!(matches!(err, AuthError::AuthenticationFailed(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_create_tokens_wrong_password() {
        let mut identity = MockIdentity::new();
        identity
            .expect_verify()
            .returning(|_| Ok(Verification::Invalid));
        let (service, _) = service_with(identity);

        assert!(matches!(
            service.create_tokens("alice", "nope").await,
            Err(AuthError::AuthenticationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_create_tokens_identity_unreachable() {
        let mut identity = MockIdentity::new();
        identity
            .expect_verify()
            .returning(|_| Err(IdentityClientError::Timeout(Duration::from_secs(5))));
        let (service, _) = service_with(identity);

        assert!(matches!(
            service.create_tokens("alice", "pw").await,
            Err(AuthError::AuthenticationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_create_tokens_overwrites_previous_pair() {
        let (service, store) = service_with(accepting_identity());

        let first = service.create_tokens("alice", "pw").await.unwrap();
        let second = service.create_tokens("alice", "pw").await.unwrap();

        assert_ne!(first.access_token, second.access_token);
        assert!(!store.access_token_matches("alice", &first.access_token).await);
        assert!(store.access_token_matches("alice", &second.access_token).await);
    }

    // ============================================
    // refresh_token
    // ============================================

    #[tokio::test]
    async fn test_refresh_rejected_while_access_live() {
        let (service, _) = service_with(accepting_identity());
        let pair = service.create_tokens("alice", "pw").await.unwrap();

        assert!(matches!(
            service.refresh_token(&pair.refresh_token).await,
            Err(AuthError::AccessTokenNotExpired)
        ));
    }

    #[tokio::test]
    async fn test_refresh_after_access_expired() {
        let (service, store) = service_with(accepting_identity());
        let (old_access, refresh) = seed_expired_access(&store, "alice").await;

        let new_access = service.refresh_token(&refresh).await.unwrap();

        assert_ne!(new_access, old_access);
        assert!(service.validate_access_token(&new_access).await.is_ok());
        assert!(matches!(
            service.validate_access_token(&old_access).await,
            Err(AuthError::AccessTokenInvalid)
        ));
        // Refresh token survives the rotation
        assert_eq!(
            store.lookup_access_by_refresh("alice", &refresh).await.unwrap(),
            new_access
        );
    }

    #[tokio::test]
    async fn test_refresh_with_superseded_refresh_token() {
        let (service, store) = service_with(accepting_identity());
        let (_, stale_refresh) = seed_expired_access(&store, "alice").await;

        service.create_tokens("alice", "pw").await.unwrap();

        assert!(matches!(
            service.refresh_token(&stale_refresh).await,
            Err(AuthError::RefreshNotRecognized)
        ));
    }

    #[tokio::test]
    async fn test_refresh_with_expired_refresh_token() {
        let (service, _) = service_with(MockIdentity::new());
        let refresh = expired_codec().issue("alice", TokenKind::Refresh).unwrap();

        assert!(matches!(
            service.refresh_token(&refresh).await,
            Err(AuthError::RefreshTokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_refresh_with_garbage() {
        let (service, _) = service_with(MockIdentity::new());

        assert!(matches!(
            service.refresh_token("not-a-token").await,
            Err(AuthError::MalformedToken)
        ));
    }

    #[tokio::test]
    async fn test_refresh_for_removed_user() {
        let mut identity = MockIdentity::new();
        identity
            .expect_verify()
            .withf(|check| check.password.is_none())
            .returning(|_| Ok(Verification::NotFound));
        let (service, store) = service_with(identity);
        let (_, refresh) = seed_expired_access(&store, "alice").await;

        assert!(matches!(
            service.refresh_token(&refresh).await,
            Err(AuthError::AuthenticationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_with_access_kind_token() {
        let (service, store) = service_with(accepting_identity());
        let expired_access = expired_codec().issue("alice", TokenKind::Access).unwrap();
        let wrong_kind = default_codec().issue("alice", TokenKind::Access).unwrap();
        store
            .save(
                "alice",
                TokenUpdate::pair(expired_access, wrong_kind.clone()),
            )
            .await
            .unwrap();

        assert!(matches!(
            service.refresh_token(&wrong_kind).await,
            Err(AuthError::InvalidTokenType {
                expected: TokenKind::Refresh,
                actual: TokenKind::Access,
            })
        ));
    }

    #[tokio::test]
    async fn test_refresh_with_unreadable_stored_access() {
        let (service, store) = service_with(accepting_identity());
        let refresh = default_codec().issue("alice", TokenKind::Refresh).unwrap();
        store
            .save("alice", TokenUpdate::pair("corrupted", refresh.clone()))
            .await
            .unwrap();

        assert!(service.refresh_token(&refresh).await.is_ok());
    }

    // ============================================
    // validate_access_token
    // ============================================

    #[tokio::test]
    async fn test_validate_current_access_token() {
        let (service, _) = service_with(accepting_identity());
        let pair = service.create_tokens("alice", "pw").await.unwrap();

        let claims = service
            .validate_access_token(&pair.access_token)
            .await
            .unwrap();
        assert_eq!(claims.sub, "alice");
    }

    #[tokio::test]
    async fn test_validate_rejects_refresh_token() {
        let (service, _) = service_with(accepting_identity());
        let pair = service.create_tokens("alice", "pw").await.unwrap();

        assert!(matches!(
            service.validate_access_token(&pair.refresh_token).await,
            Err(AuthError::InvalidTokenType {
                expected: TokenKind::Access,
                actual: TokenKind::Refresh,
            })
        ));
    }

    #[tokio::test]
    async fn test_validate_rejects_expired_and_garbage() {
        let (service, store) = service_with(accepting_identity());
        let (expired, _) = seed_expired_access(&store, "alice").await;

        assert!(matches!(
            service.validate_access_token(&expired).await,
            Err(AuthError::AccessTokenInvalid)
        ));
        assert!(matches!(
            service.validate_access_token("garbage").await,
            Err(AuthError::AccessTokenInvalid)
        ));
    }

    #[tokio::test]
    async fn test_validate_rejects_unknown_record() {
        let (service, _) = service_with(accepting_identity());
        // Signed correctly but never stored
        let orphan = default_codec().issue("alice", TokenKind::Access).unwrap();

        assert!(matches!(
            service.validate_access_token(&orphan).await,
            Err(AuthError::AccessTokenInvalid)
        ));
    }

    #[tokio::test]
    async fn test_validate_for_removed_user() {
        let mut identity = MockIdentity::new();
        identity
            .expect_verify()
            .withf(|check| check.password.is_some())
            .returning(|_| Ok(Verification::Ok));
        identity
            .expect_verify()
            .withf(|check| check.password.is_none())
            .returning(|_| Ok(Verification::NotFound));
        let (service, _) = service_with(identity);
        let pair = service.create_tokens("alice", "pw").await.unwrap();

        assert!(matches!(
            service.validate_access_token(&pair.access_token).await,
            Err(AuthError::AuthenticationFailed(_))
        ));
    }
}
