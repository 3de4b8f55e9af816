/// Credential codec for the trace-auth service
///
/// Issues and parses HS256-signed JWTs carrying a subject, a token kind
/// (access or refresh), issue time, expiry and a unique token id.
///
/// ## Security Design
///
/// - **HS256 ONLY**: one symmetric scheme, no algorithm negotiation
/// - **Secret loaded once**: the codec is built at startup and immutable
/// - **Zero leeway**: a token is expired as soon as `now >= exp`
/// - **Closed kind tag**: `token_type` deserializes into [`TokenKind`]; any
///   other value makes the token malformed
///
/// ## Usage
///
/// ```rust
/// use crypto_core::jwt::{JwtCodec, TokenKind, TokenLifetimes};
/// use std::time::Duration;
///
/// let codec = JwtCodec::new(
///     b"0123456789abcdef0123456789abcdef-change-me",
///     TokenLifetimes::new(Duration::from_secs(900), Duration::from_secs(86_400)),
/// );
/// let token = codec.issue("alice", TokenKind::Access).unwrap();
/// let claims = codec.parse(&token).unwrap();
/// assert_eq!(claims.sub, "alice");
/// ```
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// JWT algorithm - fixed, never negotiated
const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

// ============================================================================
// Data Structures
// ============================================================================

/// Kind tag carried in every credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user login)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Token kind
    pub token_type: TokenKind,
    /// JWT ID, unique per issued token
    pub jti: String,
}

/// Configured lifetime per token kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl TokenLifetimes {
    pub fn new(access: Duration, refresh: Duration) -> Self {
        Self { access, refresh }
    }

    pub fn for_kind(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access,
            TokenKind::Refresh => self.refresh,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Bad structure, bad signature, unknown kind tag or missing claims
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

// ============================================================================
// Codec
// ============================================================================

/// Signs and parses credentials with a fixed symmetric secret
#[derive(Clone)]
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetimes: TokenLifetimes,
}

impl fmt::Debug for JwtCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtCodec")
            .field("algorithm", &JWT_ALGORITHM)
            .field("lifetimes", &self.lifetimes)
            .finish_non_exhaustive()
    }
}

impl JwtCodec {
    pub fn new(secret: &[u8], lifetimes: TokenLifetimes) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            lifetimes,
        }
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        self.lifetimes.for_kind(kind)
    }

    /// Issue a signed token of the given kind for `subject`
    ///
    /// `iat` is now, `exp` is now plus the configured lifetime of `kind`.
    pub fn issue(&self, subject: &str, kind: TokenKind) -> Result<String, CodecError> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl(kind))
            .map_err(|e| CodecError::Signing(format!("lifetime out of range: {e}")))?;
        let expiry = now + ttl;

        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expiry.timestamp(),
            token_type: kind,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| CodecError::Signing(e.to_string()))
    }

    /// Verify signature, structure and expiry, returning the claims
    ///
    /// ## Errors
    ///
    /// - [`CodecError::Expired`] when `now >= exp`
    /// - [`CodecError::Malformed`] for anything else that fails verification
    pub fn parse(&self, token: &str) -> Result<Claims, CodecError> {
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iat"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => CodecError::Expired,
                _ => CodecError::Malformed(e.to_string()),
            }
        })?;

        // jsonwebtoken only rejects exp < now; a token is already dead at exp
        if Utc::now().timestamp() >= data.claims.exp {
            return Err(CodecError::Expired);
        }

        Ok(data.claims)
    }
}

// ============================================================================
// Tests
// ============================================================================
