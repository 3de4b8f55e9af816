//! Shared cryptographic primitives for the trace-auth service
//!
//! - `jwt`: HS256 credential codec (issue / parse access and refresh tokens)
//! - `hash`: SHA-256 helpers for storing token digests
//! - `secret`: signing secret strength checks
//! - `correlation`: trace id extraction from propagation headers

pub mod correlation;
pub mod hash;
pub mod jwt;
pub mod secret;

pub use jwt::{Claims, CodecError, JwtCodec, TokenKind, TokenLifetimes};
pub use secret::{validate_secret_strength, SecretStrength};
