use sha2::{Digest, Sha256};

/// Compute SHA256 hash of input bytes
pub fn sha256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hasher.finalize().into()
}

/// Hex-encoded SHA-256 digest of a token
///
/// Used wherever a credential has to be stored or compared without keeping
/// the raw string around (trace bindings, log correlation).
pub fn hash_token(token: &str) -> String {
    hex::encode(sha256(token.as_bytes()))
}
