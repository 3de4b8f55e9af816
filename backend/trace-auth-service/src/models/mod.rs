/// Request and response payloads
pub mod token;

pub use token::{AccessTokenResponse, GenerateTokensRequest, RefreshTokenRequest, TokenPair};
