pub mod identity_client;
pub mod token_service;
pub mod trace_service;

pub use identity_client::{
    HttpIdentityClient, IdentityCheck, IdentityClientError, IdentityVerifier, Verification,
};
pub use token_service::TokenService;
pub use trace_service::TraceService;
