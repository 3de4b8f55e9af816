/// Credential endpoints
use actix_web::{web, HttpRequest, HttpResponse};
use validator::Validate;

use crate::{
    error::AuthError,
    handlers::bearer_token,
    models::{AccessTokenResponse, GenerateTokensRequest, RefreshTokenRequest},
    AppState,
};

/// `POST /api/v1/tokens/generate`
pub async fn generate_tokens(
    state: web::Data<AppState>,
    payload: web::Json<GenerateTokensRequest>,
) -> Result<HttpResponse, AuthError> {
    payload.validate()?;

    let pair = state
        .tokens
        .create_tokens(&payload.login, &payload.password)
        .await?;

    Ok(HttpResponse::Ok().json(pair))
}

/// `POST /api/v1/tokens/refresh`
pub async fn refresh_token(
    state: web::Data<AppState>,
    payload: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse, AuthError> {
    payload.validate()?;

    let access_token = state.tokens.refresh_token(&payload.refresh_token).await?;

    Ok(HttpResponse::Ok().json(AccessTokenResponse { access_token }))
}

/// `POST /api/v1/tokens/validate`
pub async fn validate_token(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, AuthError> {
    let token = bearer_token(&req)?;
    state.tokens.validate_access_token(&token).await?;

    Ok(HttpResponse::NoContent().finish())
}
