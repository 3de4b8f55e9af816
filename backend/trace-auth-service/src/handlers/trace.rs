/// Trace binding endpoints
///
/// The trace id comes from the propagation headers of the request itself,
/// never from the body.
use actix_web::{web, HttpRequest, HttpResponse};

use crate::{
    error::AuthError,
    handlers::{bearer_token, request_trace_id},
    AppState,
};

/// `POST /api/v1/trace/auth`
pub async fn authorize_trace(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, AuthError> {
    let token = bearer_token(&req)?;
    let trace_id = request_trace_id(&req)?;

    state.traces.authorize_trace(&trace_id, &token).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// `POST /api/v1/trace/check`
pub async fn check_trace(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, AuthError> {
    let token = bearer_token(&req)?;
    let trace_id = request_trace_id(&req)?;

    state.traces.check_trace_auth(&trace_id, &token).await?;

    Ok(HttpResponse::NoContent().finish())
}
