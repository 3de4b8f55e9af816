/// HTTP handlers
pub mod health;
pub mod tokens;
pub mod trace;

use crate::error::AuthError;
use crate::metrics::metrics_handler;
use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use actix_web::{web, HttpRequest};
use crypto_core::correlation::extract_trace_id;
use opentelemetry::propagation::Extractor;

/// Register every route on the app
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AuthError::Validation(err.to_string()).into()),
    )
    .route("/health", web::get().to(health::health))
    .route("/metrics", web::get().to(metrics_handler))
    .service(
        web::scope("/api/v1")
            .service(
                web::scope("/tokens")
                    .route("/generate", web::post().to(tokens::generate_tokens))
                    .route("/refresh", web::post().to(tokens::refresh_token))
                    .route("/validate", web::post().to(tokens::validate_token)),
            )
            .service(
                web::scope("/trace")
                    .route("/auth", web::post().to(trace::authorize_trace))
                    .route("/check", web::post().to(trace::check_trace)),
            ),
    );
}

/// Token from `Authorization: Bearer <token>` or a bare `Authorization: <token>`
pub(crate) fn bearer_token(req: &HttpRequest) -> Result<String, AuthError> {
    let value = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .ok_or(AuthError::MissingAuthorization)?;

    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ => value,
    };

    if token.is_empty() {
        return Err(AuthError::MissingAuthorization);
    }
    Ok(token.to_string())
}

/// HTTP header extractor for trace context propagation
struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// Trace id from the request's propagation headers
pub(crate) fn request_trace_id(req: &HttpRequest) -> Result<String, AuthError> {
    extract_trace_id(&HeaderExtractor(req.headers())).ok_or(AuthError::MissingTraceContext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_bearer_token_forms() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req).unwrap(), "abc.def.ghi");

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "bearer   abc.def.ghi "))
            .to_http_request();
        assert_eq!(bearer_token(&req).unwrap(), "abc.def.ghi");

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_bearer_token_missing() {
        let req = TestRequest::default().to_http_request();
        assert!(matches!(
            bearer_token(&req),
            Err(AuthError::MissingAuthorization)
        ));

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer "))
            .to_http_request();
        assert!(matches!(
            bearer_token(&req),
            Err(AuthError::MissingAuthorization)
        ));
    }

    #[test]
    fn test_request_trace_id() {
        let req = TestRequest::default()
            .insert_header((
                "traceparent",
                "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            ))
            .to_http_request();
        assert_eq!(
            request_trace_id(&req).unwrap(),
            "4bf92f3577b34da6a3ce929d0e0e4736"
        );

        let req = TestRequest::default()
            .insert_header(("X-B3-TraceId", "80f198ee56343ba864fe8b2a57d3eff7"))
            .insert_header(("X-B3-SpanId", "e457b5a2e4d86bd1"))
            .to_http_request();
        assert_eq!(
            request_trace_id(&req).unwrap(),
            "80f198ee56343ba864fe8b2a57d3eff7"
        );

        let req = TestRequest::default()
            .insert_header((
                "traceparent",
                "00-00000000000000000000000000000000-00f067aa0ba902b7-01",
            ))
            .to_http_request();
        assert!(matches!(
            request_trace_id(&req),
            Err(AuthError::MissingTraceContext)
        ));

        let req = TestRequest::default().to_http_request();
        assert!(matches!(
            request_trace_id(&req),
            Err(AuthError::MissingTraceContext)
        ));
    }
}
