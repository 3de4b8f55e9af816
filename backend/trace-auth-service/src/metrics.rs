use actix_web::{HttpResponse, Responder};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, TextEncoder};

/// Handler that serialises Prometheus metrics in text format.
pub async fn metrics_handler() -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => HttpResponse::Ok()
            .content_type(encoder.format_type())
            .body(buffer),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

/// Force registration of every counter so they appear before first use
pub fn init_metrics() {
    Lazy::force(&TOKENS_ISSUED_TOTAL);
    Lazy::force(&TOKEN_OPERATIONS_TOTAL);
    Lazy::force(&TRACE_OPERATIONS_TOTAL);
}

/// Build and register a counter family
///
/// A registration failure keeps the counter usable but unexported. A counter
/// that cannot be built at all is `None` and its recordings are dropped.
fn register_counter_vec(name: &str, help: &str, labels: &[&str]) -> Option<IntCounterVec> {
    let counter = match IntCounterVec::new(Opts::new(name, help), labels) {
        Ok(counter) => counter,
        Err(e) => {
            tracing::error!("failed to create {} counter: {}", name, e);
            return None;
        }
    };

    if let Err(e) = prometheus::default_registry().register(Box::new(counter.clone())) {
        tracing::error!("failed to register {} counter: {}", name, e);
    }
    Some(counter)
}

/// Credentials issued, by kind (`access` | `refresh`)
static TOKENS_ISSUED_TOTAL: Lazy<Option<IntCounterVec>> = Lazy::new(|| {
    register_counter_vec(
        "trace_auth_tokens_issued_total",
        "Total number of credentials issued",
        &["kind"],
    )
});

/// Orchestrator outcomes, by operation and result label
static TOKEN_OPERATIONS_TOTAL: Lazy<Option<IntCounterVec>> = Lazy::new(|| {
    register_counter_vec(
        "trace_auth_token_operations_total",
        "Token operations by outcome",
        &["operation", "outcome"],
    )
});

static TRACE_OPERATIONS_TOTAL: Lazy<Option<IntCounterVec>> = Lazy::new(|| {
    register_counter_vec(
        "trace_auth_trace_operations_total",
        "Trace binding operations by outcome",
        &["operation", "outcome"],
    )
});

fn inc(counter: &Lazy<Option<IntCounterVec>>, labels: &[&str]) {
    if let Some(counter) = counter.as_ref() {
        counter.with_label_values(labels).inc();
    }
}

pub fn record_token_issued(kind: crypto_core::TokenKind) {
    inc(&TOKENS_ISSUED_TOTAL, &[kind.as_str()]);
}

pub fn record_token_operation(operation: &str, outcome: &str) {
    inc(&TOKEN_OPERATIONS_TOTAL, &[operation, outcome]);
}

pub fn record_trace_operation(operation: &str, outcome: &str) {
    inc(&TRACE_OPERATIONS_TOTAL, &[operation, outcome]);
}
