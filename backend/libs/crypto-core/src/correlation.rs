//! Trace context extraction for distributed call chains
//!
//! A trace id identifies one end-to-end request across services. Callers
//! propagate it in one of the standard header formats:
//!
//! ```text
//! traceparent: 00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01   (W3C)
//! b3: 80f198ee56343ba864fe8b2a57d3eff7-e457b5a2e4d86bd1-1                 (B3 single)
//! X-B3-TraceId / X-B3-SpanId                                              (B3 multi)
//! ```
//!
//! Parsing is delegated to the OpenTelemetry propagators. Headers are read
//! through any [`Extractor`], so HTTP and gRPC carriers share this path.

use opentelemetry::propagation::{Extractor, TextMapPropagator};
use opentelemetry::trace::TraceContextExt;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_zipkin::{B3Encoding, Propagator as B3Propagator};

/// Trace id of the remote parent carried in `headers`
///
/// W3C trace context wins over B3. The id is rendered as 32 lowercase hex
/// chars; 64-bit B3 ids are left-padded with zeros. Returns `None` when no
/// format yields a valid span context.
pub fn extract_trace_id(headers: &dyn Extractor) -> Option<String> {
    let w3c = TraceContextPropagator::new();
    let b3 = B3Propagator::with_encoding(B3Encoding::SingleAndMultiHeader);
    let propagators: [&dyn TextMapPropagator; 2] = [&w3c, &b3];

    let trace_id = propagators.into_iter().find_map(|propagator| {
        let cx = propagator.extract(headers);
        let span_context = cx.span().span_context().clone();
        span_context
            .is_valid()
            .then(|| span_context.trace_id().to_string())
    });
    trace_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_traceparent_wins() {
        let carrier = headers(&[
            (
                "traceparent",
                "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            ),
            ("b3", "80f198ee56343ba864fe8b2a57d3eff7-e457b5a2e4d86bd1-1"),
        ]);

        assert_eq!(
            extract_trace_id(&carrier).as_deref(),
            Some("4bf92f3577b34da6a3ce929d0e0e4736")
        );
    }

    #[test]
    fn test_b3_single_header() {
        let carrier = headers(&[("b3", "80f198ee56343ba864fe8b2a57d3eff7-e457b5a2e4d86bd1-1")]);

        assert_eq!(
            extract_trace_id(&carrier).as_deref(),
            Some("80f198ee56343ba864fe8b2a57d3eff7")
        );
    }

    #[test]
    fn test_b3_multi_header_64_bit_id() {
        let carrier = headers(&[
            ("x-b3-traceid", "463ac35c9f6413ad"),
            ("x-b3-spanid", "a2fb4a1d1a96d312"),
        ]);

        assert_eq!(
            extract_trace_id(&carrier).as_deref(),
            Some("0000000000000000463ac35c9f6413ad")
        );
    }

    #[test]
    fn test_invalid_traceparent_falls_through_to_b3() {
        let carrier = headers(&[
            ("traceparent", "garbage"),
            ("b3", "80f198ee56343ba864fe8b2a57d3eff7-e457b5a2e4d86bd1-1"),
        ]);

        assert_eq!(
            extract_trace_id(&carrier).as_deref(),
            Some("80f198ee56343ba864fe8b2a57d3eff7")
        );
    }

    #[test]
    fn test_all_zero_trace_id_rejected() {
        let carrier = headers(&[(
            "traceparent",
            "00-00000000000000000000000000000000-00f067aa0ba902b7-01",
        )]);
        assert!(extract_trace_id(&carrier).is_none());
    }

    #[test]
    fn test_sampling_only_b3_is_ignored() {
        let carrier = headers(&[("b3", "1")]);
        assert!(extract_trace_id(&carrier).is_none());
    }

    #[test]
    fn test_no_headers() {
        assert!(extract_trace_id(&HashMap::<String, String>::new()).is_none());
    }
}
