//! Propagates `X-Trace-ID` from the request (or generates one), exposes it to
//! handlers as a `TraceId` extension and echoes it on every response. The
//! rest of the request runs inside a `request` span carrying the id.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info_span, Instrument};
use uuid::Uuid;

pub const TRACE_ID_HEADER: &str = "x-trace-id";

const MAX_TRACE_ID_CHARS: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(pub String);

impl TraceId {
    /// 32 lowercase hex characters.
    pub fn generate() -> Self {
        TraceId(Uuid::new_v4().simple().to_string())
    }

    fn from_header(value: &HeaderValue) -> Option<Self> {
        let value = value.to_str().ok()?.trim();
        let usable = !value.is_empty()
            && value.len() <= MAX_TRACE_ID_CHARS
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        usable.then(|| TraceId(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub async fn trace_id_middleware(mut req: Request, next: Next) -> Response {
    let trace_id = req
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(TraceId::from_header)
        .unwrap_or_else(TraceId::generate);
    req.extensions_mut().insert(trace_id.clone());

    let span = info_span!(
        "request",
        trace_id = %trace_id.as_str(),
        method = %req.method(),
        path = %req.uri().path(),
    );
    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(trace_id.as_str()) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_hex() {
        let id = TraceId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, TraceId::generate());
    }

    #[test]
    fn test_incoming_ids_are_kept_when_sane() {
        let ok = HeaderValue::from_static("abc-123_def");
        assert_eq!(TraceId::from_header(&ok), Some(TraceId("abc-123_def".to_string())));

        let spaces = HeaderValue::from_static("has spaces in it");
        assert_eq!(TraceId::from_header(&spaces), None);

        let long = HeaderValue::from_str(&"a".repeat(200)).unwrap();
        assert_eq!(TraceId::from_header(&long), None);
    }
}
