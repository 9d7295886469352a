//! Request middleware: trace-id propagation and per-caller rate limiting.

pub mod rate_limit;
pub mod trace_id;

pub use rate_limit::{rate_limit_middleware, RateLimiter};
pub use trace_id::{trace_id_middleware, TraceId, TRACE_ID_HEADER};
