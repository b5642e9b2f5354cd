//! Request correlation for structured logs
//!
//! Every request gets a short trace id; the logging middleware emits one
//! entry line and one exit line per request.

mod trace_context;

pub use trace_context::{generate_trace_id, RequestSpan, TraceContext};
