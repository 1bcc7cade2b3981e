//! Cross-cutting request middleware.
//!
//! This module provides request logging with latency tracking and
//! request-id assignment. Idempotency middleware lives in
//! [`crate::idempotency`] since it needs the cache client in its state.

pub mod logging;

pub use logging::{current_request_id, request_logging};
