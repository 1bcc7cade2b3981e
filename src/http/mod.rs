//! HTTP surface.
//! Mission: Assemble the gateway's router from public, protected, and
//! idempotency-guarded routes (spec §4.2, §4.3, §6).

pub mod handlers;
pub mod routes;

pub use routes::{build_router, AppState};
