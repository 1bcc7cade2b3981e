//! Authentication.
//! Mission: Verify bearer tokens against the trusted OIDC realm (spec §6).
//! Token issuance, login flows, and the identity provider itself are out of
//! scope — the core only verifies.

pub mod middleware;
pub mod models;
pub mod verifier;

pub use middleware::{auth_middleware, extract_user};
pub use models::AuthUser;
pub use verifier::OidcVerifier;
