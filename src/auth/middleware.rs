//! Authentication middleware.
//! Mission: Protect mutating and listing-owner endpoints with bearer auth.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;

use super::{models::AuthUser, verifier::OidcVerifier};

/// Auth middleware that validates the bearer token and attaches the
/// resulting [`AuthUser`] to the request's extensions.
pub async fn auth_middleware(
    State(verifier): State<Arc<OidcVerifier>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::unauthorized("missing authorization token"))?;

    let user = verifier
        .verify(token)
        .await
        .map_err(|_| AppError::unauthorized("invalid or expired token"))?;
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Extract the verified caller from a request (use after [`auth_middleware`]).
pub fn extract_user(req: &Request) -> Option<&AuthUser> {
    req.extensions().get::<AuthUser>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest};

    #[test]
    fn extract_user_returns_none_without_middleware() {
        let req = HttpRequest::new(Body::empty());
        assert!(extract_user(&req).is_none());
    }

    #[test]
    fn extract_user_returns_inserted_user() {
        let mut req = HttpRequest::new(Body::empty());
        let user = AuthUser {
            id: "u1".to_string(),
            username: Some("seller1".to_string()),
            email: None,
            azp: Some("web".to_string()),
            roles: vec![],
        };
        req.extensions_mut().insert(user.clone());
        assert_eq!(extract_user(&req), Some(&user));
    }

    #[test]
    fn auth_error_responses_are_unauthorized() {
        use axum::response::IntoResponse;

        let missing = AppError::unauthorized("missing authorization token").into_response();
        let invalid = AppError::unauthorized("invalid or expired token").into_response();
        assert_eq!(missing.status(), axum::http::StatusCode::UNAUTHORIZED);
        assert_eq!(invalid.status(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
