//! Router assembly.
//! Mission: Wire public, protected, and idempotency-guarded routes together
//! the way the teacher split its auth/protected/public sub-routers, merging
//! them behind a single CORS + logging layer (spec §4.2, §4.3, §6).

use std::sync::Arc;

use axum::{
    middleware as axum_mw,
    routing::{delete, get, post, put},
    Router,
};
use axum::error_handling::HandleErrorLayer;
use axum::http::{HeaderValue, StatusCode};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::auth::{auth_middleware, OidcVerifier};
use crate::cache::Cache;
use crate::config::timeouts;
use crate::idempotency::idempotency_middleware;
use crate::listings::ListingOrchestrator;
use crate::middleware::request_logging;
use crate::upload::UploadAuthorizer;

use super::handlers;

/// Everything a fully-wired gateway process needs to build its router.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ListingOrchestrator>,
    pub upload_authorizer: Arc<UploadAuthorizer>,
    pub verifier: Arc<OidcVerifier>,
    pub cache: Cache,
    pub cors_origin: String,
}

pub fn build_router(state: AppState) -> Router {
    let mutating = Router::new()
        .route("/listings", post(handlers::listings::create_listing))
        .route("/listings/:id", put(handlers::listings::update_listing))
        .route("/listings/:id", delete(handlers::listings::delete_listing))
        .with_state(state.orchestrator.clone())
        .merge(
            Router::new()
                .route("/files/presign", post(handlers::presign::presign_upload))
                .with_state(state.upload_authorizer.clone()),
        )
        .layer(axum_mw::from_fn_with_state(state.cache.clone(), idempotency_middleware));

    let reads = Router::new()
        .route("/listings", get(handlers::listings::list_listings))
        .with_state(state.orchestrator.clone());

    let protected = mutating
        .merge(reads)
        .route_layer(axum_mw::from_fn_with_state(state.verifier.clone(), auth_middleware));

    let public = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/listings/:id", get(handlers::listings::get_listing))
        .with_state(state.orchestrator.clone());

    let origin: HeaderValue = state.cors_origin.parse().unwrap_or_else(|_| HeaderValue::from_static("null"));
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderName::from_static("idempotency-key"),
        ]);

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .layer(axum::middleware::from_fn(request_logging))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|_: axum::BoxError| async { StatusCode::REQUEST_TIMEOUT }))
                .layer(TimeoutLayer::new(timeouts::HTTP_OVERALL)),
        )
}
