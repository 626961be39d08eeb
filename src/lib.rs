pub mod access;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod session;
pub mod state;
pub mod types;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::database::models::{ApiKey, Campaign, Company, Deal, Entity, Lead, Webhook};
use crate::error::ApiError;
use crate::handlers::protected::{api_keys, auth as auth_handlers, records, usage};
use crate::handlers::public;
use crate::middleware::require_principal;
use crate::state::AppState;

/// The full HTTP surface. Everything under `/api` requires a resolved principal.
pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(auth_routes())
        .route("/api/usage", get(usage::get))
        .merge(entity_routes::<Company>("/api/companies"))
        .merge(entity_routes::<Lead>("/api/leads"))
        .merge(entity_routes::<Deal>("/api/deals"))
        .merge(entity_routes::<Campaign>("/api/campaigns"))
        .merge(entity_routes::<Webhook>("/api/webhooks"))
        .merge(api_key_routes())
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_principal));

    let router = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(protected)
        .fallback(|| async { ApiError::NotFound })
        // Global middleware
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes))
        .layer(cors_layer(&state.config.security));

    let router = if state.config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };

    router.with_state(state)
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/whoami", get(auth_handlers::whoami))
        .route("/api/auth/session", delete(auth_handlers::logout))
}

fn entity_routes<E: Entity>(base: &str) -> Router<AppState> {
    Router::new()
        .route(base, get(records::list::<E>).post(records::create::<E>))
        .route(
            &format!("{}/:id", base),
            get(records::get::<E>)
                .patch(records::update::<E>)
                .delete(records::delete::<E>),
        )
}

fn api_key_routes() -> Router<AppState> {
    Router::new()
        // Keys are minted server side; the generic create does not apply
        .route("/api/api-keys", get(records::list::<ApiKey>).post(api_keys::create))
        .route(
            "/api/api-keys/:id",
            get(records::get::<ApiKey>)
                .patch(records::update::<ApiKey>)
                .delete(records::delete::<ApiKey>),
        )
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
