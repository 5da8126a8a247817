use std::sync::Arc;

use axum::{
    http::{header, HeaderName, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
};

pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod session;
pub mod todoist_client;

#[cfg(test)]
mod testing;

use session::{SessionRegistry, SESSION_HEADER};
use todoist_client::TaskProviderFactory;

#[derive(Clone)]
pub struct AppState {
    pub api_token: Option<Arc<str>>,
    pub todoist_api_key: Option<Arc<str>>,
    pub provider_factory: Arc<dyn TaskProviderFactory>,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(
        api_token: Option<String>,
        todoist_api_key: Option<String>,
        provider_factory: Arc<dyn TaskProviderFactory>,
    ) -> Self {
        Self {
            api_token: api_token.map(Arc::<str>::from),
            todoist_api_key: todoist_api_key.map(Arc::<str>::from),
            provider_factory,
            sessions: SessionRegistry::new(),
        }
    }
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let session_header = HeaderName::from_static(SESSION_HEADER);
    let mut allowed_headers = vec![header::CONTENT_TYPE, session_header.clone()];
    if state.api_token.is_some() {
        allowed_headers.push(header::AUTHORIZATION);
    }

    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(allowed_headers)
        .expose_headers([session_header])
}

pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/mcp",
            post(http::handlers::mcp_post)
                .get(http::handlers::mcp_get)
                .delete(http::handlers::mcp_delete),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_token,
        ));

    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .merge(protected)
        .layer(CatchPanicLayer::custom(errors::panic_response))
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .layer(cors_layer(&state))
        .with_state(state)
}
