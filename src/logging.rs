use std::time::Instant;

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::session::SESSION_HEADER;

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_session = header_value(request.headers(), SESSION_HEADER);
    let started_at = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started_at.elapsed().as_millis();
    let session_id = request_session
        .or_else(|| header_value(response.headers(), SESSION_HEADER))
        .unwrap_or_default();

    info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = elapsed_ms,
        session_id = %session_id,
        "request summary"
    );

    match status {
        StatusCode::UNAUTHORIZED => {
            warn!(method = %method, path = %path, "authentication failure");
        }
        StatusCode::BAD_REQUEST if path == "/mcp" => {
            warn!(method = %method, session_id = %session_id, "mcp request rejected");
        }
        _ => {}
    }

    response
}

fn header_value(headers: &axum::http::HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
