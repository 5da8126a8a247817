//! Axum HTTP handlers for the web server
//!
//! `/mcp` routing: resumes an existing session, creates one for an `initialize`
//! request, or rejects. Protocol work is left to the session's transport.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::errors::SessionRejection;
use crate::mcp::server::is_initialize_request;
use crate::session::{SessionEvent, SessionHeader, SessionTransport, TransportReply};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub mcp_endpoint: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn discovery() -> Json<DiscoveryResponse> {
    Json(DiscoveryResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        mcp_endpoint: "/mcp",
    })
}

pub async fn mcp_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let transport = match SessionHeader::read(&headers) {
        SessionHeader::Present(session_id) => match state.sessions.get(&session_id) {
            Some(transport) => transport,
            None => return SessionRejection::NoValidSession.into_response(),
        },
        SessionHeader::Unreadable => return SessionRejection::NoValidSession.into_response(),
        SessionHeader::Absent => {
            let is_init = serde_json::from_slice::<Value>(&body)
                .map(|payload| is_initialize_request(&payload))
                .unwrap_or(false);
            if !is_init {
                return SessionRejection::NoValidSession.into_response();
            }

            let Some(api_key) = state.todoist_api_key.as_deref() else {
                error!("TODOIST_API_KEY is not set; refusing to create session");
                return SessionRejection::missing_api_key().into_response();
            };

            Arc::new(SessionTransport::create(
                state.provider_factory.connect(api_key),
            ))
        }
    };

    let reply = transport.handle_post(&headers, &body).await;
    apply_event(&state, &transport, reply)
}

pub async fn mcp_get(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(transport) = live_session(&state, &headers) else {
        return SessionRejection::InvalidSession.into_response();
    };

    let reply = transport.handle_get(&headers).await;
    apply_event(&state, &transport, reply)
}

pub async fn mcp_delete(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(transport) = live_session(&state, &headers) else {
        return SessionRejection::InvalidSession.into_response();
    };

    let reply = transport.handle_delete().await;
    apply_event(&state, &transport, reply)
}

fn live_session(state: &AppState, headers: &HeaderMap) -> Option<Arc<SessionTransport>> {
    SessionHeader::read(headers)
        .session_id()
        .and_then(|session_id| state.sessions.get(&session_id))
}

/// Applies the transport's lifecycle report to the registry and yields its response.
fn apply_event(state: &AppState, transport: &Arc<SessionTransport>, reply: TransportReply) -> Response {
    match reply.event {
        Some(SessionEvent::Initialized) => {
            if state.sessions.insert(Arc::clone(transport)) {
                info!(
                    session_id = %transport.id(),
                    live_sessions = state.sessions.len(),
                    "session initialized"
                );
            }
        }
        Some(SessionEvent::Closed) => {
            if state.sessions.remove(transport.id()).is_some() {
                info!(
                    session_id = %transport.id(),
                    live_sessions = state.sessions.len(),
                    "session closed"
                );
            }
        }
        None => {}
    }

    reply.response
}
