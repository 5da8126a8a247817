//! Per-session Streamable HTTP transport
//!
//! Owns the protocol engine of one session and turns HTTP requests into engine
//! calls: content negotiation, JSON or SSE replies, the standalone GET stream and
//! session termination. Lifecycle changes are reported to the caller through
//! [`TransportReply::event`] instead of being applied to the registry here.

use std::{convert::Infallible, sync::Arc};

use axum::{
    body::Bytes,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_stream::{wrappers::UnboundedReceiverStream, StreamExt};
use tracing::{debug, info};

use super::{NotificationChannel, SessionId, SESSION_HEADER};
use crate::errors::json_rpc_http_error;
use crate::mcp::{rpc::is_json_rpc_error, server::McpEngine};
use crate::todoist_client::TaskProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionStatus {
    Pending,
    Open,
    Closed,
}

/// Lifecycle change the router must apply to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Initialized,
    Closed,
}

pub struct TransportReply {
    pub response: Response,
    pub event: Option<SessionEvent>,
}

impl TransportReply {
    fn plain(response: Response) -> Self {
        Self {
            response,
            event: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseMode {
    Json,
    EventStream,
}

pub struct SessionTransport {
    id: SessionId,
    engine: McpEngine,
    channel: NotificationChannel,
    status: RwLock<SessionStatus>,
}

impl SessionTransport {
    /// Builds a transport for a brand new session with a freshly generated id.
    pub fn create(provider: Arc<dyn TaskProvider>) -> Self {
        let channel = NotificationChannel::new();
        Self {
            id: SessionId::generate(),
            engine: McpEngine::new(provider, channel.clone()),
            channel,
            status: RwLock::new(SessionStatus::Pending),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub async fn is_closed(&self) -> bool {
        *self.status.read().await == SessionStatus::Closed
    }

    pub async fn handle_post(&self, headers: &HeaderMap, body: &Bytes) -> TransportReply {
        let status = *self.status.read().await;
        if status == SessionStatus::Closed {
            return TransportReply::plain(session_not_found());
        }

        let Some(mode) = negotiate_post_response(headers) else {
            return TransportReply::plain(json_rpc_http_error(
                StatusCode::NOT_ACCEPTABLE,
                -32000,
                "Not Acceptable: Client must accept application/json or text/event-stream",
            ));
        };

        if !has_json_content_type(headers) {
            return TransportReply::plain(json_rpc_http_error(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                -32000,
                "Unsupported Media Type: Content-Type must be application/json",
            ));
        }

        let payload: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(_) => {
                return TransportReply::plain(json_rpc_http_error(
                    StatusCode::BAD_REQUEST,
                    -32700,
                    "Parse error",
                ))
            }
        };

        let (messages, is_batch) = match payload {
            Value::Array(items) => (items, true),
            single => (vec![single], false),
        };
        if messages.is_empty() {
            return TransportReply::plain(json_rpc_http_error(
                StatusCode::BAD_REQUEST,
                -32600,
                "Invalid Request",
            ));
        }

        let init_count = messages
            .iter()
            .filter(|message| message.get("method").and_then(Value::as_str) == Some("initialize"))
            .count();

        match status {
            SessionStatus::Pending if init_count == 0 => {
                return TransportReply::plain(json_rpc_http_error(
                    StatusCode::BAD_REQUEST,
                    -32000,
                    "Bad Request: Server not initialized",
                ));
            }
            SessionStatus::Pending if is_batch || init_count > 1 => {
                return TransportReply::plain(json_rpc_http_error(
                    StatusCode::BAD_REQUEST,
                    -32600,
                    "Invalid Request: Only one initialization request is allowed",
                ));
            }
            SessionStatus::Open if init_count > 0 => {
                return TransportReply::plain(json_rpc_http_error(
                    StatusCode::BAD_REQUEST,
                    -32600,
                    "Invalid Request: Server already initialized",
                ));
            }
            _ => {}
        }

        let mut responses = Vec::new();
        for message in messages {
            if let Some(response) = self.engine.handle_message(message).await {
                responses.push(response);
            }
        }

        let mut event = None;
        if status == SessionStatus::Pending {
            let handshake_ok = responses
                .first()
                .is_some_and(|response| !is_json_rpc_error(response));
            if handshake_ok {
                let mut current = self.status.write().await;
                if *current == SessionStatus::Pending {
                    *current = SessionStatus::Open;
                    event = Some(SessionEvent::Initialized);
                }
            } else {
                debug!(session_id = %self.id, "initialize rejected by protocol engine");
            }
        }

        let include_session_header = status == SessionStatus::Open || event.is_some();
        let mut response = build_post_response(mode, responses, is_batch);
        if include_session_header {
            self.attach_session_header(&mut response);
        }

        TransportReply { response, event }
    }

    pub async fn handle_get(&self, headers: &HeaderMap) -> TransportReply {
        if self.is_closed().await {
            return TransportReply::plain(session_not_found());
        }

        if !accepts(headers, "text/event-stream") {
            return TransportReply::plain(json_rpc_http_error(
                StatusCode::NOT_ACCEPTABLE,
                -32000,
                "Not Acceptable: Client must accept text/event-stream",
            ));
        }

        let receiver = match self.channel.attach().await {
            Ok(receiver) => receiver,
            Err(_) => {
                return TransportReply::plain(json_rpc_http_error(
                    StatusCode::CONFLICT,
                    -32000,
                    "Conflict: Only one SSE stream is allowed per session",
                ))
            }
        };

        debug!(session_id = %self.id, "standalone stream opened");
        let stream = UnboundedReceiverStream::new(receiver).map(|message| {
            Ok::<Event, Infallible>(Event::default().event("message").data(message.to_string()))
        });
        let mut response = Sse::new(stream)
            .keep_alive(KeepAlive::default())
            .into_response();
        self.attach_session_header(&mut response);

        TransportReply::plain(response)
    }

    pub async fn handle_delete(&self) -> TransportReply {
        if self.is_closed().await {
            return TransportReply::plain(session_not_found());
        }

        self.close().await;
        TransportReply {
            response: StatusCode::OK.into_response(),
            event: Some(SessionEvent::Closed),
        }
    }

    /// Marks the session closed and ends its standalone stream.
    pub async fn close(&self) {
        *self.status.write().await = SessionStatus::Closed;
        self.channel.detach().await;
        info!(session_id = %self.id, "session transport closed");
    }

    fn attach_session_header(&self, response: &mut Response) {
        if let Ok(value) = HeaderValue::from_str(self.id.as_str()) {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
    }
}

fn session_not_found() -> Response {
    json_rpc_http_error(StatusCode::NOT_FOUND, -32001, "Session not found")
}

fn header_text(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_ascii_lowercase)
}

fn accepts(headers: &HeaderMap, media_type: &str) -> bool {
    header_text(headers, header::ACCEPT).is_some_and(|accept| accept.contains(media_type))
}

/// JSON unless the client only lists `text/event-stream`. `None` means nothing acceptable.
fn negotiate_post_response(headers: &HeaderMap) -> Option<ResponseMode> {
    let Some(accept) = header_text(headers, header::ACCEPT) else {
        return Some(ResponseMode::Json);
    };

    if accept.contains("application/json") || accept.contains("*/*") {
        Some(ResponseMode::Json)
    } else if accept.contains("text/event-stream") {
        Some(ResponseMode::EventStream)
    } else {
        None
    }
}

fn has_json_content_type(headers: &HeaderMap) -> bool {
    header_text(headers, header::CONTENT_TYPE)
        .map_or(true, |content_type| content_type.contains("application/json"))
}

fn build_post_response(mode: ResponseMode, responses: Vec<Value>, is_batch: bool) -> Response {
    if responses.is_empty() {
        return StatusCode::ACCEPTED.into_response();
    }

    match mode {
        ResponseMode::Json => {
            let body = if is_batch {
                Value::Array(responses)
            } else {
                responses.into_iter().next().unwrap_or(Value::Null)
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        ResponseMode::EventStream => {
            let events = responses.into_iter().map(|response| {
                Ok::<Event, Infallible>(Event::default().event("message").data(response.to_string()))
            });
            Sse::new(tokio_stream::iter(events)).into_response()
        }
    }
}
