//! The per-session Model Context Protocol engine
//!
//! Decodes JSON-RPC messages, negotiates the protocol version on `initialize`,
//! routes tool calls to the Todoist provider and pushes log notifications onto
//! the session's standalone stream.

use std::sync::Arc;

use rust_mcp_sdk::schema::{
    CallToolRequest, Implementation, InitializeRequest, InitializeResult, JsonrpcMessage,
    JsonrpcRequest, ListToolsRequest, ListToolsResult, PingRequest, ServerCapabilities,
    ServerCapabilitiesTools,
};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::tools::{build_tools_list, handle_tools_call};
use crate::errors::AppError;
use crate::mcp::notify::{log_message, LogLevel, SetLevelParams};
use crate::mcp::rpc::{
    app_error_to_json_rpc, is_json_rpc_error, json_rpc_error, json_rpc_result,
    request_id_to_value, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
};
use crate::session::NotificationChannel;
use crate::todoist_client::TaskProvider;

/// Newest first; the first entry is offered when the client asks for an unknown version.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2025-06-18", "2025-03-26", "2024-11-05"];

const SERVER_INSTRUCTIONS: &str =
    "Todoist task management: list projects and tasks, create tasks and complete them.";

/// True for a single JSON-RPC `initialize` request that carries an id.
pub fn is_initialize_request(payload: &Value) -> bool {
    payload.is_object()
        && payload.get("method").and_then(Value::as_str) == Some("initialize")
        && payload.get("id").is_some_and(|id| !id.is_null())
        && serde_json::from_value::<InitializeRequest>(payload.clone()).is_ok()
}

pub struct McpEngine {
    provider: Arc<dyn TaskProvider>,
    channel: NotificationChannel,
    log_level: RwLock<Option<LogLevel>>,
}

impl McpEngine {
    pub fn new(provider: Arc<dyn TaskProvider>, channel: NotificationChannel) -> Self {
        Self {
            provider,
            channel,
            log_level: RwLock::new(None),
        }
    }

    /// Handles one JSON-RPC message; `None` when the message expects no reply.
    pub async fn handle_message(&self, payload: Value) -> Option<Value> {
        if !payload.is_object() {
            return Some(json_rpc_error(None, INVALID_REQUEST, "Invalid Request"));
        }

        let request_id = payload.get("id").cloned();
        let parsed: JsonrpcMessage = match serde_json::from_value(payload) {
            Ok(message) => message,
            Err(_) => return Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request")),
        };

        match parsed {
            JsonrpcMessage::Request(request) => {
                if let Err(error_response) = validate_request_shape(&request) {
                    return Some(error_response);
                }

                let request_id = request_id_to_value(request.id);
                if request.method.trim().is_empty() {
                    return Some(json_rpc_error(Some(request_id), INVALID_REQUEST, "Invalid Request"));
                }

                Some(
                    self.handle_request(
                        Some(request_id),
                        request.method,
                        request.params.map(Value::Object),
                    )
                    .await,
                )
            }
            JsonrpcMessage::Notification(notification) => {
                debug!(method = %notification.method, "notification received");
                None
            }
            JsonrpcMessage::ResultResponse(_) | JsonrpcMessage::ErrorResponse(_) => {
                debug!("client response received");
                None
            }
        }
    }

    pub async fn handle_request(
        &self,
        id: Option<Value>,
        method: String,
        params: Option<Value>,
    ) -> Value {
        let audit_params = redact_audit_params(params.as_ref());

        let response = match method.as_str() {
            "initialize" => match negotiate_protocol_version(params.as_ref()) {
                Ok(version) => json_rpc_result(
                    id,
                    serde_json::to_value(initialize_result(version))
                        .expect("initialize result serialization"),
                ),
                Err(err) => app_error_to_json_rpc(id, err),
            },
            "ping" => json_rpc_result(id, json!({})),
            "tools/list" => json_rpc_result(
                id,
                serde_json::to_value(ListToolsResult {
                    meta: None,
                    next_cursor: None,
                    tools: build_tools_list(),
                })
                .expect("tools list result serialization"),
            ),
            "tools/call" => {
                let tool_name = params
                    .as_ref()
                    .and_then(|value| value.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let response = handle_tools_call(self.provider.as_ref(), id, params).await;
                self.notify_tool_outcome(&tool_name, is_json_rpc_error(&response))
                    .await;
                response
            }
            "logging/setLevel" => self.set_log_level(id, params).await,
            _ => json_rpc_error(id, METHOD_NOT_FOUND, "Method not found"),
        };

        info!(
            method = %method,
            params = %audit_params,
            outcome = if is_json_rpc_error(&response) { "failure" } else { "success" },
            "mcp action audited"
        );

        response
    }

    async fn set_log_level(&self, id: Option<Value>, params: Option<Value>) -> Value {
        let parsed = params.and_then(|value| serde_json::from_value::<SetLevelParams>(value).ok());
        let Some(SetLevelParams { level }) = parsed else {
            return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
        };

        *self.log_level.write().await = Some(level);
        json_rpc_result(id, json!({}))
    }

    async fn notify_tool_outcome(&self, tool: &str, failed: bool) {
        let level = if failed { LogLevel::Error } else { LogLevel::Info };
        let Some(minimum) = *self.log_level.read().await else {
            return;
        };
        if level < minimum {
            return;
        }

        let outcome = if failed { "failure" } else { "success" };
        let delivered = self
            .channel
            .send(log_message(level, json!({ "tool": tool, "outcome": outcome })))
            .await;
        debug!(tool, delivered, "tool outcome notification");
    }
}

fn initialize_result(protocol_version: &str) -> InitializeResult {
    InitializeResult {
        server_info: Implementation {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: None,
            description: None,
            icons: vec![],
            website_url: None,
        },
        capabilities: ServerCapabilities {
            tools: Some(ServerCapabilitiesTools {
                list_changed: Some(false),
            }),
            logging: Some(serde_json::Map::new()),
            ..Default::default()
        },
        protocol_version: protocol_version.to_string(),
        instructions: Some(SERVER_INSTRUCTIONS.to_string()),
        meta: None,
    }
}

pub fn validate_request_shape(request: &JsonrpcRequest) -> Result<(), Value> {
    let payload = serde_json::to_value(request).expect("jsonrpc request serialization");
    let request_id = Some(request_id_to_value(request.id.clone()));

    let valid = match request.method.as_str() {
        "tools/call" => serde_json::from_value::<CallToolRequest>(payload).is_ok(),
        "tools/list" => serde_json::from_value::<ListToolsRequest>(payload).is_ok(),
        "ping" => serde_json::from_value::<PingRequest>(payload).is_ok(),
        "initialize" => serde_json::from_value::<InitializeRequest>(payload).is_ok(),
        _ => true,
    };

    if valid {
        Ok(())
    } else {
        Err(json_rpc_error(request_id, INVALID_PARAMS, "Invalid params"))
    }
}

/// Echoes a supported offered version, otherwise answers with the newest supported one.
pub fn negotiate_protocol_version(params: Option<&Value>) -> Result<&'static str, AppError> {
    let offered_version = params
        .and_then(Value::as_object)
        .and_then(|object| object.get("protocolVersion"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .ok_or_else(|| {
            AppError::bad_request(
                "invalid_protocol_version",
                "initialize params.protocolVersion is required",
            )
        })?;

    Ok(SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .copied()
        .find(|supported| *supported == offered_version)
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0]))
}

pub fn redact_audit_params(params: Option<&Value>) -> Value {
    params.map(redact_audit_value).unwrap_or(Value::Null)
}

pub fn redact_audit_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (key.clone(), redact_audit_value(item))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_audit_value).collect()),
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "authorization" | "bearer" | "api_key" | "apikey" | "credential" | "credentials"
    ) || normalized.contains("token")
        || normalized.contains("secret")
        || normalized.contains("password")
}
