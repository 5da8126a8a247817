//! JSON-RPC protocol representations and formatting utilities
//!
//! Maps internal `AppError`s onto JSON-RPC error payloads and builds result envelopes.

use rust_mcp_sdk::schema::{
    JsonrpcErrorResponse, JsonrpcResultResponse, RequestId, Result as McpResult, RpcError,
};
use serde_json::{json, Value};

use crate::errors::AppError;

pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

pub fn is_json_rpc_error(value: &Value) -> bool {
    value.get("error").is_some()
}

pub fn app_error_to_json_rpc(id: Option<Value>, err: AppError) -> Value {
    match err {
        AppError::BadRequest { code, message } => json_rpc_error_with_data(
            id,
            INVALID_PARAMS,
            "Invalid params",
            Some(json!({
                "code": code,
                "message": message,
                "details": {}
            })),
        ),
        AppError::Unauthorized { code, message } => json_rpc_error_with_data(
            id,
            -32001,
            "Unauthorized",
            Some(json!({
                "code": code,
                "message": message,
                "details": {}
            })),
        ),
        AppError::Upstream { status, message } => {
            tracing::warn!(upstream_status = status, error = %message, "todoist call failed");
            json_rpc_error_with_data(
                id,
                INTERNAL_ERROR,
                "Internal error",
                Some(json!({
                    "code": "upstream_error",
                    "message": "todoist request failed",
                    "details": { "status": status }
                })),
            )
        }
        AppError::Internal { message, .. } => {
            tracing::error!(error = %message, "mcp call failed with internal error");
            json_rpc_error(id, INTERNAL_ERROR, "Internal error")
        }
    }
}

pub fn json_rpc_error(id: Option<Value>, code: i32, message: &str) -> Value {
    json_rpc_error_with_data(id, code, message, None)
}

pub fn json_rpc_error_with_data(
    id: Option<Value>,
    code: i32,
    message: &str,
    data: Option<Value>,
) -> Value {
    let response = JsonrpcErrorResponse::new(
        RpcError {
            code: i64::from(code),
            data,
            message: message.to_string(),
        },
        id.as_ref().and_then(value_to_request_id),
    );
    serde_json::to_value(response).expect("jsonrpc error response serialization")
}

pub fn json_rpc_result(id: Option<Value>, result: Value) -> Value {
    if let Some(request_id) = id.as_ref().and_then(value_to_request_id) {
        let extra = result.as_object().cloned();
        let response = JsonrpcResultResponse::new(request_id, McpResult { meta: None, extra });
        return serde_json::to_value(response).expect("jsonrpc result response serialization");
    }

    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub fn value_to_request_id(value: &Value) -> Option<RequestId> {
    if let Some(string_id) = value.as_str() {
        return Some(RequestId::String(string_id.to_string()));
    }

    value.as_i64().map(RequestId::Integer)
}

pub fn request_id_to_value(id: RequestId) -> Value {
    match id {
        RequestId::String(value) => Value::String(value),
        RequestId::Integer(value) => Value::Number(value.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_maps_to_invalid_params_with_code() {
        let value = app_error_to_json_rpc(
            Some(json!(3)),
            AppError::bad_request("invalid_limit", "limit out of range"),
        );

        assert_eq!(value["id"], 3);
        assert_eq!(value["error"]["code"], INVALID_PARAMS);
        assert_eq!(value["error"]["data"]["code"], "invalid_limit");
    }

    #[test]
    fn upstream_maps_to_internal_error_with_status() {
        let value = app_error_to_json_rpc(
            Some(json!("req-1")),
            AppError::upstream(503, "unavailable"),
        );

        assert_eq!(value["id"], "req-1");
        assert_eq!(value["error"]["code"], INTERNAL_ERROR);
        assert_eq!(value["error"]["data"]["details"]["status"], 503);
    }

    #[test]
    fn result_envelope_keeps_fields() {
        let value = json_rpc_result(Some(json!(9)), json!({"answer": 42}));

        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 9);
        assert_eq!(value["result"]["answer"], 42);
        assert!(!is_json_rpc_error(&value));
    }
}
