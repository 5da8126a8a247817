use std::any::Any;

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::TODOIST_API_KEY_VAR;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest {
        code: &'static str,
        message: &'static str,
    },
    #[error("unauthorized: {message}")]
    Unauthorized {
        code: &'static str,
        message: &'static str,
    },
    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },
    #[error("internal error")]
    Internal { code: &'static str, message: String },
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: &'static str) -> Self {
        Self::BadRequest { code, message }
    }

    pub fn unauthorized(code: &'static str, message: &'static str) -> Self {
        Self::Unauthorized { code, message }
    }

    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: "internal_error",
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, code, message.to_string())
            }
            Self::Unauthorized { code, message } => {
                (StatusCode::UNAUTHORIZED, code, message.to_string())
            }
            Self::Upstream { status, message } => {
                tracing::warn!(upstream_status = status, error = %message, "upstream request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_error",
                    "upstream request failed".to_string(),
                )
            }
            Self::Internal { code, message } => {
                tracing::error!(error = %message, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    code,
                    "internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                code: code.to_string(),
                message,
                details: json!({}),
            }),
        )
            .into_response()
    }
}

/// Rejections issued by the `/mcp` router before any session transport is involved.
#[derive(Debug, Error)]
pub enum SessionRejection {
    #[error("{0} is not set")]
    MissingCredential(&'static str),
    #[error("no valid session ID provided")]
    NoValidSession,
    #[error("invalid or missing session ID")]
    InvalidSession,
}

impl SessionRejection {
    pub fn missing_api_key() -> Self {
        Self::MissingCredential(TODOIST_API_KEY_VAR)
    }
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        match self {
            Self::MissingCredential(name) => json_rpc_http_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                -32000,
                &format!("Internal Server Error: {name} is not set"),
            ),
            Self::NoValidSession => json_rpc_http_error(
                StatusCode::BAD_REQUEST,
                -32000,
                "Bad Request: No valid session ID provided",
            ),
            Self::InvalidSession => (
                StatusCode::BAD_REQUEST,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                "Invalid or missing session ID",
            )
                .into_response(),
        }
    }
}

/// JSON-RPC error body with a `null` id, sent with a non-200 HTTP status.
pub fn json_rpc_http_error_body(code: i32, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": {
            "code": code,
            "message": message,
        },
        "id": null,
    })
}

pub fn json_rpc_http_error(status: StatusCode, code: i32, message: &str) -> Response {
    (status, Json(json_rpc_http_error_body(code, message))).into_response()
}

/// Response used by the panic guard wrapped around every request.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic payload".to_string()
    };

    tracing::error!(panic = %detail, "request handler panicked");
    json_rpc_http_error(StatusCode::INTERNAL_SERVER_ERROR, -32603, "Internal error")
}
