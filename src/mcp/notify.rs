//! MCP logging levels and server-initiated `notifications/message` payloads.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const LOGGER_NAME: &str = "todoist";

/// RFC 5424 severities as used by MCP `logging/setLevel`, least severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

#[derive(Debug, Deserialize)]
pub struct SetLevelParams {
    pub level: LogLevel,
}

pub fn log_message(level: LogLevel, data: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "notifications/message",
        "params": {
            "level": level,
            "logger": LOGGER_NAME,
            "data": data,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_order_by_severity() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warning < LogLevel::Emergency);
    }

    #[test]
    fn set_level_params_parse_lowercase() {
        let params: SetLevelParams =
            serde_json::from_value(json!({"level": "warning"})).expect("valid level");
        assert_eq!(params.level, LogLevel::Warning);

        assert!(serde_json::from_value::<SetLevelParams>(json!({"level": "loud"})).is_err());
    }

    #[test]
    fn message_shape() {
        let message = log_message(LogLevel::Info, json!({"tool": "list_tasks"}));

        assert_eq!(message["method"], "notifications/message");
        assert_eq!(message["params"]["level"], "info");
        assert_eq!(message["params"]["logger"], "todoist");
        assert!(message.get("id").is_none());
    }
}
