//! Interactive tools exposed via Model Context Protocol
//!
//! Provides `list_projects`, `list_tasks`, `create_task` and `complete_task` by
//! delegating to the session's `TaskProvider`.

use rust_mcp_sdk::{
    macros,
    schema::{CallToolRequestParams, CallToolResult, ContentBlock, TextContent, Tool},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::domain::utils::{
    normalize_content, normalize_id, normalize_labels, normalize_limit, normalize_priority,
    optional_text,
};
use crate::errors::AppError;
use crate::mcp::rpc::{
    app_error_to_json_rpc, json_rpc_error, json_rpc_error_with_data, json_rpc_result,
    INVALID_PARAMS, METHOD_NOT_FOUND,
};
use crate::todoist_client::{NewTask, TaskProvider, TaskQuery};

#[macros::mcp_tool(name = "list_projects", description = "List Todoist projects")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct ListProjectsTool {
    pub limit: Option<u32>,
}

#[macros::mcp_tool(
    name = "list_tasks",
    description = "List active Todoist tasks, optionally by project or Todoist filter query"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct ListTasksTool {
    pub project_id: Option<String>,
    pub filter: Option<String>,
    pub limit: Option<u32>,
}

#[macros::mcp_tool(name = "create_task", description = "Create a Todoist task")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct CreateTaskTool {
    pub content: String,
    pub description: Option<String>,
    pub project_id: Option<String>,
    pub due_string: Option<String>,
    pub priority: Option<u32>,
    pub labels: Option<Vec<String>>,
}

#[macros::mcp_tool(name = "complete_task", description = "Mark a Todoist task as completed")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct CompleteTaskTool {
    pub task_id: String,
}

pub fn build_tools_list() -> Vec<Tool> {
    vec![
        ListProjectsTool::tool(),
        ListTasksTool::tool(),
        CreateTaskTool::tool(),
        CompleteTaskTool::tool(),
    ]
}

pub fn build_task_query(args: &ListTasksTool) -> Result<TaskQuery, AppError> {
    Ok(TaskQuery {
        project_id: normalize_id(args.project_id.clone(), "invalid_project_id")?,
        filter: optional_text(args.filter.clone()),
    })
}

pub fn build_new_task(args: CreateTaskTool) -> Result<NewTask, AppError> {
    Ok(NewTask {
        content: normalize_content(&args.content)?,
        description: optional_text(args.description),
        project_id: normalize_id(args.project_id, "invalid_project_id")?,
        due_string: optional_text(args.due_string),
        priority: normalize_priority(args.priority)?,
        labels: normalize_labels(args.labels),
    })
}

fn parse_arguments<T: DeserializeOwned>(arguments: Option<Map<String, Value>>) -> Option<T> {
    serde_json::from_value(Value::Object(arguments.unwrap_or_default())).ok()
}

fn tool_result(id: Option<Value>, summary: String, structured: Map<String, Value>) -> Value {
    json_rpc_result(
        id,
        serde_json::to_value(CallToolResult {
            content: vec![ContentBlock::from(TextContent::new(summary, None, None))],
            is_error: None,
            meta: None,
            structured_content: Some(structured),
        })
        .expect("tool result serialization"),
    )
}

fn listing<T: Serialize>(key: &str, items: Vec<T>, limit: usize) -> (usize, usize, Map<String, Value>) {
    let total = items.len();
    let items = items.into_iter().take(limit).collect::<Vec<_>>();
    let returned = items.len();

    let structured = Map::from_iter([
        (key.to_string(), json!(items)),
        ("total".to_string(), json!(total)),
        ("returned".to_string(), json!(returned)),
        ("truncated".to_string(), json!(total > returned)),
    ]);
    (total, returned, structured)
}

pub async fn handle_tools_call(
    provider: &dyn TaskProvider,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };

    match tool_call.name.as_str() {
        "list_projects" => {
            let Some(args) = parse_arguments::<ListProjectsTool>(tool_call.arguments) else {
                return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
            };
            let limit = match normalize_limit(args.limit) {
                Ok(value) => value,
                Err(err) => return app_error_to_json_rpc(id, err),
            };

            match provider.list_projects().await {
                Ok(projects) => {
                    let (total, returned, structured) = listing("projects", projects, limit);
                    tool_result(id, format!("Returned {returned} of {total} projects"), structured)
                }
                Err(err) => app_error_to_json_rpc(id, err),
            }
        }
        "list_tasks" => {
            let Some(args) = parse_arguments::<ListTasksTool>(tool_call.arguments) else {
                return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
            };
            let query = match build_task_query(&args) {
                Ok(query) => query,
                Err(err) => return app_error_to_json_rpc(id, err),
            };
            let limit = match normalize_limit(args.limit) {
                Ok(value) => value,
                Err(err) => return app_error_to_json_rpc(id, err),
            };

            match provider.list_tasks(&query).await {
                Ok(tasks) => {
                    let (total, returned, structured) = listing("tasks", tasks, limit);
                    tool_result(id, format!("Returned {returned} of {total} tasks"), structured)
                }
                Err(err) => app_error_to_json_rpc(id, err),
            }
        }
        "create_task" => {
            let Some(args) = parse_arguments::<CreateTaskTool>(tool_call.arguments) else {
                return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
            };
            let new_task = match build_new_task(args) {
                Ok(task) => task,
                Err(err) => return app_error_to_json_rpc(id, err),
            };

            match provider.create_task(&new_task).await {
                Ok(task) => tool_result(
                    id,
                    format!("Created task {}: {}", task.id, task.content),
                    Map::from_iter([("task".to_string(), json!(task))]),
                ),
                Err(err) => app_error_to_json_rpc(id, err),
            }
        }
        "complete_task" => {
            let Some(args) = parse_arguments::<CompleteTaskTool>(tool_call.arguments) else {
                return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
            };
            let task_id = match normalize_id(Some(args.task_id), "invalid_task_id") {
                Ok(Some(task_id)) => task_id,
                Ok(None) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
                Err(err) => return app_error_to_json_rpc(id, err),
            };

            match provider.close_task(&task_id).await {
                Ok(()) => tool_result(
                    id,
                    format!("Completed task {task_id}"),
                    Map::from_iter([
                        ("task_id".to_string(), json!(task_id)),
                        ("completed".to_string(), json!(true)),
                    ]),
                ),
                Err(err) => app_error_to_json_rpc(id, err),
            }
        }
        _ => json_rpc_error_with_data(
            id,
            METHOD_NOT_FOUND,
            "Method not found",
            Some(json!({
                "code": "tool_not_found",
                "message": "unknown tool name",
                "details": {
                    "name": tool_call.name,
                },
            })),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;

    async fn call(provider: &MockProvider, params: Value) -> Value {
        handle_tools_call(provider, Some(json!(1)), Some(params)).await
    }

    #[test]
    fn tools_list_names() {
        let names: Vec<String> = build_tools_list().into_iter().map(|tool| tool.name).collect();
        assert_eq!(
            names,
            vec!["list_projects", "list_tasks", "create_task", "complete_task"]
        );
    }

    #[test]
    fn new_task_is_normalized() {
        let task = build_new_task(CreateTaskTool {
            content: "  Call the bank ".to_string(),
            description: Some("   ".to_string()),
            project_id: Some("p1".to_string()),
            due_string: Some("tomorrow 9am".to_string()),
            priority: Some(3),
            labels: Some(vec!["finance".to_string()]),
        })
        .expect("task should build");

        assert_eq!(task.content, "Call the bank");
        assert_eq!(task.description, None);
        assert_eq!(task.priority, Some(3));
        assert_eq!(task.labels, vec!["finance".to_string()]);
    }

    #[test]
    fn new_task_rejects_invalid_priority() {
        let err = build_new_task(CreateTaskTool {
            content: "Call the bank".to_string(),
            description: None,
            project_id: None,
            due_string: None,
            priority: Some(9),
            labels: None,
        })
        .expect_err("expected invalid priority");

        assert!(err.to_string().contains("bad request"));
    }

    #[tokio::test]
    async fn list_tasks_truncates_to_limit() {
        let provider = MockProvider::default();
        let response = call(
            &provider,
            json!({"name": "list_tasks", "arguments": {"limit": 1}}),
        )
        .await;

        let structured = &response["result"]["structuredContent"];
        assert_eq!(structured["returned"], 1);
        assert_eq!(structured["total"], 2);
        assert_eq!(structured["truncated"], true);
        assert!(response["result"]["content"].is_array());
    }

    #[tokio::test]
    async fn list_tasks_passes_query_to_provider() {
        let provider = MockProvider::default();
        call(
            &provider,
            json!({"name": "list_tasks", "arguments": {"project_id": "p2", "filter": " today "}}),
        )
        .await;

        let queries = provider.task_queries.lock().await;
        assert_eq!(
            queries.as_slice(),
            &[TaskQuery {
                project_id: Some("p2".to_string()),
                filter: Some("today".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn create_task_returns_created_task() {
        let provider = MockProvider::default();
        let response = call(
            &provider,
            json!({"name": "create_task", "arguments": {"content": "Water plants", "priority": 2}}),
        )
        .await;

        assert_eq!(
            response["result"]["structuredContent"]["task"]["content"],
            "Water plants"
        );
        assert_eq!(response["result"]["structuredContent"]["task"]["priority"], 2);
    }

    #[tokio::test]
    async fn create_task_requires_content() {
        let provider = MockProvider::default();
        let response = call(&provider, json!({"name": "create_task", "arguments": {}})).await;

        assert_eq!(response["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn complete_task_rejects_path_like_ids() {
        let provider = MockProvider::default();
        let response = call(
            &provider,
            json!({"name": "complete_task", "arguments": {"task_id": "1/../2"}}),
        )
        .await;

        assert_eq!(response["error"]["code"], INVALID_PARAMS);
        assert_eq!(response["error"]["data"]["code"], "invalid_task_id");
        assert!(provider.closed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn complete_task_closes_task() {
        let provider = MockProvider::default();
        let response = call(
            &provider,
            json!({"name": "complete_task", "arguments": {"task_id": "t1"}}),
        )
        .await;

        assert_eq!(response["result"]["structuredContent"]["completed"], true);
        assert_eq!(provider.closed.lock().await.as_slice(), &["t1".to_string()]);
    }

    #[tokio::test]
    async fn upstream_failure_is_internal_error() {
        let provider = MockProvider::failing();
        let response = call(&provider, json!({"name": "list_projects", "arguments": {}})).await;

        assert_eq!(response["error"]["code"], -32603);
        assert_eq!(response["error"]["data"]["code"], "upstream_error");
    }

    #[tokio::test]
    async fn unknown_tool_returns_tool_not_found_data() {
        let provider = MockProvider::default();
        let response = call(&provider, json!({"name": "delete_everything", "arguments": {}})).await;

        assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(response["error"]["data"]["code"], "tool_not_found");
    }

    #[tokio::test]
    async fn malformed_arguments_return_invalid_params() {
        let provider = MockProvider::default();
        let response = call(
            &provider,
            json!({"name": "list_tasks", "arguments": {"limit": "many"}}),
        )
        .await;

        assert_eq!(response["error"]["code"], INVALID_PARAMS);
    }
}
