use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use crate::errors::AppError;
use crate::todoist_client::{
    NewTask, Project, Task, TaskProvider, TaskProviderFactory, TaskQuery,
};

pub fn initialize_body(id: i64) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "clientInfo": {"name": "test-client", "version": "1.0.0"},
            "capabilities": {}
        }
    })
    .to_string()
}

fn task(id: &str, content: &str) -> Task {
    Task {
        id: id.to_string(),
        content: content.to_string(),
        description: String::new(),
        project_id: Some("p1".to_string()),
        priority: 1,
        due: None,
        labels: vec![],
        url: None,
    }
}

#[derive(Default)]
pub struct MockProvider {
    fail: bool,
    pub task_queries: Mutex<Vec<TaskQuery>>,
    pub closed: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), AppError> {
        if self.fail {
            Err(AppError::upstream(503, "service unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TaskProvider for MockProvider {
    async fn list_projects(&self) -> Result<Vec<Project>, AppError> {
        self.check()?;
        Ok(vec![Project {
            id: "p1".to_string(),
            name: "Inbox".to_string(),
            color: Some("grey".to_string()),
            is_favorite: false,
            is_inbox_project: true,
        }])
    }

    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, AppError> {
        self.check()?;
        self.task_queries.lock().await.push(query.clone());
        Ok(vec![task("t1", "Buy milk"), task("t2", "Book dentist")])
    }

    async fn create_task(&self, new_task: &NewTask) -> Result<Task, AppError> {
        self.check()?;
        let mut created = task("t3", &new_task.content);
        created.priority = new_task.priority.unwrap_or(1);
        created.labels = new_task.labels.clone();
        Ok(created)
    }

    async fn close_task(&self, task_id: &str) -> Result<(), AppError> {
        self.check()?;
        self.closed.lock().await.push(task_id.to_string());
        Ok(())
    }
}

pub struct MockFactory;

impl TaskProviderFactory for MockFactory {
    fn connect(&self, _api_key: &str) -> Arc<dyn TaskProvider> {
        Arc::new(MockProvider::default())
    }
}
