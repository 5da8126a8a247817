use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_inbox_project: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Due {
    #[serde(default)]
    pub string: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub datetime: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub due: Option<Due>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
}

fn default_priority() -> u8 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub project_id: Option<String>,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct NewTask {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

#[async_trait]
pub trait TaskProvider: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, AppError>;
    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, AppError>;
    async fn create_task(&self, task: &NewTask) -> Result<Task, AppError>;
    async fn close_task(&self, task_id: &str) -> Result<(), AppError>;
}

/// Builds a provider bound to one API key; called once per new session.
pub trait TaskProviderFactory: Send + Sync {
    fn connect(&self, api_key: &str) -> Arc<dyn TaskProvider>;
}

#[derive(Debug, Clone)]
pub struct TodoistClientFactory {
    http: reqwest::Client,
    base_url: Url,
}

impl TodoistClientFactory {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| AppError::internal(format!("failed to build http client: {err}")))?;

        Ok(Self { http, base_url })
    }
}

impl TaskProviderFactory for TodoistClientFactory {
    fn connect(&self, api_key: &str) -> Arc<dyn TaskProvider> {
        Arc::new(TodoistClient {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            api_key: Arc::from(api_key),
        })
    }
}

#[derive(Clone)]
pub struct TodoistClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Arc<str>,
}

impl std::fmt::Debug for TodoistClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoistClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl TodoistClient {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, AppError> {
        let response = request
            .bearer_auth(self.api_key.as_ref())
            .send()
            .await
            .map_err(|err| AppError::upstream(0, format!("todoist request failed: {err}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(upstream_status_error(status, &body))
    }
}

fn upstream_status_error(status: StatusCode, body: &str) -> AppError {
    let detail = body.trim();
    let message = if detail.is_empty() {
        format!("todoist responded with {status}")
    } else {
        format!("todoist responded with {status}: {detail}")
    };
    AppError::upstream(status.as_u16(), message)
}

#[async_trait]
impl TaskProvider for TodoistClient {
    async fn list_projects(&self) -> Result<Vec<Project>, AppError> {
        let response = self.send(self.http.get(self.endpoint("projects"))).await?;
        response
            .json::<Vec<Project>>()
            .await
            .map_err(|err| AppError::internal(format!("invalid projects payload: {err}")))
    }

    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, AppError> {
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(project_id) = query.project_id.as_deref() {
            params.push(("project_id", project_id));
        }
        if let Some(filter) = query.filter.as_deref() {
            params.push(("filter", filter));
        }

        let response = self
            .send(self.http.get(self.endpoint("tasks")).query(&params))
            .await?;
        response
            .json::<Vec<Task>>()
            .await
            .map_err(|err| AppError::internal(format!("invalid tasks payload: {err}")))
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, AppError> {
        let response = self
            .send(self.http.post(self.endpoint("tasks")).json(task))
            .await?;
        response
            .json::<Task>()
            .await
            .map_err(|err| AppError::internal(format!("invalid task payload: {err}")))
    }

    async fn close_task(&self, task_id: &str) -> Result<(), AppError> {
        self.send(
            self.http
                .post(self.endpoint(&format!("tasks/{task_id}/close"))),
        )
        .await?;
        Ok(())
    }
}
