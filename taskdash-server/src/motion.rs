//! Motion API client: paginated fetch-all of the user's tasks.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::Duration;
use taskdash_core::Task;
use tracing::{debug, info};

use crate::error::{DashboardError, FetchError};

pub const DEFAULT_BASE_URL: &str = "https://api.usemotion.com/v1";

/// Anything that can produce the full task list in one go.
///
/// A fetch either returns every page or fails; partial results are dropped.
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn fetch_tasks(&self) -> Result<Vec<Task>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct TasksPage {
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Debug, Default, Deserialize)]
struct PageMeta {
    #[serde(rename = "nextCursor", default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MotionClient {
    api_key: String,
    base_url: String,
    max_pages: usize,
    http: reqwest::Client,
}

impl MotionClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
        max_pages: usize,
    ) -> Result<Self, DashboardError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DashboardError::Configuration(format!("building HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_pages: max_pages.max(1),
            http,
        })
    }

    fn tasks_url(&self) -> String {
        format!("{}/tasks", self.base_url)
    }

    fn tasks_request(&self, cursor: Option<&str>) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .get(self.tasks_url())
            .header("X-API-Key", &self.api_key)
            .header(CONTENT_TYPE, "application/json");
        if let Some(cursor) = cursor {
            req = req.query(&[("cursor", cursor)]);
        }
        req
    }

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<TasksPage, FetchError> {
        let resp = self
            .tasks_request(cursor)
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(FetchError::Body)?;
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        serde_json::from_slice(&body).map_err(FetchError::Decode)
    }

    /// One unpaginated request to check the key is accepted.
    pub async fn validate_api_key(&self) -> Result<(), FetchError> {
        info!(url = %self.tasks_url(), "validating API key");
        if std::env::var("LOG_API_KEYS").is_ok_and(|v| v == "true") {
            if let Some(prefix) = self.api_key.get(..4) {
                info!(first_chars = prefix, "API key prefix");
            }
        } else {
            debug!(length = self.api_key.len(), "API key loaded");
        }

        let resp = self
            .tasks_request(None)
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        info!("API key accepted");
        Ok(())
    }
}

#[async_trait]
impl TaskSource for MotionClient {
    async fn fetch_tasks(&self) -> Result<Vec<Task>, FetchError> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;

        for page_no in 1..=self.max_pages {
            let page = self.fetch_page(cursor.as_deref()).await?;
            debug!(page = page_no, count = page.tasks.len(), "fetched task page");
            all.extend(page.tasks);

            match page.meta.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => return Ok(all),
            }
        }

        Err(FetchError::TooManyPages {
            max_pages: self.max_pages,
        })
    }
}
