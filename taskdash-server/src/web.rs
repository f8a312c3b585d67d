//! HTTP surface: the HTML dashboard, its JSON feed, and a cache status probe.
//!
//! - `GET /` — dashboard page rendered from `index.html`
//! - `GET /api/dashboard-data` — `{ currentTask, nextTask }`
//! - `GET /api/status` — `{ lastUpdate, taskCount }`

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, Json};
use axum::routing::get;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use taskdash_core::{
    DashboardData, TimedItem, format_countdown, format_local_date, format_local_time, format_until,
    progress_percent,
};
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::service::{CacheStatus, TaskService};

const FETCH_FAILED: &str = "Error fetching task data";

const DATE: &str = "{{date}}";
const CURRENT: &str = "{{current}}";
const NEXT: &str = "{{next}}";

/// The dashboard page. `{{date}}`, `{{current}}` and `{{next}}` are replaced
/// with rendered fragments on every request.
#[derive(Debug, Clone)]
pub struct PageTemplate {
    source: String,
}

impl PageTemplate {
    pub fn load(templates_dir: &Path) -> Result<Self> {
        let path = templates_dir.join("index.html");
        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("error loading template {}", path.display()))?;
        Ok(Self { source })
    }

    #[cfg(test)]
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Fill placeholders in a single left-to-right pass. Inserted fragments
    /// are never rescanned, so a task name containing `{{next}}` stays text.
    pub fn render(&self, data: &DashboardData, now: DateTime<Utc>, tz: Tz) -> String {
        let mut out = String::with_capacity(self.source.len() + 512);
        let mut rest = self.source.as_str();

        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            let fragment = if tail.starts_with(DATE) {
                Some((DATE, html_escape(&format_local_date(now, tz))))
            } else if tail.starts_with(CURRENT) {
                Some((CURRENT, render_current(data.current_task.as_ref(), now, tz)))
            } else if tail.starts_with(NEXT) {
                Some((NEXT, render_next(data.next_task.as_ref(), now, tz)))
            } else {
                None
            };

            match fragment {
                Some((placeholder, html)) => {
                    out.push_str(&html);
                    rest = &tail[placeholder.len()..];
                }
                None => {
                    out.push_str("{{");
                    rest = &tail[2..];
                }
            }
        }

        out.push_str(rest);
        out
    }
}

fn render_current(item: Option<&TimedItem>, now: DateTime<Utc>, tz: Tz) -> String {
    let Some(item) = item else {
        return format!(
            r#"<section class="task current empty"><h2>No current task</h2><p class="clock">{clock}</p></section>"#,
            clock = format_local_time(now, tz),
        );
    };
    let progress = progress_percent(item.start, item.end, now);
    format!(
        concat!(
            r#"<section class="task current" data-id="{id}" data-start="{start_iso}" data-end="{end_iso}" data-progress="{progress}">"#,
            r#"<h2>{name}</h2><p class="window">{start} – {end}</p>"#,
            r#"<progress max="100" value="{progress}">{progress}%</progress>"#,
            r#"<p class="countdown">{left}</p></section>"#,
        ),
        id = html_escape(&item.id),
        start_iso = item.start.to_rfc3339(),
        end_iso = item.end.to_rfc3339(),
        progress = progress,
        name = html_escape(&item.name),
        start = format_local_time(item.start, tz),
        end = format_local_time(item.end, tz),
        left = format_countdown(item.end - now),
    )
}

fn render_next(item: Option<&TimedItem>, now: DateTime<Utc>, tz: Tz) -> String {
    let Some(item) = item else {
        return r#"<section class="task next empty"><h3>Nothing scheduled</h3></section>"#
            .to_string();
    };
    format!(
        r#"<section class="task next" data-id="{id}" data-start="{start_iso}"><h3>{name}</h3><p class="window">{start}</p><p class="countdown">{until}</p></section>"#,
        id = html_escape(&item.id),
        start_iso = item.start.to_rfc3339(),
        name = html_escape(&item.name),
        start = format_local_time(item.start, tz),
        until = format_until(item.start - now),
    )
}

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TaskService>,
    pub page: Arc<PageTemplate>,
    pub timezone: Tz,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/api/dashboard-data", get(handle_dashboard_data))
        .route("/api/status", get(handle_status))
        .with_state(state)
}

async fn handle_index(
    State(state): State<AppState>,
) -> Result<Html<String>, (StatusCode, &'static str)> {
    debug!(path = "/", "handling request");
    let now = Utc::now();
    let data = state.service.dashboard_data_at(now).await.map_err(|e| {
        error!(error = %e, "dashboard data unavailable");
        (StatusCode::INTERNAL_SERVER_ERROR, FETCH_FAILED)
    })?;
    Ok(Html(state.page.render(&data, now, state.timezone)))
}

async fn handle_dashboard_data(
    State(state): State<AppState>,
) -> Result<Json<DashboardData>, (StatusCode, &'static str)> {
    debug!(path = "/api/dashboard-data", "handling request");
    let data = state.service.dashboard_data().await.map_err(|e| {
        error!(error = %e, "dashboard data unavailable");
        (StatusCode::INTERNAL_SERVER_ERROR, FETCH_FAILED)
    })?;
    Ok(Json(data))
}

async fn handle_status(State(state): State<AppState>) -> Json<CacheStatus> {
    Json(state.service.status().await)
}

/// Serve until `cancel` fires, then drain in-flight requests.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    cancel: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr().context("reading listener address")?;
    info!(address = %addr, "server started");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

/// Log uptime every `every` until cancelled.
pub async fn run_heartbeat(cancel: CancellationToken, every: Duration) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval_at(started + every, every);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("stopping heartbeat");
                break;
            }
            _ = ticker.tick() => {
                info!(uptime = ?started.elapsed(), "heartbeat");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::TaskSource;
    use crate::service::tests::CountingSource;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::net::SocketAddr;
    use std::sync::atomic::Ordering;

    const PAGE: &str = "<main><p>{{date}}</p>{{current}}{{next}}</main>";

    fn item(id: &str, name: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> TimedItem {
        TimedItem {
            id: id.to_string(),
            name: name.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn test_render_both_slots() {
        let now = Utc.with_ymd_and_hms(2026, 2, 19, 20, 0, 0).unwrap();
        let data = DashboardData {
            current_task: Some(item(
                "c1",
                "Write <report> & ship",
                now - ChronoDuration::minutes(30),
                now + ChronoDuration::minutes(90),
            )),
            next_task: Some(item(
                "t2",
                "Gym",
                now + ChronoDuration::hours(3),
                now + ChronoDuration::hours(4),
            )),
        };

        let html = PageTemplate::from_source(PAGE).render(&data, now, Tz::America__Chicago);

        assert!(html.contains("<p>Thursday, February 19</p>"));
        assert!(html.contains("<h2>Write &lt;report&gt; &amp; ship</h2>"));
        assert!(html.contains("13:30 – 15:30"));
        assert!(html.contains(r#"<p class="countdown">01:30:00</p>"#));
        assert!(html.contains(r#"data-progress="25""#));
        assert!(html.contains(r#"<progress max="100" value="25">25%</progress>"#));
        assert!(html.contains("<h3>Gym</h3>"));
        assert!(html.contains("in 3h 0m"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_render_empty_slots() {
        let now = Utc.with_ymd_and_hms(2026, 2, 19, 20, 0, 0).unwrap();
        let html = PageTemplate::from_source(PAGE).render(&DashboardData::default(), now, Tz::UTC);
        assert!(html.contains("No current task"));
        assert!(html.contains(r#"<p class="clock">20:00</p>"#));
        assert!(html.contains("Nothing scheduled"));
    }

    #[test]
    fn test_placeholders_in_task_names_stay_literal() {
        let now = Utc.with_ymd_and_hms(2026, 2, 19, 20, 0, 0).unwrap();
        let data = DashboardData {
            current_task: Some(item(
                "c",
                "Plan {{next}} sprint",
                now - ChronoDuration::minutes(10),
                now + ChronoDuration::minutes(10),
            )),
            next_task: Some(item(
                "n",
                "Review {{current}} and {{date}}",
                now + ChronoDuration::hours(1),
                now + ChronoDuration::hours(2),
            )),
        };

        let html = PageTemplate::from_source("{{current}}|{{next}}").render(&data, now, Tz::UTC);

        assert!(html.contains("<h2>Plan {{next}} sprint</h2>"));
        assert!(html.contains("<h3>Review {{current}} and {{date}}</h3>"));
        assert_eq!(html.matches("<section").count(), 2);
    }

    #[test]
    fn test_unknown_braces_pass_through() {
        let now = Utc.with_ymd_and_hms(2026, 2, 19, 20, 0, 0).unwrap();
        let html = PageTemplate::from_source("a {{ b }} {{date}} {{")
            .render(&DashboardData::default(), now, Tz::UTC);
        assert_eq!(html, "a {{ b }} Thursday, February 19 {{");
    }

    #[test]
    fn test_missing_template_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PageTemplate::load(dir.path()).is_err());

        std::fs::write(dir.path().join("index.html"), PAGE).unwrap();
        assert!(PageTemplate::load(dir.path()).is_ok());
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape(r#"a&b<c>"d'"#), "a&amp;b&lt;c&gt;&quot;d&#x27;");
    }

    async fn start(source: Arc<CountingSource>) -> (SocketAddr, CancellationToken) {
        let source: Arc<dyn TaskSource> = source;
        let state = AppState {
            service: Arc::new(TaskService::new(source)),
            page: Arc::new(PageTemplate::from_source(PAGE)),
            timezone: Tz::UTC,
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        tokio::spawn(serve(listener, state, cancel.clone()));
        (addr, cancel)
    }

    #[tokio::test]
    async fn test_json_endpoint() {
        let now = Utc::now();
        let source = Arc::new(CountingSource {
            schedule: Some((now - ChronoDuration::minutes(5), now + ChronoDuration::minutes(25))),
            ..Default::default()
        });
        let (addr, cancel) = start(source).await;

        let resp = reqwest::get(format!("http://{addr}/api/dashboard-data")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["currentTask"]["id"], "fetch-1");
        assert_eq!(body["currentTask"]["name"], "Focus block");
        assert!(body["nextTask"].is_null());

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_index_and_status() {
        let source = Arc::new(CountingSource::default());
        let (addr, cancel) = start(Arc::clone(&source)).await;

        let resp = reqwest::get(format!("http://{addr}/")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let html = resp.text().await.unwrap();
        assert!(html.starts_with("<main>"));
        assert!(html.contains("No current task"));

        let status: serde_json::Value = reqwest::get(format!("http://{addr}/api/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["taskCount"], 1);
        assert!(status["lastUpdate"].is_string());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_fetch_failure_is_500() {
        let source = Arc::new(CountingSource::default());
        source.fail.store(true, Ordering::SeqCst);
        let (addr, cancel) = start(source).await;

        for path in ["/", "/api/dashboard-data"] {
            let resp = reqwest::get(format!("http://{addr}{path}")).await.unwrap();
            assert_eq!(resp.status(), 500);
            assert_eq!(resp.text().await.unwrap(), FETCH_FAILED);
        }

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_heartbeat(cancel.clone(), Duration::from_secs(30)));

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert!(!handle.is_finished());

        cancel.cancel();
        handle.await.unwrap();
    }
}
