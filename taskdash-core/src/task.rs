//! Task model as served by the Motion API, plus the dashboard output shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Unix seconds of `0001-01-01T00:00:00Z`, the zero-value timestamp some
/// clients send instead of `null` for an unscheduled endpoint.
const ZERO_INSTANT_UNIX_SECS: i64 = -62_135_596_800;

/// True when `dt` is the zero-value instant rather than a real schedule.
pub fn is_zero_instant(dt: DateTime<Utc>) -> bool {
    dt.timestamp() == ZERO_INSTANT_UNIX_SECS && dt.timestamp_subsec_nanos() == 0
}

/// A scheduled `[start, end)` window. Only built when both endpoints are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    fn from_endpoints(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<Self> {
        let start = start.filter(|t| !is_zero_instant(*t))?;
        let end = end.filter(|t| !is_zero_instant(*t))?;
        Some(Self { start, end })
    }

    /// Half-open containment: `start <= now < end`.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.end
    }

    pub fn starts_after(&self, now: DateTime<Utc>) -> bool {
        now < self.start
    }
}

/// A sub-interval of a task's work. Shown under its parent task's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: String,

    #[serde(default, deserialize_with = "scheduled_instant")]
    pub scheduled_start: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "scheduled_instant")]
    pub scheduled_end: Option<DateTime<Utc>>,
}

impl Chunk {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scheduled_start: None,
            scheduled_end: None,
        }
    }

    pub fn with_schedule(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.scheduled_start = Some(start);
        self.scheduled_end = Some(end);
        self
    }

    pub fn window(&self) -> Option<Window> {
        Window::from_endpoints(self.scheduled_start, self.scheduled_end)
    }
}

/// Core task type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,

    #[serde(default, deserialize_with = "scheduled_instant")]
    pub scheduled_start: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "scheduled_instant")]
    pub scheduled_end: Option<DateTime<Utc>>,

    /// Ordered as received. `null` decodes to an empty list.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub chunks: Vec<Chunk>,
}

impl Task {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            scheduled_start: None,
            scheduled_end: None,
            chunks: Vec::new(),
        }
    }

    pub fn with_schedule(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.scheduled_start = Some(start);
        self.scheduled_end = Some(end);
        self
    }

    pub fn with_chunk(mut self, chunk: Chunk) -> Self {
        self.chunks.push(chunk);
        self
    }

    pub fn window(&self) -> Option<Window> {
        Window::from_endpoints(self.scheduled_start, self.scheduled_end)
    }
}

/// A task or chunk flattened to what the dashboard displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "startDate")]
    pub start: DateTime<Utc>,
    #[serde(rename = "endDate")]
    pub end: DateTime<Utc>,
}

impl TimedItem {
    pub fn new(id: &str, name: &str, window: Window) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            start: window.start,
            end: window.end,
        }
    }
}

/// Current and next item at some instant. Either may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub current_task: Option<TimedItem>,
    pub next_task: Option<TimedItem>,
}

fn scheduled_instant<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<DateTime<Utc>>::deserialize(deserializer)?;
    Ok(raw.filter(|t| !is_zero_instant(*t)))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Chunk>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Chunk>>::deserialize(deserializer)?.unwrap_or_default())
}
