//! taskdash-core: task model and current/next resolution for the dashboard

pub mod task;
pub mod time;
pub mod timing;

pub use task::{Chunk, DashboardData, Task, TimedItem, Window, is_zero_instant};
pub use time::{
    format_countdown, format_local_date, format_local_time, format_until, parse_timezone,
    progress_percent,
};
pub use timing::resolve;
