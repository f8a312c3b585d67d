//! Current/next resolution over a task collection.
//!
//! Every task and every chunk is a candidate window. Candidates are visited in
//! a fixed order: all tasks in input order, then the chunks of each task (tasks
//! in input order, chunks in input order).
//!
//! - **Current**: a window containing `now` (`start <= now < end`). Each match
//!   overwrites the previous one, so the last match in visit order wins. Since
//!   chunks are visited after all tasks, a running chunk always takes the slot
//!   over a running task.
//! - **Next**: a window starting strictly after `now`. The earliest start wins;
//!   on equal starts the first one visited is kept.
//!
//! Candidates with a missing or zero-value endpoint are skipped.

use chrono::{DateTime, Utc};

use crate::task::{DashboardData, Task, TimedItem, Window};

#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    id: &'a str,
    /// For chunks this is the parent task's name.
    name: &'a str,
    window: Window,
}

impl Candidate<'_> {
    fn to_item(self) -> TimedItem {
        TimedItem::new(self.id, self.name, self.window)
    }
}

fn candidates(tasks: &[Task]) -> impl Iterator<Item = Candidate<'_>> {
    let task_pass = tasks.iter().filter_map(|t| {
        t.window().map(|window| Candidate {
            id: &t.id,
            name: &t.name,
            window,
        })
    });

    let chunk_pass = tasks.iter().flat_map(|t| {
        t.chunks.iter().filter_map(move |c| {
            c.window().map(|window| Candidate {
                id: &c.id,
                name: &t.name,
                window,
            })
        })
    });

    task_pass.chain(chunk_pass)
}

/// Resolve the current and next item at `now`.
pub fn resolve(tasks: &[Task], now: DateTime<Utc>) -> DashboardData {
    let mut current: Option<Candidate<'_>> = None;
    let mut next: Option<Candidate<'_>> = None;

    for c in candidates(tasks) {
        if c.window.contains(now) {
            current = Some(c);
        } else if c.window.starts_after(now)
            && next.is_none_or(|best| c.window.start < best.window.start)
        {
            next = Some(c);
        }
    }

    DashboardData {
        current_task: current.map(Candidate::to_item),
        next_task: next.map(Candidate::to_item),
    }
}
