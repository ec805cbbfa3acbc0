//! crates/study_tracker_core/src/progress.rs
//!
//! Aggregates a coerced study log into the cumulative curve and the
//! progress-toward-goal summary. Everything here is recomputed from scratch
//! on every call.

use crate::domain::{PageGoal, ProgressPoint, ProgressSummary, StudyEntry, StudyProgress};

/// Summarizes `done` pages against `goal`.
pub fn summary(done: f64, goal: PageGoal) -> ProgressSummary {
    let goal = goal.pages();
    let fraction = (done / goal).clamp(0.0, 1.0);
    ProgressSummary {
        goal,
        done,
        percent: fraction * 100.0,
        remaining: (goal - done).max(0.0),
    }
}

/// Sorts the log by date (ties keep sheet order) and attaches the running total.
pub fn summarize(entries: &[StudyEntry], goal: PageGoal) -> StudyProgress {
    let mut sorted: Vec<&StudyEntry> = entries.iter().collect();
    sorted.sort_by_key(|entry| entry.date);

    let mut running = 0.0;
    let log: Vec<ProgressPoint> = sorted
        .into_iter()
        .map(|entry| {
            running += entry.pages;
            ProgressPoint {
                date: entry.date,
                pages: entry.pages,
                cumulative: running,
            }
        })
        .collect();

    StudyProgress {
        summary: summary(running, goal),
        log,
    }
}
