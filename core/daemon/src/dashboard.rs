//! Live view of what each active worker is doing.

use std::collections::HashSet;
use worklog_daemon_protocol::{DashboardEntry, IdleWorkers, DATE_FORMAT};

use crate::aggregate::{format_clock_span, raw_seconds, NO_PROJECT_LABEL, NO_TASK_LABEL};
use crate::clock::Clock;
use crate::db::Db;
use crate::error::Result;
use crate::model::{format_timestamp, SessionDetail};

const COMMENT_PREVIEW_CHARS: usize = 50;

/// One entry per active worker: their most recent session.
pub fn dashboard(db: &Db, clock: &dyn Clock) -> Result<Vec<DashboardEntry>> {
    let today = clock.now().date_naive();
    let entries = db
        .latest_session_details_for_active_workers()?
        .into_iter()
        .map(|detail| entry(detail, today))
        .collect();
    Ok(entries)
}

fn entry(detail: SessionDetail, today: chrono::NaiveDate) -> DashboardEntry {
    let session = &detail.session;
    let activity_date = session
        .ended_at
        .map(|ended_at| ended_at.date_naive())
        .unwrap_or(today);

    DashboardEntry {
        session_id: session.id,
        worker: detail.username.clone().unwrap_or_default(),
        task: detail
            .task_title
            .clone()
            .unwrap_or_else(|| NO_TASK_LABEL.to_string()),
        project: detail
            .project
            .as_ref()
            .map(|project| project.display_name())
            .unwrap_or_else(|| NO_PROJECT_LABEL.to_string()),
        started_time: session.started_at.format("%H:%M:%S").to_string(),
        started_at: format_timestamp(&session.started_at),
        comment: session.comment.as_deref().map(preview),
        comment_full: session.comment.clone(),
        in_activity: session.is_open(),
        elapsed: raw_seconds(session).map(format_clock_span),
        activity_date: activity_date.format(DATE_FORMAT).to_string(),
    }
}

fn preview(comment: &str) -> String {
    if comment.chars().count() > COMMENT_PREVIEW_CHARS {
        let head: String = comment.chars().take(COMMENT_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        comment.to_string()
    }
}

/// Active workers with no open session, sorted by username.
pub fn idle_workers(db: &Db) -> Result<IdleWorkers> {
    let busy: HashSet<i64> = db.open_session_worker_ids()?;
    let usernames: Vec<String> = db
        .list_workers(true)?
        .into_iter()
        .filter(|worker| !busy.contains(&worker.id))
        .map(|worker| worker.username)
        .collect();

    let message = if usernames.is_empty() {
        String::new()
    } else {
        format!(
            "The following workers have not logged activity: {}",
            usernames.join(", ")
        )
    };
    Ok(IdleWorkers { message, usernames })
}
