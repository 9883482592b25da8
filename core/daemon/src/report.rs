//! Read-side queries: totals, the chart matrix, and tabular reports.
//!
//! Nothing here mutates the store. Empty inputs produce zero totals and empty
//! row sets, never errors.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use worklog_daemon_protocol::{
    format_duration_hhmm, DailyTotal, DetailedReport, DetailedRow, PeriodReport, ProjectDateMatrix,
    ProjectHours, ReportColumn, TaskSummary, DATE_FORMAT,
};

use crate::aggregate::{
    chart_filter_matches, daily_total_seconds, decimal_hours, elapsed_seconds,
    format_hours_minutes, period_rollup, project_date_matrix, raw_seconds,
};
use crate::config::DaemonConfig;
use crate::db::Db;
use crate::error::{Result, WorklogError};
use crate::model::SessionDetail;

const REPORT_DATE_FORMAT: &str = "%d/%m/%Y";
const DEFAULT_AREA: &str = "GENERAL";

const DETAILED_COLUMNS: [(&str, &str); 8] = [
    ("project_id", "Project ID"),
    ("project_name", "Project name"),
    ("activity", "Activity"),
    ("comment", "Description"),
    ("worker", "Worker"),
    ("date", "Date"),
    ("total", "Total"),
    ("total_decimal", "Total decimal"),
];

pub fn daily_total(
    db: &Db,
    config: &DaemonConfig,
    worker_id: i64,
    day: NaiveDate,
) -> Result<DailyTotal> {
    db.get_worker(worker_id)?
        .ok_or_else(|| WorklogError::not_found("worker", worker_id))?;
    let sessions = db.sessions_started_on(worker_id, day)?;
    let seconds = daily_total_seconds(&sessions, day, config.workday_floor);
    Ok(DailyTotal {
        worker_id,
        date: day.format(DATE_FORMAT).to_string(),
        total: format_hours_minutes(seconds),
    })
}

pub fn date_matrix(
    db: &Db,
    config: &DaemonConfig,
    start: NaiveDate,
    end: NaiveDate,
    filter: Option<&str>,
) -> Result<ProjectDateMatrix> {
    let details: Vec<SessionDetail> = db
        .session_details_started_between(Some((start, end)))?
        .into_iter()
        .filter(|detail| chart_filter_matches(detail, filter))
        .collect();
    Ok(project_date_matrix(&details, start, end, config.workday_floor))
}

/// Per-project summary of one worker's sessions, for the weekly/period export.
pub fn period_report(
    db: &Db,
    config: &DaemonConfig,
    start: NaiveDate,
    end: NaiveDate,
    worker_filter: &str,
) -> Result<PeriodReport> {
    let fragment = worker_filter.trim();
    if fragment.is_empty() {
        return Err(WorklogError::validation("worker", "must not be empty"));
    }
    let worker = db
        .find_worker_by_username(fragment)?
        .ok_or_else(|| WorklogError::not_found("worker", fragment))?;

    let details = db.worker_session_details_between(worker.id, start, end)?;
    let rows = period_rollup(&details, config.workday_floor);
    let total_decimal_days = rows.iter().map(|row| row.total_decimal_days).sum();

    Ok(PeriodReport {
        area: worker
            .area
            .as_deref()
            .map(str::trim)
            .filter(|area| !area.is_empty())
            .map(str::to_uppercase)
            .unwrap_or_else(|| DEFAULT_AREA.to_string()),
        worker: worker.username,
        start_date: start.format(DATE_FORMAT).to_string(),
        end_date: end.format(DATE_FORMAT).to_string(),
        project_count: rows.len(),
        rows,
        total_decimal_days,
    })
}

/// Session-level rows, newest first. The filter matches username, project name,
/// project id or session note as a case-insensitive substring.
pub fn detailed_report(
    db: &Db,
    config: &DaemonConfig,
    range: Option<(NaiveDate, NaiveDate)>,
    filter: Option<&str>,
) -> Result<DetailedReport> {
    let needle = filter.map(str::to_lowercase);
    let mut rows = Vec::new();
    let mut total_hours = 0.0;

    for detail in db.session_details_started_between(range)? {
        if let Some(needle) = needle.as_deref() {
            if !detailed_filter_matches(&detail, needle) {
                continue;
            }
        }

        let seconds = elapsed_seconds(&detail.session, config.workday_floor);
        let total_decimal = seconds.map(decimal_hours);
        total_hours += total_decimal.unwrap_or(0.0);

        rows.push(DetailedRow {
            session_id: detail.session.id,
            project_id: detail.session.project_id,
            project_name: detail.project.as_ref().map(|project| project.name.clone()),
            activity: detail
                .task_title
                .clone()
                .or_else(|| detail.session.note.clone()),
            comment: detail.session.comment.clone(),
            worker: detail.username.clone(),
            date: detail
                .session
                .start_date()
                .format(REPORT_DATE_FORMAT)
                .to_string(),
            total: seconds.map(format_duration_hhmm),
            total_decimal,
        });
    }

    Ok(DetailedReport {
        columns: DETAILED_COLUMNS
            .iter()
            .map(|(key, title)| ReportColumn {
                key: key.to_string(),
                title: title.to_string(),
            })
            .collect(),
        rows,
        total_decimal_hours: (total_hours * 100.0).round() / 100.0,
    })
}

fn detailed_filter_matches(detail: &SessionDetail, needle: &str) -> bool {
    let username = detail
        .username
        .as_deref()
        .map(|username| username.to_lowercase().contains(needle))
        .unwrap_or(false);
    let project = detail
        .project
        .as_ref()
        .map(|project| {
            project.name.to_lowercase().contains(needle) || project.id.to_string().contains(needle)
        })
        .unwrap_or(false);
    let note = detail
        .session
        .note
        .as_deref()
        .map(|note| note.to_lowercase().contains(needle))
        .unwrap_or(false);
    username || project || note
}

/// Raw worked time on a task (no workday floor) and who worked it.
pub fn task_summary(db: &Db, task_id: i64) -> Result<TaskSummary> {
    let task = db
        .get_task(task_id)?
        .ok_or_else(|| WorklogError::not_found("task", task_id))?;
    let details = db.task_session_details(task_id)?;

    let seconds: i64 = details
        .iter()
        .filter_map(|detail| raw_seconds(&detail.session))
        .sum();
    let participants: BTreeSet<String> = details
        .iter()
        .filter_map(|detail| detail.username.clone())
        .collect();

    Ok(TaskSummary {
        task: (&task).into(),
        hours_worked: format_duration_hhmm(seconds),
        participants: participants.into_iter().collect(),
    })
}

pub fn project_hours(db: &Db, config: &DaemonConfig, project_id: i64) -> Result<ProjectHours> {
    let project = db
        .get_project(project_id)?
        .ok_or_else(|| WorklogError::not_found("project", project_id))?;
    let seconds: i64 = db
        .project_sessions(project_id)?
        .iter()
        .filter_map(|session| elapsed_seconds(session, config.workday_floor))
        .sum();

    Ok(ProjectHours {
        project: (&project).into(),
        total_hours: format_duration_hhmm(seconds),
    })
}
