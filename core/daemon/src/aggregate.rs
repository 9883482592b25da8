//! Elapsed-time arithmetic and roll-ups over session records.
//!
//! Work before the workday floor (08:00 by default) on a session's start date
//! does not count. Open sessions have no elapsed time at all; they are skipped,
//! never counted as zero.

use chrono::{Days, NaiveDate, NaiveTime, TimeZone};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use worklog_daemon_protocol::{ChartDataset, PeriodReportRow, ProjectDateMatrix, DATE_FORMAT};

use crate::model::{SessionDetail, WorkSession};

pub const NO_PROJECT_LABEL: &str = "Without project";
pub const NO_TASK_LABEL: &str = "Without task";
pub const DEFAULT_COLOR: &str = "#000000";
const PROJECT_LABEL_CHARS: usize = 20;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Seconds worked, counted from `max(started_at, floor)`. Negative spans propagate.
pub fn elapsed_seconds(session: &WorkSession, floor: NaiveTime) -> Option<i64> {
    let ended_at = session.ended_at?;
    let started_at = session.started_at;
    let floor_at = started_at
        .offset()
        .from_local_datetime(&started_at.date_naive().and_time(floor))
        .single()
        .unwrap_or(started_at);
    let effective_start = started_at.max(floor_at);
    Some((ended_at - effective_start).num_seconds())
}

/// Seconds between start and end with no floor applied.
pub fn raw_seconds(session: &WorkSession) -> Option<i64> {
    session
        .ended_at
        .map(|ended_at| (ended_at - session.started_at).num_seconds())
}

pub fn decimal_hours(seconds: i64) -> f64 {
    round2(seconds as f64 / 3600.0)
}

pub fn decimal_days(seconds: i64) -> f64 {
    seconds as f64 / SECONDS_PER_DAY
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `H:MM` with unpadded, unbounded hours.
pub fn format_hours_minutes(seconds: i64) -> String {
    format_minutes(seconds.div_euclid(60))
}

fn format_minutes(minutes: i64) -> String {
    format!("{}:{:02}", minutes.div_euclid(60), minutes.rem_euclid(60))
}

/// `H:MM:SS` with unpadded, unbounded hours.
pub fn format_hours_minutes_seconds(seconds: i64) -> String {
    let hours = seconds.div_euclid(3600);
    let rest = seconds.rem_euclid(3600);
    format!("{}:{:02}:{:02}", hours, rest / 60, rest % 60)
}

/// `HH:MM:SS`, zero-padded hours.
pub fn format_clock_span(seconds: i64) -> String {
    let hours = seconds.div_euclid(3600);
    let rest = seconds.rem_euclid(3600);
    format!("{:02}:{:02}:{:02}", hours, rest / 60, rest % 60)
}

/// Floor-rule seconds over the sessions that started on `day`.
pub fn daily_total_seconds(sessions: &[WorkSession], day: NaiveDate, floor: NaiveTime) -> i64 {
    sessions
        .iter()
        .filter(|session| session.start_date() == day)
        .filter_map(|session| elapsed_seconds(session, floor))
        .sum()
}

/// Whole minutes a session contributes to the chart, truncated from its decimal hours.
fn chart_minutes(session: &WorkSession, floor: NaiveTime) -> Option<i64> {
    elapsed_seconds(session, floor).map(|seconds| (decimal_hours(seconds) * 60.0).trunc() as i64)
}

pub fn project_label(detail: &SessionDetail) -> String {
    match &detail.project {
        Some(project) => project.display_name().chars().take(PROJECT_LABEL_CHARS).collect(),
        None => NO_PROJECT_LABEL.to_string(),
    }
}

/// Keeps sessions matching the chart filter: all digits selects a project id,
/// anything else a username prefix.
pub fn chart_filter_matches(detail: &SessionDetail, filter: Option<&str>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    if filter.chars().all(|c| c.is_ascii_digit()) {
        return detail
            .session
            .project_id
            .map(|id| id.to_string() == filter)
            .unwrap_or(false);
    }
    detail
        .username
        .as_deref()
        .map(|username| username.starts_with(filter))
        .unwrap_or(false)
}

/// Dense project-by-date matrix, one column per day of `start..=end`.
///
/// Closed sessions land on the date they ended. Cells whose end date falls
/// outside the range are dropped. Datasets follow project id descending with
/// sessions without a project last.
pub fn project_date_matrix(
    details: &[SessionDetail],
    start: NaiveDate,
    end: NaiveDate,
    floor: NaiveTime,
) -> ProjectDateMatrix {
    let dates: Vec<NaiveDate> = date_range(start, end);
    let column: HashMap<NaiveDate, usize> = dates
        .iter()
        .enumerate()
        .map(|(idx, date)| (*date, idx))
        .collect();

    let mut ordered: Vec<&SessionDetail> = details
        .iter()
        .filter(|detail| !detail.session.is_open())
        .collect();
    ordered.sort_by_key(|detail| match detail.session.project_id {
        Some(id) => (false, Reverse(id)),
        None => (true, Reverse(0)),
    });

    let mut labels: Vec<String> = Vec::new();
    let mut rows: HashMap<String, (Vec<i64>, String)> = HashMap::new();
    let mut totals = vec![0i64; dates.len()];

    for detail in ordered {
        let Some(ended_at) = detail.session.ended_at else {
            continue;
        };
        let label = project_label(detail);
        let entry = rows.entry(label.clone()).or_insert_with(|| {
            labels.push(label.clone());
            let color = detail
                .project
                .as_ref()
                .and_then(|project| project.color.clone())
                .unwrap_or_else(|| DEFAULT_COLOR.to_string());
            (vec![0; dates.len()], color)
        });

        let Some(&idx) = column.get(&ended_at.date_naive()) else {
            continue;
        };
        let minutes = chart_minutes(&detail.session, floor).unwrap_or(0);
        entry.0[idx] += minutes;
        totals[idx] += minutes;
    }

    let datasets = labels
        .into_iter()
        .filter_map(|label| {
            rows.remove(&label).map(|(minutes, color_hint)| ChartDataset {
                data: minutes.iter().map(|m| *m as f64 / 60.0).collect(),
                data_label: minutes.iter().map(|m| format_minutes(*m)).collect(),
                label,
                color_hint,
            })
        })
        .collect();

    ProjectDateMatrix {
        labels: dates
            .iter()
            .map(|date| date.format(DATE_FORMAT).to_string())
            .collect(),
        datasets,
        totals: totals.into_iter().map(format_minutes).collect(),
    }
}

fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        dates.push(current);
        match current.checked_add_days(Days::new(1)) {
            Some(next) => current = next,
            None => break,
        }
    }
    dates
}

/// Per-project rollup for the period report, ordered by project id with
/// sessions without a project last.
pub fn period_rollup(details: &[SessionDetail], floor: NaiveTime) -> Vec<PeriodReportRow> {
    let mut groups: BTreeMap<(bool, i64), Vec<&SessionDetail>> = BTreeMap::new();
    for detail in details {
        let key = match detail.session.project_id {
            Some(id) => (false, id),
            None => (true, 0),
        };
        groups.entry(key).or_default().push(detail);
    }

    groups
        .into_values()
        .map(|group| {
            let tasks: BTreeSet<&str> = group
                .iter()
                .filter_map(|detail| detail.task_title.as_deref())
                .collect();
            let days: BTreeSet<NaiveDate> = group
                .iter()
                .map(|detail| detail.session.start_date())
                .collect();
            let total_seconds: i64 = group
                .iter()
                .filter_map(|detail| elapsed_seconds(&detail.session, floor))
                .sum();
            let first = group[0];

            PeriodReportRow {
                project_id: first.session.project_id,
                project_name: first.project.as_ref().map(|project| project.name.clone()),
                tasks_list: tasks.into_iter().collect::<Vec<_>>().join("\n"),
                dates_list: days
                    .iter()
                    .map(|day| day.format("%d/%m/%Y").to_string())
                    .collect::<Vec<_>>()
                    .join("\n"),
                days_worked: days.len(),
                worker: first.username.clone(),
                total_seconds,
                total_duration: format_hours_minutes_seconds(total_seconds),
                total_decimal_days: decimal_days(total_seconds),
            }
        })
        .collect()
}
