//! Per-method request parameters.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{parse_date, parse_duration_hhmm, require_id, require_string, ErrorInfo, Validate};

pub const MAX_COMMENT_CHARS: usize = 10_000;
pub const MAX_USERNAME_CHARS: usize = 150;
pub const MAX_MATRIX_DAYS: i64 = 366;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartFromTaskParams {
    pub worker_id: i64,
    pub task_id: i64,
}

impl Validate for StartFromTaskParams {
    fn validate(&self) -> Result<(), ErrorInfo> {
        require_id(self.worker_id, "worker_id")?;
        require_id(self.task_id, "task_id")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResumeSessionParams {
    pub worker_id: i64,
    pub session_id: i64,
}

impl Validate for ResumeSessionParams {
    fn validate(&self) -> Result<(), ErrorInfo> {
        require_id(self.worker_id, "worker_id")?;
        require_id(self.session_id, "session_id")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndSessionParams {
    pub session_id: i64,
    #[serde(default)]
    pub comment: String,
}

impl Validate for EndSessionParams {
    fn validate(&self) -> Result<(), ErrorInfo> {
        require_id(self.session_id, "session_id")?;
        if self.comment.chars().count() > MAX_COMMENT_CHARS {
            return Err(ErrorInfo::new(
                "validation_error",
                format!("comment must be {} characters or fewer", MAX_COMMENT_CHARS),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerIdParams {
    pub worker_id: i64,
}

impl Validate for WorkerIdParams {
    fn validate(&self) -> Result<(), ErrorInfo> {
        require_id(self.worker_id, "worker_id")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateWorkerParams {
    pub username: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
}

impl Validate for CreateWorkerParams {
    fn validate(&self) -> Result<(), ErrorInfo> {
        require_string(&self.username, "username")?;
        if self.username.chars().count() > MAX_USERNAME_CHARS {
            return Err(ErrorInfo::new(
                "validation_error",
                format!("username must be {} characters or fewer", MAX_USERNAME_CHARS),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateProjectParams {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

impl Validate for CreateProjectParams {
    fn validate(&self) -> Result<(), ErrorInfo> {
        require_id(self.id, "id")?;
        require_string(&self.name, "name")?;
        if let Some(color) = &self.color {
            let hex = color.strip_prefix('#').unwrap_or("");
            if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ErrorInfo::new(
                    "validation_error",
                    "color must be a #rrggbb hex value",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTaskParams {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub worker_id: Option<i64>,
    #[serde(default)]
    pub priority: Option<String>,
    /// Due date, `YYYY-MM-DD`.
    #[serde(default)]
    pub due: Option<String>,
    /// Planned duration, `hh:mm`.
    #[serde(default)]
    pub duration: Option<String>,
}

impl CreateTaskParams {
    pub fn due_date(&self) -> Result<Option<NaiveDate>, ErrorInfo> {
        match non_blank(&self.due) {
            Some(value) => parse_date(value, "due").map(Some),
            None => Ok(None),
        }
    }

    pub fn planned_seconds(&self) -> Result<Option<i64>, ErrorInfo> {
        match non_blank(&self.duration) {
            Some(value) => parse_duration_hhmm(value, "duration").map(Some),
            None => Ok(None),
        }
    }
}

impl Validate for CreateTaskParams {
    fn validate(&self) -> Result<(), ErrorInfo> {
        require_string(&self.title, "title")?;
        if let Some(project_id) = self.project_id {
            require_id(project_id, "project_id")?;
        }
        if let Some(worker_id) = self.worker_id {
            require_id(worker_id, "worker_id")?;
        }
        if let Some(priority) = non_blank(&self.priority) {
            if !matches!(priority, "high" | "medium" | "low") {
                return Err(ErrorInfo::new(
                    "validation_error",
                    "priority must be one of high, medium, low",
                ));
            }
        }
        self.due_date()?;
        self.planned_seconds()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DailyTotalParams {
    pub worker_id: i64,
    pub date: String,
}

impl DailyTotalParams {
    pub fn day(&self) -> Result<NaiveDate, ErrorInfo> {
        parse_date(&self.date, "date")
    }
}

impl Validate for DailyTotalParams {
    fn validate(&self) -> Result<(), ErrorInfo> {
        require_id(self.worker_id, "worker_id")?;
        self.day().map(|_| ())
    }
}

/// Inclusive date range plus an optional free-text filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateRangeParams {
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub filter: Option<String>,
}

impl DateRangeParams {
    /// The matrix is dense over the range, so the span is capped.
    pub fn range(&self) -> Result<(NaiveDate, NaiveDate), ErrorInfo> {
        let (start, end) = parse_range(&self.start_date, &self.end_date)?;
        if (end - start).num_days() + 1 > MAX_MATRIX_DAYS {
            return Err(ErrorInfo::new(
                "validation_error",
                format!("date range must span at most {} days", MAX_MATRIX_DAYS),
            ));
        }
        Ok((start, end))
    }

    pub fn filter(&self) -> Option<&str> {
        non_blank(&self.filter)
    }
}

impl Validate for DateRangeParams {
    fn validate(&self) -> Result<(), ErrorInfo> {
        self.range().map(|_| ())
    }
}

/// Detailed report parameters; the range is optional but both bounds travel together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetailedReportParams {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
}

impl DetailedReportParams {
    pub fn range(&self) -> Result<Option<(NaiveDate, NaiveDate)>, ErrorInfo> {
        match (non_blank(&self.start_date), non_blank(&self.end_date)) {
            (Some(start), Some(end)) => parse_range(start, end).map(Some),
            (None, None) => Ok(None),
            _ => Err(ErrorInfo::new(
                "validation_error",
                "start_date and end_date must be given together",
            )),
        }
    }

    pub fn filter(&self) -> Option<&str> {
        non_blank(&self.filter)
    }
}

impl Validate for DetailedReportParams {
    fn validate(&self) -> Result<(), ErrorInfo> {
        self.range().map(|_| ())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeriodReportParams {
    pub start_date: String,
    pub end_date: String,
    /// Case-insensitive username fragment selecting the worker.
    pub worker: String,
}

impl PeriodReportParams {
    pub fn range(&self) -> Result<(NaiveDate, NaiveDate), ErrorInfo> {
        parse_range(&self.start_date, &self.end_date)
    }
}

impl Validate for PeriodReportParams {
    fn validate(&self) -> Result<(), ErrorInfo> {
        require_string(&self.worker, "worker")?;
        self.range().map(|_| ())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskSummaryParams {
    pub task_id: i64,
}

impl Validate for TaskSummaryParams {
    fn validate(&self) -> Result<(), ErrorInfo> {
        require_id(self.task_id, "task_id")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectHoursParams {
    pub project_id: i64,
}

impl Validate for ProjectHoursParams {
    fn validate(&self) -> Result<(), ErrorInfo> {
        require_id(self.project_id, "project_id")
    }
}

fn parse_range(start: &str, end: &str) -> Result<(NaiveDate, NaiveDate), ErrorInfo> {
    let start = parse_date(start, "start_date")?;
    let end = parse_date(end, "end_date")?;
    if end < start {
        return Err(ErrorInfo::new(
            "validation_error",
            "end_date must not be before start_date",
        ));
    }
    Ok((start, end))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
