//! Typed response payloads, one shape per method.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub id: i64,
    pub worker_id: Option<i64>,
    pub project_id: Option<i64>,
    pub task_id: Option<i64>,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub note: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerView {
    pub id: i64,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
    pub area: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectView {
    pub id: i64,
    pub name: String,
    pub state: String,
    pub color: Option<String>,
    pub is_private: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskView {
    pub id: i64,
    pub project_id: Option<i64>,
    pub worker_id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub due_at: Option<String>,
    /// Planned duration as `HH:MM`.
    pub planned_duration: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub worker_id: i64,
    pub date: String,
    /// `H:MM`, hours unpadded and unbounded.
    pub total: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDataset {
    pub label: String,
    /// Hours per date, aligned with `ProjectDateMatrix::labels`.
    pub data: Vec<f64>,
    /// `H:MM` per date, aligned with `ProjectDateMatrix::labels`.
    pub data_label: Vec<String>,
    pub color_hint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDateMatrix {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
    /// Column totals per date as `H:MM`.
    pub totals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodReportRow {
    pub project_id: Option<i64>,
    pub project_name: Option<String>,
    pub tasks_list: String,
    pub dates_list: String,
    pub days_worked: usize,
    pub worker: Option<String>,
    pub total_seconds: i64,
    /// `H:MM:SS`, hours unbounded.
    pub total_duration: String,
    pub total_decimal_days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodReport {
    pub worker: String,
    pub area: String,
    pub start_date: String,
    pub end_date: String,
    pub rows: Vec<PeriodReportRow>,
    pub project_count: usize,
    pub total_decimal_days: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportColumn {
    pub key: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedRow {
    pub session_id: i64,
    pub project_id: Option<i64>,
    pub project_name: Option<String>,
    pub activity: Option<String>,
    pub comment: Option<String>,
    pub worker: Option<String>,
    /// Start date as `dd/mm/YYYY`.
    pub date: String,
    pub total: Option<String>,
    pub total_decimal: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedReport {
    pub columns: Vec<ReportColumn>,
    pub rows: Vec<DetailedRow>,
    pub total_decimal_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task: TaskView,
    pub hours_worked: String,
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectHours {
    pub project: ProjectView,
    pub total_hours: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardEntry {
    pub session_id: i64,
    pub worker: String,
    pub task: String,
    pub project: String,
    /// Start time of day, `HH:MM:SS`.
    pub started_time: String,
    pub started_at: String,
    pub comment: Option<String>,
    pub comment_full: Option<String>,
    pub in_activity: bool,
    /// Raw span `HH:MM:SS`; absent while the session is open.
    pub elapsed: Option<String>,
    pub activity_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleWorkers {
    pub message: String,
    pub usernames: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoCloseStatus {
    pub enabled: bool,
    pub cutoff: String,
    pub poll_interval_secs: u64,
    pub last_sweep_at: Option<String>,
    pub last_closed_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub pid: u32,
    pub version: String,
    pub protocol_version: u32,
    pub auto_close: AutoCloseStatus,
}
