//! Domain records persisted by the daemon and their wire views.

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use worklog_daemon_protocol::{
    format_duration_hhmm, ProjectView, SessionView, TaskView, WorkerView, DATE_FORMAT,
};

pub const DEFAULT_PROJECT_STATE: &str = "Activo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "todo" => Some(TaskStatus::Todo),
            "in_progress" => Some(TaskStatus::InProgress),
            "review" => Some(TaskStatus::Review),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "high" => Some(TaskPriority::High),
            "medium" => Some(TaskPriority::Medium),
            "low" => Some(TaskPriority::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worker {
    pub id: i64,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
    pub area: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWorker {
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub area: Option<String>,
}

/// A work order. The id is assigned by whoever opens the order, not by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub state: String,
    pub color: Option<String>,
    pub is_private: bool,
}

impl Project {
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.id, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub project_id: Option<i64>,
    pub worker_id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_at: Option<NaiveDate>,
    pub planned_seconds: Option<i64>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub project_id: Option<i64>,
    pub worker_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_at: Option<NaiveDate>,
    pub planned_seconds: Option<i64>,
    pub created_at: DateTime<FixedOffset>,
}

/// One continuous span of work. `ended_at == None` means the session is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkSession {
    pub id: i64,
    pub worker_id: Option<i64>,
    pub project_id: Option<i64>,
    pub task_id: Option<i64>,
    pub started_at: DateTime<FixedOffset>,
    pub ended_at: Option<DateTime<FixedOffset>>,
    pub note: Option<String>,
    pub comment: Option<String>,
}

impl WorkSession {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn start_date(&self) -> NaiveDate {
        self.started_at.date_naive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub worker_id: i64,
    pub project_id: Option<i64>,
    pub task_id: Option<i64>,
    pub started_at: DateTime<FixedOffset>,
    pub note: Option<String>,
    pub comment: Option<String>,
}

/// A session joined with the labels reports need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDetail {
    pub session: WorkSession,
    pub username: Option<String>,
    pub project: Option<Project>,
    pub task_title: Option<String>,
}

pub fn format_timestamp(value: &DateTime<FixedOffset>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, false)
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).ok()
}

impl From<&WorkSession> for SessionView {
    fn from(session: &WorkSession) -> Self {
        SessionView {
            id: session.id,
            worker_id: session.worker_id,
            project_id: session.project_id,
            task_id: session.task_id,
            started_at: format_timestamp(&session.started_at),
            ended_at: session.ended_at.as_ref().map(format_timestamp),
            note: session.note.clone(),
            comment: session.comment.clone(),
        }
    }
}

impl From<&Worker> for WorkerView {
    fn from(worker: &Worker) -> Self {
        WorkerView {
            id: worker.id,
            username: worker.username.clone(),
            first_name: worker.first_name.clone(),
            last_name: worker.last_name.clone(),
            is_active: worker.is_active,
            area: worker.area.clone(),
        }
    }
}

impl From<&Project> for ProjectView {
    fn from(project: &Project) -> Self {
        ProjectView {
            id: project.id,
            name: project.name.clone(),
            state: project.state.clone(),
            color: project.color.clone(),
            is_private: project.is_private,
        }
    }
}

impl From<&Task> for TaskView {
    fn from(task: &Task) -> Self {
        TaskView {
            id: task.id,
            project_id: task.project_id,
            worker_id: task.worker_id,
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status.as_str().to_string(),
            priority: task.priority.as_str().to_string(),
            due_at: task.due_at.map(|due| due.format(DATE_FORMAT).to_string()),
            planned_duration: task.planned_seconds.map(format_duration_hhmm),
            created_at: format_timestamp(&task.created_at),
            updated_at: format_timestamp(&task.updated_at),
        }
    }
}
