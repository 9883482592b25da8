//! Worker, project and task creation.

use tracing::info;
use worklog_daemon_protocol::{
    CreateProjectParams, CreateTaskParams, CreateWorkerParams, ErrorInfo,
};

use crate::clock::Clock;
use crate::db::Db;
use crate::error::{Result, WorklogError};
use crate::model::{NewTask, NewWorker, Project, Task, TaskPriority, Worker, DEFAULT_PROJECT_STATE};

pub fn create_worker(db: &Db, params: &CreateWorkerParams) -> Result<Worker> {
    let username = params.username.trim();
    if username.is_empty() {
        return Err(WorklogError::validation("username", "must not be empty"));
    }
    let worker = db.insert_worker(&NewWorker {
        username: username.to_string(),
        first_name: trimmed(&params.first_name),
        last_name: trimmed(&params.last_name),
        area: trimmed(&params.area),
    })?;
    info!(worker_id = worker.id, username = %worker.username, "Created worker");
    Ok(worker)
}

pub fn create_project(db: &Db, params: &CreateProjectParams) -> Result<Project> {
    if params.id <= 0 {
        return Err(WorklogError::validation("id", "must be a positive integer"));
    }
    let name = params.name.trim();
    if name.is_empty() {
        return Err(WorklogError::validation("name", "must not be empty"));
    }
    let project = db.insert_project(&Project {
        id: params.id,
        name: name.to_string(),
        state: DEFAULT_PROJECT_STATE.to_string(),
        color: trimmed(&params.color),
        is_private: params.is_private,
    })?;
    info!(project_id = project.id, "Created project");
    Ok(project)
}

pub fn create_task(db: &Db, clock: &dyn Clock, params: &CreateTaskParams) -> Result<Task> {
    let title = params.title.trim();
    if title.is_empty() {
        return Err(WorklogError::validation("title", "must not be empty"));
    }
    let due_at = params.due_date().map_err(|err| field_error("due", err))?;
    let planned_seconds = params
        .planned_seconds()
        .map_err(|err| field_error("duration", err))?;
    let priority = match params.priority.as_deref().map(str::trim) {
        None | Some("") => TaskPriority::Low,
        Some(raw) => TaskPriority::from_str(raw)
            .ok_or_else(|| WorklogError::validation("priority", format!("unknown value {}", raw)))?,
    };

    if let Some(project_id) = params.project_id {
        db.get_project(project_id)?
            .ok_or_else(|| WorklogError::not_found("project", project_id))?;
    }
    if let Some(worker_id) = params.worker_id {
        db.get_worker(worker_id)?
            .ok_or_else(|| WorklogError::not_found("worker", worker_id))?;
    }

    let task = db.insert_task(&NewTask {
        project_id: params.project_id,
        worker_id: params.worker_id,
        title: title.to_string(),
        description: trimmed(&params.description),
        priority,
        due_at,
        planned_seconds,
        created_at: clock.now(),
    })?;
    info!(task_id = task.id, project_id = ?task.project_id, "Created task");
    Ok(task)
}

fn field_error(field: &str, err: ErrorInfo) -> WorklogError {
    WorklogError::validation(field, err.message)
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
