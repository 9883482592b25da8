//! Shared daemon state handed to every connection thread.
//!
//! Request handlers talk to this facade only; it owns the store, the clock and
//! the resolved configuration, and turns domain records into wire views.

use std::sync::{Arc, Mutex};
use worklog_daemon_protocol::{
    AutoCloseStatus, CreateProjectParams, CreateTaskParams, CreateWorkerParams, DailyTotal,
    DashboardEntry, DetailedReport, Health, IdleWorkers, PeriodReport, ProjectDateMatrix,
    ProjectHours, ProjectView, SessionView, TaskSummary, TaskView, WorkerView, PROTOCOL_VERSION,
};

use chrono::NaiveDate;

use crate::auto_close::SweepStats;
use crate::clock::Clock;
use crate::config::DaemonConfig;
use crate::db::Db;
use crate::error::Result;
use crate::{dashboard, lifecycle, records, report};

pub struct SharedState {
    db: Arc<Db>,
    clock: Arc<dyn Clock>,
    config: DaemonConfig,
    sweep: Arc<Mutex<SweepStats>>,
}

impl SharedState {
    pub fn new(
        db: Arc<Db>,
        clock: Arc<dyn Clock>,
        config: DaemonConfig,
        sweep: Arc<Mutex<SweepStats>>,
    ) -> Self {
        Self {
            db,
            clock,
            config,
            sweep,
        }
    }

    pub fn health(&self) -> Health {
        let stats = match self.sweep.lock() {
            Ok(stats) => stats.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        Health {
            status: "ok".to_string(),
            pid: std::process::id(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: PROTOCOL_VERSION,
            auto_close: AutoCloseStatus {
                enabled: self.config.auto_close.enabled,
                cutoff: self.config.auto_close.cutoff.format("%H:%M").to_string(),
                poll_interval_secs: self.config.auto_close.poll_interval_secs,
                last_sweep_at: stats.last_sweep_at.map(|at| at.to_rfc3339()),
                last_closed_count: stats.last_closed_count,
            },
        }
    }

    pub fn start_from_task(&self, worker_id: i64, task_id: i64) -> Result<SessionView> {
        let session = lifecycle::start_from_task(&self.db, self.clock.as_ref(), worker_id, task_id)?;
        Ok((&session).into())
    }

    pub fn resume_session(&self, worker_id: i64, session_id: i64) -> Result<SessionView> {
        let session = lifecycle::resume(&self.db, self.clock.as_ref(), worker_id, session_id)?;
        Ok((&session).into())
    }

    pub fn end_session(&self, session_id: i64, comment: &str) -> Result<SessionView> {
        let session = lifecycle::end(&self.db, self.clock.as_ref(), session_id, comment)?;
        Ok((&session).into())
    }

    pub fn toggle_worker_active(&self, worker_id: i64) -> Result<WorkerView> {
        let worker = lifecycle::toggle_worker_active(&self.db, worker_id)?;
        Ok((&worker).into())
    }

    pub fn create_worker(&self, params: &CreateWorkerParams) -> Result<WorkerView> {
        let worker = records::create_worker(&self.db, params)?;
        Ok((&worker).into())
    }

    pub fn create_project(&self, params: &CreateProjectParams) -> Result<ProjectView> {
        let project = records::create_project(&self.db, params)?;
        Ok((&project).into())
    }

    pub fn create_task(&self, params: &CreateTaskParams) -> Result<TaskView> {
        let task = records::create_task(&self.db, self.clock.as_ref(), params)?;
        Ok((&task).into())
    }

    pub fn daily_total(&self, worker_id: i64, day: NaiveDate) -> Result<DailyTotal> {
        report::daily_total(&self.db, &self.config, worker_id, day)
    }

    pub fn project_date_matrix(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        filter: Option<&str>,
    ) -> Result<ProjectDateMatrix> {
        report::date_matrix(&self.db, &self.config, start, end, filter)
    }

    pub fn period_report(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        worker: &str,
    ) -> Result<PeriodReport> {
        report::period_report(&self.db, &self.config, start, end, worker)
    }

    pub fn detailed_report(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
        filter: Option<&str>,
    ) -> Result<DetailedReport> {
        report::detailed_report(&self.db, &self.config, range, filter)
    }

    pub fn task_summary(&self, task_id: i64) -> Result<TaskSummary> {
        report::task_summary(&self.db, task_id)
    }

    pub fn project_hours(&self, project_id: i64) -> Result<ProjectHours> {
        report::project_hours(&self.db, &self.config, project_id)
    }

    pub fn dashboard(&self) -> Result<Vec<DashboardEntry>> {
        dashboard::dashboard(&self.db, self.clock.as_ref())
    }

    pub fn idle_workers(&self) -> Result<IdleWorkers> {
        dashboard::idle_workers(&self.db)
    }
}
