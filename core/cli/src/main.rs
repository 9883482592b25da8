//! worklog: command-line client for the worklog daemon.
//!
//! Every subcommand maps to one daemon method. Responses are printed as
//! pretty JSON on stdout; daemon errors go to stderr with a non-zero exit.

mod client;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use worklog_daemon_protocol::{
    CreateProjectParams, CreateTaskParams, CreateWorkerParams, DailyTotalParams,
    DateRangeParams, DetailedReportParams, EndSessionParams, Method, PeriodReportParams,
    ProjectHoursParams, ResumeSessionParams, StartFromTaskParams, TaskSummaryParams,
    WorkerIdParams, DATE_FORMAT,
};

use crate::client::{socket_path, ClientError, DaemonClient};

#[derive(Parser)]
#[command(name = "worklog")]
#[command(about = "Track work sessions against the worklog daemon")]
#[command(version)]
struct Cli {
    /// Daemon socket path (defaults to $WORKLOG_SOCKET or ~/.worklog/daemon.sock)
    #[arg(long, global = true)]
    socket: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daemon status and auto-close state
    Health,

    /// Start a session from a task, closing any open one
    Start {
        #[arg(long)]
        worker: i64,
        #[arg(long)]
        task: i64,
    },

    /// Open a new session copying an earlier session's project, task and comment
    Resume {
        #[arg(long)]
        worker: i64,
        #[arg(long)]
        session: i64,
    },

    /// Close a session
    End {
        #[arg(long)]
        session: i64,
        #[arg(long, default_value = "")]
        comment: String,
    },

    /// Flip a worker between active and inactive
    ToggleWorker {
        #[arg(long)]
        worker: i64,
    },

    /// Manage workers
    #[command(subcommand)]
    Worker(WorkerCommand),

    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),

    /// Manage tasks
    #[command(subcommand)]
    Task(TaskCommand),

    /// Hours a worker logged on one day
    DailyTotal {
        #[arg(long)]
        worker: i64,
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        date: Option<String>,
    },

    /// Minutes per project per day, for charting
    Matrix(RangeArgs),

    /// Per-project rollup for one worker
    PeriodReport {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        /// Username fragment
        #[arg(long)]
        worker: String,
    },

    /// Session-level report
    Report {
        #[arg(long, requires = "end")]
        start: Option<String>,
        #[arg(long, requires = "start")]
        end: Option<String>,
        #[arg(long)]
        filter: Option<String>,
    },

    /// Raw time logged on a task and who logged it
    TaskSummary {
        #[arg(long)]
        task: i64,
    },

    /// Hours logged on a project
    ProjectHours {
        #[arg(long)]
        project: i64,
    },

    /// Latest session of each active worker
    Dashboard,

    /// Active workers with no open session
    Idle,
}

#[derive(Subcommand)]
enum WorkerCommand {
    Add {
        username: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        area: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProjectCommand {
    Add {
        id: i64,
        name: String,
        /// #rrggbb
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        private: bool,
    },
}

#[derive(Subcommand)]
enum TaskCommand {
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        project: Option<i64>,
        #[arg(long)]
        worker: Option<i64>,
        /// high, medium or low
        #[arg(long)]
        priority: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
        /// hh:mm
        #[arg(long)]
        duration: Option<String>,
    },
}

#[derive(Args)]
struct RangeArgs {
    #[arg(long)]
    start: String,
    #[arg(long)]
    end: String,
    /// Project id (all digits) or username prefix
    #[arg(long)]
    filter: Option<String>,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(data) => match serde_json::to_string_pretty(&data) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("Failed to render response: {}", err);
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            tracing::debug!(error = ?err, "worklog command failed");
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let debug_enabled = std::env::var("WORKLOG_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli) -> Result<Value, ClientError> {
    let socket = match cli.socket {
        Some(path) => path,
        None => socket_path()?,
    };
    let (method, params) = request_for(cli.command)?;
    DaemonClient::new(socket).call(method, params)
}

fn request_for(command: Commands) -> Result<(Method, Option<Value>), ClientError> {
    let request = match command {
        Commands::Health => (Method::GetHealth, None),
        Commands::Start { worker, task } => (
            Method::StartFromTask,
            Some(to_params(&StartFromTaskParams {
                worker_id: worker,
                task_id: task,
            })?),
        ),
        Commands::Resume { worker, session } => (
            Method::ResumeSession,
            Some(to_params(&ResumeSessionParams {
                worker_id: worker,
                session_id: session,
            })?),
        ),
        Commands::End { session, comment } => (
            Method::EndSession,
            Some(to_params(&EndSessionParams {
                session_id: session,
                comment,
            })?),
        ),
        Commands::ToggleWorker { worker } => (
            Method::ToggleWorkerActive,
            Some(to_params(&WorkerIdParams { worker_id: worker })?),
        ),
        Commands::Worker(WorkerCommand::Add {
            username,
            first_name,
            last_name,
            area,
        }) => (
            Method::CreateWorker,
            Some(to_params(&CreateWorkerParams {
                username,
                first_name,
                last_name,
                area,
            })?),
        ),
        Commands::Project(ProjectCommand::Add {
            id,
            name,
            color,
            private,
        }) => (
            Method::CreateProject,
            Some(to_params(&CreateProjectParams {
                id,
                name,
                color,
                is_private: private,
            })?),
        ),
        Commands::Task(TaskCommand::Add {
            title,
            description,
            project,
            worker,
            priority,
            due,
            duration,
        }) => (
            Method::CreateTask,
            Some(to_params(&CreateTaskParams {
                title,
                description,
                project_id: project,
                worker_id: worker,
                priority,
                due,
                duration,
            })?),
        ),
        Commands::DailyTotal { worker, date } => {
            let date = date.unwrap_or_else(|| {
                chrono::Local::now()
                    .date_naive()
                    .format(DATE_FORMAT)
                    .to_string()
            });
            (
                Method::GetDailyTotal,
                Some(to_params(&DailyTotalParams {
                    worker_id: worker,
                    date,
                })?),
            )
        }
        Commands::Matrix(range) => (
            Method::GetProjectDateMatrix,
            Some(to_params(&DateRangeParams {
                start_date: range.start,
                end_date: range.end,
                filter: range.filter,
            })?),
        ),
        Commands::PeriodReport { start, end, worker } => (
            Method::GetPeriodReport,
            Some(to_params(&PeriodReportParams {
                start_date: start,
                end_date: end,
                worker,
            })?),
        ),
        Commands::Report { start, end, filter } => (
            Method::GetDetailedReport,
            Some(to_params(&DetailedReportParams {
                start_date: start,
                end_date: end,
                filter,
            })?),
        ),
        Commands::TaskSummary { task } => (
            Method::GetTaskSummary,
            Some(to_params(&TaskSummaryParams { task_id: task })?),
        ),
        Commands::ProjectHours { project } => (
            Method::GetProjectHours,
            Some(to_params(&ProjectHoursParams {
                project_id: project,
            })?),
        ),
        Commands::Dashboard => (Method::GetDashboard, None),
        Commands::Idle => (Method::GetIdleWorkers, None),
    };
    Ok(request)
}

fn to_params<T: Serialize>(params: &T) -> Result<Value, ClientError> {
    serde_json::to_value(params)
        .map_err(|err| ClientError::Transport(format!("Failed to serialize params: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("worklog").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn start_maps_to_start_from_task() {
        let cli = parse(&["start", "--worker", "3", "--task", "7"]);
        let (method, params) = request_for(cli.command).unwrap();
        assert_eq!(method, Method::StartFromTask);
        assert_eq!(
            params.unwrap(),
            serde_json::json!({"worker_id": 3, "task_id": 7})
        );
    }

    #[test]
    fn task_add_carries_optional_fields() {
        let cli = parse(&[
            "task",
            "add",
            "Planos",
            "--project",
            "1042",
            "--duration",
            "02:30",
        ]);
        let (method, params) = request_for(cli.command).unwrap();
        assert_eq!(method, Method::CreateTask);
        let params = params.unwrap();
        assert_eq!(params["title"], "Planos");
        assert_eq!(params["project_id"], 1042);
        assert_eq!(params["duration"], "02:30");
        assert!(params["due"].is_null());
    }

    #[test]
    fn daily_total_defaults_to_today() {
        let cli = parse(&["daily-total", "--worker", "1"]);
        let (_, params) = request_for(cli.command).unwrap();
        let today = chrono::Local::now().date_naive().format(DATE_FORMAT).to_string();
        assert_eq!(params.unwrap()["date"], today.as_str());
    }

    #[test]
    fn report_range_bounds_travel_together() {
        assert!(Cli::try_parse_from(["worklog", "report", "--start", "2025-03-01"]).is_err());

        let cli = parse(&["report"]);
        let (method, params) = request_for(cli.command).unwrap();
        assert_eq!(method, Method::GetDetailedReport);
        assert_eq!(
            params.unwrap(),
            serde_json::json!({"start_date": null, "end_date": null, "filter": null})
        );
    }

    #[test]
    fn read_only_views_send_no_params() {
        for (args, expected) in [
            (["dashboard"], Method::GetDashboard),
            (["idle"], Method::GetIdleWorkers),
            (["health"], Method::GetHealth),
        ] {
            let (method, params) = request_for(parse(&args).command).unwrap();
            assert_eq!(method, expected);
            assert!(params.is_none());
        }
    }

    #[test]
    fn task_summary_help_describes_raw_time() {
        use clap::CommandFactory;

        let command = Cli::command();
        let about = command
            .find_subcommand("task-summary")
            .and_then(|sub| sub.get_about())
            .map(|about| about.to_string());
        assert_eq!(
            about.as_deref(),
            Some("Raw time logged on a task and who logged it")
        );
    }

    #[test]
    fn socket_flag_overrides_environment() {
        let cli = parse(&["--socket", "/tmp/other.sock", "idle"]);
        assert_eq!(
            cli.socket.as_deref(),
            Some(std::path::Path::new("/tmp/other.sock"))
        );
    }
}
