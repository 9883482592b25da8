//! IPC protocol types and validation for worklogd.
//!
//! This crate is shared by the daemon and its clients to prevent schema drift.
//! The daemon remains the authority on validation, but clients can reuse the
//! same types to construct valid requests and decode typed responses.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod params;
mod schema;

pub use params::*;
pub use schema::*;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024; // 1MB

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    StartFromTask,
    ResumeSession,
    EndSession,
    ToggleWorkerActive,
    CreateWorker,
    CreateProject,
    CreateTask,
    GetDailyTotal,
    GetProjectDateMatrix,
    GetPeriodReport,
    GetDetailedReport,
    GetTaskSummary,
    GetProjectHours,
    GetDashboard,
    GetIdleWorkers,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(method: Method, params: Option<Value>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            method,
            id: None,
            params,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

/// Parameter payloads validate themselves after deserialization.
pub trait Validate {
    fn validate(&self) -> Result<(), ErrorInfo>;
}

pub fn parse_params<T>(params: Option<Value>) -> Result<T, ErrorInfo>
where
    T: DeserializeOwned + Validate,
{
    let params = params.ok_or_else(|| ErrorInfo::new("invalid_params", "params are required"))?;
    if !params.is_object() {
        return Err(ErrorInfo::new("invalid_params", "params must be an object"));
    }
    let parsed: T = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new("invalid_params", format!("params are invalid: {}", err))
    })?;
    parsed.validate()?;
    Ok(parsed)
}

/// Parses a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate, ErrorInfo> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        ErrorInfo::new(
            "validation_error",
            format!("{} must be a date in YYYY-MM-DD form", field),
        )
    })
}

/// Parses an `hh:mm` duration into whole seconds.
///
/// Hours and minutes are plain non-negative integers; minutes are not capped
/// at 59, so `"0:90"` is ninety minutes.
pub fn parse_duration_hhmm(value: &str, field: &str) -> Result<i64, ErrorInfo> {
    let invalid = || {
        ErrorInfo::new(
            "validation_error",
            format!("{} must be a duration in hh:mm form", field),
        )
    };

    let mut parts = value.trim().split(':');
    let (hours, minutes) = match (parts.next(), parts.next(), parts.next()) {
        (Some(hours), Some(minutes), None) => (hours, minutes),
        _ => return Err(invalid()),
    };
    let hours: i64 = hours.trim().parse().map_err(|_| invalid())?;
    let minutes: i64 = minutes.trim().parse().map_err(|_| invalid())?;
    if hours < 0 || minutes < 0 {
        return Err(invalid());
    }

    hours
        .checked_mul(3600)
        .and_then(|hours| {
            minutes
                .checked_mul(60)
                .and_then(|minutes| hours.checked_add(minutes))
        })
        .ok_or_else(invalid)
}

/// Renders whole seconds as zero-padded `HH:MM`.
pub fn format_duration_hhmm(seconds: i64) -> String {
    let hours = seconds.div_euclid(3600);
    let minutes = seconds.rem_euclid(3600) / 60;
    format!("{:02}:{:02}", hours, minutes)
}

fn require_string(value: &str, field: &str) -> Result<(), ErrorInfo> {
    if value.trim().is_empty() {
        return Err(ErrorInfo::new(
            "missing_field",
            format!("{} is required", field),
        ));
    }
    Ok(())
}

fn require_id(value: i64, field: &str) -> Result<(), ErrorInfo> {
    if value <= 0 {
        return Err(ErrorInfo::new(
            "invalid_id",
            format!("{} must be a positive integer", field),
        ));
    }
    Ok(())
}
