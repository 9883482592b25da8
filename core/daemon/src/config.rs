//! Daemon configuration loaded from `~/.worklog/config.toml`.
//!
//! A missing file means defaults. A malformed file is an error; main decides
//! whether to fall back.

use chrono::{FixedOffset, NaiveTime};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Result, WorklogError};

const CONFIG_ENV: &str = "WORKLOG_CONFIG";
const DEFAULT_CUTOFF: &str = "18:35";
const DEFAULT_WORKDAY_FLOOR: &str = "08:00";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    pub auto_close: AutoCloseConfig,
    pub workday_floor: NaiveTime,
    pub utc_offset: Option<FixedOffset>,
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoCloseConfig {
    pub enabled: bool,
    pub cutoff: NaiveTime,
    pub poll_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            auto_close: AutoCloseConfig::default(),
            workday_floor: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            utc_offset: None,
            db_path: None,
        }
    }
}

impl Default for AutoCloseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cutoff: NaiveTime::from_hms_opt(18, 35, 0).unwrap_or_default(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    auto_close: AutoCloseSection,
    #[serde(default)]
    time: TimeSection,
    #[serde(default)]
    storage: StorageSection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AutoCloseSection {
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default = "default_cutoff")]
    cutoff: String,
    #[serde(default = "default_poll_interval_secs")]
    poll_interval_secs: u64,
}

impl Default for AutoCloseSection {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            cutoff: default_cutoff(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimeSection {
    #[serde(default = "default_workday_floor")]
    workday_floor: String,
    #[serde(default)]
    utc_offset: Option<String>,
}

impl Default for TimeSection {
    fn default() -> Self {
        Self {
            workday_floor: default_workday_floor(),
            utc_offset: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StorageSection {
    #[serde(default)]
    db_path: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

fn default_cutoff() -> String {
    DEFAULT_CUTOFF.to_string()
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_workday_floor() -> String {
    DEFAULT_WORKDAY_FLOOR.to_string()
}

pub fn default_config_path() -> std::result::Result<PathBuf, String> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(".worklog").join("config.toml"))
}

pub fn load_config(path: Option<PathBuf>) -> Result<DaemonConfig> {
    let config_path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    if !config_path.exists() {
        return Ok(DaemonConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|err| WorklogError::Config {
        path: config_path.clone(),
        details: err.to_string(),
    })?;
    let file = toml::from_str::<ConfigFile>(&content).map_err(|err| WorklogError::Config {
        path: config_path.clone(),
        details: err.to_string(),
    })?;
    resolve(file, &config_path)
}

fn resolve(file: ConfigFile, path: &Path) -> Result<DaemonConfig> {
    let malformed = |details: String| WorklogError::Config {
        path: path.to_path_buf(),
        details,
    };

    let cutoff = parse_clock_time(&file.auto_close.cutoff)
        .ok_or_else(|| malformed(format!("auto_close.cutoff {:?} is not HH:MM", file.auto_close.cutoff)))?;
    let workday_floor = parse_clock_time(&file.time.workday_floor).ok_or_else(|| {
        malformed(format!(
            "time.workday_floor {:?} is not HH:MM",
            file.time.workday_floor
        ))
    })?;
    if file.auto_close.poll_interval_secs == 0 {
        return Err(malformed(
            "auto_close.poll_interval_secs must be positive".to_string(),
        ));
    }
    let utc_offset = match file.time.utc_offset.as_deref() {
        Some(raw) => Some(
            raw.trim()
                .parse::<FixedOffset>()
                .map_err(|_| malformed(format!("time.utc_offset {:?} is not +HH:MM", raw)))?,
        ),
        None => None,
    };

    Ok(DaemonConfig {
        auto_close: AutoCloseConfig {
            enabled: file.auto_close.enabled,
            cutoff,
            poll_interval_secs: file.auto_close.poll_interval_secs,
        },
        workday_floor,
        utc_offset,
        db_path: file.storage.db_path,
    })
}

pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}
