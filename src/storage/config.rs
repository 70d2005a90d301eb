//! Configuration handling
//!
//! Scheduling settings live in a `gantt.toml` found next to the plan file or
//! in one of its parent directories (project). Output preferences live in
//! `config.toml` under the user's config directory (global), which
//! `GANTT_CONFIG_DIR` overrides.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Date, ScheduleSettings};

/// Name of the project configuration file
pub const PROJECT_CONFIG_FILE: &str = "gantt.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Invalid(String),

    #[error("TOML error: {0}")]
    Parse(String),
}

/// Parses an RFC 3339 timestamp or a plain `YYYY-MM-DD` date (midnight UTC)
pub fn parse_date(value: &str) -> Result<Date, ConfigError> {
    let value = value.trim();
    if let Ok(date) = chrono::DateTime::parse_from_rfc3339(value) {
        return Ok(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| {
            ConfigError::Invalid(format!(
                "'{}' is not a date (expected YYYY-MM-DD or RFC 3339)",
                value
            ))
        })
}

/// `[scheduling]` section
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Apply a task's own start rule before its dependencies, so dependencies win
    pub dependencies_have_priority: bool,

    /// No task may start before this date
    pub project_start: Option<String>,

    /// Tasks ending after this date are reported
    pub deadline: Option<String>,
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ProjectConfig {
    pub scheduling: SchedulingConfig,
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Used when `--format` is not given
    pub default_format: OutputFormat,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Settings in effect for one plan file
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads the configuration that applies to the plan file at `plan_path`
    pub fn for_plan(plan_path: &Path) -> Result<Self> {
        let global = Self::load_global()?;

        let start = plan_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .or_else(|| std::env::current_dir().ok());

        let project_root = start.as_deref().and_then(Self::find_project_root);
        let project = match &project_root {
            Some(root) => Self::load_project_config(root)?,
            None => ProjectConfig::default(),
        };

        Ok(Self {
            project,
            global,
            project_root,
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        if let Some(dir) = std::env::var_os("GANTT_CONFIG_DIR") {
            return Some(PathBuf::from(dir));
        }
        ProjectDirs::from("dev", "gantt", "gantt-graph").map(|dirs| dirs.config_dir().to_path_buf())
    }

    fn load_global() -> Result<GlobalConfig> {
        match Self::global_config_dir() {
            Some(dir) => read_toml_or_default(&dir.join("config.toml"), "global"),
            None => Ok(GlobalConfig::default()),
        }
    }

    fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
        read_toml_or_default(&project_root.join(PROJECT_CONFIG_FILE), "project")
    }

    /// Finds the closest directory at or above `start` holding a `gantt.toml`
    pub fn find_project_root(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if current.join(PROJECT_CONFIG_FILE).is_file() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Returns true if a project configuration was found
    pub fn is_in_project(&self) -> bool {
        self.project_root.is_some()
    }

    /// Engine settings from the `[scheduling]` section
    pub fn schedule_settings(&self) -> Result<ScheduleSettings> {
        let scheduling = &self.project.scheduling;
        let project_start = scheduling
            .project_start
            .as_deref()
            .map(parse_date)
            .transpose()
            .context("Invalid scheduling.project_start")?;
        let deadline = scheduling
            .deadline
            .as_deref()
            .map(parse_date)
            .transpose()
            .context("Invalid scheduling.deadline")?;

        Ok(ScheduleSettings {
            dependencies_have_priority: scheduling.dependencies_have_priority,
            project_start,
            deadline,
        })
    }
}

/// Missing files yield the defaults; `scope` names the file in errors
fn read_toml_or_default<T: DeserializeOwned + Default>(path: &Path, scope: &str) -> Result<T> {
    if !path.is_file() {
        return Ok(T::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Cannot read {} config {}", scope, path.display()))?;
    toml::from_str(&content)
        .map_err(|e| ConfigError::Parse(e.to_string()))
        .with_context(|| format!("Bad {} config {}", scope, path.display()))
}
