//! # Storage Layer
//!
//! Persistence for plans and configuration.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Plan | JSON, YAML or TOML (by extension) | any path given on the command line |
//! | Project config | TOML | `gantt.toml` at or above the plan's directory |
//! | Global config | TOML | `config.toml` in the user config directory |
//!
//! ## Concurrency Safety
//!
//! - [`PlanFile`] uses file locking (`fs2`) for reads and writes
//! - Writes are atomic (temp file + rename)

mod config;
mod plan_file;

pub use config::{
    parse_date, Config, ConfigError, GlobalConfig, OutputFormat, ProjectConfig, SchedulingConfig,
    PROJECT_CONFIG_FILE,
};
pub use plan_file::{PlanFile, PlanFormat};
