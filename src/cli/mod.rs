//! # Command-Line Interface
//!
//! The `gantt` tool: every command takes a plan file, loads it into the
//! engine and either edits it or reports on it.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Edit | Change the plan, reschedule dependants | `add`, `move`, `resize`, `link`, `unlink`, `remove` |
//! | Schedule | Enforce every rule | `schedule --write` |
//! | Query | Read-only reports | `check-link`, `critical-path`, `inspect` |
//!
//! ## Output Formats
//!
//! All commands support the `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Logging
//!
//! `--verbose` (or `-v`) turns on debug logs on stderr; `RUST_LOG` overrides
//! the filter:
//! ```bash
//! RUST_LOG=gantt_graph=trace gantt move plan.yaml design --start 2020-01-06
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod edit;
mod output;
mod query;

pub use app::{run, Cli, Commands, LinkType};
pub use output::{Output, OutputFormat};
