//! Main CLI application structure

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::output::{Output, OutputFormat};
use super::{edit, query};
use crate::domain::{DependencyType, Date};
use crate::storage::{parse_date, Config};

#[derive(Parser)]
#[command(name = "gantt")]
#[command(author, version, about = "Dependency-aware scheduling for Gantt plans")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Dependency type as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LinkType {
    #[default]
    EndStart,
    StartStart,
    EndEnd,
    StartEnd,
}

impl From<LinkType> for DependencyType {
    fn from(link: LinkType) -> Self {
        match link {
            LinkType::EndStart => DependencyType::EndStart,
            LinkType::StartStart => DependencyType::StartStart,
            LinkType::EndEnd => DependencyType::EndEnd,
            LinkType::StartEnd => DependencyType::StartEnd,
        }
    }
}

fn date_arg(value: &str) -> Result<Date, String> {
    parse_date(value).map_err(|e| e.to_string())
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enforce every rule of the plan and show the result
    Schedule {
        /// Plan file (.json, .yaml or .toml)
        plan: PathBuf,

        /// Write the enforced dates back to the plan
        #[arg(long)]
        write: bool,
    },

    /// Add a task
    Add {
        plan: PathBuf,

        /// Task name
        name: String,

        /// Task ID (generated from the name if omitted)
        #[arg(long)]
        id: Option<String>,

        #[arg(long, value_parser = date_arg)]
        start: Date,

        #[arg(long, value_parser = date_arg)]
        end: Date,

        /// Container to add the task to
        #[arg(long)]
        parent: Option<String>,

        /// Preview without writing the plan
        #[arg(long)]
        dry_run: bool,
    },

    /// Move a task and pin its earliest start
    Move {
        plan: PathBuf,

        task: String,

        #[arg(long, value_parser = date_arg)]
        start: Date,

        #[arg(long)]
        dry_run: bool,
    },

    /// Change the end of a task
    Resize {
        plan: PathBuf,

        task: String,

        #[arg(long, value_parser = date_arg)]
        end: Date,

        #[arg(long)]
        dry_run: bool,
    },

    /// Add a dependency between two tasks
    Link {
        plan: PathBuf,

        from: String,

        to: String,

        #[arg(long = "type", value_enum, default_value_t = LinkType::EndStart)]
        link_type: LinkType,

        #[arg(long)]
        dry_run: bool,
    },

    /// Remove the dependency between two tasks
    Unlink {
        plan: PathBuf,

        from: String,

        to: String,

        #[arg(long)]
        dry_run: bool,
    },

    /// Remove a task (and everything it contains)
    Remove {
        plan: PathBuf,

        task: String,

        #[arg(long)]
        dry_run: bool,
    },

    /// Check whether a dependency can be added without creating a cycle
    CheckLink {
        plan: PathBuf,

        from: String,

        to: String,

        #[arg(long = "type", value_enum, default_value_t = LinkType::EndStart)]
        link_type: LinkType,
    },

    /// Show the tasks without slack
    CriticalPath { plan: PathBuf },

    /// Show the shape of the plan: initial and latest tasks, deadline violations
    Inspect { plan: PathBuf },
}

impl Commands {
    fn plan_path(&self) -> &Path {
        match self {
            Commands::Schedule { plan, .. }
            | Commands::Add { plan, .. }
            | Commands::Move { plan, .. }
            | Commands::Resize { plan, .. }
            | Commands::Link { plan, .. }
            | Commands::Unlink { plan, .. }
            | Commands::Remove { plan, .. }
            | Commands::CheckLink { plan, .. }
            | Commands::CriticalPath { plan }
            | Commands::Inspect { plan } => plan,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // A second init (tests calling run twice) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::for_plan(cli.command.plan_path())?;
    let format = cli
        .format
        .unwrap_or_else(|| config.global.default_format.into());
    let output = Output::new(format);
    let settings = config.schedule_settings()?;

    debug!(
        plan = %cli.command.plan_path().display(),
        project_root = ?config.project_root,
        "configuration loaded"
    );

    match cli.command {
        Commands::Schedule { plan, write } => edit::schedule(&output, &plan, &settings, write)?,

        Commands::Add {
            plan,
            name,
            id,
            start,
            end,
            parent,
            dry_run,
        } => edit::add(
            &output,
            &plan,
            &settings,
            edit::NewTask {
                name,
                id,
                start,
                end,
                parent,
            },
            dry_run,
        )?,

        Commands::Move {
            plan,
            task,
            start,
            dry_run,
        } => edit::move_task(&output, &plan, &settings, &task, start, dry_run)?,

        Commands::Resize {
            plan,
            task,
            end,
            dry_run,
        } => edit::resize(&output, &plan, &settings, &task, end, dry_run)?,

        Commands::Link {
            plan,
            from,
            to,
            link_type,
            dry_run,
        } => edit::link(&output, &plan, &settings, &from, &to, link_type.into(), dry_run)?,

        Commands::Unlink {
            plan,
            from,
            to,
            dry_run,
        } => edit::unlink(&output, &plan, &settings, &from, &to, dry_run)?,

        Commands::Remove {
            plan,
            task,
            dry_run,
        } => edit::remove(&output, &plan, &settings, &task, dry_run)?,

        Commands::CheckLink {
            plan,
            from,
            to,
            link_type,
        } => query::check_link(&output, &plan, &settings, &from, &to, link_type.into())?,

        Commands::CriticalPath { plan } => query::critical_path(&output, &plan, &settings)?,

        Commands::Inspect { plan } => query::inspect(&output, &plan, &settings)?,
    }

    debug!("command completed");
    Ok(())
}
