//! Commands that change a plan (schedule, add, move, resize, link, unlink, remove)
//!
//! Every command loads the plan into a schedule, applies one edit through the
//! engine, reports the tasks whose dates moved and writes the plan back
//! unless `--dry-run` is given.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use super::output::{format_date, Output};
use crate::domain::{
    Date, DependencyType, Plan, PlanTask, Schedule, ScheduleSettings, TaskId,
};
use crate::storage::PlanFile;

/// A plan file loaded into the engine
pub(super) struct Session {
    file: PlanFile,
    original: Plan,
    pub(super) schedule: Schedule,
}

impl Session {
    pub(super) fn open(path: &Path, settings: &ScheduleSettings) -> Result<Self> {
        let file = PlanFile::new(path)?;
        let original = file.read()?;
        let schedule = Schedule::build(original.clone(), settings)
            .with_context(|| format!("Invalid plan: {}", path.display()))?;
        Ok(Self {
            file,
            original,
            schedule,
        })
    }

    /// Tasks whose dates differ from the file, in plan order
    fn changes(&self) -> Vec<DateChange> {
        let current = self.schedule.to_plan();
        current
            .tasks
            .iter()
            .filter_map(|task| {
                let before = self.original.task(&task.id)?;
                (before.start != task.start || before.end != task.end).then(|| DateChange {
                    id: task.id.clone(),
                    previous_start: before.start,
                    previous_end: before.end,
                    start: task.start,
                    end: task.end,
                })
            })
            .collect()
    }

    /// Reports the outcome and saves unless `dry_run`
    fn finish(mut self, output: &Output, summary: &str, dry_run: bool) -> Result<()> {
        let notifications = self.schedule.adapter_mut().take_notifications();
        debug!(notifications = notifications.len(), "engine notifications delivered");

        let changes = self.changes();
        if !dry_run {
            self.file.write(&self.schedule.to_plan())?;
        }

        if output.is_json() {
            output.data(&EditReport {
                message: summary,
                changed: &changes,
                written: !dry_run,
            });
            return Ok(());
        }

        output.success(summary);
        for change in &changes {
            println!(
                "  {:<16} {} .. {}  (was {} .. {})",
                change.id.to_string(),
                format_date(&change.start),
                format_date(&change.end),
                format_date(&change.previous_start),
                format_date(&change.previous_end),
            );
        }
        if dry_run {
            println!("(dry run, {} not written)", self.file.path().display());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct DateChange {
    id: TaskId,
    previous_start: Date,
    previous_end: Date,
    start: Date,
    end: Date,
}

#[derive(Serialize)]
struct EditReport<'a> {
    message: &'a str,
    changed: &'a [DateChange],
    written: bool,
}

pub(super) fn parse_id(value: &str) -> Result<TaskId> {
    value
        .parse()
        .with_context(|| format!("Invalid task ID '{}'", value))
}

/// Enforces every rule of the plan
pub fn schedule(output: &Output, path: &Path, settings: &ScheduleSettings, write: bool) -> Result<()> {
    let mut session = Session::open(path, settings)?;
    session.schedule.enforce_all_restrictions()?;

    if output.is_json() || write {
        return session.finish(output, "Schedule enforced", !write);
    }

    let changes = session.changes();
    print_tree(&session.schedule);
    if !changes.is_empty() {
        println!();
        println!(
            "{} task(s) would move; run with --write to save",
            changes.len()
        );
    }
    Ok(())
}

/// Prints the task tree with dates
fn print_tree(schedule: &Schedule) {
    println!("{:<24} {:<12} {:<12} NAME", "ID", "START", "END");
    println!("{}", "-".repeat(64));
    for id in schedule.top_level_tasks() {
        print_task(schedule, id, 0);
    }
}

fn print_task(schedule: &Schedule, id: &TaskId, depth: usize) {
    let Some(task) = schedule.adapter().get(id) else {
        return;
    };
    let label = format!("{}{}", "  ".repeat(depth), task.id);
    println!(
        "{:<24} {:<12} {:<12} {}",
        label,
        format_date(&task.start),
        format_date(&task.end),
        task.name
    );
    for child in &task.children {
        print_task(schedule, child, depth + 1);
    }
}

/// Fields of `gantt add`
pub struct NewTask {
    pub name: String,
    pub id: Option<String>,
    pub start: Date,
    pub end: Date,
    pub parent: Option<String>,
}

pub fn add(
    output: &Output,
    path: &Path,
    settings: &ScheduleSettings,
    new_task: NewTask,
    dry_run: bool,
) -> Result<()> {
    if new_task.end < new_task.start {
        anyhow::bail!("End date must not be before the start date");
    }

    let mut session = Session::open(path, settings)?;
    let id = match new_task.id.as_deref() {
        Some(id) => parse_id(id)?,
        None => TaskId::generate(&new_task.name, Utc::now()),
    };
    let parent = new_task.parent.as_deref().map(parse_id).transpose()?;

    let task = PlanTask::new(id.clone(), new_task.start, new_task.end).with_name(new_task.name);
    session.schedule.add_plan_task(task, parent.as_ref())?;

    session.finish(output, &format!("Added task {}", id), dry_run)
}

pub fn move_task(
    output: &Output,
    path: &Path,
    settings: &ScheduleSettings,
    task: &str,
    start: Date,
    dry_run: bool,
) -> Result<()> {
    let id = parse_id(task)?;
    let mut session = Session::open(path, settings)?;
    session.schedule.move_task(&id, start)?;
    session.finish(output, &format!("Moved {}", id), dry_run)
}

pub fn resize(
    output: &Output,
    path: &Path,
    settings: &ScheduleSettings,
    task: &str,
    end: Date,
    dry_run: bool,
) -> Result<()> {
    let id = parse_id(task)?;
    let mut session = Session::open(path, settings)?;
    session.schedule.resize_task(&id, end)?;
    session.finish(output, &format!("Resized {}", id), dry_run)
}

pub fn link(
    output: &Output,
    path: &Path,
    settings: &ScheduleSettings,
    from: &str,
    to: &str,
    dependency_type: DependencyType,
    dry_run: bool,
) -> Result<()> {
    let from = parse_id(from)?;
    let to = parse_id(to)?;
    let mut session = Session::open(path, settings)?;
    session.schedule.link(&from, &to, dependency_type)?;
    session.finish(
        output,
        &format!("Linked {} -> {} ({})", from, to, dependency_type),
        dry_run,
    )
}

pub fn unlink(
    output: &Output,
    path: &Path,
    settings: &ScheduleSettings,
    from: &str,
    to: &str,
    dry_run: bool,
) -> Result<()> {
    let from = parse_id(from)?;
    let to = parse_id(to)?;
    let mut session = Session::open(path, settings)?;
    session.schedule.unlink(&from, &to)?;
    session.finish(output, &format!("Unlinked {} -> {}", from, to), dry_run)
}

pub fn remove(
    output: &Output,
    path: &Path,
    settings: &ScheduleSettings,
    task: &str,
    dry_run: bool,
) -> Result<()> {
    let id = parse_id(task)?;
    let mut session = Session::open(path, settings)?;
    session.schedule.remove_task(&id)?;
    session.finish(output, &format!("Removed {}", id), dry_run)
}
