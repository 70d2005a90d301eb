//! Read-only commands (check-link, critical-path, inspect)

use std::path::Path;

use anyhow::{bail, Result};

use super::edit::{parse_id, Session};
use super::output::{format_date, Output};
use crate::domain::{self, DependencyType, ScheduleSettings, TaskId};

/// Fails if linking `from` to `to` would create a cycle
pub fn check_link(
    output: &Output,
    path: &Path,
    settings: &ScheduleSettings,
    from: &str,
    to: &str,
    dependency_type: DependencyType,
) -> Result<()> {
    let from = parse_id(from)?;
    let to = parse_id(to)?;
    let session = Session::open(path, settings)?;

    for id in [&from, &to] {
        if !session.schedule.contains_task(id) {
            bail!("Task not found: {}", id);
        }
    }

    if !session.schedule.can_link(&from, &to, dependency_type) {
        bail!(
            "Linking {} -> {} ({}) would create a cycle",
            from,
            to,
            dependency_type
        );
    }

    output.success(&format!(
        "{} -> {} ({}) can be linked",
        from, to, dependency_type
    ));
    Ok(())
}

pub fn critical_path(output: &Output, path: &Path, settings: &ScheduleSettings) -> Result<()> {
    let mut session = Session::open(path, settings)?;
    session.schedule.enforce_all_restrictions()?;
    let critical = domain::critical_path(&session.schedule);

    if output.is_json() {
        let items: Vec<_> = critical
            .iter()
            .filter_map(|id| session.schedule.adapter().get(id))
            .map(|task| {
                serde_json::json!({
                    "id": task.id,
                    "name": task.name,
                    "start": task.start,
                    "end": task.end,
                })
            })
            .collect();
        output.data(&items);
    } else if critical.is_empty() {
        println!("No critical path (the plan has no tasks).");
    } else {
        println!("Critical path ({} tasks):", critical.len());
        println!("{:<20} {:<12} {:<12} NAME", "ID", "START", "END");
        println!("{}", "-".repeat(60));
        for task in critical.iter().filter_map(|id| session.schedule.adapter().get(id)) {
            println!(
                "{:<20} {:<12} {:<12} {}",
                task.id.to_string(),
                format_date(&task.start),
                format_date(&task.end),
                task.name
            );
        }
    }

    Ok(())
}

pub fn inspect(output: &Output, path: &Path, settings: &ScheduleSettings) -> Result<()> {
    let mut session = Session::open(path, settings)?;
    session.schedule.enforce_all_restrictions()?;
    let schedule = &session.schedule;

    let initial = schedule.initial_tasks();
    let latest = schedule.latest_tasks();
    let violations = schedule.end_constraint_violations();
    let containers: Vec<TaskId> = schedule
        .tasks()
        .into_iter()
        .filter(|task| schedule.is_container(task))
        .collect();

    if output.is_json() {
        output.data(&serde_json::json!({
            "tasks": schedule.len(),
            "dependencies": schedule.visible_dependencies().len(),
            "containers": containers,
            "initial": initial,
            "latest": latest,
            "deadline_violations": violations,
        }));
        return Ok(());
    }

    println!("Tasks:        {}", schedule.len());
    println!("Dependencies: {}", schedule.visible_dependencies().len());
    println!("Containers:   {}", join(&containers));
    println!("Initial:      {}", join(&initial));
    println!("Latest:       {}", join(&latest));

    if let Some(deadline) = settings.deadline {
        if violations.is_empty() {
            println!("Deadline {}: met", format_date(&deadline));
        } else {
            println!("Deadline {}: missed by {}", format_date(&deadline), join(&violations));
        }
    }

    Ok(())
}

fn join(ids: &[TaskId]) -> String {
    if ids.is_empty() {
        return "-".to_string();
    }
    ids.iter()
        .map(TaskId::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
