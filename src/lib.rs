//! Gantt graph - dependency graph and constraint propagation for Gantt charts
//!
//! Tasks are vertices, dependencies are edges. Editing a task date, a
//! dependency or the task tree runs one pass that moves every affected task
//! so all start and end rules hold again, then reports each moved task once.
//! Plans are stored as JSON, YAML or TOML files and edited through the
//! `gantt` command-line tool.

pub mod cli;
pub mod domain;
pub mod storage;

pub use domain::{
    DependencyType, GanttAdapter, GanttDependency, GanttDiagramGraph, GraphError, Plan,
    PlanDependency, PlanTask, Schedule, TaskId,
};
