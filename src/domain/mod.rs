//! Domain model for the Gantt scheduling engine
//!
//! Contains the dependency graph, the constraint solver and the plan model,
//! without any I/O concerns.

mod adapter;
mod constraint;
mod critical_path;
mod dependency;
mod graph;
mod id;
mod listeners;
mod notification;
mod plan;
mod reentrance;
mod solver;

pub use adapter::GanttAdapter;
pub use constraint::{Constraint, ConstraintChain, Date};
pub use critical_path::critical_path;
pub use dependency::{DependencyType, GanttDependency, PointType, TaskKey, TaskPoint};
pub use graph::{GanttDiagramGraph, GraphError};
pub use id::{IdError, TaskId};
pub use listeners::{GraphChangeListener, GraphChangeListeners, ListenerId};
pub use notification::{
    DateNotification, DeferredNotifier, LengthNotification, StartDateNotification,
};
pub use plan::{
    Plan, PlanAdapter, PlanDependency, PlanError, PlanTask, Schedule, ScheduleSettings,
    StartConstraint,
};
pub use reentrance::{Entrance, ReentranceGuard};
