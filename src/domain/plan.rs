//! Plan model
//!
//! A plan is the serialisable form of a schedule: tasks with their dates,
//! containment and start rule, plus the user dependencies between them.
//! [`PlanAdapter`] stores the tasks and exposes them to the engine;
//! a [`Schedule`] is the engine graph built over one plan.

use chrono::Duration;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use super::adapter::GanttAdapter;
use super::constraint::{Constraint, Date};
use super::dependency::{DependencyType, GanttDependency};
use super::graph::{GanttDiagramGraph, GraphError};
use super::id::TaskId;
use super::notification::DateNotification;

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("Duplicate task id: {0}")]
    DuplicateTask(TaskId),

    #[error("Task {task} referenced by {referenced_by} does not exist")]
    UnknownTask { task: TaskId, referenced_by: String },

    #[error("Task {0} is listed as a child of more than one container")]
    MultipleParents(TaskId),

    #[error("Task {0} contains itself")]
    ContainmentCycle(TaskId),

    #[error("No dependency from {0} to {1}")]
    NoSuchDependency(TaskId, TaskId),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// How a task positions its start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "date", rename_all = "snake_case")]
pub enum StartConstraint {
    /// As early as dependencies and the containing task allow
    #[default]
    AsSoonAsPossible,
    /// Never before the given date
    NotEarlierThan(Date),
    /// Pinned to the given date
    FixedDate(Date),
}

impl StartConstraint {
    pub fn is_as_soon_as_possible(&self) -> bool {
        matches!(self, StartConstraint::AsSoonAsPossible)
    }

    pub fn to_constraints(&self) -> Vec<Constraint> {
        match self {
            StartConstraint::AsSoonAsPossible => vec![],
            StartConstraint::NotEarlierThan(date) => vec![Constraint::bigger_or_equal_than(*date)],
            StartConstraint::FixedDate(date) => vec![Constraint::equal_to(*date)],
        }
    }
}

/// A task of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTask {
    pub id: TaskId,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    pub start: Date,

    pub end: Date,

    /// Ordered children; a task with children is a container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TaskId>,

    #[serde(default, skip_serializing_if = "StartConstraint::is_as_soon_as_possible")]
    pub constraint: StartConstraint,
}

impl PlanTask {
    pub fn new(id: TaskId, start: Date, end: Date) -> Self {
        Self {
            id,
            name: String::new(),
            start,
            end,
            children: Vec::new(),
            constraint: StartConstraint::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_children(mut self, children: Vec<TaskId>) -> Self {
        self.children = children;
        self
    }

    pub fn with_constraint(mut self, constraint: StartConstraint) -> Self {
        self.constraint = constraint;
        self
    }

    pub fn is_container(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn length(&self) -> Duration {
        self.end - self.start
    }
}

fn visible_by_default() -> bool {
    true
}

/// A dependency between two plan tasks
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanDependency {
    pub from: TaskId,

    pub to: TaskId,

    #[serde(rename = "type", default)]
    pub dependency_type: DependencyType,

    /// Containment edges are never stored in plan files
    #[serde(skip, default = "visible_by_default")]
    visible: bool,
}

impl PlanDependency {
    pub fn new(from: TaskId, to: TaskId, dependency_type: DependencyType) -> Self {
        Self {
            from,
            to,
            dependency_type,
            visible: true,
        }
    }

    pub fn end_start(from: TaskId, to: TaskId) -> Self {
        Self::new(from, to, DependencyType::EndStart)
    }
}

impl GanttDependency<TaskId> for PlanDependency {
    fn source(&self) -> &TaskId {
        &self.from
    }

    fn destination(&self) -> &TaskId {
        &self.to
    }

    fn dependency_type(&self) -> DependencyType {
        self.dependency_type
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn invisible(origin: TaskId, destination: TaskId, dependency_type: DependencyType) -> Self {
        Self {
            from: origin,
            to: destination,
            dependency_type,
            visible: false,
        }
    }
}

/// Serialisable plan
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default)]
    pub tasks: Vec<PlanTask>,

    #[serde(default)]
    pub dependencies: Vec<PlanDependency>,
}

impl Plan {
    pub fn task(&self, id: &TaskId) -> Option<&PlanTask> {
        self.tasks.iter().find(|task| &task.id == id)
    }

    /// Tasks that are nobody's child, in file order
    pub fn top_level_ids(&self) -> Vec<TaskId> {
        let children: std::collections::HashSet<_> =
            self.tasks.iter().flat_map(|task| task.children.iter()).collect();
        self.tasks
            .iter()
            .filter(|task| !children.contains(&task.id))
            .map(|task| task.id.clone())
            .collect()
    }

    /// Checks ids are unique, every reference resolves and containment is a forest
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut ids = HashMap::new();
        for task in &self.tasks {
            if ids.insert(&task.id, task).is_some() {
                return Err(PlanError::DuplicateTask(task.id.clone()));
            }
        }

        let mut parent_of: HashMap<&TaskId, &TaskId> = HashMap::new();
        for task in &self.tasks {
            for child in &task.children {
                if !ids.contains_key(child) {
                    return Err(PlanError::UnknownTask {
                        task: child.clone(),
                        referenced_by: task.id.to_string(),
                    });
                }
                if parent_of.insert(child, &task.id).is_some() {
                    return Err(PlanError::MultipleParents(child.clone()));
                }
            }
        }

        for task in &self.tasks {
            let mut current = parent_of.get(&task.id);
            let mut steps = 0;
            while let Some(parent) = current {
                steps += 1;
                if *parent == &task.id || steps > self.tasks.len() {
                    return Err(PlanError::ContainmentCycle(task.id.clone()));
                }
                current = parent_of.get(parent);
            }
        }

        for dependency in &self.dependencies {
            for endpoint in [&dependency.from, &dependency.to] {
                if !ids.contains_key(endpoint) {
                    return Err(PlanError::UnknownTask {
                        task: endpoint.clone(),
                        referenced_by: format!("{} -> {}", dependency.from, dependency.to),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Task store backing a [`Schedule`]
#[derive(Debug, Clone, Default)]
pub struct PlanAdapter {
    name: String,
    tasks: IndexMap<TaskId, PlanTask>,
    notifications: Vec<(TaskId, DateNotification)>,
}

impl PlanAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stores a task, returning the one it replaced
    pub fn insert(&mut self, task: PlanTask) -> Option<PlanTask> {
        self.tasks.insert(task.id.clone(), task)
    }

    pub fn get(&self, id: &TaskId) -> Option<&PlanTask> {
        self.tasks.get(id)
    }

    pub fn get_mut(&mut self, id: &TaskId) -> Option<&mut PlanTask> {
        self.tasks.get_mut(id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &PlanTask> {
        self.tasks.values()
    }

    /// Notifications delivered since the last call, oldest first
    pub fn take_notifications(&mut self) -> Vec<(TaskId, DateNotification)> {
        std::mem::take(&mut self.notifications)
    }

    // The engine only asks about tasks it holds; a miss is a broken adapter.
    fn task(&self, id: &TaskId) -> &PlanTask {
        &self.tasks[id]
    }

    fn task_mut(&mut self, id: &TaskId) -> &mut PlanTask {
        &mut self.tasks[id]
    }
}

impl GanttAdapter for PlanAdapter {
    type Task = TaskId;
    type Dependency = PlanDependency;

    fn children(&self, task: &TaskId) -> Vec<TaskId> {
        self.tasks
            .get(task)
            .map(|t| t.children.clone())
            .unwrap_or_default()
    }

    fn is_container(&self, task: &TaskId) -> bool {
        self.tasks.get(task).is_some_and(PlanTask::is_container)
    }

    fn start_date(&self, task: &TaskId) -> Date {
        self.task(task).start
    }

    fn set_start_date(&mut self, task: &TaskId, start: Date) {
        let task = self.task_mut(task);
        let length = task.length();
        task.start = start;
        task.end = start + length;
    }

    fn end_date(&self, task: &TaskId) -> Date {
        self.task(task).end
    }

    fn set_end_date(&mut self, task: &TaskId, end: Date) {
        self.task_mut(task).end = end;
    }

    fn start_constraints(&self, task: &TaskId) -> Vec<Constraint> {
        self.task(task).constraint.to_constraints()
    }

    fn notify(&mut self, task: &TaskId, notification: DateNotification) {
        self.notifications.push((task.clone(), notification));
    }

    fn task_removed(&mut self, task: &TaskId) {
        for each in self.tasks.values_mut() {
            each.children.retain(|child| child != task);
        }
        self.tasks.shift_remove(task);
    }
}

/// How a schedule is enforced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleSettings {
    /// Own start rules are applied before dependency rules, so dependencies win
    pub dependencies_have_priority: bool,
    /// No task starts before this date
    pub project_start: Option<Date>,
    /// Tasks should end by this date; reported, not enforced
    pub deadline: Option<Date>,
}

/// The engine graph over a plan
pub type Schedule = GanttDiagramGraph<PlanAdapter>;

impl GanttDiagramGraph<PlanAdapter> {
    /// Builds the graph for `plan`; every visible dependency enforces its destination
    pub fn build(plan: Plan, settings: &ScheduleSettings) -> Result<Self, PlanError> {
        plan.validate()?;

        let top_level = plan.top_level_ids();
        let Plan {
            name,
            tasks,
            dependencies,
        } = plan;

        let mut adapter = PlanAdapter::new(name);
        for task in tasks {
            adapter.insert(task);
        }

        let global_start = settings
            .project_start
            .map(Constraint::bigger_or_equal_than)
            .into_iter()
            .collect();
        let global_end = settings
            .deadline
            .map(Constraint::less_or_equal_than)
            .into_iter()
            .collect();

        let mut schedule = Self::new(
            adapter,
            global_start,
            global_end,
            settings.dependencies_have_priority,
        );
        schedule.add_top_level_all(top_level)?;
        for dependency in dependencies {
            schedule.add(dependency)?;
        }

        debug!(tasks = schedule.len(), "schedule built");
        Ok(schedule)
    }

    /// Snapshot of current dates and user dependencies
    pub fn to_plan(&self) -> Plan {
        Plan {
            name: self.adapter().name().to_string(),
            tasks: self.adapter().tasks().cloned().collect(),
            dependencies: self.visible_dependencies().into_iter().cloned().collect(),
        }
    }

    fn require(&self, id: &TaskId) -> Result<(), PlanError> {
        if self.contains_task(id) {
            Ok(())
        } else {
            Err(GraphError::TaskNotFound(id.to_string()).into())
        }
    }

    /// Moves a task to `start` and pins it there as its earliest start
    pub fn move_task(&mut self, id: &TaskId, start: Date) -> Result<(), PlanError> {
        self.require(id)?;
        if let Some(task) = self.adapter_mut().get_mut(id) {
            task.constraint = StartConstraint::NotEarlierThan(start);
        }
        self.set_start_date(id, start)?;
        Ok(())
    }

    pub fn resize_task(&mut self, id: &TaskId, end: Date) -> Result<(), PlanError> {
        self.require(id)?;
        self.set_end_date(id, end)?;
        Ok(())
    }

    pub fn link(
        &mut self,
        from: &TaskId,
        to: &TaskId,
        dependency_type: DependencyType,
    ) -> Result<(), PlanError> {
        self.add(PlanDependency::new(from.clone(), to.clone(), dependency_type))?;
        Ok(())
    }

    pub fn unlink(&mut self, from: &TaskId, to: &TaskId) -> Result<(), PlanError> {
        let dependency = self
            .dependency_from(from, to)
            .filter(|dependency| dependency.is_visible())
            .cloned()
            .ok_or_else(|| PlanError::NoSuchDependency(from.clone(), to.clone()))?;
        self.remove_dependency(&dependency)?;
        Ok(())
    }

    /// Returns false if linking `from` to `to` would create a cycle
    pub fn can_link(&self, from: &TaskId, to: &TaskId, dependency_type: DependencyType) -> bool {
        from != to
            && self.does_not_provoke_loop(&PlanDependency::new(
                from.clone(),
                to.clone(),
                dependency_type,
            ))
    }

    pub fn remove_task(&mut self, id: &TaskId) -> Result<(), PlanError> {
        self.require(id)?;
        self.remove(id)?;
        Ok(())
    }

    /// Adds a new task at the top level or as the last child of `parent`
    pub fn add_plan_task(&mut self, task: PlanTask, parent: Option<&TaskId>) -> Result<(), PlanError> {
        if self.adapter().get(&task.id).is_some() {
            return Err(PlanError::DuplicateTask(task.id));
        }
        if let Some(parent) = parent {
            self.require(parent)?;
        }

        let id = task.id.clone();
        self.adapter_mut().insert(task);

        match parent {
            Some(parent) => {
                if let Some(container) = self.adapter_mut().get_mut(parent) {
                    container.children.push(id);
                }
                self.children_added_to(parent)?;
            }
            None => {
                self.add_top_level(id.clone())?;
                self.enforce_restrictions(&id)?;
            }
        }
        Ok(())
    }
}
