//! Task contract
//!
//! The graph never owns task data. Everything it needs to know about a task
//! (dates, structure, constraints) and every date it writes goes through a
//! [`GanttAdapter`]. Dependency edges are described by the separate
//! [`GanttDependency`] contract.

use chrono::Duration;

use super::constraint::{Constraint, Date};
use super::dependency::{DependencyType, GanttDependency, TaskKey};
use super::notification::DateNotification;

pub trait GanttAdapter {
    /// Vertex identity
    type Task: TaskKey;

    /// Edge payload
    type Dependency: GanttDependency<Self::Task>;

    /// Ordered children of a container (empty for plain tasks)
    fn children(&self, task: &Self::Task) -> Vec<Self::Task>;

    fn is_container(&self, task: &Self::Task) -> bool;

    fn start_date(&self, task: &Self::Task) -> Date;

    /// Moves the start, keeping the length
    fn set_start_date(&mut self, task: &Self::Task, start: Date);

    fn end_date(&self, task: &Self::Task) -> Date;

    fn set_end_date(&mut self, task: &Self::Task, end: Date);

    fn length(&self, task: &Self::Task) -> Duration {
        self.end_date(task) - self.start_date(task)
    }

    /// Earliest start among the children; the container's own start if it has none
    fn smallest_begin_date_from_children(&self, container: &Self::Task) -> Date {
        self.children(container)
            .iter()
            .map(|child| self.start_date(child))
            .min()
            .unwrap_or_else(|| self.start_date(container))
    }

    /// Keeps the end where the current length puts it; containers follow their children
    fn current_length_constraint(&self, task: &Self::Task) -> Constraint {
        if self.is_container(task) {
            Constraint::void()
        } else {
            Constraint::bigger_or_equal_than(self.end_date(task))
        }
    }

    fn end_after_start_constraint(&self, task: &Self::Task) -> Constraint {
        Constraint::bigger_or_equal_than(self.start_date(task))
    }

    /// The task's own start rules, in application order
    fn start_constraints(&self, task: &Self::Task) -> Vec<Constraint>;

    /// Start rules implied by incoming dependencies
    fn start_constraints_given(&self, incoming: &[&Self::Dependency]) -> Vec<Constraint> {
        incoming
            .iter()
            .filter_map(|dependency| {
                let source = dependency.source();
                match dependency.dependency_type() {
                    DependencyType::EndStart => {
                        Some(Constraint::bigger_or_equal_than(self.end_date(source)))
                    }
                    DependencyType::StartStart => {
                        Some(Constraint::bigger_or_equal_than(self.start_date(source)))
                    }
                    DependencyType::EndEnd | DependencyType::StartEnd => None,
                }
            })
            .collect()
    }

    /// End rules implied by incoming dependencies
    fn end_constraints_given(&self, incoming: &[&Self::Dependency]) -> Vec<Constraint> {
        incoming
            .iter()
            .filter_map(|dependency| {
                let source = dependency.source();
                match dependency.dependency_type() {
                    DependencyType::EndEnd => {
                        Some(Constraint::bigger_or_equal_than(self.end_date(source)))
                    }
                    DependencyType::StartEnd => {
                        Some(Constraint::bigger_or_equal_than(self.start_date(source)))
                    }
                    DependencyType::EndStart | DependencyType::StartStart => None,
                }
            })
            .collect()
    }

    /// Receives the coalesced notifications of a finished pass
    fn notify(&mut self, task: &Self::Task, notification: DateNotification) {
        let _ = (task, notification);
    }

    /// Called once a task has left the graph, before dependants are re-enforced
    fn task_removed(&mut self, task: &Self::Task) {
        let _ = task;
    }
}
