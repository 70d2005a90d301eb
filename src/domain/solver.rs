//! Constraint propagation
//!
//! A change to a task is propagated in two phases. Planning walks the graph
//! breadth-first from the changed task and produces an ordered list of
//! recalculations; a task reached twice is moved to the back so it is
//! computed after everything that can influence it. Execution then walks
//! the list, recomputing a task only if one of the recalculations that
//! reached it actually changed something.
//!
//! After the list runs, containers whose children all moved later are
//! shrunk to their first child, and tasks linked START_START to a shrunk
//! container get their own pass. Those follow-up passes are queued, not
//! nested.

use indexmap::IndexSet;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, trace};

use super::adapter::GanttAdapter;
use super::constraint::{ConstraintChain, Date};
use super::dependency::{DependencyType, GanttDependency, PointType, TaskKey, TaskPoint};
use super::graph::{describe, GanttDiagramGraph, GraphError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecalculationKey<T> {
    point: TaskPoint<T>,
    parent_recalculation: bool,
}

#[derive(Debug)]
struct Recalculation<T> {
    key: RecalculationKey<T>,
    /// Recalculations that reached this one, by position in the arena
    parents: Vec<usize>,
    recalculation_called: bool,
    data_point_modified: bool,
    could_have_been_modified_beforehand: bool,
}

/// Ordered recalculations produced by planning
#[derive(Debug)]
pub(super) struct RecalculationPlan<T> {
    nodes: Vec<Recalculation<T>>,
    order: Vec<usize>,
}

impl<T: TaskKey> RecalculationPlan<T> {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            order: Vec::new(),
        }
    }

    fn create(&mut self, point: TaskPoint<T>, parent_recalculation: bool) -> usize {
        self.nodes.push(Recalculation {
            key: RecalculationKey {
                point,
                parent_recalculation,
            },
            parents: Vec::new(),
            recalculation_called: false,
            data_point_modified: false,
            could_have_been_modified_beforehand: false,
        });
        self.nodes.len() - 1
    }

    fn add_parent(&mut self, node: usize, parent: usize) {
        let parents = &mut self.nodes[node].parents;
        if !parents.contains(&parent) {
            parents.push(parent);
        }
    }

    /// Position in the current order of a regular recalculation of `point`
    fn position_of(&self, point: &TaskPoint<T>) -> Option<usize> {
        self.order.iter().position(|&idx| {
            let key = &self.nodes[idx].key;
            !key.parent_recalculation && key.point == *point
        })
    }

    /// Runs `other` after this plan
    fn append(&mut self, other: RecalculationPlan<T>) {
        let offset = self.nodes.len();
        for mut node in other.nodes {
            for parent in node.parents.iter_mut() {
                *parent += offset;
            }
            self.nodes.push(node);
        }
        self.order
            .extend(other.order.into_iter().map(|idx| idx + offset));
    }

    pub(super) fn len(&self) -> usize {
        self.order.len()
    }

    /// Sequence of recalculated points, parent recalculations flagged
    #[cfg(test)]
    fn points(&self) -> Vec<(TaskPoint<T>, bool)> {
        self.order
            .iter()
            .map(|&idx| {
                let key = &self.nodes[idx].key;
                (key.point.clone(), key.parent_recalculation)
            })
            .collect()
    }

    /// Returns true if some recalculation reaching `node` changed, or may have changed, its data
    fn have_to_do_calculation(&self, node: usize) -> Result<bool, GraphError> {
        let recalculation = &self.nodes[node];
        if recalculation.parents.is_empty() {
            return Ok(true);
        }
        for &parent in &recalculation.parents {
            let parent = &self.nodes[parent];
            if !parent.recalculation_called {
                return Err(GraphError::ParentNotRecalculated(describe(
                    &recalculation.key.point.task,
                )));
            }
            if parent.data_point_modified || parent.could_have_been_modified_beforehand {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Tasks whose change started this plan
    fn triggers(&self) -> impl Iterator<Item = &T> {
        self.nodes
            .iter()
            .filter(|node| node.could_have_been_modified_beforehand)
            .map(|node| &node.key.point.task)
    }
}

impl<A: GanttAdapter> GanttDiagramGraph<A> {
    // ---------------------------------------------------------------------
    // Planning
    // ---------------------------------------------------------------------

    pub(super) fn recalculations_needed_from_all(
        &self,
        tasks: &[A::Task],
    ) -> RecalculationPlan<A::Task> {
        let mut plan = RecalculationPlan::new();
        for task in tasks {
            plan.append(self.recalculations_needed_from(task));
        }
        plan
    }

    pub(super) fn recalculations_needed_from(&self, task: &A::Task) -> RecalculationPlan<A::Task> {
        let mut plan = RecalculationPlan::new();
        let mut parents_done = IndexSet::new();
        let mut pending = VecDeque::new();

        let first_point = TaskPoint::both(task.clone());
        let first = plan.create(first_point.clone(), false);
        plan.nodes[first].could_have_been_modified_beforehand = true;
        self.push_parent_recalculations(&mut plan, &mut parents_done, &first_point);
        plan.order.push(first);
        pending.push_back(first);

        while let Some(current) = pending.pop_front() {
            let current_point = plan.nodes[current].key.point.clone();
            for each in self.immediate_reachable_from(&current_point) {
                let idx = match plan.position_of(&each) {
                    Some(position) => plan.order.remove(position),
                    None => plan.create(each.clone(), false),
                };
                plan.add_parent(idx, current);
                self.push_parent_recalculations(&mut plan, &mut parents_done, &each);
                plan.order.push(idx);
                pending.push_back(idx);
            }
        }

        plan
    }

    /// Queues a recalculation of every ancestor of a task whose start can move,
    /// topmost first, each at most once per plan
    fn push_parent_recalculations(
        &self,
        plan: &mut RecalculationPlan<A::Task>,
        parents_done: &mut IndexSet<A::Task>,
        point: &TaskPoint<A::Task>,
    ) {
        if point.point_type != PointType::Both {
            return;
        }
        let ancestors = self.ancestors_of(&point.task);
        for ancestor in ancestors.into_iter().rev() {
            if parents_done.insert(ancestor.clone()) {
                let idx = plan.create(TaskPoint::both(ancestor), true);
                plan.order.push(idx);
            }
        }
    }

    /// Parent, grandparent and so on up to the top level
    pub(super) fn ancestors_of(&self, task: &A::Task) -> Vec<A::Task> {
        let mut result = Vec::new();
        let mut current = self.from_child_to_parent.get(task);
        while let Some(parent) = current {
            if result.contains(parent) {
                break;
            }
            result.push(parent.clone());
            current = self.from_child_to_parent.get(parent);
        }
        result
    }

    // ---------------------------------------------------------------------
    // Execution
    // ---------------------------------------------------------------------

    pub(super) fn do_recalculations(
        &mut self,
        plan: RecalculationPlan<A::Task>,
    ) -> Result<(), GraphError> {
        let mut pending = VecDeque::from([plan]);

        while let Some(mut plan) = pending.pop_front() {
            debug!(recalculations = plan.len(), "running recalculations");
            let modified = self.run_plan(&mut plan)?;

            let mut candidates: IndexSet<A::Task> = plan.triggers().cloned().collect();
            candidates.extend(modified);

            let shrunk = self.shrunk_containers_of(&candidates)?;
            for task in self.tasks_affected_by_shrinking(&shrunk) {
                pending.push_back(self.recalculations_needed_from(&task));
            }
        }
        Ok(())
    }

    fn run_plan(
        &mut self,
        plan: &mut RecalculationPlan<A::Task>,
    ) -> Result<IndexSet<A::Task>, GraphError> {
        let mut all_modified = IndexSet::new();
        for position in 0..plan.order.len() {
            let idx = plan.order[position];
            plan.nodes[idx].recalculation_called = true;

            let modified = if plan.have_to_do_calculation(idx)? {
                let point = plan.nodes[idx].key.point.clone();
                self.task_changes_position(&point)?
            } else {
                false
            };

            plan.nodes[idx].data_point_modified = modified;
            if modified {
                let task = plan.nodes[idx].key.point.task.clone();
                trace!(task = ?task, "recalculation modified task");
                self.modified_in_pass.insert(task.clone());
                all_modified.insert(task);
            }
        }
        Ok(all_modified)
    }

    fn task_changes_position(&mut self, point: &TaskPoint<A::Task>) -> Result<bool, GraphError> {
        let task = &point.task;
        match point.point_type {
            PointType::Both => self.enforce_start_and_end(task),
            PointType::End => {
                let previous_end = self.adapter.end_date(task);
                self.enforce_end_date(task, previous_end)
            }
            PointType::None => Ok(false),
        }
    }

    fn enforce_start_and_end(&mut self, task: &A::Task) -> Result<bool, GraphError> {
        let previous_end = self.adapter.end_date(task);
        let start_changed = self.enforce_start_date(task)?;
        let end_changed = self.enforce_end_date(task, previous_end)?;
        Ok(start_changed || end_changed)
    }

    fn enforce_start_date(&mut self, task: &A::Task) -> Result<bool, GraphError> {
        match self.calculate_start_date_for(task) {
            Some(new_start) if new_start != self.adapter.start_date(task) => {
                self.write_start(task, new_start)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Applies the dependency and own start rules in priority order, then the global ones
    fn calculate_start_date_for(&self, task: &A::Task) -> Option<Date> {
        let incoming = self.incoming_dependencies(task);
        let from_dependencies = self.adapter.start_constraints_given(&incoming);
        let own = self.adapter.start_constraints(task);

        let (first, second) = if self.dependencies_constraints_have_priority {
            (own, from_dependencies)
        } else {
            (from_dependencies, own)
        };

        ConstraintChain::initial_value(None)
            .with_constraints(first)
            .with_constraints(second)
            .with_constraints(self.global_start_constraints.iter().cloned())
            .apply()
    }

    /// Returns true if the end differs from `previous_end`, the end before the start was enforced
    fn enforce_end_date(&mut self, task: &A::Task, previous_end: Date) -> Result<bool, GraphError> {
        let new_end = {
            let incoming = self.incoming_dependencies(task);
            ConstraintChain::initial_value(None)
                .with_constraint(self.adapter.current_length_constraint(task))
                .with_constraints(self.adapter.end_constraints_given(&incoming))
                .with_constraint(self.adapter.end_after_start_constraint(task))
                .apply()
        };

        let Some(new_end) = new_end else {
            return Ok(false);
        };
        if new_end != self.adapter.end_date(task) {
            self.write_end(task, new_end)?;
        }
        Ok(new_end != previous_end)
    }

    // ---------------------------------------------------------------------
    // Container shrinkage
    // ---------------------------------------------------------------------

    /// Shrinks the containers above the modified tasks, bottom-up, and returns
    /// the ones whose start moved
    fn shrunk_containers_of(
        &mut self,
        modified: &IndexSet<A::Task>,
    ) -> Result<Vec<A::Task>, GraphError> {
        let mut all_to_shrink = Vec::new();
        for container in self.topmost_that_could_need_shrinking(modified) {
            all_to_shrink.extend(self.containers_bottom_up(&container));
        }

        let mut result = Vec::new();
        for container in all_to_shrink {
            if self.enforce_parent_shrinkage(&container)? {
                result.push(container);
            }
        }
        Ok(result)
    }

    fn topmost_that_could_need_shrinking(&self, modified: &IndexSet<A::Task>) -> IndexSet<A::Task> {
        let mut result = IndexSet::new();
        for task in modified {
            if !self.contains_task(task) {
                continue;
            }
            let topmost = self
                .ancestors_of(task)
                .pop()
                .unwrap_or_else(|| task.clone());
            if self.adapter.is_container(&topmost) {
                result.insert(topmost);
            }
        }
        result
    }

    /// Every container in the subtree of `container`, children before parents
    fn containers_bottom_up(&self, container: &A::Task) -> Vec<A::Task> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        self.collect_containers_bottom_up(container, &mut result, &mut seen);
        result
    }

    fn collect_containers_bottom_up(
        &self,
        container: &A::Task,
        result: &mut Vec<A::Task>,
        seen: &mut HashSet<A::Task>,
    ) {
        if !seen.insert(container.clone()) {
            return;
        }
        for child in self.adapter.children(container) {
            if self.adapter.is_container(&child) {
                self.collect_containers_bottom_up(&child, result, seen);
            }
        }
        result.push(container.clone());
    }

    /// Moves a container's start to its first child when every child starts
    /// later, keeping the container's end
    ///
    /// A container never grows earlier here. The START_START containment edge
    /// keeps children after the container's start only while dependency
    /// constraints have priority; otherwise a child's own rule (a fixed date
    /// before the container's start) wins and the container start is left
    /// stale after its first child.
    fn enforce_parent_shrinkage(&mut self, container: &A::Task) -> Result<bool, GraphError> {
        let old_begin = self.adapter.start_date(container);
        let first_start = self.adapter.smallest_begin_date_from_children(container);
        let previous_end = self.adapter.end_date(container);

        if first_start > old_begin {
            debug!(container = ?container, from = %old_begin, to = %first_start, "shrinking container");
            self.write_start(container, first_start)?;
            self.write_end(container, previous_end)?;
            self.modified_in_pass.insert(container.clone());
            return Ok(true);
        }
        Ok(false)
    }

    /// Destinations of visible START_START edges leaving a shrunk container
    fn tasks_affected_by_shrinking(&self, shrunk: &[A::Task]) -> Vec<A::Task> {
        let mut result = Vec::new();
        for container in shrunk {
            for dependency in self.outgoing_dependencies(container) {
                if dependency.dependency_type() == DependencyType::StartStart
                    && dependency.is_visible()
                {
                    result.push(dependency.destination().clone());
                }
            }
        }
        result
    }
}
