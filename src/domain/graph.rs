//! Gantt diagram dependency graph
//!
//! Vertices are tasks, edges are dependencies. The graph enforces the rules
//! embodied in the dependencies, the task constraints and the containment
//! of tasks in containers: every edit made through it triggers a pass that
//! propagates the change to every affected task (see [`super::solver`]).
//!
//! Containers are wired to their children with two invisible edges per
//! child: child END_END parent and parent START_START child.

use chrono::Duration;
use indexmap::IndexSet;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tracing::{debug, trace};

use super::adapter::GanttAdapter;
use super::constraint::{Constraint, Date};
use super::dependency::{DependencyType, GanttDependency, TaskKey, TaskPoint};
use super::listeners::{GraphChangeListener, GraphChangeListeners, ListenerId};
use super::notification::{DeferredNotifier, LengthNotification, StartDateNotification};
use super::reentrance::{Entrance, ReentranceGuard};

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Self-dependency not allowed: {0}")]
    SelfDependency(String),

    #[error("Adding dependency would create a cycle: {0} -> {1}")]
    CycleDetected(String, String),

    #[error("A different dependency already links {0} -> {1}")]
    DependencyExists(String, String),

    #[error("Cannot start a manual notification while a pass is already running")]
    AlreadyInsidePass,

    #[error("Recalculation of {0} was reached before one of its parents was recalculated")]
    ParentNotRecalculated(String),
}

pub(super) fn describe<T: std::fmt::Debug>(task: &T) -> String {
    format!("{:?}", task)
}

/// Same endpoints, same type and same visibility
fn same_dependency<T: TaskKey, D: GanttDependency<T>>(a: &D, b: &D) -> bool {
    a.source() == b.source()
        && a.destination() == b.destination()
        && a.dependency_type() == b.dependency_type()
        && a.is_visible() == b.is_visible()
}

/// Task graph with constraint enforcement
pub struct GanttDiagramGraph<A: GanttAdapter> {
    pub(super) adapter: A,

    /// The underlying directed graph
    pub(super) graph: DiGraph<A::Task, A::Dependency>,

    /// Map from task to node index, rebuilt after removals
    node_map: HashMap<A::Task, NodeIndex>,

    top_level_tasks: Vec<A::Task>,

    pub(super) from_child_to_parent: HashMap<A::Task, A::Task>,

    pub(super) global_start_constraints: Vec<Constraint>,

    global_end_constraints: Vec<Constraint>,

    pub(super) dependencies_constraints_have_priority: bool,

    guard: ReentranceGuard,

    /// Notifier of the running pass
    notifier: Option<DeferredNotifier<A::Task>>,

    pub(super) modified_in_pass: IndexSet<A::Task>,

    pre_listeners: GraphChangeListeners,

    post_listeners: GraphChangeListeners,
}

impl<A: GanttAdapter> GanttDiagramGraph<A> {
    pub fn new(
        adapter: A,
        global_start_constraints: Vec<Constraint>,
        global_end_constraints: Vec<Constraint>,
        dependencies_constraints_have_priority: bool,
    ) -> Self {
        Self {
            adapter,
            graph: DiGraph::new(),
            node_map: HashMap::new(),
            top_level_tasks: Vec::new(),
            from_child_to_parent: HashMap::new(),
            global_start_constraints,
            global_end_constraints,
            dependencies_constraints_have_priority,
            guard: ReentranceGuard::new(),
            notifier: None,
            modified_in_pass: IndexSet::new(),
            pre_listeners: GraphChangeListeners::new(),
            post_listeners: GraphChangeListeners::new(),
        }
    }

    /// Graph without global constraints, own constraints applied after dependency ones
    pub fn with_adapter(adapter: A) -> Self {
        Self::new(adapter, Vec::new(), Vec::new(), false)
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Raw access to task data; changes made here are not enforced until
    /// [`Self::enforce_restrictions`] is called
    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn global_start_constraints(&self) -> &[Constraint] {
        &self.global_start_constraints
    }

    pub fn global_end_constraints(&self) -> &[Constraint] {
        &self.global_end_constraints
    }

    pub fn dependencies_constraints_have_priority(&self) -> bool {
        self.dependencies_constraints_have_priority
    }

    // ---------------------------------------------------------------------
    // Listeners
    // ---------------------------------------------------------------------

    pub fn add_pre_graph_change_listener(&mut self, listener: GraphChangeListener) -> ListenerId {
        self.pre_listeners.register(listener)
    }

    pub fn remove_pre_graph_change_listener(&mut self, id: ListenerId) -> bool {
        self.pre_listeners.unregister(id)
    }

    pub fn add_post_graph_change_listener(&mut self, listener: GraphChangeListener) -> ListenerId {
        self.post_listeners.register(listener)
    }

    pub fn remove_post_graph_change_listener(&mut self, id: ListenerId) -> bool {
        self.post_listeners.unregister(id)
    }

    pub fn add_pre_change_listeners(
        &mut self,
        listeners: impl IntoIterator<Item = GraphChangeListener>,
    ) -> Vec<ListenerId> {
        self.pre_listeners.register_all(listeners)
    }

    pub fn add_post_change_listeners(
        &mut self,
        listeners: impl IntoIterator<Item = GraphChangeListener>,
    ) -> Vec<ListenerId> {
        self.post_listeners.register_all(listeners)
    }

    // ---------------------------------------------------------------------
    // Structure
    // ---------------------------------------------------------------------

    /// Adds a task and, for containers, its whole subtree with containment edges
    pub fn add_task(&mut self, task: A::Task) -> Result<(), GraphError> {
        if self.node_map.contains_key(&task) {
            return Ok(());
        }

        let idx = self.graph.add_node(task.clone());
        self.node_map.insert(task.clone(), idx);
        trace!(task = ?task, "added task");

        if self.adapter.is_container(&task) {
            let mut dependencies_to_add = Vec::new();
            for child in self.adapter.children(&task) {
                self.from_child_to_parent.insert(child.clone(), task.clone());
                self.add_task(child.clone())?;
                dependencies_to_add.push(A::Dependency::invisible(
                    child.clone(),
                    task.clone(),
                    DependencyType::EndEnd,
                ));
                dependencies_to_add.push(A::Dependency::invisible(
                    task.clone(),
                    child,
                    DependencyType::StartStart,
                ));
            }
            for dependency in dependencies_to_add {
                self.add(dependency)?;
            }
        }

        Ok(())
    }

    pub fn add_tasks(&mut self, tasks: impl IntoIterator<Item = A::Task>) -> Result<(), GraphError> {
        for task in tasks {
            self.add_task(task)?;
        }
        Ok(())
    }

    /// Adds a root task
    pub fn add_top_level(&mut self, task: A::Task) -> Result<(), GraphError> {
        self.top_level_tasks.push(task.clone());
        self.add_task(task)
    }

    pub fn add_top_level_all(
        &mut self,
        tasks: impl IntoIterator<Item = A::Task>,
    ) -> Result<(), GraphError> {
        for task in tasks {
            self.add_top_level(task)?;
        }
        Ok(())
    }

    /// Wires children that the adapter lists for `container` but the graph
    /// does not know yet, then enforces the container
    pub fn children_added_to(&mut self, container: &A::Task) -> Result<(), GraphError> {
        self.index_of(container)?;

        for child in self.adapter.children(container) {
            if self.node_map.contains_key(&child) {
                continue;
            }
            self.from_child_to_parent
                .insert(child.clone(), container.clone());
            self.add_task(child.clone())?;
            self.add(A::Dependency::invisible(
                child.clone(),
                container.clone(),
                DependencyType::EndEnd,
            ))?;
            self.add(A::Dependency::invisible(
                container.clone(),
                child,
                DependencyType::StartStart,
            ))?;
        }

        self.enforce_restrictions(container)
    }

    /// Removes a task (and the subtree of a container), then re-enforces
    /// every task that depended on it
    pub fn remove(&mut self, task: &A::Task) -> Result<(), GraphError> {
        let needing_enforcing = self.outgoing_tasks_for(task);
        self.remove_vertex(task)?;
        let remaining: Vec<_> = needing_enforcing
            .into_iter()
            .filter(|each| self.node_map.contains_key(each))
            .collect();
        self.enforce_restrictions_on(&remaining)
    }

    fn remove_vertex(&mut self, task: &A::Task) -> Result<(), GraphError> {
        let idx = self.index_of(task)?;
        let children = if self.adapter.is_container(task) {
            self.adapter.children(task)
        } else {
            Vec::new()
        };

        self.graph.remove_node(idx);
        self.rebuild_node_map();
        self.top_level_tasks.retain(|each| each != task);
        self.from_child_to_parent.remove(task);
        self.adapter.task_removed(task);
        debug!(task = ?task, "removed task");

        for child in children {
            if self.node_map.contains_key(&child) {
                self.remove(&child)?;
            }
        }
        Ok(())
    }

    /// Rebuilds the node map after removal
    fn rebuild_node_map(&mut self) {
        self.node_map.clear();
        for idx in self.graph.node_indices() {
            if let Some(task) = self.graph.node_weight(idx) {
                self.node_map.insert(task.clone(), idx);
            }
        }
    }

    /// Adds a dependency and enforces its destination
    ///
    /// A visible dependency that would make a task reach itself through
    /// propagating edges is rejected with [`GraphError::CycleDetected`].
    /// Two tasks are linked by at most one edge per direction: adding the
    /// dependency that is already there only re-enforces the destination,
    /// any other dependency over an existing edge (a containment edge
    /// included) is [`GraphError::DependencyExists`].
    pub fn add(&mut self, dependency: A::Dependency) -> Result<(), GraphError> {
        let source = dependency.source().clone();
        let destination = dependency.destination().clone();

        if source == destination {
            return Err(GraphError::SelfDependency(describe(&source)));
        }

        let source_idx = self.index_of(&source)?;
        let destination_idx = self.index_of(&destination)?;

        if dependency.is_visible() && !self.does_not_provoke_loop(&dependency) {
            return Err(GraphError::CycleDetected(
                describe(&source),
                describe(&destination),
            ));
        }

        match self.dependency_from(&source, &destination) {
            Some(existing) if same_dependency::<A::Task, _>(existing, &dependency) => {}
            Some(_) => {
                return Err(GraphError::DependencyExists(
                    describe(&source),
                    describe(&destination),
                ));
            }
            None => {
                trace!(
                    source = ?source,
                    destination = ?destination,
                    dependency_type = %dependency.dependency_type(),
                    "added dependency"
                );
                self.graph.add_edge(source_idx, destination_idx, dependency);
            }
        }

        self.enforce_restrictions(&destination)
    }

    /// Removes `dependency` and enforces the destination
    ///
    /// An edge between the same endpoints that differs in type or visibility
    /// is left in place.
    pub fn remove_dependency(&mut self, dependency: &A::Dependency) -> Result<(), GraphError> {
        let source_idx = self.index_of(dependency.source())?;
        let destination_idx = self.index_of(dependency.destination())?;

        let matching = self
            .graph
            .find_edge(source_idx, destination_idx)
            .filter(|edge| {
                self.graph.edge_weight(*edge).is_some_and(|existing| {
                    same_dependency::<A::Task, _>(existing, dependency)
                })
            });
        if let Some(edge) = matching {
            self.graph.remove_edge(edge);
        }

        let destination = dependency.destination().clone();
        self.enforce_restrictions(&destination)
    }

    // ---------------------------------------------------------------------
    // Enforcement entry points
    // ---------------------------------------------------------------------

    /// One pass over every top-level task
    pub fn enforce_all_restrictions(&mut self) -> Result<(), GraphError> {
        let top_level = self.top_level_tasks.clone();
        self.enforce_restrictions_on(&top_level)
    }

    /// One pass triggered by a change of `task`
    pub fn enforce_restrictions(&mut self, task: &A::Task) -> Result<(), GraphError> {
        self.index_of(task)?;
        self.execute_with_pre_and_post_actions_only_if_new_entrance(|graph| {
            let recalculations = graph.recalculations_needed_from(task);
            graph.do_recalculations(recalculations)
        })
    }

    /// One pass triggered by a change of every task in `tasks`
    pub fn enforce_restrictions_on(&mut self, tasks: &[A::Task]) -> Result<(), GraphError> {
        for task in tasks {
            self.index_of(task)?;
        }
        self.execute_with_pre_and_post_actions_only_if_new_entrance(|graph| {
            let recalculations = graph.recalculations_needed_from_all(tasks);
            graph.do_recalculations(recalculations)
        })
    }

    /// Moves the start of a task, keeping its length, and enforces the consequences
    pub fn set_start_date(&mut self, task: &A::Task, start: Date) -> Result<(), GraphError> {
        self.index_of(task)?;
        self.write_start(task, start)
    }

    /// Moves the end of a task and enforces the consequences
    pub fn set_end_date(&mut self, task: &A::Task, end: Date) -> Result<(), GraphError> {
        self.index_of(task)?;
        self.write_end(task, end)
    }

    /// Runs `action` inside one guarded pass and hands back its notifications
    /// unflushed; deliver them with [`Self::flush`]
    ///
    /// Date changes made by `action` are not propagated on their own, call
    /// the enforcement entry points from inside the action for that.
    pub fn manual_notification_on<F>(
        &mut self,
        action: F,
    ) -> Result<DeferredNotifier<A::Task>, GraphError>
    where
        F: FnOnce(&mut Self) -> Result<(), GraphError>,
    {
        match self.guard.entrance_requested() {
            Entrance::AlreadyInside => Err(GraphError::AlreadyInsidePass),
            Entrance::New => {
                self.modified_in_pass.clear();
                self.pre_listeners.fire_all();
                self.notifier = Some(DeferredNotifier::new());
                let result = action(self);
                let notifier = self.notifier.take().unwrap_or_default();
                if result.is_ok() {
                    self.post_listeners.fire_all();
                }
                self.guard.exit();
                result.map(|()| notifier)
            }
        }
    }

    /// Delivers queued notifications to the adapter
    pub fn flush(&mut self, mut notifier: DeferredNotifier<A::Task>) {
        let adapter = &mut self.adapter;
        notifier.do_notifications(|task, notification| adapter.notify(task, notification));
    }

    /// Returns true while a pass is running
    pub fn is_inside_pass(&self) -> bool {
        self.guard.is_inside()
    }

    /// Tasks whose dates were changed by the last pass, in modification order
    pub fn modified_in_last_pass(&self) -> Vec<A::Task> {
        self.modified_in_pass.iter().cloned().collect()
    }

    fn execute_with_pre_and_post_actions_only_if_new_entrance<F>(
        &mut self,
        action: F,
    ) -> Result<(), GraphError>
    where
        F: FnOnce(&mut Self) -> Result<(), GraphError>,
    {
        match self.guard.entrance_requested() {
            Entrance::AlreadyInside => action(self),
            Entrance::New => {
                let result = self.on_new_entrance(action);
                self.guard.exit();
                result
            }
        }
    }

    fn on_new_entrance<F>(&mut self, action: F) -> Result<(), GraphError>
    where
        F: FnOnce(&mut Self) -> Result<(), GraphError>,
    {
        self.modified_in_pass.clear();
        self.pre_listeners.fire_all();

        self.notifier = Some(DeferredNotifier::new());
        let result = action(self);
        if let Some(notifier) = self.notifier.take() {
            self.flush(notifier);
        }

        if result.is_ok() {
            self.post_listeners.fire_all();
        }
        result
    }

    /// Writes a new start through the adapter and reports it like any other change
    pub(super) fn write_start(&mut self, task: &A::Task, new_start: Date) -> Result<(), GraphError> {
        let previous_start = self.adapter.start_date(task);
        let previous_length = self.adapter.length(task);
        self.adapter.set_start_date(task, new_start);
        trace!(task = ?task, from = %previous_start, to = %new_start, "start moved");

        let notification = StartDateNotification {
            previous_start,
            previous_length,
            new_start,
        };

        match self.guard.entrance_requested() {
            Entrance::AlreadyInside => {
                self.queue_start(task, notification);
                Ok(())
            }
            Entrance::New => {
                let result = self.on_new_entrance(|graph| {
                    graph.queue_start(task, notification);
                    let recalculations = graph.recalculations_needed_from(task);
                    graph.do_recalculations(recalculations)
                });
                self.guard.exit();
                result
            }
        }
    }

    pub(super) fn write_end(&mut self, task: &A::Task, new_end: Date) -> Result<(), GraphError> {
        let previous_length = self.adapter.length(task);
        self.adapter.set_end_date(task, new_end);
        let new_length = self.adapter.length(task);
        trace!(task = ?task, to = %new_end, "end moved");

        let notification = LengthNotification {
            previous_length,
            new_length,
        };

        match self.guard.entrance_requested() {
            Entrance::AlreadyInside => {
                self.queue_length(task, notification);
                Ok(())
            }
            Entrance::New => {
                let result = self.on_new_entrance(|graph| {
                    graph.queue_length(task, notification);
                    let recalculations = graph.recalculations_needed_from(task);
                    graph.do_recalculations(recalculations)
                });
                self.guard.exit();
                result
            }
        }
    }

    fn queue_start(&mut self, task: &A::Task, notification: StartDateNotification) {
        if let Some(notifier) = self.notifier.as_mut() {
            notifier.add_start(task, notification);
        }
    }

    fn queue_length(&mut self, task: &A::Task, notification: LengthNotification) {
        if let Some(notifier) = self.notifier.as_mut() {
            notifier.add_length(task, notification);
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub(super) fn index_of(&self, task: &A::Task) -> Result<NodeIndex, GraphError> {
        self.node_map
            .get(task)
            .copied()
            .ok_or_else(|| GraphError::TaskNotFound(describe(task)))
    }

    /// Returns true if the graph contains the task
    pub fn contains_task(&self, task: &A::Task) -> bool {
        self.node_map.contains_key(task)
    }

    /// Returns true if the graph holds this exact dependency
    pub fn contains_dependency(&self, dependency: &A::Dependency) -> bool {
        self.dependency_from(dependency.source(), dependency.destination())
            .is_some_and(|existing| same_dependency::<A::Task, _>(existing, dependency))
    }

    pub fn dependency_from(&self, from: &A::Task, to: &A::Task) -> Option<&A::Dependency> {
        let from = self.node_map.get(from)?;
        let to = self.node_map.get(to)?;
        self.graph
            .find_edge(*from, *to)
            .and_then(|edge| self.graph.edge_weight(edge))
    }

    pub(super) fn incoming_dependencies(&self, task: &A::Task) -> Vec<&A::Dependency> {
        self.edges_of(task, Direction::Incoming)
    }

    pub(super) fn outgoing_dependencies(&self, task: &A::Task) -> Vec<&A::Dependency> {
        self.edges_of(task, Direction::Outgoing)
    }

    fn edges_of(&self, task: &A::Task, direction: Direction) -> Vec<&A::Dependency> {
        match self.node_map.get(task) {
            Some(idx) => self
                .graph
                .edges_directed(*idx, direction)
                .map(|edge| edge.weight())
                .collect(),
            None => vec![],
        }
    }

    /// Tasks at the destination of an edge leaving `task`
    pub fn outgoing_tasks_for(&self, task: &A::Task) -> IndexSet<A::Task> {
        self.outgoing_dependencies(task)
            .into_iter()
            .map(|dependency| dependency.destination().clone())
            .collect()
    }

    /// Tasks at the source of an edge reaching `task`
    pub fn incoming_tasks_for(&self, task: &A::Task) -> IndexSet<A::Task> {
        self.incoming_dependencies(task)
            .into_iter()
            .map(|dependency| dependency.source().clone())
            .collect()
    }

    /// All tasks in the graph
    pub fn tasks(&self) -> Vec<A::Task> {
        self.graph.node_weights().cloned().collect()
    }

    /// Dependencies created by the user (not containment edges)
    pub fn visible_dependencies(&self) -> Vec<&A::Dependency> {
        self.graph
            .edge_weights()
            .filter(|dependency| dependency.is_visible())
            .collect()
    }

    pub fn top_level_tasks(&self) -> &[A::Task] {
        &self.top_level_tasks
    }

    pub fn parent_of(&self, task: &A::Task) -> Option<&A::Task> {
        self.from_child_to_parent.get(task)
    }

    pub fn is_container(&self, task: &A::Task) -> bool {
        self.adapter.is_container(task)
    }

    /// Returns true if `task` is a direct child of `container`
    pub fn container_contains(&self, container: &A::Task, task: &A::Task) -> bool {
        self.adapter.is_container(container) && self.adapter.children(container).contains(task)
    }

    /// Tasks without a real predecessor (incoming containment END_END edges do not count)
    pub fn initial_tasks(&self) -> Vec<A::Task> {
        self.graph
            .node_weights()
            .filter(|task| {
                self.incoming_dependencies(task)
                    .iter()
                    .all(|dependency| dependency.dependency_type() == DependencyType::EndEnd)
            })
            .cloned()
            .collect()
    }

    /// Tasks without a real successor (outgoing START_START edges do not count)
    pub fn latest_tasks(&self) -> Vec<A::Task> {
        self.graph
            .node_weights()
            .filter(|task| {
                self.outgoing_dependencies(task)
                    .iter()
                    .all(|dependency| dependency.dependency_type() == DependencyType::StartStart)
            })
            .cloned()
            .collect()
    }

    /// Returns false if adding `dependency` would let a change flow back
    /// through it, i.e. create a cycle in the propagation graph
    pub fn does_not_provoke_loop(&self, dependency: &A::Dependency) -> bool {
        !self
            .reachable_from(dependency.destination_point())
            .iter()
            .any(|point| point.sends_modifications_through(dependency))
    }

    /// Task points reachable from `start` through propagating edges, `start` included
    pub(super) fn reachable_from(&self, start: TaskPoint<A::Task>) -> IndexSet<TaskPoint<A::Task>> {
        let mut result = IndexSet::new();
        let mut pending = VecDeque::new();
        result.insert(start.clone());
        pending.push_back(start);

        while let Some(current) = pending.pop_front() {
            for each in self.immediate_reachable_from(&current) {
                if result.insert(each.clone()) {
                    pending.push_back(each);
                }
            }
        }
        result
    }

    pub(super) fn immediate_reachable_from(
        &self,
        current: &TaskPoint<A::Task>,
    ) -> IndexSet<TaskPoint<A::Task>> {
        self.outgoing_dependencies(&current.task)
            .into_iter()
            .filter(|dependency| current.sends_modifications_through(*dependency))
            .map(|dependency| dependency.destination_point())
            .collect()
    }

    /// Tasks whose end breaks one of the global end constraints
    pub fn end_constraint_violations(&self) -> Vec<A::Task> {
        self.graph
            .node_weights()
            .filter(|task| {
                let end = self.adapter.end_date(task);
                self.global_end_constraints
                    .iter()
                    .any(|constraint| !constraint.is_satisfied_by(end))
            })
            .cloned()
            .collect()
    }

    /// Returns the number of tasks in the graph
    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    /// Returns true if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }

    pub fn length_of(&self, task: &A::Task) -> Duration {
        self.adapter.length(task)
    }
}

impl<A: GanttAdapter + std::fmt::Debug> std::fmt::Debug for GanttDiagramGraph<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GanttDiagramGraph")
            .field("adapter", &self.adapter)
            .field("tasks", &self.node_map.len())
            .field("edges", &self.graph.edge_count())
            .field("top_level_tasks", &self.top_level_tasks)
            .finish()
    }
}
