//! Critical path
//!
//! Classic critical path method over the leaf tasks of a graph. Containers
//! take no part themselves: a dependency that touches a container stands
//! for the same dependency on each of its leaf descendants. Durations are
//! the tasks' current lengths.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;
use tracing::warn;

use super::adapter::GanttAdapter;
use super::constraint::{ConstraintChain, Date};
use super::dependency::{DependencyType, GanttDependency};
use super::graph::GanttDiagramGraph;

/// Leaf tasks with no slack, in dependency order
pub fn critical_path<A: GanttAdapter>(graph: &GanttDiagramGraph<A>) -> Vec<A::Task> {
    let adapter = graph.adapter();

    let mut network: DiGraph<A::Task, DependencyType> = DiGraph::new();
    let mut nodes = HashMap::new();
    for task in graph.tasks() {
        if !adapter.is_container(&task) {
            let idx = network.add_node(task.clone());
            nodes.insert(task, idx);
        }
    }

    for dependency in graph.visible_dependencies() {
        let sources = leaves_of(graph, dependency.source());
        let destinations = leaves_of(graph, dependency.destination());
        for source in &sources {
            for destination in &destinations {
                if source == destination {
                    continue;
                }
                if let (Some(&s), Some(&d)) = (nodes.get(source), nodes.get(destination)) {
                    if network.find_edge(s, d).is_none() {
                        network.add_edge(s, d, dependency.dependency_type());
                    }
                }
            }
        }
    }

    let order = match toposort(&network, None) {
        Ok(order) => order,
        Err(cycle) => {
            warn!(task = ?network[cycle.node_id()], "dependency cycle, no critical path");
            return vec![];
        }
    };

    let Some(project_start) = nodes.keys().map(|task| adapter.start_date(task)).min() else {
        return vec![];
    };

    let length_of = |idx: NodeIndex| adapter.length(&network[idx]);

    // Forward pass
    let mut earliest_start: HashMap<NodeIndex, Date> = HashMap::new();
    for &idx in &order {
        let length = length_of(idx);
        let mut start = project_start;
        for edge in network.edges_directed(idx, Direction::Incoming) {
            let predecessor = edge.source();
            let predecessor_start = earliest_start
                .get(&predecessor)
                .copied()
                .unwrap_or(project_start);
            let predecessor_finish = predecessor_start + length_of(predecessor);
            let candidate = match edge.weight() {
                DependencyType::EndStart => predecessor_finish,
                DependencyType::StartStart => predecessor_start,
                DependencyType::EndEnd => predecessor_finish - length,
                DependencyType::StartEnd => predecessor_start - length,
            };
            start = start.max(candidate);
        }

        let start = ConstraintChain::initial_value(Some(start))
            .with_constraints(adapter.start_constraints(&network[idx]))
            .with_constraints(graph.global_start_constraints().iter().cloned())
            .apply()
            .unwrap_or(start);
        earliest_start.insert(idx, start);
    }

    let Some(project_end) = order
        .iter()
        .filter_map(|idx| earliest_start.get(idx).map(|start| *start + length_of(*idx)))
        .max()
    else {
        return vec![];
    };

    // Backward pass
    let mut latest_finish: HashMap<NodeIndex, Date> = HashMap::new();
    for &idx in order.iter().rev() {
        let length = length_of(idx);
        let mut finish = project_end;
        for edge in network.edges_directed(idx, Direction::Outgoing) {
            let successor = edge.target();
            let successor_finish = latest_finish
                .get(&successor)
                .copied()
                .unwrap_or(project_end);
            let successor_start = successor_finish - length_of(successor);
            let candidate = match edge.weight() {
                DependencyType::EndStart => successor_start,
                DependencyType::StartStart => successor_start + length,
                DependencyType::EndEnd => successor_finish,
                DependencyType::StartEnd => successor_finish + length,
            };
            finish = finish.min(candidate);
        }
        latest_finish.insert(idx, finish);
    }

    order
        .into_iter()
        .filter(|idx| match (earliest_start.get(idx), latest_finish.get(idx)) {
            (Some(earliest), Some(latest)) => *latest - length_of(*idx) <= *earliest,
            _ => false,
        })
        .map(|idx| network[idx].clone())
        .collect()
}

fn leaves_of<A: GanttAdapter>(graph: &GanttDiagramGraph<A>, task: &A::Task) -> Vec<A::Task> {
    let adapter = graph.adapter();
    if !adapter.is_container(task) {
        return vec![task.clone()];
    }
    adapter
        .children(task)
        .iter()
        .flat_map(|child| leaves_of(graph, child))
        .collect()
}
