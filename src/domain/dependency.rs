//! Dependency edges and task points
//!
//! A dependency links an endpoint of its source task to an endpoint of its
//! destination task. Which endpoints of the destination can move because
//! of an upstream change is captured by [`PointType`]; a task together with
//! its live endpoints is a [`TaskPoint`].

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::hash::Hash;

/// Identity requirements for task vertices
pub trait TaskKey: Clone + Eq + Hash + Debug {}

impl<T: Clone + Eq + Hash + Debug> TaskKey for T {}

/// Which endpoint of the source constrains which endpoint of the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    /// Destination ends no earlier than the source ends
    EndEnd,
    /// Destination starts no earlier than the source ends
    #[default]
    EndStart,
    /// Destination starts no earlier than the source starts
    StartStart,
    /// Destination ends no earlier than the source starts
    StartEnd,
}

impl DependencyType {
    /// Endpoints of the destination that this type of dependency can move
    pub fn point_modified(&self) -> PointType {
        match self {
            DependencyType::EndStart | DependencyType::StartStart => PointType::Both,
            DependencyType::EndEnd | DependencyType::StartEnd => PointType::End,
        }
    }

    /// Returns a display label for the dependency type
    pub fn label(&self) -> &'static str {
        match self {
            DependencyType::EndEnd => "end-end",
            DependencyType::EndStart => "end-start",
            DependencyType::StartStart => "start-start",
            DependencyType::StartEnd => "start-end",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which endpoints of a task may be affected by upstream changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointType {
    Both,
    End,
    None,
}

impl PointType {
    /// Returns true if a change of these endpoints flows through an edge of `dependency_type`
    pub fn sends_modifications_through(&self, dependency_type: DependencyType) -> bool {
        match self {
            PointType::None => false,
            PointType::Both => true,
            PointType::End => matches!(
                dependency_type,
                DependencyType::EndEnd | DependencyType::EndStart
            ),
        }
    }
}

/// A task together with its live endpoints
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskPoint<T> {
    pub task: T,
    pub point_type: PointType,
}

impl<T: TaskKey> TaskPoint<T> {
    pub fn new(task: T, point_type: PointType) -> Self {
        Self { task, point_type }
    }

    pub fn both(task: T) -> Self {
        Self::new(task, PointType::Both)
    }

    pub fn end_of(task: T) -> Self {
        Self::new(task, PointType::End)
    }

    /// Returns true if a change at this point propagates along `dependency`
    pub fn sends_modifications_through<D: GanttDependency<T>>(&self, dependency: &D) -> bool {
        dependency.source() == &self.task
            && self
                .point_type
                .sends_modifications_through(dependency.dependency_type())
    }
}

impl<T: fmt::Display> fmt::Display for TaskPoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.task, self.point_type)
    }
}

/// Contract the graph needs from a dependency edge
pub trait GanttDependency<T: TaskKey>: Debug {
    fn source(&self) -> &T;

    fn destination(&self) -> &T;

    fn dependency_type(&self) -> DependencyType;

    /// Visible dependencies are user dependencies; invisible ones encode containment
    fn is_visible(&self) -> bool;

    /// Creates an engine-internal containment edge
    fn invisible(origin: T, destination: T, dependency_type: DependencyType) -> Self
    where
        Self: Sized;

    /// The destination endpoints this dependency can move
    fn destination_point(&self) -> TaskPoint<T> {
        TaskPoint::new(
            self.destination().clone(),
            self.dependency_type().point_modified(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Edge(&'static str, &'static str, DependencyType);

    impl GanttDependency<&'static str> for Edge {
        fn source(&self) -> &&'static str {
            &self.0
        }

        fn destination(&self) -> &&'static str {
            &self.1
        }

        fn dependency_type(&self) -> DependencyType {
            self.2
        }

        fn is_visible(&self) -> bool {
            true
        }

        fn invisible(origin: &'static str, destination: &'static str, ty: DependencyType) -> Self {
            Edge(origin, destination, ty)
        }
    }

    #[test]
    fn point_modified_by_type() {
        assert_eq!(DependencyType::EndStart.point_modified(), PointType::Both);
        assert_eq!(DependencyType::StartStart.point_modified(), PointType::Both);
        assert_eq!(DependencyType::EndEnd.point_modified(), PointType::End);
        assert_eq!(DependencyType::StartEnd.point_modified(), PointType::End);
    }

    #[test]
    fn end_point_only_sends_through_end_edges() {
        assert!(PointType::End.sends_modifications_through(DependencyType::EndEnd));
        assert!(PointType::End.sends_modifications_through(DependencyType::EndStart));
        assert!(!PointType::End.sends_modifications_through(DependencyType::StartStart));
        assert!(!PointType::End.sends_modifications_through(DependencyType::StartEnd));
    }

    #[test]
    fn both_and_none() {
        for ty in [
            DependencyType::EndEnd,
            DependencyType::EndStart,
            DependencyType::StartStart,
            DependencyType::StartEnd,
        ] {
            assert!(PointType::Both.sends_modifications_through(ty));
            assert!(!PointType::None.sends_modifications_through(ty));
        }
    }

    #[test]
    fn task_point_requires_matching_source() {
        let edge = Edge("a", "b", DependencyType::StartStart);

        assert!(TaskPoint::both("a").sends_modifications_through(&edge));
        assert!(!TaskPoint::both("b").sends_modifications_through(&edge));
        assert!(!TaskPoint::end_of("a").sends_modifications_through(&edge));
    }

    #[test]
    fn destination_point_uses_type() {
        let edge = Edge("a", "b", DependencyType::EndEnd);
        assert_eq!(edge.destination_point(), TaskPoint::end_of("b"));

        let edge = Edge::invisible("a", "b", DependencyType::EndStart);
        assert_eq!(edge.destination_point(), TaskPoint::both("b"));
    }

    #[test]
    fn dependency_type_serde() {
        let json = serde_json::to_string(&DependencyType::StartStart).unwrap();
        assert_eq!(json, "\"start_start\"");

        let parsed: DependencyType = serde_json::from_str("\"end_end\"").unwrap();
        assert_eq!(parsed, DependencyType::EndEnd);
        assert_eq!(DependencyType::default(), DependencyType::EndStart);
    }
}
