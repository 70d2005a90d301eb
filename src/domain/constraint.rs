//! Date constraints
//!
//! A constraint is a total function over optional dates: it takes the value
//! computed so far (`None` meaning unconstrained) and returns a tightened
//! value. Constraints never fail, a rule that cannot be satisfied simply
//! clamps.
//!
//! Constraints are combined left to right with [`ConstraintChain`]; each
//! one sees the result of the previous ones, so later constraints win when
//! they conflict.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Absolute point in time used for task start and end dates
pub type Date = DateTime<Utc>;

type ConstraintFn = dyn Fn(Option<Date>) -> Option<Date> + Send + Sync;

/// A single date rule
#[derive(Clone, Default)]
pub enum Constraint {
    /// Leaves the value untouched
    #[default]
    Void,
    /// Not before the given date
    BiggerOrEqualThan(Date),
    /// Not after the given date
    LessOrEqualThan(Date),
    /// Exactly the given date
    EqualTo(Date),
    /// Arbitrary rule
    Custom(Arc<ConstraintFn>),
}

impl Constraint {
    pub fn void() -> Self {
        Constraint::Void
    }

    pub fn bigger_or_equal_than(date: Date) -> Self {
        Constraint::BiggerOrEqualThan(date)
    }

    pub fn less_or_equal_than(date: Date) -> Self {
        Constraint::LessOrEqualThan(date)
    }

    pub fn equal_to(date: Date) -> Self {
        Constraint::EqualTo(date)
    }

    /// Wraps an arbitrary function as a constraint
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Option<Date>) -> Option<Date> + Send + Sync + 'static,
    {
        Constraint::Custom(Arc::new(f))
    }

    /// Applies this rule to the value computed so far
    ///
    /// An unconstrained value takes the comparison date of any comparison
    /// constraint.
    pub fn apply_to(&self, value: Option<Date>) -> Option<Date> {
        match self {
            Constraint::Void => value,
            Constraint::BiggerOrEqualThan(bound) => {
                Some(value.map_or(*bound, |v| v.max(*bound)))
            }
            Constraint::LessOrEqualThan(bound) => Some(value.map_or(*bound, |v| v.min(*bound))),
            Constraint::EqualTo(date) => Some(*date),
            Constraint::Custom(f) => f(value),
        }
    }

    /// Returns true if `value` already satisfies this rule
    pub fn is_satisfied_by(&self, value: Date) -> bool {
        match self {
            Constraint::Void => true,
            Constraint::BiggerOrEqualThan(bound) => value >= *bound,
            Constraint::LessOrEqualThan(bound) => value <= *bound,
            Constraint::EqualTo(date) => value == *date,
            Constraint::Custom(f) => f(Some(value)) == Some(value),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Constraint::Void)
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Void => f.write_str("Void"),
            Constraint::BiggerOrEqualThan(d) => write!(f, ">= {}", d.to_rfc3339()),
            Constraint::LessOrEqualThan(d) => write!(f, "<= {}", d.to_rfc3339()),
            Constraint::EqualTo(d) => write!(f, "== {}", d.to_rfc3339()),
            Constraint::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constraint::Void, Constraint::Void) => true,
            (Constraint::BiggerOrEqualThan(a), Constraint::BiggerOrEqualThan(b)) => a == b,
            (Constraint::LessOrEqualThan(a), Constraint::LessOrEqualThan(b)) => a == b,
            (Constraint::EqualTo(a), Constraint::EqualTo(b)) => a == b,
            (Constraint::Custom(a), Constraint::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Left-to-right combination of constraints starting from an initial value
#[derive(Debug, Clone, Default)]
pub struct ConstraintChain {
    initial: Option<Date>,
    constraints: Vec<Constraint>,
}

impl ConstraintChain {
    /// Starts a chain; `None` means unconstrained
    pub fn initial_value(initial: Option<Date>) -> Self {
        Self {
            initial,
            constraints: Vec::new(),
        }
    }

    /// Appends one constraint
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Appends constraints in order
    pub fn with_constraints(mut self, constraints: impl IntoIterator<Item = Constraint>) -> Self {
        self.constraints.extend(constraints);
        self
    }

    /// Runs every constraint in order over the initial value
    pub fn apply(&self) -> Option<Date> {
        self.constraints
            .iter()
            .fold(self.initial, |value, constraint| constraint.apply_to(value))
    }
}
