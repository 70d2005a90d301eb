//! Pass re-entrance tracking
//!
//! Applying a constraint changes task dates, and changing a task date is
//! itself a trigger for enforcement. The guard tells a fresh external call
//! apart from such a nested trigger so that only the outermost call runs
//! the pass-level work (listeners, notifier set-up and flush).

/// Outcome of asking to enter a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entrance {
    /// No pass was running; the caller now owns the pass and must call [`ReentranceGuard::exit`]
    New,
    /// A pass is already running further up the call chain
    AlreadyInside,
}

/// Tracks whether a pass is currently running on one graph
#[derive(Debug, Default)]
pub struct ReentranceGuard {
    inside: bool,
}

impl ReentranceGuard {
    pub fn new() -> Self {
        Self { inside: false }
    }

    pub fn entrance_requested(&mut self) -> Entrance {
        if self.inside {
            Entrance::AlreadyInside
        } else {
            self.inside = true;
            Entrance::New
        }
    }

    pub fn exit(&mut self) {
        self.inside = false;
    }

    pub fn is_inside(&self) -> bool {
        self.inside
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_requests_are_already_inside() {
        let mut guard = ReentranceGuard::new();
        assert!(!guard.is_inside());

        assert_eq!(guard.entrance_requested(), Entrance::New);
        assert!(guard.is_inside());
        assert_eq!(guard.entrance_requested(), Entrance::AlreadyInside);
        assert_eq!(guard.entrance_requested(), Entrance::AlreadyInside);

        guard.exit();
        assert!(!guard.is_inside());
        assert_eq!(guard.entrance_requested(), Entrance::New);
    }
}
