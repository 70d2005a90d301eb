//! Deferred date-change notifications
//!
//! While a pass is running, tasks may move several times. Listeners must
//! only observe the final, consistent state, so every change is queued in a
//! [`DeferredNotifier`] and coalesced per task: the first previous value and
//! the last new value survive. The queue is flushed once, after the pass.

use chrono::Duration;
use indexmap::IndexMap;

use super::constraint::Date;
use super::dependency::TaskKey;

/// The start of a task moved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartDateNotification {
    pub previous_start: Date,
    pub previous_length: Duration,
    pub new_start: Date,
}

impl StartDateNotification {
    /// Keeps our previous values and takes the newest start
    pub fn coalesce(self, newer: StartDateNotification) -> Self {
        Self {
            new_start: newer.new_start,
            ..self
        }
    }
}

/// The length of a task changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthNotification {
    pub previous_length: Duration,
    pub new_length: Duration,
}

impl LengthNotification {
    pub fn coalesce(self, newer: LengthNotification) -> Self {
        Self {
            new_length: newer.new_length,
            ..self
        }
    }
}

/// A notification delivered after dependencies have been enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateNotification {
    StartDate(StartDateNotification),
    Length(LengthNotification),
}

#[derive(Debug, Clone, Default)]
struct PendingForTask {
    start: Option<StartDateNotification>,
    length: Option<LengthNotification>,
}

/// Per-pass queue of coalesced notifications
#[derive(Debug, Clone)]
pub struct DeferredNotifier<T: TaskKey> {
    pending: IndexMap<T, PendingForTask>,
}

impl<T: TaskKey> Default for DeferredNotifier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TaskKey> DeferredNotifier<T> {
    pub fn new() -> Self {
        Self {
            pending: IndexMap::new(),
        }
    }

    fn retrieve_or_create_for(&mut self, task: &T) -> &mut PendingForTask {
        self.pending.entry(task.clone()).or_default()
    }

    pub fn add_start(&mut self, task: &T, notification: StartDateNotification) {
        let pending = self.retrieve_or_create_for(task);
        pending.start = Some(match pending.start {
            Some(existing) => existing.coalesce(notification),
            None => notification,
        });
    }

    pub fn add_length(&mut self, task: &T, notification: LengthNotification) {
        let pending = self.retrieve_or_create_for(task);
        pending.length = Some(match pending.length {
            Some(existing) => existing.coalesce(notification),
            None => notification,
        });
    }

    /// Number of tasks with something pending
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Fires start then length notification per task, in first-touched order, and clears
    pub fn do_notifications(&mut self, mut sink: impl FnMut(&T, DateNotification)) {
        for (task, pending) in self.pending.drain(..) {
            if let Some(start) = pending.start {
                sink(&task, DateNotification::StartDate(start));
            }
            if let Some(length) = pending.length {
                sink(&task, DateNotification::Length(length));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn day(d: u32) -> Date {
        Utc.with_ymd_and_hms(2020, 1, d, 0, 0, 0).unwrap()
    }

    fn start(previous: u32, new: u32) -> StartDateNotification {
        StartDateNotification {
            previous_start: day(previous),
            previous_length: Duration::days(2),
            new_start: day(new),
        }
    }

    #[test]
    fn start_notifications_coalesce() {
        let mut notifier = DeferredNotifier::new();
        notifier.add_start(&"b", start(1, 3));
        notifier.add_start(&"b", start(3, 5));

        let mut fired = Vec::new();
        notifier.do_notifications(|task, n| fired.push((*task, n)));

        assert_eq!(fired, vec![("b", DateNotification::StartDate(start(1, 5)))]);
    }

    #[test]
    fn length_notifications_coalesce() {
        let mut notifier = DeferredNotifier::new();
        notifier.add_length(
            &"a",
            LengthNotification {
                previous_length: Duration::days(1),
                new_length: Duration::days(2),
            },
        );
        notifier.add_length(
            &"a",
            LengthNotification {
                previous_length: Duration::days(2),
                new_length: Duration::days(4),
            },
        );

        let mut fired = Vec::new();
        notifier.do_notifications(|_, n| fired.push(n));

        assert_eq!(
            fired,
            vec![DateNotification::Length(LengthNotification {
                previous_length: Duration::days(1),
                new_length: Duration::days(4),
            })]
        );
    }

    #[test]
    fn fires_in_first_touched_order_start_before_length() {
        let mut notifier = DeferredNotifier::new();
        notifier.add_length(
            &"a",
            LengthNotification {
                previous_length: Duration::days(1),
                new_length: Duration::days(2),
            },
        );
        notifier.add_start(&"b", start(1, 2));
        notifier.add_start(&"a", start(1, 2));
        assert_eq!(notifier.len(), 2);

        let mut fired = Vec::new();
        notifier.do_notifications(|task, n| {
            let kind = match n {
                DateNotification::StartDate(_) => "start",
                DateNotification::Length(_) => "length",
            };
            fired.push((*task, kind));
        });

        assert_eq!(fired, vec![("a", "start"), ("a", "length"), ("b", "start")]);
    }

    #[test]
    fn flush_clears_queue() {
        let mut notifier = DeferredNotifier::new();
        notifier.add_start(&"a", start(1, 2));
        notifier.do_notifications(|_, _| {});
        assert!(notifier.is_empty());

        let mut count = 0;
        notifier.do_notifications(|_, _| count += 1);
        assert_eq!(count, 0);
    }
}
