//! Virtual clock implementing [`Scheduler`].

use crate::platform::{Scheduler, TimerId};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::time::Duration;

enum Task {
    Once(Box<dyn FnOnce()>),
    Every {
        period: Duration,
        callback: Option<Box<dyn FnMut()>>,
    },
}

enum Fired {
    Once(Box<dyn FnOnce()>),
    Every(Box<dyn FnMut()>),
}

struct Timer {
    due: Duration,
    task: Task,
}

/// Deterministic scheduler driven by [`ManualScheduler::advance`].
///
/// Timers fire in `(due time, creation order)` order. Callbacks run with no
/// internal borrow held, so they may schedule or clear timers, including
/// the interval currently firing.
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<Duration>,
    next_id: Cell<u64>,
    timers: RefCell<BTreeMap<u64, Timer>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since the scheduler was created.
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    pub fn active_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Move the clock forward, firing every timer that falls due.
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;
        while let Some(id) = self.next_due(target) {
            self.fire(id);
        }
        self.now.set(target);
    }

    fn next_due(&self, target: Duration) -> Option<u64> {
        self.timers
            .borrow()
            .iter()
            .filter(|(_, timer)| timer.due <= target)
            .min_by_key(|(id, timer)| (timer.due, **id))
            .map(|(id, _)| *id)
    }

    fn fire(&self, id: u64) {
        let fired = {
            let mut timers = self.timers.borrow_mut();
            let Some(timer) = timers.remove(&id) else {
                return;
            };
            self.now.set(timer.due);
            match timer.task {
                Task::Once(callback) => Some(Fired::Once(callback)),
                Task::Every { period, callback } => {
                    timers.insert(
                        id,
                        Timer {
                            due: timer.due + period,
                            task: Task::Every {
                                period,
                                callback: None,
                            },
                        },
                    );
                    callback.map(Fired::Every)
                }
            }
        };

        match fired {
            Some(Fired::Once(callback)) => callback(),
            Some(Fired::Every(mut callback)) => {
                callback();
                // Put the callback back unless the interval was cleared.
                if let Some(Timer {
                    task: Task::Every { callback: slot, .. },
                    ..
                }) = self.timers.borrow_mut().get_mut(&id)
                {
                    *slot = Some(callback);
                }
            }
            None => {}
        }
    }

    fn insert(&self, due: Duration, task: Task) -> TimerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.timers.borrow_mut().insert(id, Timer { due, task });
        TimerId(id)
    }
}

impl Scheduler for ManualScheduler {
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        self.insert(self.now.get() + delay, Task::Once(callback))
    }

    fn set_interval(&self, period: Duration, callback: Box<dyn FnMut()>) -> TimerId {
        let period = period.max(Duration::from_millis(1));
        self.insert(
            self.now.get() + period,
            Task::Every {
                period,
                callback: Some(callback),
            },
        )
    }

    fn clear(&self, id: TimerId) {
        self.timers.borrow_mut().remove(&id.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_timeouts_fire_in_order() {
        let clock = ManualScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (ms, tag) in [(30, "c"), (10, "a"), (20, "b")] {
            let l = log.clone();
            clock.set_timeout(
                Duration::from_millis(ms),
                Box::new(move || l.borrow_mut().push(tag)),
            );
        }
        clock.advance(Duration::from_millis(25));
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        clock.advance(Duration::from_millis(5));
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_interval_can_clear_itself() {
        let clock = Rc::new(ManualScheduler::new());
        let ticks = Rc::new(Cell::new(0));
        let id_cell = Rc::new(Cell::new(None));

        let (c, t, i) = (clock.clone(), ticks.clone(), id_cell.clone());
        let id = clock.set_interval(
            Duration::from_millis(100),
            Box::new(move || {
                t.set(t.get() + 1);
                if t.get() == 3 {
                    if let Some(id) = i.get() {
                        c.clear(id);
                    }
                }
            }),
        );
        id_cell.set(Some(id));

        clock.advance(Duration::from_millis(1000));
        assert_eq!(ticks.get(), 3);
        assert_eq!(clock.active_timers(), 0);
    }

    #[test]
    fn test_now_tracks_firing_time() {
        let clock = Rc::new(ManualScheduler::new());
        let seen = Rc::new(Cell::new(Duration::ZERO));
        let (c, s) = (clock.clone(), seen.clone());
        clock.set_timeout(
            Duration::from_millis(40),
            Box::new(move || s.set(c.now())),
        );
        clock.advance(Duration::from_millis(100));
        assert_eq!(seen.get(), Duration::from_millis(40));
        assert_eq!(clock.now(), Duration::from_millis(100));
    }
}
