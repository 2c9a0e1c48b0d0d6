//! Single-threaded timer scheduler with owned, cancel-on-drop handles.
//!
//! Two kinds of work are scheduled:
//!
//! ```text
//! wall-clock timers   schedule_once / schedule_repeating   fired by advance()/advance_to()
//! frame callbacks     schedule_frames                       fired by run_frame()
//! ```
//!
//! The host drives the clock. In the browser that is one
//! `requestAnimationFrame` callback calling `advance_to(now)` then
//! `run_frame()`; in tests it is explicit `advance` calls.
//!
//! `advance_to` is a jump: a repeating timer that fell more than a period
//! behind (a hidden tab pauses frames) fires once and re-arms on its period
//! grid after the target. `advance` lets time pass continuously and fires
//! every due time on the way.
//!
//! Callbacks run with no scheduler borrow held, so they may schedule new
//! timers or cancel any handle, including their own.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Shortest allowed repeating period.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

type Callback = Box<dyn FnMut()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cadence {
    Once,
    Repeating(Duration),
    Frame,
}

struct Timer {
    cadence: Cadence,
    due: Duration,
    /// `None` while the callback is executing.
    callback: Option<Callback>,
}

#[derive(Default)]
struct SchedulerInner {
    now: Duration,
    next_id: u64,
    timers: BTreeMap<u64, Timer>,
}

impl SchedulerInner {
    fn insert(&mut self, cadence: Cadence, due: Duration, callback: Callback) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.timers.insert(
            id,
            Timer {
                cadence,
                due,
                callback: Some(callback),
            },
        );
        id
    }

    /// Earliest wall-clock timer due at or before `limit`. Ties go to the
    /// lowest id, i.e. registration order.
    fn next_due(&self, limit: Duration) -> Option<(u64, Duration)> {
        self.timers
            .iter()
            .filter(|(_, t)| t.cadence != Cadence::Frame && t.callback.is_some() && t.due <= limit)
            .min_by_key(|(id, t)| (t.due, **id))
            .map(|(id, t)| (*id, t.due))
    }
}

/// First point of the `due + k * period` grid strictly after `target`, or
/// `due + period` when that is still ahead.
fn rearm(due: Duration, period: Duration, target: Duration) -> Duration {
    let next = due + period;
    if next > target {
        return next;
    }
    let behind = (target - due).as_nanos() % period.as_nanos();
    let behind = Duration::from_nanos(u64::try_from(behind).unwrap_or(u64::MAX));
    target + period.saturating_sub(behind)
}

/// Virtual-clock scheduler shared by every controller.
///
/// Cloning yields another handle to the same scheduler.
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl Scheduler {
    /// Create a scheduler with its clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Run `callback` once, `delay` from now.
    pub fn schedule_once<F>(&self, delay: Duration, callback: F) -> TimerHandle
    where
        F: FnMut() + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let due = inner.now + delay;
        let id = inner.insert(Cadence::Once, due, Box::new(callback));
        self.handle(id)
    }

    /// Run `callback` every `period` (floored at [`MIN_PERIOD`]) until cancelled.
    pub fn schedule_repeating<F>(&self, period: Duration, callback: F) -> TimerHandle
    where
        F: FnMut() + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let mut inner = self.inner.borrow_mut();
        let due = inner.now + period;
        let id = inner.insert(Cadence::Repeating(period), due, Box::new(callback));
        self.handle(id)
    }

    /// Run `callback` on every [`run_frame`](Self::run_frame) until cancelled.
    pub fn schedule_frames<F>(&self, callback: F) -> TimerHandle
    where
        F: FnMut() + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let due = inner.now;
        let id = inner.insert(Cadence::Frame, due, Box::new(callback));
        self.handle(id)
    }

    fn handle(&self, id: u64) -> TimerHandle {
        TimerHandle {
            id,
            scheduler: Rc::downgrade(&self.inner),
        }
    }

    /// Let `by` elapse, firing every timer at each of its due times.
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        loop {
            let next = self.inner.borrow().next_due(target).map(|(_, due)| due);
            let Some(due) = next else {
                break;
            };
            self.advance_to(due);
        }
        self.advance_to(target);
    }

    /// Jump the clock to `target`, firing due timers in due-time order.
    ///
    /// A repeating timer fires at most once per period it is behind: when
    /// it missed several, it fires once and resumes after `target`. A target
    /// in the past is ignored.
    pub fn advance_to(&self, target: Duration) {
        loop {
            let fired = {
                let mut guard = self.inner.borrow_mut();
                let inner = &mut *guard;
                let Some((id, due)) = inner.next_due(target) else {
                    break;
                };
                if due > inner.now {
                    inner.now = due;
                }
                let Some(timer) = inner.timers.get_mut(&id) else {
                    break;
                };
                let callback = timer.callback.take();
                let cadence = timer.cadence;
                if let Cadence::Repeating(period) = cadence {
                    timer.due = rearm(due, period, target);
                }
                if cadence == Cadence::Once {
                    inner.timers.remove(&id);
                }
                callback.map(|cb| (id, cb))
            };
            if let Some((id, mut callback)) = fired {
                tracing::trace!("Timer {id} fired");
                callback();
                self.restore(id, callback);
            }
        }

        let mut inner = self.inner.borrow_mut();
        if target > inner.now {
            inner.now = target;
        }
    }

    /// Run every frame callback once, in registration order.
    pub fn run_frame(&self) {
        let ids: Vec<u64> = self
            .inner
            .borrow()
            .timers
            .iter()
            .filter(|(_, t)| t.cadence == Cadence::Frame)
            .map(|(id, _)| *id)
            .collect();

        for id in ids {
            let callback = {
                let mut inner = self.inner.borrow_mut();
                inner.timers.get_mut(&id).and_then(|t| t.callback.take())
            };
            if let Some(mut callback) = callback {
                callback();
                self.restore(id, callback);
            }
        }
    }

    /// Put a callback back after it ran, unless its timer was cancelled or
    /// was one-shot. The leftover callback is dropped with no borrow held.
    fn restore(&self, id: u64, callback: Callback) {
        let leftover = {
            let mut inner = self.inner.borrow_mut();
            match inner.timers.get_mut(&id) {
                Some(timer) => {
                    timer.callback = Some(callback);
                    None
                }
                None => Some(callback),
            }
        };
        drop(leftover);
    }

    /// Number of live timers and frame callbacks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.borrow().timers.len()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Scheduler")
            .field("now", &inner.now)
            .field("pending", &inner.timers.len())
            .finish()
    }
}

/// Owned handle to a scheduled timer. Dropping it cancels the timer.
pub struct TimerHandle {
    id: u64,
    scheduler: Weak<RefCell<SchedulerInner>>,
}

impl TimerHandle {
    /// Cancel the timer now.
    pub fn cancel(self) {
        drop(self);
    }

    /// Whether the timer is still scheduled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.scheduler
            .upgrade()
            .is_some_and(|inner| inner.borrow().timers.contains_key(&self.id))
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        let Some(inner) = self.scheduler.upgrade() else {
            return;
        };
        let removed = inner.borrow_mut().timers.remove(&self.id);
        drop(removed);
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
