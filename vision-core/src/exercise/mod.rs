//! Exercise controllers.
//!
//! Each controller runs the same `Idle -> Running -> Idle` machine: start
//! while running and stop while idle are no-ops, starting resets kinematic
//! state before the first frame, and stopping halts every timer the session
//! owns. All of them stop on [`AppEvent::StopAllAnimations`](crate::event::AppEvent::StopAllAnimations).

pub mod chart;
pub mod guided;
pub mod saccades;
pub mod tracking;

use std::rc::Rc;

use crate::scheduler::TimerHandle;
use crate::settings::ExerciseId;

pub use chart::{ChartController, ChartParts, EOrientation};
pub use guided::{GuidedController, GuidedParts};
pub use saccades::{SaccadesController, SaccadesParts};
pub use tracking::{TrackingController, TrackingParts};

/// Common control surface of every exercise.
pub trait Exercise {
    /// The tab this exercise lives on.
    fn id(&self) -> ExerciseId;

    /// Begin the animation session. No-op while running.
    fn start(&self);

    /// End the animation session. No-op while idle.
    fn stop(&self);

    /// Whether a session is live.
    fn is_running(&self) -> bool;
}

/// Timers owned by one running exercise.
///
/// Dropping the session cancels everything it holds.
#[derive(Debug)]
pub struct AnimationSession {
    redraw: TimerHandle,
    flash: Option<TimerHandle>,
}

impl AnimationSession {
    /// Start a session around its continuous redraw timer.
    #[must_use]
    pub fn new(redraw: TimerHandle) -> Self {
        Self {
            redraw,
            flash: None,
        }
    }

    /// Swap in a new redraw timer, returning the old one.
    pub fn replace_redraw(&mut self, redraw: TimerHandle) -> TimerHandle {
        std::mem::replace(&mut self.redraw, redraw)
    }

    /// Install or remove the visibility-flash timer, returning the old one.
    pub fn set_flash(&mut self, flash: Option<TimerHandle>) -> Option<TimerHandle> {
        std::mem::replace(&mut self.flash, flash)
    }

    /// Whether the redraw timer is still scheduled.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.redraw.is_active()
    }

    /// Whether a flash timer is installed.
    #[must_use]
    pub fn is_flashing(&self) -> bool {
        self.flash.is_some()
    }
}

/// Wrap `tick` into a timer callback that holds `state` weakly.
pub(crate) fn weak_tick<S, F>(state: &Rc<S>, tick: F) -> impl FnMut() + 'static
where
    S: ?Sized + 'static,
    F: Fn(Rc<S>) + 'static,
{
    let weak = Rc::downgrade(state);
    move || {
        if let Some(state) = weak.upgrade() {
            tick(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use std::cell::Cell;
    use std::time::Duration;

    #[test]
    fn test_dropping_session_cancels_its_timers() {
        let scheduler = Scheduler::new();
        let mut session = AnimationSession::new(scheduler.schedule_frames(|| {}));
        session.set_flash(Some(scheduler.schedule_repeating(
            Duration::from_millis(100),
            || {},
        )));
        assert!(session.is_flashing());
        assert!(session.is_live());
        assert_eq!(scheduler.pending(), 2);

        drop(session);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_weak_tick_skips_dropped_state() {
        let state = Rc::new(Cell::new(0));
        let mut tick = weak_tick(&state, |state| state.set(state.get() + 1));
        tick();
        assert_eq!(state.get(), 1);
        drop(state);
        tick();
    }
}
