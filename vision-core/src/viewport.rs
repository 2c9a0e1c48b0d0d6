//! Viewport signals: debounced resize and fullscreen transitions.
//!
//! Raw resize notifications and fullscreen state changes are folded into a
//! single [`AppEvent::CanvasResized`] signal. The controller knows nothing
//! about individual exercises.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::config::ViewportConfig;
use crate::event::{AppEvent, EventBus};
use crate::platform::FullscreenPlatform;
use crate::scheduler::{Scheduler, TimerHandle};

struct ViewportInner {
    bus: EventBus,
    scheduler: Scheduler,
    platform: Box<dyn FullscreenPlatform>,
    config: ViewportConfig,
    fullscreen: bool,
    resize_timer: Option<TimerHandle>,
    settle_timer: Option<TimerHandle>,
}

/// Normalizes resize and fullscreen notifications. Clones share state.
#[derive(Clone)]
pub struct ViewportController {
    inner: Rc<RefCell<ViewportInner>>,
}

impl ViewportController {
    /// Create a controller publishing on `bus`.
    #[must_use]
    pub fn new(
        bus: EventBus,
        scheduler: Scheduler,
        platform: Box<dyn FullscreenPlatform>,
        config: ViewportConfig,
    ) -> Self {
        let fullscreen = platform.is_fullscreen();
        Self {
            inner: Rc::new(RefCell::new(ViewportInner {
                bus,
                scheduler,
                platform,
                config,
                fullscreen,
                resize_timer: None,
                settle_timer: None,
            })),
        }
    }

    /// Record a raw window resize.
    ///
    /// `canvas:resized` fires once the resize stream has been quiet for the
    /// debounce period.
    pub fn notify_resize(&self) {
        let handle = self.schedule_resized(|config| config.resize_debounce());
        let previous = self.inner.borrow_mut().resize_timer.replace(handle);
        drop(previous);
    }

    /// Record a fullscreen state change reported by the platform.
    ///
    /// Publishes `viewport:fullscreen` immediately and `canvas:resized` once
    /// the transition has settled. Repeated reports of the same state are
    /// ignored.
    pub fn notify_fullscreen_change(&self, active: bool) {
        let bus = {
            let mut inner = self.inner.borrow_mut();
            if inner.fullscreen == active {
                return;
            }
            inner.fullscreen = active;
            inner.bus.clone()
        };
        tracing::debug!("Fullscreen {}", if active { "entered" } else { "exited" });
        bus.publish(AppEvent::FullscreenChanged(active));

        let handle = self.schedule_resized(|config| config.fullscreen_settle());
        let previous = self.inner.borrow_mut().settle_timer.replace(handle);
        drop(previous);
    }

    fn schedule_resized(
        &self,
        delay: impl FnOnce(&ViewportConfig) -> std::time::Duration,
    ) -> TimerHandle {
        let (bus, scheduler, delay) = {
            let inner = self.inner.borrow();
            (
                inner.bus.clone(),
                inner.scheduler.clone(),
                delay(&inner.config),
            )
        };
        scheduler.schedule_once(delay, move || bus.publish(AppEvent::CanvasResized))
    }

    /// Ask the platform for fullscreen. Does nothing if already fullscreen.
    ///
    /// A rejected request is logged and the app carries on windowed.
    pub fn enter_fullscreen(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.fullscreen || inner.platform.is_fullscreen() {
            return;
        }
        if let Err(e) = inner.platform.request_enter() {
            tracing::warn!("Fullscreen request failed: {e}");
        }
    }

    /// Ask the platform to leave fullscreen. Does nothing if not fullscreen.
    pub fn exit_fullscreen(&self) {
        let mut inner = self.inner.borrow_mut();
        if !inner.fullscreen && !inner.platform.is_fullscreen() {
            return;
        }
        if let Err(e) = inner.platform.request_exit() {
            tracing::warn!("Fullscreen exit failed: {e}");
        }
    }

    /// Whether fullscreen is active, as last reported by the platform.
    #[must_use]
    pub fn is_fullscreen(&self) -> bool {
        self.inner.borrow().fullscreen
    }
}

impl fmt::Debug for ViewportController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ViewportController")
            .field("fullscreen", &inner.fullscreen)
            .field("config", &inner.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Topic;
    use crate::headless::HeadlessFullscreen;
    use std::time::Duration;

    struct Fixture {
        scheduler: Scheduler,
        platform: HeadlessFullscreen,
        viewport: ViewportController,
        events: Rc<RefCell<Vec<AppEvent>>>,
    }

    fn fixture() -> Fixture {
        let bus = EventBus::new();
        let scheduler = Scheduler::new();
        let platform = HeadlessFullscreen::new();
        let viewport = ViewportController::new(
            bus.clone(),
            scheduler.clone(),
            Box::new(platform.clone()),
            ViewportConfig::default(),
        );
        let events = Rc::new(RefCell::new(Vec::new()));
        for topic in [Topic::CanvasResized, Topic::FullscreenChanged] {
            let events = Rc::clone(&events);
            bus.subscribe(topic, move |event| events.borrow_mut().push(event.clone()));
        }
        Fixture {
            scheduler,
            platform,
            viewport,
            events,
        }
    }

    #[test]
    fn test_resize_burst_is_debounced() {
        let fx = fixture();
        fx.viewport.notify_resize();
        fx.scheduler.advance(Duration::from_millis(100));
        fx.viewport.notify_resize();
        fx.scheduler.advance(Duration::from_millis(200));
        fx.viewport.notify_resize();
        fx.scheduler.advance(Duration::from_millis(249));
        assert!(fx.events.borrow().is_empty());

        fx.scheduler.advance(Duration::from_millis(1));
        assert_eq!(*fx.events.borrow(), vec![AppEvent::CanvasResized]);

        fx.scheduler.advance(Duration::from_secs(5));
        assert_eq!(fx.events.borrow().len(), 1);
    }

    #[test]
    fn test_fullscreen_change_settles_into_resize() {
        let fx = fixture();
        fx.viewport.notify_fullscreen_change(true);
        assert!(fx.viewport.is_fullscreen());
        assert_eq!(*fx.events.borrow(), vec![AppEvent::FullscreenChanged(true)]);

        fx.scheduler.advance(Duration::from_millis(150));
        assert_eq!(
            *fx.events.borrow(),
            vec![AppEvent::FullscreenChanged(true), AppEvent::CanvasResized]
        );
    }

    #[test]
    fn test_repeated_fullscreen_report_is_ignored() {
        let fx = fixture();
        fx.viewport.notify_fullscreen_change(false);
        fx.scheduler.advance(Duration::from_secs(1));
        assert!(fx.events.borrow().is_empty());
    }

    #[test]
    fn test_enter_and_exit_are_idempotent() {
        let fx = fixture();
        fx.viewport.enter_fullscreen();
        fx.viewport.enter_fullscreen();
        assert_eq!(fx.platform.enter_requests(), 1);

        fx.viewport.notify_fullscreen_change(true);
        fx.viewport.exit_fullscreen();
        fx.viewport.notify_fullscreen_change(false);
        fx.viewport.exit_fullscreen();
        assert_eq!(fx.platform.exit_requests(), 1);
    }

    #[test]
    fn test_rejected_request_leaves_windowed() {
        let fx = fixture();
        fx.platform.set_reject(true);
        fx.viewport.enter_fullscreen();
        assert!(!fx.viewport.is_fullscreen());
        assert!(fx.events.borrow().is_empty());
    }
}
