//! Saccade training: the highlight jumps between fixed targets.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::config::SaccadesConfig;
use crate::event::{AppEvent, SettingChange, Topic};
use crate::exercise::{weak_tick, AnimationSession, Exercise};
use crate::platform::Widget;
use crate::prng::Prng;
use crate::scheduler::Scheduler;
use crate::settings::{ExerciseId, SettingPath};
use crate::store::StateStore;
use crate::surface::{Point, Surface};

/// Toggle button label while stopped.
pub const START_LABEL: &str = "Start saccades";
/// Toggle button label while running.
pub const STOP_LABEL: &str = "Stop saccades";

const NEUTRAL_COLOR: &str = "#999";
const HIGHLIGHT_COLOR: &str = "red";

/// Jump timer period for a rate: `1000 / jumps_per_second` ms.
#[must_use]
pub fn jump_period(jumps_per_second: f64) -> Duration {
    Duration::from_secs_f64(1.0 / jumps_per_second.max(f64::MIN_POSITIVE))
}

/// Pick the next target index.
///
/// Uniform over every index except `current` when more than one target
/// exists; always 0 otherwise.
pub fn pick_next(current: usize, len: usize, rng: &mut Prng) -> usize {
    if len <= 1 {
        return 0;
    }
    loop {
        let next = rng.gen_index(len);
        if next != current {
            return next;
        }
    }
}

/// Place `count` targets uniformly inside a `width` by `height` canvas,
/// keeping every target fully visible.
#[must_use]
pub fn place_targets(
    count: u32,
    width: f64,
    height: f64,
    config: &SaccadesConfig,
    rng: &mut Prng,
) -> Vec<Point> {
    let inset = config.target_radius + config.edge_margin;
    (0..count)
        .map(|_| {
            Point::new(
                rng.gen_range_f64(inset, width - inset),
                rng.gen_range_f64(inset, height - inset),
            )
        })
        .collect()
}

/// Collaborators owned by the saccades exercise.
pub struct SaccadesParts {
    /// Saccades canvas.
    pub surface: Box<dyn Surface>,
    /// Target count control, locked while running.
    pub count_control: Box<dyn Widget>,
    /// Start/stop toggle button.
    pub toggle_button: Box<dyn Widget>,
}

struct SaccadesState {
    parts: SaccadesParts,
    rng: Prng,
    targets: Vec<Point>,
    current: usize,
    session: Option<AnimationSession>,
}

impl SaccadesState {
    fn regenerate(&mut self, count: u32, config: &SaccadesConfig) {
        let (width, height) = self.parts.surface.size();
        self.targets = place_targets(count, width, height, config, &mut self.rng);
        self.current = 0;
    }

    fn draw(&mut self, config: &SaccadesConfig) {
        let surface = &mut self.parts.surface;
        surface.clear();
        for (i, target) in self.targets.iter().enumerate() {
            let color = if i == self.current {
                HIGHLIGHT_COLOR
            } else {
                NEUTRAL_COLOR
            };
            surface.fill_circle(*target, config.target_radius, color);
        }
    }
}

struct SaccadesShared {
    store: Rc<StateStore>,
    scheduler: Scheduler,
    config: SaccadesConfig,
    initialized: Cell<bool>,
    state: RefCell<SaccadesState>,
}

/// Saccades exercise controller. Clones share state.
#[derive(Clone)]
pub struct SaccadesController {
    shared: Rc<SaccadesShared>,
}

impl SaccadesController {
    /// Create the controller. Call [`SaccadesController::init`] to wire it up.
    #[must_use]
    pub fn new(
        store: Rc<StateStore>,
        scheduler: Scheduler,
        config: SaccadesConfig,
        parts: SaccadesParts,
        rng: Prng,
    ) -> Self {
        let mut state = SaccadesState {
            parts,
            rng,
            targets: Vec::new(),
            current: 0,
            session: None,
        };
        state.parts.toggle_button.set_label(START_LABEL);
        Self {
            shared: Rc::new(SaccadesShared {
                store,
                scheduler,
                config,
                initialized: Cell::new(false),
                state: RefCell::new(state),
            }),
        }
    }

    /// Subscribe to the bus. Calling this twice has no further effect.
    pub fn init(&self) {
        if self.shared.initialized.replace(true) {
            return;
        }
        let bus = self.shared.store.bus().clone();
        bus.subscribe_weak(Topic::StopAllAnimations, &self.shared, |shared, _| {
            Self { shared }.stop();
        });
        bus.subscribe_weak(Topic::TabChanged, &self.shared, |shared, event| {
            if *event == AppEvent::TabChanged(ExerciseId::Saccades) {
                Self { shared }.prepare();
            }
        });
        bus.subscribe_weak(Topic::CanvasResized, &self.shared, |shared, _| {
            let controller = Self { shared };
            if controller
                .shared
                .store
                .with_state(|s| s.active_tab == ExerciseId::Saccades)
            {
                controller.prepare();
            }
        });
        bus.subscribe_weak(Topic::StateChanged, &self.shared, |shared, event| {
            if let AppEvent::StateChanged(change) = event {
                Self { shared }.on_setting_changed(change);
            }
        });
    }

    /// Start when stopped, stop when running.
    pub fn toggle(&self) {
        if self.is_running() {
            self.stop();
        } else {
            self.start();
        }
    }

    /// Target positions.
    #[must_use]
    pub fn targets(&self) -> Vec<Point> {
        self.shared.state.borrow().targets.clone()
    }

    /// Index of the highlighted target.
    #[must_use]
    pub fn current(&self) -> usize {
        self.shared.state.borrow().current
    }

    fn target_count(&self) -> u32 {
        self.shared.store.with_state(|s| s.saccades.target_count)
    }

    fn jump_period(&self) -> Duration {
        jump_period(self.shared.store.with_state(|s| s.saccades.jumps_per_second))
    }

    fn jump_callback(&self) -> impl FnMut() + 'static {
        weak_tick(&self.shared, |shared| Self { shared }.jump())
    }

    /// Fit the canvas, regenerate targets and draw.
    fn prepare(&self) {
        let count = self.target_count();
        let Ok(mut state) = self.shared.state.try_borrow_mut() else {
            tracing::warn!("Saccades busy; skipping layout refresh");
            return;
        };
        state.parts.surface.fit_to_display();
        state.regenerate(count, &self.shared.config);
        state.draw(&self.shared.config);
    }

    fn on_setting_changed(&self, change: &SettingChange) {
        match change.path {
            SettingPath::SaccadesTargetCount => {
                if self.is_running() {
                    self.stop();
                    self.prepare();
                    self.start();
                } else {
                    self.prepare();
                }
            }
            SettingPath::SaccadesJumpsPerSecond => self.restart_timer(),
            _ => {}
        }
    }

    fn restart_timer(&self) {
        if !self.is_running() {
            return;
        }
        let timer = self
            .shared
            .scheduler
            .schedule_repeating(self.jump_period(), self.jump_callback());
        let previous = match self.shared.state.try_borrow_mut() {
            Ok(mut state) => state
                .session
                .as_mut()
                .map(|session| session.replace_redraw(timer)),
            Err(_) => {
                tracing::warn!("Saccades busy; keeping old jump rate");
                None
            }
        };
        drop(previous);
    }

    fn jump(&self) {
        let Ok(mut state) = self.shared.state.try_borrow_mut() else {
            tracing::warn!("Saccades busy; skipping jump");
            return;
        };
        if state.session.is_none() {
            return;
        }
        let state = &mut *state;
        state.current = pick_next(state.current, state.targets.len(), &mut state.rng);
        tracing::trace!("Saccade target {}", state.current);
        state.draw(&self.shared.config);
    }
}

impl Exercise for SaccadesController {
    fn id(&self) -> ExerciseId {
        ExerciseId::Saccades
    }

    fn start(&self) {
        let count = self.target_count();
        let period = self.jump_period();
        let Ok(mut state) = self.shared.state.try_borrow_mut() else {
            tracing::warn!("Saccades busy; ignoring start");
            return;
        };
        if state.session.is_some() {
            return;
        }
        if u32::try_from(state.targets.len()).ok() != Some(count) {
            state.regenerate(count, &self.shared.config);
        }
        state.current = 0;
        let timer = self
            .shared
            .scheduler
            .schedule_repeating(period, self.jump_callback());
        state.session = Some(AnimationSession::new(timer));
        state.parts.count_control.set_enabled(false);
        state.parts.toggle_button.set_label(STOP_LABEL);
        state.draw(&self.shared.config);
        tracing::debug!("Saccades started with {count} targets, period {period:?}");
    }

    fn stop(&self) {
        let session = {
            let Ok(mut state) = self.shared.state.try_borrow_mut() else {
                tracing::warn!("Saccades busy; ignoring stop");
                return;
            };
            let Some(session) = state.session.take() else {
                return;
            };
            state.current = 0;
            state.parts.count_control.set_enabled(true);
            state.parts.toggle_button.set_label(START_LABEL);
            state.draw(&self.shared.config);
            session
        };
        drop(session);
        tracing::debug!("Saccades stopped");
    }

    fn is_running(&self) -> bool {
        self.shared
            .state
            .try_borrow()
            .is_ok_and(|state| state.session.is_some())
    }
}

impl fmt::Debug for SaccadesController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaccadesController")
            .field("running", &self.is_running())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBus;
    use crate::headless::{HeadlessSurface, HeadlessWidget};
    use crate::store::MemoryStorage;

    struct Fixture {
        store: Rc<StateStore>,
        scheduler: Scheduler,
        surface: HeadlessSurface,
        count_control: HeadlessWidget,
        button: HeadlessWidget,
        saccades: SaccadesController,
    }

    fn fixture() -> Fixture {
        let bus = EventBus::new();
        let store = Rc::new(StateStore::new(bus, Box::new(MemoryStorage::new())));
        let scheduler = Scheduler::new();
        let surface = HeadlessSurface::new(500.0, 400.0);
        let count_control = HeadlessWidget::new();
        let button = HeadlessWidget::new();
        let saccades = SaccadesController::new(
            Rc::clone(&store),
            scheduler.clone(),
            SaccadesConfig::default(),
            SaccadesParts {
                surface: Box::new(surface.clone()),
                count_control: Box::new(count_control.clone()),
                toggle_button: Box::new(button.clone()),
            },
            Prng::new(5),
        );
        saccades.init();
        Fixture {
            store,
            scheduler,
            surface,
            count_control,
            button,
            saccades,
        }
    }

    #[test]
    fn test_pick_next_single_target_terminates() {
        let mut rng = Prng::new(1);
        for _ in 0..100 {
            assert_eq!(pick_next(0, 1, &mut rng), 0);
        }
        assert_eq!(pick_next(0, 0, &mut rng), 0);
    }

    #[test]
    fn test_pick_next_always_moves() {
        let mut rng = Prng::new(2);
        let mut current = 0;
        for _ in 0..500 {
            let next = pick_next(current, 2, &mut rng);
            assert_ne!(next, current);
            current = next;
        }
    }

    #[test]
    fn test_targets_stay_inside_canvas() {
        let config = SaccadesConfig::default();
        let mut rng = Prng::new(9);
        let targets = place_targets(20, 300.0, 200.0, &config, &mut rng);
        assert_eq!(targets.len(), 20);
        for t in targets {
            assert!(t.x >= 25.0 && t.x <= 275.0);
            assert!(t.y >= 25.0 && t.y <= 175.0);
        }
    }

    #[test]
    fn test_start_locks_count_and_highlights_first() {
        let fx = fixture();
        fx.saccades.start();
        assert!(!fx.count_control.is_enabled());
        assert_eq!(fx.button.label(), STOP_LABEL);
        assert_eq!(fx.saccades.targets().len(), 5);

        let circles = fx.surface.last_circles();
        assert_eq!(circles.len(), 5);
        assert_eq!(circles[0].2, HIGHLIGHT_COLOR);
        assert!(circles[1..].iter().all(|c| c.2 == NEUTRAL_COLOR));
    }

    #[test]
    fn test_jumps_follow_rate() {
        let fx = fixture();
        fx.store
            .update(SettingPath::SaccadesJumpsPerSecond, 4.0)
            .expect("update");
        fx.saccades.start();
        let mut last = fx.saccades.current();
        for _ in 0..20 {
            fx.scheduler.advance(Duration::from_millis(250));
            let now = fx.saccades.current();
            assert_ne!(now, last);
            last = now;
        }
    }

    #[test]
    fn test_single_target_runs_without_hanging() {
        let fx = fixture();
        fx.store
            .update(SettingPath::SaccadesTargetCount, 1_u32)
            .expect("update");
        fx.saccades.start();
        fx.scheduler.advance(Duration::from_secs(10));
        assert_eq!(fx.saccades.current(), 0);
    }

    #[test]
    fn test_stop_resets_index_and_unlocks_count() {
        let fx = fixture();
        fx.saccades.start();
        fx.scheduler.advance(Duration::from_secs(3));
        fx.saccades.toggle();

        assert!(!fx.saccades.is_running());
        assert_eq!(fx.saccades.current(), 0);
        assert!(fx.count_control.is_enabled());
        assert_eq!(fx.button.label(), START_LABEL);
        assert_eq!(fx.scheduler.pending(), 0);
    }

    #[test]
    fn test_count_change_while_running_regenerates() {
        let fx = fixture();
        fx.saccades.start();
        fx.store
            .update(SettingPath::SaccadesTargetCount, 8_u32)
            .expect("update");
        assert!(fx.saccades.is_running());
        assert_eq!(fx.saccades.targets().len(), 8);
        assert_eq!(fx.scheduler.pending(), 1);
    }

    #[test]
    fn test_rate_change_replaces_timer() {
        let fx = fixture();
        fx.saccades.start();
        fx.store
            .update(SettingPath::SaccadesJumpsPerSecond, 10.0)
            .expect("update");
        assert_eq!(fx.scheduler.pending(), 1);
        let before = fx.saccades.current();
        fx.scheduler.advance(Duration::from_millis(100));
        assert_ne!(fx.saccades.current(), before);
    }

    #[test]
    fn test_resize_regenerates_targets_for_active_tab() {
        let fx = fixture();
        fx.store
            .update(SettingPath::ActiveTab, ExerciseId::Saccades)
            .expect("update");
        fx.surface.set_display_size(1000.0, 800.0);
        fx.store.bus().publish(AppEvent::CanvasResized);

        assert_eq!(fx.surface.size(), (1000.0, 800.0));
        assert_eq!(fx.saccades.targets().len(), 5);
    }
}
