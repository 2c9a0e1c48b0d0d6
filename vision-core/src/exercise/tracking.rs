//! Moving-object tracking exercise.
//!
//! Motion is driven by frame callbacks. An independent repeating timer
//! toggles visibility when a flash frequency is set.

use std::cell::{Cell, RefCell};
use std::f64::consts::TAU;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::config::TrackingConfig;
use crate::event::{AppEvent, SettingChange, Topic};
use crate::exercise::{weak_tick, AnimationSession, Exercise};
use crate::platform::Widget;
use crate::prng::Prng;
use crate::scheduler::Scheduler;
use crate::settings::{ExerciseId, SettingPath, TrackingPath, TrackingSettings};
use crate::store::StateStore;
use crate::surface::{Point, Surface};

const OBJECT_COLOR: &str = "green";

/// Visibility toggle period for a flash frequency: `1000 / (2 * hz)` ms.
///
/// Returns `None` when flashing is disabled.
#[must_use]
pub fn flash_period(frequency_hz: f64) -> Option<Duration> {
    if frequency_hz > 0.0 && frequency_hz.is_finite() {
        Some(Duration::from_secs_f64(1.0 / (2.0 * frequency_hz)))
    } else {
        None
    }
}

/// Object position and phase along its path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    /// Object center.
    pub position: Point,
    /// Horizontal direction on the linear path: `1.0` or `-1.0`.
    pub direction: f64,
    /// Phase angle on curved paths, in radians.
    pub angle: f64,
}

impl Kinematics {
    /// Canonical start of `path` on a `width` by `height` canvas.
    #[must_use]
    pub fn start(path: TrackingPath, width: f64, height: f64, config: &TrackingConfig) -> Self {
        let mut kinematics = Self {
            position: Point::new(width / 2.0, height / 2.0),
            direction: 1.0,
            angle: 0.0,
        };
        if path != TrackingPath::Linear {
            kinematics.position = curve_point(path, 0.0, width, height, config);
        }
        kinematics
    }

    /// Advance one frame.
    pub fn step(
        &mut self,
        settings: &TrackingSettings,
        width: f64,
        height: f64,
        config: &TrackingConfig,
    ) {
        let speed = f64::from(settings.speed);
        match settings.path {
            TrackingPath::Linear => {
                let radius = config.object_radius;
                let step = config.base_step * speed / config.reference_speed;
                let mut x = self.position.x + self.direction * step;
                if x + radius >= width {
                    x = width - radius;
                    self.direction = -1.0;
                } else if x - radius <= 0.0 {
                    x = radius;
                    self.direction = 1.0;
                }
                self.position = Point::new(x, height / 2.0);
            }
            path => {
                self.angle = (self.angle + config.angle_step * speed) % TAU;
                self.position = curve_point(path, self.angle, width, height, config);
            }
        }
    }
}

/// Point at phase `angle` on a circle or figure-eight centered on the canvas.
fn curve_point(
    path: TrackingPath,
    angle: f64,
    width: f64,
    height: f64,
    config: &TrackingConfig,
) -> Point {
    let (cx, cy) = (width / 2.0, height / 2.0);
    let sx = ((cx - config.object_radius) * config.path_margin).max(0.0);
    let sy = ((cy - config.object_radius) * config.path_margin).max(0.0);
    match path {
        TrackingPath::Circle => {
            let r = sx.min(sy);
            Point::new(cx + angle.cos() * r, cy + angle.sin() * r)
        }
        TrackingPath::Infinity => {
            Point::new(cx + angle.sin() * sx, cy + (2.0 * angle).sin() * sy)
        }
        TrackingPath::Linear => Point::new(cx, cy),
    }
}

/// Collaborators owned by the tracking exercise.
pub struct TrackingParts {
    /// Tracking canvas.
    pub surface: Box<dyn Surface>,
    /// Start button, disabled while running.
    pub start_button: Box<dyn Widget>,
    /// Stop button, enabled only while running.
    pub stop_button: Box<dyn Widget>,
}

struct TrackingState {
    parts: TrackingParts,
    rng: Prng,
    session: Option<AnimationSession>,
    kinematics: Kinematics,
    visible: bool,
}

impl TrackingState {
    fn reset(&mut self, settings: &TrackingSettings, config: &TrackingConfig) {
        let (width, height) = self.parts.surface.size();
        self.kinematics = Kinematics::start(settings.path, width, height, config);
        self.visible = true;
        if settings.random_position {
            self.jump(config);
        }
    }

    /// Idle frame: canonical start of `path`, visible, buttons reset.
    fn rest(&mut self, path: TrackingPath, config: &TrackingConfig) {
        let (width, height) = self.parts.surface.size();
        self.kinematics = Kinematics::start(path, width, height, config);
        self.visible = true;
        self.set_buttons(false);
    }

    fn jump(&mut self, config: &TrackingConfig) {
        let (width, height) = self.parts.surface.size();
        let r = config.object_radius;
        let x = self.rng.gen_range_f64(r, width - r);
        let y = self.rng.gen_range_f64(r, height - r);
        self.kinematics.position = Point::new(x, y);
    }

    fn set_buttons(&mut self, running: bool) {
        self.parts.start_button.set_enabled(!running);
        self.parts.stop_button.set_enabled(running);
    }

    fn draw(&mut self, config: &TrackingConfig) {
        let surface = &mut self.parts.surface;
        surface.clear();
        if self.visible {
            surface.fill_circle(self.kinematics.position, config.object_radius, OBJECT_COLOR);
        }
    }
}

struct TrackingShared {
    store: Rc<StateStore>,
    scheduler: Scheduler,
    config: TrackingConfig,
    initialized: Cell<bool>,
    state: RefCell<TrackingState>,
}

/// Tracking exercise controller. Clones share state.
#[derive(Clone)]
pub struct TrackingController {
    shared: Rc<TrackingShared>,
}

impl TrackingController {
    /// Create the controller. Call [`TrackingController::init`] to wire it up.
    #[must_use]
    pub fn new(
        store: Rc<StateStore>,
        scheduler: Scheduler,
        config: TrackingConfig,
        parts: TrackingParts,
        rng: Prng,
    ) -> Self {
        let (width, height) = parts.surface.size();
        let mut state = TrackingState {
            kinematics: Kinematics::start(TrackingPath::default(), width, height, &config),
            parts,
            rng,
            session: None,
            visible: true,
        };
        state.set_buttons(false);
        Self {
            shared: Rc::new(TrackingShared {
                store,
                scheduler,
                config,
                initialized: Cell::new(false),
                state: RefCell::new(state),
            }),
        }
    }

    /// Subscribe to the bus and rest on the loaded path. Calling this twice
    /// has no further effect.
    pub fn init(&self) {
        if self.shared.initialized.replace(true) {
            return;
        }
        let path = self.shared.store.with_state(|s| s.tracking.path);
        match self.shared.state.try_borrow_mut() {
            Ok(mut state) => state.rest(path, &self.shared.config),
            Err(_) => tracing::warn!("Tracking busy; keeping initial position"),
        }
        let bus = self.shared.store.bus().clone();
        bus.subscribe_weak(Topic::StopAllAnimations, &self.shared, |shared, _| {
            Self { shared }.stop();
        });
        bus.subscribe_weak(Topic::TabChanged, &self.shared, |shared, event| {
            if *event == AppEvent::TabChanged(ExerciseId::Tracking) {
                Self { shared }.prepare();
            }
        });
        bus.subscribe_weak(Topic::CanvasResized, &self.shared, |shared, _| {
            let controller = Self { shared };
            if controller
                .shared
                .store
                .with_state(|s| s.active_tab == ExerciseId::Tracking)
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

    /// Current object position.
    #[must_use]
    pub fn position(&self) -> Point {
        self.shared.state.borrow().kinematics.position
    }

    /// Whether the object is currently drawn.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.shared.state.borrow().visible
    }

    fn settings(&self) -> TrackingSettings {
        self.shared.store.with_state(|s| s.tracking.clone())
    }

    /// Fit the canvas and reset to the canonical frame of the current mode.
    fn prepare(&self) {
        let settings = self.settings();
        let Ok(mut state) = self.shared.state.try_borrow_mut() else {
            tracing::warn!("Tracking busy; skipping layout refresh");
            return;
        };
        state.parts.surface.fit_to_display();
        if state.session.is_some() {
            state.reset(&settings, &self.shared.config);
        } else {
            state.rest(settings.path, &self.shared.config);
        }
        state.draw(&self.shared.config);
    }

    fn on_setting_changed(&self, change: &SettingChange) {
        match change.path {
            SettingPath::TrackingPath
            | SettingPath::TrackingFlashFrequency
            | SettingPath::TrackingRandomPosition => {
                if self.is_running() {
                    tracing::debug!("Tracking restarting after {} change", change.path);
                    self.stop();
                    self.start();
                }
            }
            _ => {}
        }
    }

    fn frame(&self) {
        let settings = self.settings();
        let Ok(mut state) = self.shared.state.try_borrow_mut() else {
            tracing::warn!("Tracking busy; dropping frame");
            return;
        };
        if state.session.is_none() {
            return;
        }
        if !settings.random_position {
            let (width, height) = state.parts.surface.size();
            state
                .kinematics
                .step(&settings, width, height, &self.shared.config);
        }
        state.draw(&self.shared.config);
    }

    fn flash(&self) {
        let random = self.shared.store.with_state(|s| s.tracking.random_position);
        let Ok(mut state) = self.shared.state.try_borrow_mut() else {
            tracing::warn!("Tracking busy; skipping flash toggle");
            return;
        };
        state.visible = !state.visible;
        if state.visible && random {
            state.jump(&self.shared.config);
        }
        tracing::trace!("Tracking object visible: {}", state.visible);
    }
}

impl Exercise for TrackingController {
    fn id(&self) -> ExerciseId {
        ExerciseId::Tracking
    }

    fn start(&self) {
        let settings = self.settings();
        let Ok(mut state) = self.shared.state.try_borrow_mut() else {
            tracing::warn!("Tracking busy; ignoring start");
            return;
        };
        if state.session.is_some() {
            return;
        }
        state.reset(&settings, &self.shared.config);

        let scheduler = &self.shared.scheduler;
        let frames = scheduler.schedule_frames(weak_tick(&self.shared, |shared| {
            Self { shared }.frame();
        }));
        let mut session = AnimationSession::new(frames);
        if let Some(period) = flash_period(settings.flash_frequency_hz) {
            let flash = scheduler.schedule_repeating(
                period,
                weak_tick(&self.shared, |shared| Self { shared }.flash()),
            );
            session.set_flash(Some(flash));
        }
        state.session = Some(session);
        state.set_buttons(true);
        state.draw(&self.shared.config);
        tracing::debug!(
            "Tracking started on {} path, flash {} Hz",
            settings.path,
            settings.flash_frequency_hz
        );
    }

    fn stop(&self) {
        let settings = self.settings();
        let session = {
            let Ok(mut state) = self.shared.state.try_borrow_mut() else {
                tracing::warn!("Tracking busy; ignoring stop");
                return;
            };
            let Some(session) = state.session.take() else {
                return;
            };
            state.rest(settings.path, &self.shared.config);
            state.draw(&self.shared.config);
            session
        };
        drop(session);
        tracing::debug!("Tracking stopped");
    }

    fn is_running(&self) -> bool {
        self.shared
            .state
            .try_borrow()
            .is_ok_and(|state| state.session.is_some())
    }
}

impl fmt::Debug for TrackingController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingController")
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
    use crate::store::{MemoryStorage, DEFAULT_STORAGE_KEY};

    const WIDTH: f64 = 400.0;
    const HEIGHT: f64 = 300.0;

    struct Fixture {
        store: Rc<StateStore>,
        scheduler: Scheduler,
        surface: HeadlessSurface,
        start_button: HeadlessWidget,
        stop_button: HeadlessWidget,
        tracking: TrackingController,
    }

    fn fixture() -> Fixture {
        let bus = EventBus::new();
        let store = Rc::new(StateStore::new(bus, Box::new(MemoryStorage::new())));
        let scheduler = Scheduler::new();
        let surface = HeadlessSurface::new(WIDTH, HEIGHT);
        let start_button = HeadlessWidget::new();
        let stop_button = HeadlessWidget::new();
        let tracking = TrackingController::new(
            Rc::clone(&store),
            scheduler.clone(),
            TrackingConfig::default(),
            TrackingParts {
                surface: Box::new(surface.clone()),
                start_button: Box::new(start_button.clone()),
                stop_button: Box::new(stop_button.clone()),
            },
            Prng::new(3),
        );
        tracking.init();
        Fixture {
            store,
            scheduler,
            surface,
            start_button,
            stop_button,
            tracking,
        }
    }

    #[test]
    fn test_init_rests_on_the_loaded_path() {
        let storage =
            MemoryStorage::with_entry(DEFAULT_STORAGE_KEY, r#"{"tracking":{"path":"circle"}}"#);
        let store = Rc::new(StateStore::new(EventBus::new(), Box::new(storage)));
        let tracking = TrackingController::new(
            Rc::clone(&store),
            Scheduler::new(),
            TrackingConfig::default(),
            TrackingParts {
                surface: Box::new(HeadlessSurface::new(WIDTH, HEIGHT)),
                start_button: Box::new(HeadlessWidget::new()),
                stop_button: Box::new(HeadlessWidget::new()),
            },
            Prng::new(3),
        );
        store.load_state();
        tracking.init();

        let expected =
            Kinematics::start(TrackingPath::Circle, WIDTH, HEIGHT, &TrackingConfig::default());
        assert_eq!(tracking.position(), expected.position);
        assert!((tracking.position().x - WIDTH / 2.0).abs() > 1.0);
    }

    #[test]
    fn test_flash_period() {
        assert_eq!(flash_period(0.0), None);
        assert_eq!(flash_period(0.5), Some(Duration::from_secs(1)));
        assert_eq!(flash_period(5.0), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_linear_reverses_at_edges_without_overshoot() {
        let config = TrackingConfig::default();
        let settings = TrackingSettings {
            speed: 20,
            ..TrackingSettings::default()
        };
        let mut k = Kinematics::start(TrackingPath::Linear, WIDTH, HEIGHT, &config);
        let mut reversals = 0;
        let mut last_direction = k.direction;
        for _ in 0..500 {
            k.step(&settings, WIDTH, HEIGHT, &config);
            assert!(k.position.x - config.object_radius >= 0.0);
            assert!(k.position.x + config.object_radius <= WIDTH);
            if (k.direction - last_direction).abs() > f64::EPSILON {
                reversals += 1;
                let at_edge = (k.position.x - config.object_radius).abs() < 1e-9
                    || (k.position.x + config.object_radius - WIDTH).abs() < 1e-9;
                assert!(at_edge, "reversed away from an edge at {}", k.position.x);
                last_direction = k.direction;
            }
        }
        assert!(reversals >= 2);
    }

    #[test]
    fn test_infinity_path_follows_lissajous() {
        let config = TrackingConfig::default();
        let settings = TrackingSettings {
            path: TrackingPath::Infinity,
            ..TrackingSettings::default()
        };
        let mut k = Kinematics::start(TrackingPath::Infinity, WIDTH, HEIGHT, &config);
        assert_eq!(k.position, Point::new(WIDTH / 2.0, HEIGHT / 2.0));
        k.step(&settings, WIDTH, HEIGHT, &config);
        let a = k.angle;
        let sx = (WIDTH / 2.0 - 20.0) * 0.8;
        let sy = (HEIGHT / 2.0 - 20.0) * 0.8;
        assert!((k.position.x - (WIDTH / 2.0 + a.sin() * sx)).abs() < 1e-9);
        assert!((k.position.y - (HEIGHT / 2.0 + (2.0 * a).sin() * sy)).abs() < 1e-9);
    }

    #[test]
    fn test_start_and_stop_toggle_buttons() {
        let fx = fixture();
        assert!(fx.start_button.is_enabled());
        assert!(!fx.stop_button.is_enabled());

        fx.tracking.start();
        assert!(fx.tracking.is_running());
        assert!(!fx.start_button.is_enabled());
        assert!(fx.stop_button.is_enabled());

        fx.tracking.stop();
        assert!(!fx.tracking.is_running());
        assert!(fx.start_button.is_enabled());
        assert!(!fx.stop_button.is_enabled());
        assert_eq!(fx.tracking.position(), Point::new(WIDTH / 2.0, HEIGHT / 2.0));
        assert_eq!(fx.scheduler.pending(), 0);
    }

    #[test]
    fn test_frames_move_the_object() {
        let fx = fixture();
        fx.tracking.start();
        fx.scheduler.run_frame();
        fx.scheduler.run_frame();
        assert!((fx.tracking.position().x - (WIDTH / 2.0 + 10.0)).abs() < 1e-9);
        assert_eq!(fx.surface.last_circles().len(), 1);
    }

    #[test]
    fn test_flash_toggles_visibility() {
        let fx = fixture();
        fx.store
            .update(SettingPath::TrackingFlashFrequency, 5.0)
            .expect("update");
        fx.tracking.start();
        assert!(fx.tracking.is_visible());

        fx.scheduler.advance(Duration::from_millis(100));
        assert!(!fx.tracking.is_visible());
        fx.scheduler.run_frame();
        assert!(fx.surface.last_circles().is_empty());

        fx.scheduler.advance(Duration::from_millis(100));
        assert!(fx.tracking.is_visible());
        fx.scheduler.run_frame();
        assert_eq!(fx.surface.last_circles().len(), 1);
    }

    #[test]
    fn test_structural_change_restarts_session() {
        let fx = fixture();
        fx.tracking.start();
        for _ in 0..10 {
            fx.scheduler.run_frame();
        }
        assert_eq!(fx.scheduler.pending(), 1);

        fx.store
            .update(SettingPath::TrackingFlashFrequency, 2.0)
            .expect("update");
        assert!(fx.tracking.is_running());
        assert_eq!(fx.scheduler.pending(), 2);
        assert_eq!(fx.tracking.position(), Point::new(WIDTH / 2.0, HEIGHT / 2.0));

        fx.store
            .update(SettingPath::TrackingFlashFrequency, 0.0)
            .expect("update");
        assert_eq!(fx.scheduler.pending(), 1);
        assert!(fx.tracking.is_visible());
    }

    #[test]
    fn test_speed_change_does_not_restart() {
        let fx = fixture();
        fx.tracking.start();
        fx.scheduler.run_frame();
        let before = fx.tracking.position();
        fx.store
            .update(SettingPath::TrackingSpeed, 10_u32)
            .expect("update");
        assert_eq!(fx.tracking.position(), before);
        fx.scheduler.run_frame();
        assert!((fx.tracking.position().x - (before.x + 10.0)).abs() < 1e-9);
    }

    #[test]
    fn test_random_position_jumps_when_visible() {
        let fx = fixture();
        fx.store
            .update(SettingPath::TrackingRandomPosition, true)
            .expect("update");
        fx.store
            .update(SettingPath::TrackingFlashFrequency, 1.0)
            .expect("update");
        fx.tracking.start();
        let first = fx.tracking.position();

        fx.scheduler.run_frame();
        assert_eq!(fx.tracking.position(), first);

        fx.scheduler.advance(Duration::from_secs(1));
        let second = fx.tracking.position();
        assert_ne!(second, first);
        for p in [first, second] {
            assert!(p.x >= 20.0 && p.x <= WIDTH - 20.0);
            assert!(p.y >= 20.0 && p.y <= HEIGHT - 20.0);
        }
    }

    #[test]
    fn test_stop_all_leaves_tracking_idle() {
        let fx = fixture();
        fx.tracking.start();
        fx.store.bus().publish(AppEvent::StopAllAnimations);
        assert!(!fx.tracking.is_running());

        fx.scheduler.run_frame();
        fx.scheduler.advance(Duration::from_secs(5));
        assert_eq!(fx.tracking.position(), Point::new(WIDTH / 2.0, HEIGHT / 2.0));
    }
}
