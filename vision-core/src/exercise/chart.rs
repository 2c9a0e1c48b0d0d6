//! Tumbling-E acuity chart with an automatic blur cycle.
//!
//! The cycle nudges `chart.blurAmount` through the settings store on every
//! tick, so the slider, persistence and redraw all follow the same path as a
//! manual change.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::config::ChartConfig;
use crate::event::{AppEvent, SettingChange, Topic};
use crate::exercise::{weak_tick, AnimationSession, Exercise};
use crate::platform::Widget;
use crate::prng::Prng;
use crate::scheduler::Scheduler;
use crate::settings::{ExerciseId, SettingPath, BLUR_MAX, BLUR_MIN};
use crate::store::StateStore;
use crate::surface::{Rect, Surface};
use crate::viewport::ViewportController;

/// Toggle button label while the cycle is stopped.
pub const START_LABEL: &str = "Start blur cycle";
/// Toggle button label while the cycle runs.
pub const STOP_LABEL: &str = "Stop blur cycle";

const LETTER_COLOR: &str = "#333";

/// Rows of the chart as (size multiplier, letters in the row).
pub const CHART_ROWS: [(f64, usize); 6] = [
    (1.0, 1),
    (0.8, 2),
    (0.6, 3),
    (0.4, 4),
    (0.3, 5),
    (0.25, 6),
];

/// Y coordinate of the top of the first row.
pub const CHART_TOP: f64 = 50.0;

/// Letters on the whole chart.
pub const LETTER_COUNT: usize = 21;

/// Side of one letter in stroke units.
const LETTER_UNITS: f64 = 5.0;

/// Direction the open side of an E faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EOrientation {
    /// Bars point right (the upright letter).
    Right,
    /// Bars point down.
    Down,
    /// Bars point left.
    Left,
    /// Bars point up.
    Up,
}

impl EOrientation {
    /// Every orientation, in clockwise order from [`EOrientation::Right`].
    pub const ALL: [Self; 4] = [Self::Right, Self::Down, Self::Left, Self::Up];

    const fn quarter_turns(self) -> u8 {
        match self {
            Self::Right => 0,
            Self::Down => 1,
            Self::Left => 2,
            Self::Up => 3,
        }
    }
}

/// One blur cycle step.
///
/// Moves `current` by `step` in the given direction, clamps to
/// `[BLUR_MIN, max]` and flips direction exactly when a bound is reached.
/// Returns the new value and whether the cycle is still rising.
#[must_use]
pub fn blur_step(current: f64, rising: bool, step: f64, max: f64) -> (f64, bool) {
    if rising {
        let next = current + step;
        if next >= max {
            (max, false)
        } else {
            (next, true)
        }
    } else {
        let next = current - step;
        if next <= BLUR_MIN {
            (BLUR_MIN, true)
        } else {
            (next, false)
        }
    }
}

/// Map a stored blur amount to the rendered blur radius: `max * (v / max)^exponent`.
#[must_use]
pub fn display_radius(stored: f64, max: f64, exponent: f64) -> f64 {
    if max <= 0.0 {
        return 0.0;
    }
    max * (stored.clamp(0.0, max) / max).powf(exponent)
}

/// Stroke width of the largest row for a canvas `width` pixels wide.
#[must_use]
pub fn base_unit(width: f64, size_percent: u32) -> f64 {
    let min = width / 100.0;
    let max = width / 15.0;
    min + (max - min) * f64::from(size_percent) / 100.0
}

/// Bounding boxes of every letter, row by row, each row centered.
#[must_use]
pub fn letter_boxes(width: f64, size_percent: u32) -> Vec<Rect> {
    let base = base_unit(width, size_percent);
    let mut boxes = Vec::with_capacity(LETTER_COUNT);
    let mut y = CHART_TOP;
    for (multiplier, count) in CHART_ROWS {
        let unit = base * multiplier;
        let side = unit * LETTER_UNITS;
        #[allow(clippy::cast_precision_loss)]
        let row_width = count as f64 * (side + unit) - unit;
        let start_x = (width - row_width) / 2.0;
        for i in 0..count {
            #[allow(clippy::cast_precision_loss)]
            let x = start_x + i as f64 * (side + unit);
            boxes.push(Rect::new(x, y, side, side));
        }
        y += side + unit;
    }
    boxes
}

/// The four bars of an E drawn in `letter`, facing `orientation`.
#[must_use]
pub fn e_bars(letter: Rect, orientation: EOrientation) -> [Rect; 4] {
    // Stem, top, middle (one unit short), bottom, in 5x5 stroke units.
    const BARS: [(f64, f64, f64, f64); 4] = [
        (0.0, 0.0, 1.0, 5.0),
        (0.0, 0.0, 5.0, 1.0),
        (0.0, 2.0, 4.0, 1.0),
        (0.0, 4.0, 5.0, 1.0),
    ];
    let unit = letter.width / LETTER_UNITS;
    let half = LETTER_UNITS / 2.0;
    BARS.map(|(x, y, w, h)| {
        let mut a = (x - half, y - half);
        let mut b = (x + w - half, y + h - half);
        for _ in 0..orientation.quarter_turns() {
            a = (-a.1, a.0);
            b = (-b.1, b.0);
        }
        let left = a.0.min(b.0) + half;
        let top = a.1.min(b.1) + half;
        Rect::new(
            letter.x + left * unit,
            letter.y + top * unit,
            (a.0 - b.0).abs() * unit,
            (a.1 - b.1).abs() * unit,
        )
    })
}

/// Collaborators owned by the chart.
pub struct ChartParts {
    /// Chart canvas.
    pub surface: Box<dyn Surface>,
    /// Manual blur slider, locked while cycling.
    pub blur_slider: Box<dyn Widget>,
    /// Start/stop toggle button.
    pub toggle_button: Box<dyn Widget>,
}

struct ChartState {
    parts: ChartParts,
    rng: Prng,
    orientations: Vec<EOrientation>,
    session: Option<AnimationSession>,
    rising: bool,
}

impl ChartState {
    fn shuffle(&mut self) {
        let rng = &mut self.rng;
        self.orientations = (0..LETTER_COUNT)
            .map(|_| EOrientation::ALL[rng.gen_index(EOrientation::ALL.len())])
            .collect();
    }

    fn draw(&mut self, size_percent: u32, blur: f64, config: &ChartConfig) {
        if self.orientations.len() != LETTER_COUNT {
            self.shuffle();
        }
        let (width, _) = self.parts.surface.size();
        self.parts.blur_slider.set_value(blur);
        let surface = &mut self.parts.surface;
        surface.clear();
        surface.set_blur(display_radius(blur, BLUR_MAX, config.display_exponent));
        for (letter, orientation) in letter_boxes(width, size_percent)
            .into_iter()
            .zip(&self.orientations)
        {
            for bar in e_bars(letter, *orientation) {
                surface.fill_rect(bar, LETTER_COLOR);
            }
        }
    }
}

struct ChartShared {
    store: Rc<StateStore>,
    scheduler: Scheduler,
    viewport: ViewportController,
    config: ChartConfig,
    initialized: Cell<bool>,
    state: RefCell<ChartState>,
}

/// Acuity chart controller. Clones share state.
#[derive(Clone)]
pub struct ChartController {
    shared: Rc<ChartShared>,
}

impl ChartController {
    /// Create the controller. Call [`ChartController::init`] to wire it up.
    #[must_use]
    pub fn new(
        store: Rc<StateStore>,
        scheduler: Scheduler,
        viewport: ViewportController,
        config: ChartConfig,
        parts: ChartParts,
        rng: Prng,
    ) -> Self {
        let mut state = ChartState {
            parts,
            rng,
            orientations: Vec::new(),
            session: None,
            rising: true,
        };
        state.parts.toggle_button.set_label(START_LABEL);
        Self {
            shared: Rc::new(ChartShared {
                store,
                scheduler,
                viewport,
                config,
                initialized: Cell::new(false),
                state: RefCell::new(state),
            }),
        }
    }

    /// Subscribe to the bus and show the loaded blur on the slider. Calling
    /// this twice has no further effect.
    pub fn init(&self) {
        if self.shared.initialized.replace(true) {
            return;
        }
        let blur = self.shared.store.with_state(|s| s.chart.blur_amount);
        match self.shared.state.try_borrow_mut() {
            Ok(mut state) => state.parts.blur_slider.set_value(blur),
            Err(_) => tracing::warn!("Chart busy; slider not synced"),
        }
        let bus = self.shared.store.bus().clone();
        bus.subscribe_weak(Topic::StopAllAnimations, &self.shared, |shared, _| {
            Self { shared }.stop();
        });
        bus.subscribe_weak(Topic::TabChanged, &self.shared, |shared, event| {
            if *event == AppEvent::TabChanged(ExerciseId::EyeChart) {
                Self { shared }.prepare();
            }
        });
        bus.subscribe_weak(Topic::CanvasResized, &self.shared, |shared, _| {
            let controller = Self { shared };
            if controller.is_active_tab() {
                controller.prepare();
            }
        });
        bus.subscribe_weak(Topic::StateChanged, &self.shared, |shared, event| {
            if let AppEvent::StateChanged(change) = event {
                Self { shared }.on_setting_changed(change);
            }
        });
    }

    /// Start the cycle when stopped, stop it when running.
    pub fn toggle(&self) {
        if self.is_running() {
            self.stop();
        } else {
            self.start();
        }
    }

    /// Whether the cycle is currently making the chart blurrier.
    #[must_use]
    pub fn is_rising(&self) -> bool {
        self.shared.state.borrow().rising
    }

    /// Current letter orientations, row by row.
    #[must_use]
    pub fn orientations(&self) -> Vec<EOrientation> {
        self.shared.state.borrow().orientations.clone()
    }

    fn is_active_tab(&self) -> bool {
        self.shared
            .store
            .with_state(|s| s.active_tab == ExerciseId::EyeChart)
    }

    /// Fit the canvas, deal new orientations and draw.
    fn prepare(&self) {
        match self.shared.state.try_borrow_mut() {
            Ok(mut state) => {
                state.parts.surface.fit_to_display();
                state.shuffle();
            }
            Err(_) => {
                tracing::warn!("Chart busy; skipping layout refresh");
                return;
            }
        }
        self.redraw();
    }

    fn redraw(&self) {
        let (size_percent, blur) = self
            .shared
            .store
            .with_state(|s| (s.chart.size_percent, s.chart.blur_amount));
        match self.shared.state.try_borrow_mut() {
            Ok(mut state) => state.draw(size_percent, blur, &self.shared.config),
            Err(_) => tracing::warn!("Chart busy; skipping redraw"),
        }
    }

    fn on_setting_changed(&self, change: &SettingChange) {
        match change.path {
            SettingPath::ChartSizePercent => {
                if let Ok(mut state) = self.shared.state.try_borrow_mut() {
                    state.shuffle();
                }
                self.redraw();
            }
            SettingPath::ChartBlurAmount => self.redraw(),
            SettingPath::ChartBlurCycleSpeed => self.restart_timer(),
            _ => {}
        }
    }

    fn cycle_callback(&self) -> impl FnMut() + 'static {
        weak_tick(&self.shared, |shared| Self { shared }.tick())
    }

    fn cycle_period(&self) -> std::time::Duration {
        let speed = self.shared.store.with_state(|s| s.chart.blur_cycle_speed);
        self.shared.config.cycle_period(speed)
    }

    /// Replace the cycle timer with one at the current speed, keeping direction.
    fn restart_timer(&self) {
        if !self.is_running() {
            return;
        }
        let timer = self
            .shared
            .scheduler
            .schedule_repeating(self.cycle_period(), self.cycle_callback());
        let previous = match self.shared.state.try_borrow_mut() {
            Ok(mut state) => state
                .session
                .as_mut()
                .map(|session| session.replace_redraw(timer)),
            Err(_) => {
                tracing::warn!("Chart busy; keeping old cycle speed");
                None
            }
        };
        drop(previous);
        tracing::debug!("Blur cycle period now {:?}", self.cycle_period());
    }

    fn tick(&self) {
        let current = self.shared.store.with_state(|s| s.chart.blur_amount);
        let next = {
            let Ok(mut state) = self.shared.state.try_borrow_mut() else {
                tracing::warn!("Chart busy; skipping blur tick");
                return;
            };
            if state.session.is_none() {
                return;
            }
            let (next, rising) = blur_step(
                current,
                state.rising,
                self.shared.config.blur_step,
                BLUR_MAX,
            );
            state.rising = rising;
            next
        };
        tracing::trace!("Blur cycle tick: {current:.1} -> {next:.1}");
        if let Err(e) = self.shared.store.update(SettingPath::ChartBlurAmount, next) {
            tracing::warn!("Blur cycle update rejected: {e}");
        }
    }
}

impl Exercise for ChartController {
    fn id(&self) -> ExerciseId {
        ExerciseId::EyeChart
    }

    fn start(&self) {
        let blur = self.shared.store.with_state(|s| s.chart.blur_amount);
        let period = self.cycle_period();
        {
            let Ok(mut state) = self.shared.state.try_borrow_mut() else {
                tracing::warn!("Chart busy; ignoring start");
                return;
            };
            if state.session.is_some() {
                return;
            }
            state.rising = blur < BLUR_MAX;
            let timer = self
                .shared
                .scheduler
                .schedule_repeating(period, self.cycle_callback());
            state.session = Some(AnimationSession::new(timer));
            state.parts.blur_slider.set_enabled(false);
            state.parts.toggle_button.set_label(STOP_LABEL);
        }
        tracing::debug!("Blur cycle started, period {period:?}");
        if self.shared.config.fullscreen_on_cycle {
            self.shared.viewport.enter_fullscreen();
        }
    }

    fn stop(&self) {
        let session = {
            let Ok(mut state) = self.shared.state.try_borrow_mut() else {
                tracing::warn!("Chart busy; ignoring stop");
                return;
            };
            let Some(session) = state.session.take() else {
                return;
            };
            state.parts.blur_slider.set_enabled(true);
            state.parts.toggle_button.set_label(START_LABEL);
            session
        };
        drop(session);
        tracing::debug!("Blur cycle stopped");
        if self.shared.config.exit_fullscreen_on_stop {
            self.shared.viewport.exit_fullscreen();
        }
        self.redraw();
    }

    fn is_running(&self) -> bool {
        self.shared
            .state
            .try_borrow()
            .is_ok_and(|state| state.session.is_some())
    }
}

impl fmt::Debug for ChartController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartController")
            .field("running", &self.is_running())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}
