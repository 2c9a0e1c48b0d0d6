//! The trainer: every component wired together.
//!
//! Hosts build a [`TrainerParts`] bundle of collaborators, hand it to
//! [`Trainer::new`], call [`Trainer::init`] once and then
//! [`Trainer::tick`] on every display frame.

use std::rc::Rc;
use std::time::Duration;

use crate::config::TrainerConfig;
use crate::event::EventBus;
use crate::exercise::{
    ChartController, ChartParts, Exercise, GuidedController, GuidedParts, SaccadesController,
    SaccadesParts, TrackingController, TrackingParts,
};
use crate::platform::{FullscreenPlatform, TabView};
use crate::prng::Prng;
use crate::scheduler::Scheduler;
use crate::settings::{ExerciseId, SettingValue};
use crate::store::{SettingsStorage, StateStore};
use crate::tabs::TabController;
use crate::viewport::ViewportController;
use crate::CoreResult;

/// Every collaborator the trainer needs from its host.
pub struct TrainerParts {
    /// Persistence medium for the settings blob.
    pub storage: Box<dyn SettingsStorage>,
    /// Tab selectors and panes.
    pub tab_view: Box<dyn TabView>,
    /// Fullscreen capability.
    pub fullscreen: Box<dyn FullscreenPlatform>,
    /// Acuity chart collaborators.
    pub chart: ChartParts,
    /// Tracking collaborators.
    pub tracking: TrackingParts,
    /// Saccades collaborators.
    pub saccades: SaccadesParts,
    /// Guided exercise collaborators.
    pub guided: GuidedParts,
}

/// The assembled application core.
#[derive(Debug)]
pub struct Trainer {
    bus: EventBus,
    store: Rc<StateStore>,
    scheduler: Scheduler,
    viewport: ViewportController,
    tabs: TabController,
    chart: ChartController,
    tracking: TrackingController,
    saccades: SaccadesController,
    guided: GuidedController,
}

impl Trainer {
    /// Build every component. Nothing is loaded or drawn until [`Trainer::init`].
    #[must_use]
    pub fn new(parts: TrainerParts, config: TrainerConfig) -> Self {
        let bus = EventBus::new();
        let store = Rc::new(StateStore::with_key(
            bus.clone(),
            parts.storage,
            &config.storage_key,
        ));
        let scheduler = Scheduler::new();
        let viewport = ViewportController::new(
            bus.clone(),
            scheduler.clone(),
            parts.fullscreen,
            config.viewport,
        );
        let mut rng = Prng::seeded_or_random(config.seed);

        let chart = ChartController::new(
            Rc::clone(&store),
            scheduler.clone(),
            viewport.clone(),
            config.chart,
            parts.chart,
            rng.fork(),
        );
        let tracking = TrackingController::new(
            Rc::clone(&store),
            scheduler.clone(),
            config.tracking,
            parts.tracking,
            rng.fork(),
        );
        let saccades = SaccadesController::new(
            Rc::clone(&store),
            scheduler.clone(),
            config.saccades,
            parts.saccades,
            rng.fork(),
        );
        let guided = GuidedController::new(Rc::clone(&store), parts.guided);
        let tabs = TabController::new(Rc::clone(&store), bus.clone(), parts.tab_view);

        Self {
            bus,
            store,
            scheduler,
            viewport,
            tabs,
            chart,
            tracking,
            saccades,
            guided,
        }
    }

    /// Load persisted settings, wire every controller and show the stored tab.
    pub fn init(&self) {
        self.store.load_state();
        self.chart.init();
        self.tracking.init();
        self.saccades.init();
        self.guided.init();
        self.tabs.init();
        tracing::debug!("Trainer initialized on tab {:?}", self.tabs.active());
    }

    /// Advance wall-clock timers to `now` and run one display frame.
    pub fn tick(&self, now: Duration) {
        self.scheduler.advance_to(now);
        self.scheduler.run_frame();
    }

    /// Write a setting by dotted path, as an input control does.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown paths or values of the wrong shape.
    pub fn update_setting(
        &self,
        path: &str,
        value: impl Into<SettingValue>,
    ) -> CoreResult<SettingValue> {
        self.store.update_setting(path, value)
    }

    /// Switch tabs through the settings store.
    ///
    /// # Errors
    ///
    /// Propagates store update errors.
    pub fn select_tab(&self, tab: ExerciseId) -> CoreResult<SettingValue> {
        self.tabs.select(tab)
    }

    /// Every exercise, in tab order.
    #[must_use]
    pub fn exercises(&self) -> [&dyn Exercise; 4] {
        [&self.chart, &self.tracking, &self.saccades, &self.guided]
    }

    /// Exercises with a live session.
    #[must_use]
    pub fn running(&self) -> Vec<ExerciseId> {
        self.exercises()
            .into_iter()
            .filter(|exercise| exercise.is_running())
            .map(Exercise::id)
            .collect()
    }

    /// The event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The settings store.
    #[must_use]
    pub fn store(&self) -> &Rc<StateStore> {
        &self.store
    }

    /// The scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The viewport controller.
    #[must_use]
    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    /// The tab controller.
    #[must_use]
    pub fn tabs(&self) -> &TabController {
        &self.tabs
    }

    /// The acuity chart.
    #[must_use]
    pub fn chart(&self) -> &ChartController {
        &self.chart
    }

    /// The tracking exercise.
    #[must_use]
    pub fn tracking(&self) -> &TrackingController {
        &self.tracking
    }

    /// The saccades exercise.
    #[must_use]
    pub fn saccades(&self) -> &SaccadesController {
        &self.saccades
    }

    /// The guided exercise.
    #[must_use]
    pub fn guided(&self) -> &GuidedController {
        &self.guided
    }
}
