//! Trainer harness for integration tests.
//!
//! Builds a [`Trainer`] over headless collaborators and keeps a handle to
//! each one so tests can inspect what the trainer did.

#![allow(dead_code)]

use std::time::Duration;

use vision_core::headless::{
    HeadlessAudio, HeadlessFullscreen, HeadlessSurface, HeadlessTabView, HeadlessWidget,
};
use vision_core::{
    ChartParts, GuidedParts, SaccadesParts, SettingsStorage, TrackingParts, Trainer,
    TrainerConfig, TrainerParts,
};

/// Headless handles shared with the trainer under test.
pub struct Harness {
    pub trainer: Trainer,
    pub tab_view: HeadlessTabView,
    pub fullscreen: HeadlessFullscreen,
    pub chart_surface: HeadlessSurface,
    pub blur_slider: HeadlessWidget,
    pub blur_toggle: HeadlessWidget,
    pub tracking_surface: HeadlessSurface,
    pub tracking_start: HeadlessWidget,
    pub tracking_stop: HeadlessWidget,
    pub saccades_surface: HeadlessSurface,
    pub target_count: HeadlessWidget,
    pub saccades_toggle: HeadlessWidget,
    pub audio: HeadlessAudio,
    now: Duration,
}

impl Harness {
    /// Build and initialize a trainer over `storage` with a fixed seed.
    pub fn with_storage(storage: Box<dyn SettingsStorage>) -> Self {
        let tab_view = HeadlessTabView::new();
        let fullscreen = HeadlessFullscreen::new();
        let chart_surface = HeadlessSurface::new(800.0, 600.0);
        let blur_slider = HeadlessWidget::new();
        let blur_toggle = HeadlessWidget::new();
        let tracking_surface = HeadlessSurface::new(640.0, 480.0);
        let tracking_start = HeadlessWidget::new();
        let tracking_stop = HeadlessWidget::new();
        let saccades_surface = HeadlessSurface::new(640.0, 480.0);
        let target_count = HeadlessWidget::new();
        let saccades_toggle = HeadlessWidget::new();
        let audio = HeadlessAudio::new();

        let parts = TrainerParts {
            storage,
            tab_view: Box::new(tab_view.clone()),
            fullscreen: Box::new(fullscreen.clone()),
            chart: ChartParts {
                surface: Box::new(chart_surface.clone()),
                blur_slider: Box::new(blur_slider.clone()),
                toggle_button: Box::new(blur_toggle.clone()),
            },
            tracking: TrackingParts {
                surface: Box::new(tracking_surface.clone()),
                start_button: Box::new(tracking_start.clone()),
                stop_button: Box::new(tracking_stop.clone()),
            },
            saccades: SaccadesParts {
                surface: Box::new(saccades_surface.clone()),
                count_control: Box::new(target_count.clone()),
                toggle_button: Box::new(saccades_toggle.clone()),
            },
            guided: GuidedParts {
                audio: Box::new(audio.clone()),
                toggle_button: Box::new(HeadlessWidget::new()),
            },
        };
        let config = TrainerConfig {
            seed: Some(42),
            ..TrainerConfig::default()
        };
        let trainer = Trainer::new(parts, config);
        trainer.init();

        Self {
            trainer,
            tab_view,
            fullscreen,
            chart_surface,
            blur_slider,
            blur_toggle,
            tracking_surface,
            tracking_start,
            tracking_stop,
            saccades_surface,
            target_count,
            saccades_toggle,
            audio,
            now: Duration::ZERO,
        }
    }

    /// Build and initialize a trainer over fresh in-memory storage.
    pub fn new() -> Self {
        Self::with_storage(Box::new(vision_core::MemoryStorage::new()))
    }

    /// Let `by` of wall-clock time pass, one 16ms display frame at a time.
    pub fn run_for(&mut self, by: Duration) {
        let end = self.now + by;
        let frame = Duration::from_millis(16);
        while self.now < end {
            self.now = (self.now + frame).min(end);
            self.trainer.tick(self.now);
        }
    }
}
