//! # Trainer Integration Tests
//!
//! End-to-end behavior of the assembled trainer: tab switching, mutual
//! exclusion, fullscreen transitions and frame-driven animation.

mod common;

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use common::Harness;
use vision_core::exercise::chart;
use vision_core::{AppEvent, AudioPlayer, CoreError, Exercise, ExerciseId, Surface, Topic};

// ============================================================================
// Startup
// ============================================================================

#[test]
fn test_init_shows_default_tab_and_draws_chart() {
    let h = Harness::new();
    assert_eq!(h.tab_view.current(), Some(ExerciseId::EyeChart));
    assert_eq!(h.trainer.tabs().active(), Some(ExerciseId::EyeChart));
    assert_eq!(h.chart_surface.last_frame().len(), chart::LETTER_COUNT * 4);
    assert_eq!(h.blur_toggle.label(), chart::START_LABEL);
    assert!(h.trainer.running().is_empty());
}

// ============================================================================
// Mutual exclusion
// ============================================================================

#[test]
fn test_switching_tabs_stops_blur_cycle() {
    let mut h = Harness::new();
    h.trainer.chart().toggle();
    assert!(h.trainer.chart().is_running());
    assert!(!h.blur_slider.is_enabled());

    h.run_for(Duration::from_secs(1));
    let blur = h.trainer.store().get_state().chart.blur_amount;
    assert!(blur > 0.0);

    h.trainer.select_tab(ExerciseId::Tracking).expect("select");
    assert!(!h.trainer.chart().is_running());
    assert_eq!(h.blur_toggle.label(), chart::START_LABEL);
    assert!(h.blur_slider.is_enabled());
    assert_eq!(h.tab_view.current(), Some(ExerciseId::Tracking));

    h.run_for(Duration::from_secs(2));
    let after = h.trainer.store().get_state().chart.blur_amount;
    assert!((after - blur).abs() < f64::EPSILON);
}

#[test]
fn test_stop_all_leaves_every_exercise_idle() {
    let mut h = Harness::new();
    for exercise in h.trainer.exercises() {
        exercise.start();
    }
    assert_eq!(h.trainer.running().len(), 4);

    h.trainer.bus().publish(AppEvent::StopAllAnimations);
    assert!(h.trainer.running().is_empty());
    assert_eq!(h.trainer.scheduler().pending(), 0);

    let before = h.trainer.store().get_state();
    let tracked = h.trainer.tracking().position();
    h.run_for(Duration::from_secs(5));
    assert_eq!(h.trainer.store().get_state(), before);
    assert_eq!(h.trainer.tracking().position(), tracked);
    assert!(!h.audio.is_playing());
}

#[test]
fn test_only_the_active_exercise_runs_after_switching() {
    let mut h = Harness::new();
    h.trainer.select_tab(ExerciseId::Tracking).expect("select");
    h.trainer.tracking().start();
    h.run_for(Duration::from_millis(100));

    h.trainer.select_tab(ExerciseId::Saccades).expect("select");
    h.trainer.saccades().toggle();
    assert_eq!(h.trainer.running(), vec![ExerciseId::Saccades]);
    assert!(h.tracking_start.is_enabled());
    assert!(!h.tracking_stop.is_enabled());
    assert!(!h.target_count.is_enabled());
}

// ============================================================================
// Animation
// ============================================================================

#[test]
fn test_tracking_moves_once_per_frame() {
    let mut h = Harness::new();
    h.trainer.select_tab(ExerciseId::Tracking).expect("select");
    h.trainer.tracking().start();
    let start = h.trainer.tracking().position();

    h.run_for(Duration::from_millis(160));
    let moved = h.trainer.tracking().position();
    assert!((moved.x - (start.x + 50.0)).abs() < 1e-9);
    assert!((moved.y - start.y).abs() < f64::EPSILON);
}

#[test]
fn test_saccades_jump_on_wall_clock() {
    let mut h = Harness::new();
    h.trainer.select_tab(ExerciseId::Saccades).expect("select");
    h.trainer
        .update_setting("saccades.jumpsPerSecond", 2.0)
        .expect("update");
    h.trainer.saccades().toggle();

    let first = h.trainer.saccades().current();
    h.run_for(Duration::from_millis(500));
    assert_ne!(h.trainer.saccades().current(), first);
}

#[test]
fn test_frame_after_hidden_tab_does_not_replay_missed_ticks() {
    let h = Harness::new();
    h.trainer
        .update_setting("chart.blurCycleSpeed", 5_u32)
        .expect("update");
    h.trainer.chart().toggle();

    let changes = Rc::new(Cell::new(0));
    let counter = Rc::clone(&changes);
    h.trainer
        .bus()
        .subscribe(Topic::StateChanged, move |_| counter.set(counter.get() + 1));

    h.trainer.tick(Duration::from_secs(3600));
    assert_eq!(changes.get(), 1);

    h.trainer.tick(Duration::from_millis(3_600_100));
    assert_eq!(changes.get(), 2);
}

// ============================================================================
// Viewport
// ============================================================================

#[test]
fn test_blur_cycle_fullscreen_round_trip() {
    let mut h = Harness::new();
    h.trainer.chart().toggle();
    assert_eq!(h.fullscreen.enter_requests(), 1);

    h.chart_surface.set_display_size(1920.0, 1080.0);
    h.trainer.viewport().notify_fullscreen_change(true);
    h.run_for(Duration::from_millis(200));
    assert_eq!(h.chart_surface.size(), (1920.0, 1080.0));
    assert!(h.trainer.chart().is_running());

    h.trainer.chart().toggle();
    assert_eq!(h.fullscreen.exit_requests(), 1);
}

#[test]
fn test_resize_only_refits_the_visible_exercise() {
    let mut h = Harness::new();
    h.chart_surface.set_display_size(1024.0, 768.0);
    h.tracking_surface.set_display_size(1024.0, 768.0);
    h.trainer.viewport().notify_resize();
    h.run_for(Duration::from_millis(300));

    assert_eq!(h.chart_surface.size(), (1024.0, 768.0));
    assert_eq!(h.tracking_surface.size(), (640.0, 480.0));

    h.trainer.select_tab(ExerciseId::Tracking).expect("select");
    assert_eq!(h.tracking_surface.size(), (1024.0, 768.0));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unknown_setting_path_fails_fast() {
    let h = Harness::new();
    let before = h.trainer.store().get_state();
    let err = h.trainer.update_setting("chart.colour", 1.0).unwrap_err();
    assert!(matches!(err, CoreError::UnknownSettingPath(_)));
    assert_eq!(h.trainer.store().get_state(), before);
}

#[test]
fn test_out_of_range_blur_is_clamped() {
    let h = Harness::new();
    h.trainer
        .update_setting("chart.blurAmount", 25.0)
        .expect("update");
    let state = h.trainer.store().get_state();
    assert!((state.chart.blur_amount - 20.0).abs() < f64::EPSILON);
    assert_eq!(h.blur_slider.value(), Some(20.0));
}
