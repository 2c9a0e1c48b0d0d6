//! Headless collaborators that record what the core asks of them.
//!
//! Used by tests and by hosts without a display. Every type is a cheap
//! handle: clone one, hand the clone to a controller and inspect the
//! original afterwards.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::PlatformError;
use crate::platform::{AudioPlayer, FullscreenPlatform, TabView, Widget};
use crate::settings::ExerciseId;
use crate::surface::{Point, Rect, Surface};

/// Recorded operations are discarded at the next clear once the log holds
/// this many, so a long-running frame loop keeps bounded memory.
pub const MAX_RECORDED_OPS: usize = 4096;

/// One recorded drawing operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// The surface was cleared.
    Clear,
    /// A rectangle was filled.
    Rect {
        /// Filled area.
        rect: Rect,
        /// Fill color.
        color: String,
    },
    /// A circle was filled.
    Circle {
        /// Circle center.
        center: Point,
        /// Circle radius.
        radius: f64,
        /// Fill color.
        color: String,
    },
}

#[derive(Debug)]
struct SurfaceState {
    display: (f64, f64),
    size: (f64, f64),
    blur: f64,
    ops: Vec<DrawOp>,
}

/// Surface that records drawing operations instead of rasterizing.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    state: Rc<RefCell<SurfaceState>>,
}

impl HeadlessSurface {
    /// Create a surface whose display and logical sizes are both `width` by `height`.
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            state: Rc::new(RefCell::new(SurfaceState {
                display: (width, height),
                size: (width, height),
                blur: 0.0,
                ops: Vec::new(),
            })),
        }
    }

    /// Simulate the host resizing the element on screen.
    pub fn set_display_size(&self, width: f64, height: f64) {
        self.state.borrow_mut().display = (width, height);
    }

    /// Operations recorded so far, up to [`MAX_RECORDED_OPS`] plus the
    /// current frame.
    #[must_use]
    pub fn ops(&self) -> Vec<DrawOp> {
        self.state.borrow().ops.clone()
    }

    /// Operations drawn since the most recent clear.
    #[must_use]
    pub fn last_frame(&self) -> Vec<DrawOp> {
        let state = self.state.borrow();
        let start = state
            .ops
            .iter()
            .rposition(|op| *op == DrawOp::Clear)
            .map_or(0, |i| i + 1);
        state.ops[start..].to_vec()
    }

    /// Circles drawn since the most recent clear.
    #[must_use]
    pub fn last_circles(&self) -> Vec<(Point, f64, String)> {
        self.last_frame()
            .into_iter()
            .filter_map(|op| match op {
                DrawOp::Circle {
                    center,
                    radius,
                    color,
                } => Some((center, radius, color)),
                _ => None,
            })
            .collect()
    }

    /// Forget every recorded operation.
    pub fn clear_log(&self) {
        self.state.borrow_mut().ops.clear();
    }

    /// Current blur radius.
    #[must_use]
    pub fn blur(&self) -> f64 {
        self.state.borrow().blur
    }
}

impl Surface for HeadlessSurface {
    fn display_size(&self) -> (f64, f64) {
        self.state.borrow().display
    }

    fn size(&self) -> (f64, f64) {
        self.state.borrow().size
    }

    fn set_size(&mut self, width: f64, height: f64) {
        tracing::trace!("Headless surface resized to {width}x{height}");
        self.state.borrow_mut().size = (width, height);
    }

    fn clear(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.ops.len() >= MAX_RECORDED_OPS {
            state.ops.clear();
        }
        state.ops.push(DrawOp::Clear);
    }

    fn fill_rect(&mut self, rect: Rect, color: &str) {
        self.state.borrow_mut().ops.push(DrawOp::Rect {
            rect,
            color: color.to_string(),
        });
    }

    fn fill_circle(&mut self, center: Point, radius: f64, color: &str) {
        self.state.borrow_mut().ops.push(DrawOp::Circle {
            center,
            radius,
            color: color.to_string(),
        });
    }

    fn set_blur(&mut self, radius: f64) {
        self.state.borrow_mut().blur = radius;
    }
}

#[derive(Debug)]
struct WidgetState {
    enabled: bool,
    label: String,
    value: Option<f64>,
}

/// Input control that remembers its enabled flag, label and value.
#[derive(Debug, Clone)]
pub struct HeadlessWidget {
    state: Rc<RefCell<WidgetState>>,
}

impl Default for HeadlessWidget {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessWidget {
    /// Create an enabled control with no label.
    #[must_use]
    pub fn new() -> Self {
        Self::with_label("")
    }

    /// Create an enabled control showing `label`.
    #[must_use]
    pub fn with_label(label: &str) -> Self {
        Self {
            state: Rc::new(RefCell::new(WidgetState {
                enabled: true,
                label: label.to_string(),
                value: None,
            })),
        }
    }

    /// Whether user input is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.state.borrow().enabled
    }

    /// Current label.
    #[must_use]
    pub fn label(&self) -> String {
        self.state.borrow().label.clone()
    }

    /// Last value pushed to the control.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.state.borrow().value
    }
}

impl Widget for HeadlessWidget {
    fn set_enabled(&mut self, enabled: bool) {
        self.state.borrow_mut().enabled = enabled;
    }

    fn set_label(&mut self, label: &str) {
        self.state.borrow_mut().label = label.to_string();
    }

    fn set_value(&mut self, value: f64) {
        self.state.borrow_mut().value = Some(value);
    }
}

/// Tab view that records which tab was shown.
#[derive(Debug, Clone, Default)]
pub struct HeadlessTabView {
    shown: Rc<RefCell<Vec<ExerciseId>>>,
}

impl HeadlessTabView {
    /// Create a view with nothing shown yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The tab currently shown, if any.
    #[must_use]
    pub fn current(&self) -> Option<ExerciseId> {
        self.shown.borrow().last().copied()
    }

    /// Every tab shown, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<ExerciseId> {
        self.shown.borrow().clone()
    }
}

impl TabView for HeadlessTabView {
    fn show(&mut self, tab: ExerciseId) {
        self.shown.borrow_mut().push(tab);
    }
}

#[derive(Debug, Default)]
struct FullscreenState {
    active: bool,
    reject: bool,
    enter_requests: usize,
    exit_requests: usize,
}

/// Fullscreen capability that switches state immediately when asked.
///
/// Like a real platform it does not notify anyone; tests forward the change
/// to the viewport themselves.
#[derive(Debug, Clone, Default)]
pub struct HeadlessFullscreen {
    state: Rc<RefCell<FullscreenState>>,
}

impl HeadlessFullscreen {
    /// Create a platform that is not fullscreen and accepts requests.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent request fail.
    pub fn set_reject(&self, reject: bool) {
        self.state.borrow_mut().reject = reject;
    }

    /// Number of enter requests received.
    #[must_use]
    pub fn enter_requests(&self) -> usize {
        self.state.borrow().enter_requests
    }

    /// Number of exit requests received.
    #[must_use]
    pub fn exit_requests(&self) -> usize {
        self.state.borrow().exit_requests
    }
}

impl FullscreenPlatform for HeadlessFullscreen {
    fn request_enter(&mut self) -> Result<(), PlatformError> {
        let mut state = self.state.borrow_mut();
        state.enter_requests += 1;
        if state.reject {
            return Err(PlatformError::FullscreenRejected(
                "headless platform configured to reject".to_string(),
            ));
        }
        state.active = true;
        Ok(())
    }

    fn request_exit(&mut self) -> Result<(), PlatformError> {
        let mut state = self.state.borrow_mut();
        state.exit_requests += 1;
        if state.reject {
            return Err(PlatformError::FullscreenRejected(
                "headless platform configured to reject".to_string(),
            ));
        }
        state.active = false;
        Ok(())
    }

    fn is_fullscreen(&self) -> bool {
        self.state.borrow().active
    }
}

#[derive(Debug, Default)]
struct AudioState {
    playing: bool,
    rewinds: usize,
}

/// Audio player that tracks play state and rewinds.
#[derive(Debug, Clone, Default)]
pub struct HeadlessAudio {
    state: Rc<RefCell<AudioState>>,
}

impl HeadlessAudio {
    /// Create a paused player.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times playback was rewound.
    #[must_use]
    pub fn rewinds(&self) -> usize {
        self.state.borrow().rewinds
    }
}

impl AudioPlayer for HeadlessAudio {
    fn play(&mut self) -> Result<(), PlatformError> {
        self.state.borrow_mut().playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.state.borrow_mut().playing = false;
    }

    fn seek_to_start(&mut self) {
        self.state.borrow_mut().rewinds += 1;
    }

    fn is_playing(&self) -> bool {
        self.state.borrow().playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_records_frames() {
        let handle = HeadlessSurface::new(200.0, 100.0);
        let mut surface = handle.clone();
        surface.fill_rect(Rect::new(0.0, 0.0, 5.0, 5.0), "#333");
        surface.clear();
        surface.fill_circle(Point::new(10.0, 10.0), 3.0, "green");

        assert_eq!(handle.ops().len(), 3);
        assert_eq!(handle.last_frame().len(), 1);
        assert_eq!(handle.last_circles()[0].2, "green");
    }

    #[test]
    fn test_log_stays_bounded_across_frames() {
        let handle = HeadlessSurface::new(200.0, 100.0);
        let mut surface = handle.clone();
        for frame in 0..10_000 {
            surface.clear();
            surface.fill_circle(Point::new(f64::from(frame), 10.0), 3.0, "green");
        }

        assert!(handle.ops().len() <= MAX_RECORDED_OPS + 2);
        let last = handle.last_circles();
        assert_eq!(last.len(), 1);
        assert!((last[0].0.x - 9_999.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fit_to_display_tracks_display_size() {
        let handle = HeadlessSurface::new(200.0, 100.0);
        let mut surface = handle.clone();
        assert!(!surface.fit_to_display());

        handle.set_display_size(400.0, 300.0);
        assert!(surface.fit_to_display());
        assert_eq!(handle.size(), (400.0, 300.0));
    }

    #[test]
    fn test_fullscreen_rejection() {
        let handle = HeadlessFullscreen::new();
        let mut platform = handle.clone();
        handle.set_reject(true);
        assert!(platform.request_enter().is_err());
        assert!(!handle.is_fullscreen());
        assert_eq!(handle.enter_requests(), 1);
    }
}
