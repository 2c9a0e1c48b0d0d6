//! Platform collaborators: input controls, tab panes, fullscreen and audio.

use crate::error::PlatformError;
use crate::settings::ExerciseId;

/// An input control (slider, select, button) the core can lock and relabel.
pub trait Widget {
    /// Enable or disable user input.
    fn set_enabled(&mut self, enabled: bool);

    /// Replace the visible label. Controls without a label ignore this.
    fn set_label(&mut self, _label: &str) {}

    /// Move the control to `value`. Controls without a value ignore this.
    fn set_value(&mut self, _value: f64) {}
}

/// The set of tab selectors and tab panes.
pub trait TabView {
    /// Mark `tab` as the active selector and pane, and every other one inactive.
    fn show(&mut self, tab: ExerciseId);
}

/// The environment's fullscreen capability.
///
/// Requests are asynchronous on real platforms: the state change arrives later
/// through [`ViewportController::notify_fullscreen_change`](crate::viewport::ViewportController::notify_fullscreen_change).
pub trait FullscreenPlatform {
    /// Ask to enter fullscreen.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] if the environment rejects the request.
    fn request_enter(&mut self) -> Result<(), PlatformError>;

    /// Ask to leave fullscreen.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] if the environment rejects the request.
    fn request_exit(&mut self) -> Result<(), PlatformError>;

    /// Whether the platform currently reports fullscreen.
    fn is_fullscreen(&self) -> bool;
}

/// Audio playback used by the guided eye-exercise tab.
pub trait AudioPlayer {
    /// Start or resume playback.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] if playback is refused (autoplay policy and the like).
    fn play(&mut self) -> Result<(), PlatformError>;

    /// Pause playback.
    fn pause(&mut self);

    /// Rewind to the beginning.
    fn seek_to_start(&mut self);

    /// Whether audio is currently playing.
    fn is_playing(&self) -> bool;
}
