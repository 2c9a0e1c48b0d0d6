//! Guided eye exercises: an audio track with play/pause control.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::event::Topic;
use crate::exercise::Exercise;
use crate::platform::{AudioPlayer, Widget};
use crate::settings::ExerciseId;
use crate::store::StateStore;

/// Button label while paused.
pub const PLAY_LABEL: &str = "Play";
/// Button label while playing.
pub const PAUSE_LABEL: &str = "Pause";

/// Collaborators owned by the guided exercise.
pub struct GuidedParts {
    /// The exercise audio track.
    pub audio: Box<dyn AudioPlayer>,
    /// Play/pause button.
    pub toggle_button: Box<dyn Widget>,
}

struct GuidedShared {
    store: Rc<StateStore>,
    initialized: Cell<bool>,
    parts: RefCell<GuidedParts>,
}

/// Guided exercise controller. Clones share state.
#[derive(Clone)]
pub struct GuidedController {
    shared: Rc<GuidedShared>,
}

impl GuidedController {
    /// Create the controller. Call [`GuidedController::init`] to wire it up.
    #[must_use]
    pub fn new(store: Rc<StateStore>, mut parts: GuidedParts) -> Self {
        parts.toggle_button.set_label(PLAY_LABEL);
        Self {
            shared: Rc::new(GuidedShared {
                store,
                initialized: Cell::new(false),
                parts: RefCell::new(parts),
            }),
        }
    }

    /// Subscribe to the bus. Calling this twice has no further effect.
    pub fn init(&self) {
        if self.shared.initialized.replace(true) {
            return;
        }
        self.shared.store.bus().subscribe_weak(
            Topic::StopAllAnimations,
            &self.shared,
            |shared, _| Self { shared }.stop(),
        );
    }

    /// Pause when playing, play when paused.
    pub fn toggle(&self) {
        if self.is_running() {
            self.pause();
        } else {
            self.start();
        }
    }

    fn pause(&self) {
        let Ok(mut parts) = self.shared.parts.try_borrow_mut() else {
            tracing::warn!("Guided audio busy; ignoring pause");
            return;
        };
        parts.audio.pause();
        parts.toggle_button.set_label(PLAY_LABEL);
    }
}

impl Exercise for GuidedController {
    fn id(&self) -> ExerciseId {
        ExerciseId::EyeExercises
    }

    fn start(&self) {
        let Ok(mut parts) = self.shared.parts.try_borrow_mut() else {
            tracing::warn!("Guided audio busy; ignoring play");
            return;
        };
        if parts.audio.is_playing() {
            return;
        }
        match parts.audio.play() {
            Ok(()) => {
                parts.toggle_button.set_label(PAUSE_LABEL);
                tracing::debug!("Guided audio playing");
            }
            Err(e) => tracing::warn!("Guided audio refused to play: {e}"),
        }
    }

    /// Pause and rewind.
    fn stop(&self) {
        let Ok(mut parts) = self.shared.parts.try_borrow_mut() else {
            tracing::warn!("Guided audio busy; ignoring stop");
            return;
        };
        if !parts.audio.is_playing() {
            return;
        }
        parts.audio.pause();
        parts.audio.seek_to_start();
        parts.toggle_button.set_label(PLAY_LABEL);
        tracing::debug!("Guided audio stopped");
    }

    fn is_running(&self) -> bool {
        self.shared
            .parts
            .try_borrow()
            .is_ok_and(|parts| parts.audio.is_playing())
    }
}

impl fmt::Debug for GuidedController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuidedController")
            .field("playing", &self.is_running())
            .finish_non_exhaustive()
    }
}
