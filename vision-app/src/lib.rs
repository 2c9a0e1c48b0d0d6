//! # Vision Trainer WASM Application
//!
//! Binds the vision trainer core to a browser page: canvases, controls,
//! tab panes, the Fullscreen API, `localStorage` and the guided-exercise
//! audio track.
//!
//! ## Usage
//!
//! Build for WASM:
//! ```bash
//! wasm-pack build --target web vision-app
//! ```
//!
//! Then import in JavaScript:
//! ```javascript
//! import init, { VisionApp } from './pkg/vision_app.js';
//!
//! await init();
//! const app = new VisionApp();
//!
//! window.addEventListener('resize', () => app.handleResize());
//! document.addEventListener('fullscreenchange', () => app.handleFullscreenChange());
//! document.querySelectorAll('.tab-button').forEach(button =>
//!     button.addEventListener('click', () => app.selectTab(button.dataset.tab)));
//! document.getElementById('blurAmount').addEventListener('input', e =>
//!     app.updateSetting('chart.blurAmount', e.target.value));
//!
//! function frame(now) {
//!     app.tick(now);
//!     requestAnimationFrame(frame);
//! }
//! requestAnimationFrame(frame);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod dom;

use std::time::Duration;

use vision_core::{
    ChartParts, Exercise, ExerciseId, GuidedParts, MemoryStorage, SaccadesParts, SettingValue,
    SettingsStorage, TrackingParts, Trainer, TrainerConfig, TrainerParts, Widget,
};
use wasm_bindgen::prelude::*;
use web_sys::Document;

use crate::dom::{
    DomAudio, DomFullscreen, DomSurface, DomTabView, DomWidget, LocalStorage, NullWidget,
};

/// Initialize the WASM module.
#[wasm_bindgen(start)]
pub fn init_wasm() {
    console_error_panic_hook::set_once();
    tracing::info!("Vision trainer WASM initialized");
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Prefer `localStorage`; fall back to memory when the page may not use it.
fn browser_storage(window: &web_sys::Window) -> Box<dyn SettingsStorage> {
    match window.local_storage() {
        Ok(Some(storage)) => Box::new(LocalStorage::new(storage)),
        Ok(None) | Err(_) => {
            tracing::warn!("localStorage unavailable; settings will not persist");
            Box::new(MemoryStorage::new())
        }
    }
}

fn optional_widget(document: &Document, id: &str) -> Box<dyn Widget> {
    match DomWidget::new(document, id) {
        Ok(widget) => Box::new(widget),
        Err(_) => Box::new(NullWidget),
    }
}

fn page_parts(window: &web_sys::Window, document: &Document) -> Result<TrainerParts, JsValue> {
    Ok(TrainerParts {
        storage: browser_storage(window),
        tab_view: Box::new(DomTabView::new(document.clone())),
        fullscreen: Box::new(DomFullscreen::new(document.clone())),
        chart: ChartParts {
            surface: Box::new(DomSurface::new(document, "eyeChartCanvas")?),
            blur_slider: Box::new(DomWidget::new(document, "blurAmount")?),
            toggle_button: Box::new(DomWidget::new(document, "toggleBlur")?),
        },
        tracking: TrackingParts {
            surface: Box::new(DomSurface::new(document, "trackingCanvas")?),
            start_button: Box::new(DomWidget::new(document, "startTracking")?),
            stop_button: Box::new(DomWidget::new(document, "stopTracking")?),
        },
        saccades: SaccadesParts {
            surface: Box::new(DomSurface::new(document, "saccadesCanvas")?),
            count_control: Box::new(DomWidget::new(document, "targetCount")?),
            toggle_button: Box::new(DomWidget::new(document, "toggleSaccades")?),
        },
        guided: GuidedParts {
            audio: Box::new(DomAudio::new(document, "eyeExercisesAudio")?),
            toggle_button: optional_widget(document, "toggleEyeExercises"),
        },
    })
}

/// Convert a control value from JavaScript into a setting value.
fn setting_value(value: &JsValue) -> Option<SettingValue> {
    if let Some(flag) = value.as_bool() {
        Some(SettingValue::Flag(flag))
    } else if let Some(number) = value.as_f64() {
        Some(SettingValue::Number(number))
    } else {
        value.as_string().map(SettingValue::Text)
    }
}

/// The vision trainer bound to the current page.
#[wasm_bindgen]
pub struct VisionApp {
    trainer: Trainer,
    document: Document,
}

#[wasm_bindgen]
impl VisionApp {
    /// Bind to the page and show the stored tab.
    ///
    /// `config_json` optionally overrides tuning values; missing fields keep
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is malformed or a required element is
    /// missing from the page.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<VisionApp, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window object"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("No document object"))?;

        let config = match config_json.as_deref() {
            Some(json) => TrainerConfig::from_json(json).map_err(js_error)?,
            None => TrainerConfig::default(),
        };

        let trainer = Trainer::new(page_parts(&window, &document)?, config);
        trainer.init();

        Ok(Self { trainer, document })
    }

    /// Advance to `now_ms` (a `requestAnimationFrame` timestamp) and run one frame.
    pub fn tick(&self, now_ms: f64) {
        match Duration::try_from_secs_f64(now_ms / 1000.0) {
            Ok(now) => self.trainer.tick(now),
            Err(e) => tracing::warn!("Ignoring frame timestamp {now_ms}: {e}"),
        }
    }

    /// Report a raw window resize.
    #[wasm_bindgen(js_name = handleResize)]
    pub fn handle_resize(&self) {
        self.trainer.viewport().notify_resize();
    }

    /// Report a `fullscreenchange` event. Mirrors the state as the
    /// `fullscreen-active` class on the root element for page styles.
    #[wasm_bindgen(js_name = handleFullscreenChange)]
    pub fn handle_fullscreen_change(&self) {
        let active = self.document.fullscreen_element().is_some();
        if let Some(root) = self.document.document_element() {
            if let Err(e) = root
                .class_list()
                .toggle_with_force("fullscreen-active", active)
            {
                tracing::warn!("Failed to mark fullscreen state: {e:?}");
            }
        }
        self.trainer.viewport().notify_fullscreen_change(active);
    }

    /// Switch to the tab named `tab` (`eyeChart`, `tracking`, ...).
    ///
    /// # Errors
    ///
    /// Returns an error for unknown tab names.
    #[wasm_bindgen(js_name = selectTab)]
    pub fn select_tab(&self, tab: &str) -> Result<(), JsValue> {
        let tab: ExerciseId = tab.parse().map_err(js_error)?;
        self.trainer.select_tab(tab).map_err(js_error)?;
        Ok(())
    }

    /// Write a setting from a control, e.g. `("chart.blurAmount", "7.5")`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown paths or unusable values. Nothing is
    /// changed in that case.
    #[wasm_bindgen(js_name = updateSetting)]
    pub fn update_setting(&self, path: &str, value: &JsValue) -> Result<(), JsValue> {
        let value = setting_value(value).ok_or_else(|| {
            JsValue::from_str(&format!("Unsupported value for {path}: {value:?}"))
        })?;
        if let Err(e) = self.trainer.update_setting(path, value) {
            tracing::warn!("Rejected setting update: {e}");
            return Err(js_error(e));
        }
        Ok(())
    }

    /// The settings tree as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    #[wasm_bindgen(js_name = getSettingsJson)]
    pub fn get_settings_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.trainer.store().get_state()).map_err(js_error)
    }

    /// Start or stop the blur cycle.
    #[wasm_bindgen(js_name = toggleBlurCycle)]
    pub fn toggle_blur_cycle(&self) {
        self.trainer.chart().toggle();
    }

    /// Start the tracking exercise.
    #[wasm_bindgen(js_name = startTracking)]
    pub fn start_tracking(&self) {
        self.trainer.tracking().start();
    }

    /// Stop the tracking exercise.
    #[wasm_bindgen(js_name = stopTracking)]
    pub fn stop_tracking(&self) {
        self.trainer.tracking().stop();
    }

    /// Start or stop the saccades exercise.
    #[wasm_bindgen(js_name = toggleSaccades)]
    pub fn toggle_saccades(&self) {
        self.trainer.saccades().toggle();
    }

    /// Play or pause the guided exercise audio.
    #[wasm_bindgen(js_name = toggleGuidedAudio)]
    pub fn toggle_guided_audio(&self) {
        self.trainer.guided().toggle();
    }

    /// Whether the page is fullscreen, as last reported.
    #[wasm_bindgen(js_name = isFullscreen)]
    #[must_use]
    pub fn is_fullscreen(&self) -> bool {
        self.trainer.viewport().is_fullscreen()
    }

    /// Crate version.
    #[must_use]
    pub fn version() -> String {
        vision_core::VERSION.to_string()
    }
}

