//! Browser implementations of the core collaborator traits.

use std::f64::consts::TAU;

use vision_core::{
    AudioPlayer, ExerciseId, FullscreenPlatform, PlatformError, Point, Rect, SettingsStorage,
    StorageError, Surface, TabView, Widget,
};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    CanvasRenderingContext2d, Document, Element, HtmlCanvasElement, HtmlElement,
    HtmlInputElement, HtmlMediaElement, Storage,
};

/// Look up `id` and cast it to `T`.
pub(crate) fn element_by_id<T: JsCast>(document: &Document, id: &str) -> Result<T, JsValue> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("Element '{id}' not found")))?
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("Element '{id}' has an unexpected type")))
}

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

// ============================================================================
// Canvas
// ============================================================================

/// A `<canvas>` drawn through its 2D context. Blur is a CSS filter on the
/// element so it applies to everything drawn.
pub struct DomSurface {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl DomSurface {
    /// Bind to the canvas with element id `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is missing, is not a canvas, or has
    /// no 2D context.
    pub fn new(document: &Document, id: &str) -> Result<Self, JsValue> {
        let canvas: HtmlCanvasElement = element_by_id(document, id)?;
        let ctx = canvas
            .get_context("2d")
            .map_err(|_| JsValue::from_str("Failed to get 2D context"))?
            .ok_or_else(|| JsValue::from_str("2D context not available"))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| JsValue::from_str("Failed to cast to 2D context"))?;
        Ok(Self { canvas, ctx })
    }
}

impl Surface for DomSurface {
    fn display_size(&self) -> (f64, f64) {
        (
            f64::from(self.canvas.client_width()),
            f64::from(self.canvas.client_height()),
        )
    }

    fn size(&self) -> (f64, f64) {
        (f64::from(self.canvas.width()), f64::from(self.canvas.height()))
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn set_size(&mut self, width: f64, height: f64) {
        self.canvas.set_width(width.max(0.0).round() as u32);
        self.canvas.set_height(height.max(0.0).round() as u32);
    }

    fn clear(&mut self) {
        let (width, height) = self.size();
        self.ctx.clear_rect(0.0, 0.0, width, height);
    }

    fn fill_rect(&mut self, rect: Rect, color: &str) {
        self.ctx.set_fill_style_str(color);
        self.ctx.fill_rect(rect.x, rect.y, rect.width, rect.height);
    }

    fn fill_circle(&mut self, center: Point, radius: f64, color: &str) {
        self.ctx.begin_path();
        if let Err(e) = self.ctx.arc(center.x, center.y, radius, 0.0, TAU) {
            tracing::warn!("Canvas arc failed: {}", describe(&e));
            return;
        }
        self.ctx.set_fill_style_str(color);
        self.ctx.fill();
    }

    fn set_blur(&mut self, radius: f64) {
        let filter = format!("blur({radius}px)");
        if let Err(e) = self.canvas.style().set_property("filter", &filter) {
            tracing::warn!("Failed to set canvas blur: {}", describe(&e));
        }
    }
}

// ============================================================================
// Controls
// ============================================================================

/// A button or input element.
pub struct DomWidget {
    element: HtmlElement,
}

impl DomWidget {
    /// Bind to the element with id `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is missing.
    pub fn new(document: &Document, id: &str) -> Result<Self, JsValue> {
        Ok(Self {
            element: element_by_id(document, id)?,
        })
    }
}

impl Widget for DomWidget {
    fn set_enabled(&mut self, enabled: bool) {
        let result = if enabled {
            self.element.remove_attribute("disabled")
        } else {
            self.element.set_attribute("disabled", "")
        };
        if let Err(e) = result {
            tracing::warn!("Failed to toggle disabled: {}", describe(&e));
        }
    }

    fn set_label(&mut self, label: &str) {
        self.element.set_text_content(Some(label));
    }

    fn set_value(&mut self, value: f64) {
        if let Some(input) = self.element.dyn_ref::<HtmlInputElement>() {
            input.set_value_as_number(value);
        }
    }
}

/// Stand-in for an optional control the page does not provide.
pub struct NullWidget;

impl Widget for NullWidget {
    fn set_enabled(&mut self, _enabled: bool) {}
}

/// Tab selectors (`.tab-button[data-tab]`) and panes (`.tab-content#id`),
/// marked with the `active` class.
pub struct DomTabView {
    document: Document,
}

impl DomTabView {
    /// Bind to the tab markup of `document`.
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    fn mark(&self, selector: &str, is_active: impl Fn(&Element) -> bool) {
        let nodes = match self.document.query_selector_all(selector) {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::warn!("Failed to query {selector}: {}", describe(&e));
                return;
            }
        };
        for index in 0..nodes.length() {
            let Some(element) = nodes
                .item(index)
                .and_then(|node| node.dyn_into::<Element>().ok())
            else {
                continue;
            };
            let active = is_active(&element);
            if let Err(e) = element.class_list().toggle_with_force("active", active) {
                tracing::warn!("Failed to mark tab: {}", describe(&e));
            }
        }
    }
}

impl TabView for DomTabView {
    fn show(&mut self, tab: ExerciseId) {
        let id = tab.as_str();
        self.mark(".tab-button", |element| {
            element.get_attribute("data-tab").as_deref() == Some(id)
        });
        self.mark(".tab-content", |element| element.id() == id);
    }
}

// ============================================================================
// Fullscreen
// ============================================================================

/// The document Fullscreen API.
pub struct DomFullscreen {
    document: Document,
}

impl DomFullscreen {
    /// Bind to `document`.
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self { document }
    }
}

impl FullscreenPlatform for DomFullscreen {
    fn request_enter(&mut self) -> Result<(), PlatformError> {
        let root = self
            .document
            .document_element()
            .ok_or_else(|| PlatformError::Unsupported("no document element".to_string()))?;
        root.request_fullscreen()
            .map_err(|e| PlatformError::FullscreenRejected(describe(&e)))
    }

    fn request_exit(&mut self) -> Result<(), PlatformError> {
        self.document.exit_fullscreen();
        Ok(())
    }

    fn is_fullscreen(&self) -> bool {
        self.document.fullscreen_element().is_some()
    }
}

// ============================================================================
// Audio
// ============================================================================

/// An `<audio>` element.
pub struct DomAudio {
    media: HtmlMediaElement,
}

impl DomAudio {
    /// Bind to the media element with id `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is missing or is not a media element.
    pub fn new(document: &Document, id: &str) -> Result<Self, JsValue> {
        Ok(Self {
            media: element_by_id(document, id)?,
        })
    }
}

impl AudioPlayer for DomAudio {
    fn play(&mut self) -> Result<(), PlatformError> {
        self.media
            .play()
            .map(|_| ())
            .map_err(|e| PlatformError::Unsupported(describe(&e)))
    }

    fn pause(&mut self) {
        if let Err(e) = self.media.pause() {
            tracing::warn!("Failed to pause audio: {}", describe(&e));
        }
    }

    fn seek_to_start(&mut self) {
        self.media.set_current_time(0.0);
    }

    fn is_playing(&self) -> bool {
        !self.media.paused()
    }
}

// ============================================================================
// Storage
// ============================================================================

/// `window.localStorage`.
pub struct LocalStorage {
    storage: Storage,
}

impl LocalStorage {
    /// Wrap an existing storage area.
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }
}

impl SettingsStorage for LocalStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage
            .get_item(key)
            .map_err(|e| StorageError::Unavailable(describe(&e)))
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage.set_item(key, value).map_err(|e| {
            tracing::debug!("localStorage rejected write: {}", describe(&e));
            StorageError::QuotaExceeded
        })
    }
}
