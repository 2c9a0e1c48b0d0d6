//! Drawing surface collaborator and the small geometry types it speaks.

use serde::{Deserialize, Serialize};

/// A point in logical canvas pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in logical canvas pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Rect {
    /// Create a rectangle.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge.
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// A canvas-like drawing surface owned by one exercise.
///
/// Logical size (the pixel grid drawn into) is set independently of the
/// display size (the size the surface occupies on screen).
pub trait Surface {
    /// Size the surface currently occupies on screen.
    fn display_size(&self) -> (f64, f64);

    /// Logical pixel size.
    fn size(&self) -> (f64, f64);

    /// Set the logical pixel size.
    fn set_size(&mut self, width: f64, height: f64);

    /// Clear the whole surface.
    fn clear(&mut self);

    /// Fill a rectangle.
    fn fill_rect(&mut self, rect: Rect, color: &str);

    /// Fill a circle.
    fn fill_circle(&mut self, center: Point, radius: f64, color: &str);

    /// Set the blur post-filter radius in pixels (0 disables it).
    fn set_blur(&mut self, radius: f64);

    /// Match the logical size to the display size. Returns whether it changed.
    fn fit_to_display(&mut self) -> bool {
        let (width, height) = self.display_size();
        if width <= 0.0 || height <= 0.0 {
            return false;
        }
        let (current_width, current_height) = self.size();
        #[allow(clippy::float_cmp)]
        let unchanged = current_width == width && current_height == height;
        if unchanged {
            return false;
        }
        self.set_size(width, height);
        true
    }
}
