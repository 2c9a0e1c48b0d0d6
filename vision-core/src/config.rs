//! Tuning configuration.
//!
//! Every field has a default, so a host may pass a partial JSON object (or
//! nothing at all).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::DEFAULT_STORAGE_KEY;
use crate::CoreResult;

/// Resize and fullscreen signal timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Quiet period after the last raw resize before `canvas:resized` fires.
    pub resize_debounce_ms: u64,
    /// Delay after a fullscreen transition before `canvas:resized` fires.
    pub fullscreen_settle_ms: u64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            resize_debounce_ms: 250,
            fullscreen_settle_ms: 150,
        }
    }
}

impl ViewportConfig {
    /// Resize debounce as a duration.
    #[must_use]
    pub const fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }

    /// Fullscreen settle delay as a duration.
    #[must_use]
    pub const fn fullscreen_settle(&self) -> Duration {
        Duration::from_millis(self.fullscreen_settle_ms)
    }
}

/// Acuity chart and blur cycle tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Cycle period at speed 0, in milliseconds.
    pub cycle_base_period_ms: u64,
    /// Milliseconds removed from the period per speed step.
    pub cycle_period_per_speed_ms: u64,
    /// Blur change per tick.
    pub blur_step: f64,
    /// Exponent of the stored-to-displayed blur remap.
    pub display_exponent: f64,
    /// Request fullscreen when the cycle starts.
    pub fullscreen_on_cycle: bool,
    /// Leave fullscreen when the cycle stops.
    pub exit_fullscreen_on_stop: bool,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            cycle_base_period_ms: 500,
            cycle_period_per_speed_ms: 80,
            blur_step: 0.3,
            display_exponent: 3.0,
            fullscreen_on_cycle: true,
            exit_fullscreen_on_stop: true,
        }
    }
}

impl ChartConfig {
    /// Blur cycle period for `speed`: `base - speed * per_speed`.
    #[must_use]
    pub fn cycle_period(&self, speed: u32) -> Duration {
        let reduction = self
            .cycle_period_per_speed_ms
            .saturating_mul(u64::from(speed));
        Duration::from_millis(self.cycle_base_period_ms.saturating_sub(reduction))
    }
}

/// Tracking object tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Object radius in pixels.
    pub object_radius: f64,
    /// Horizontal step per frame at the reference speed.
    pub base_step: f64,
    /// Speed setting at which the object moves `base_step` per frame.
    pub reference_speed: f64,
    /// Phase advance per frame per speed unit on curved paths, in radians.
    pub angle_step: f64,
    /// Fraction of the free half-extent used by curved paths.
    pub path_margin: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            object_radius: 20.0,
            base_step: 5.0,
            reference_speed: 5.0,
            angle_step: 0.01,
            path_margin: 0.8,
        }
    }
}

/// Saccade target tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaccadesConfig {
    /// Target radius in pixels.
    pub target_radius: f64,
    /// Extra clearance between targets and the canvas edge.
    pub edge_margin: f64,
}

impl Default for SaccadesConfig {
    fn default() -> Self {
        Self {
            target_radius: 15.0,
            edge_margin: 10.0,
        }
    }
}

/// Complete trainer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Key the settings blob is persisted under.
    pub storage_key: String,
    /// Fixed PRNG seed; random when absent.
    pub seed: Option<u64>,
    /// Viewport timing.
    pub viewport: ViewportConfig,
    /// Chart tuning.
    pub chart: ChartConfig,
    /// Tracking tuning.
    pub tracking: TrackingConfig,
    /// Saccades tuning.
    pub saccades: SaccadesConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            seed: None,
            viewport: ViewportConfig::default(),
            chart: ChartConfig::default(),
            tracking: TrackingConfig::default(),
            saccades: SaccadesConfig::default(),
        }
    }
}

impl TrainerConfig {
    /// Parse a (possibly partial) JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Serialization`](crate::CoreError::Serialization)
    /// if `json` is malformed or a field has the wrong type.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
