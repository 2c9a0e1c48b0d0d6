//! The settings tree: the single persisted aggregate shared by every exercise.
//!
//! Every numeric leaf has a declared bound. Values are clamped on the way in,
//! both through [`Settings::apply`] and when persisted data is merged over the
//! defaults, so a stored tree is always in range.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CoreError, CoreResult};

/// Lower bound of `chart.sizePercent`.
pub const SIZE_PERCENT_MIN: u32 = 0;
/// Upper bound of `chart.sizePercent`.
pub const SIZE_PERCENT_MAX: u32 = 100;
/// Lower bound of `chart.blurAmount`.
pub const BLUR_MIN: f64 = 0.0;
/// Upper bound of `chart.blurAmount`.
pub const BLUR_MAX: f64 = 20.0;
/// Lower bound of `chart.blurCycleSpeed`.
pub const BLUR_SPEED_MIN: u32 = 1;
/// Upper bound of `chart.blurCycleSpeed`.
pub const BLUR_SPEED_MAX: u32 = 5;
/// Lower bound of `tracking.speed`.
pub const TRACKING_SPEED_MIN: u32 = 1;
/// Upper bound of `tracking.speed`.
pub const TRACKING_SPEED_MAX: u32 = 20;
/// Lower bound of `tracking.flashFrequencyHz` (0 disables flashing).
pub const FLASH_FREQUENCY_MIN: f64 = 0.0;
/// Upper bound of `tracking.flashFrequencyHz`.
pub const FLASH_FREQUENCY_MAX: f64 = 10.0;
/// Lower bound of `saccades.jumpsPerSecond`.
pub const JUMPS_PER_SECOND_MIN: f64 = 0.1;
/// Upper bound of `saccades.jumpsPerSecond`.
pub const JUMPS_PER_SECOND_MAX: f64 = 10.0;
/// Lower bound of `saccades.targetCount`.
pub const TARGET_COUNT_MIN: u32 = 1;
/// Upper bound of `saccades.targetCount`.
pub const TARGET_COUNT_MAX: u32 = 20;

/// Identifier of an exercise tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExerciseId {
    /// Tumbling-E acuity chart with blur cycling.
    #[default]
    EyeChart,
    /// Moving-object tracking.
    Tracking,
    /// Saccade target jumps.
    Saccades,
    /// Guided eye exercises (audio player).
    EyeExercises,
}

impl ExerciseId {
    /// Every known exercise, in tab order.
    pub const ALL: [Self; 4] = [
        Self::EyeChart,
        Self::Tracking,
        Self::Saccades,
        Self::EyeExercises,
    ];

    /// The wire identifier (also the DOM id of the tab pane).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EyeChart => "eyeChart",
            Self::Tracking => "tracking",
            Self::Saccades => "saccades",
            Self::EyeExercises => "eyeExercises",
        }
    }
}

impl fmt::Display for ExerciseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| CoreError::InvalidValue {
                path: SettingPath::ActiveTab.as_str().to_string(),
                reason: format!("unknown exercise '{s}'"),
            })
    }
}

/// Motion path of the tracking object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingPath {
    /// Horizontal bounce between the canvas edges.
    #[default]
    Linear,
    /// Circle around the canvas center.
    Circle,
    /// Figure-eight (Lissajous 1:2).
    Infinity,
}

impl TrackingPath {
    /// Every known path.
    pub const ALL: [Self; 3] = [Self::Linear, Self::Circle, Self::Infinity];

    /// The wire identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Circle => "circle",
            Self::Infinity => "infinity",
        }
    }
}

impl fmt::Display for TrackingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackingPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| CoreError::InvalidValue {
                path: SettingPath::TrackingPath.as_str().to_string(),
                reason: format!("unknown path '{s}'"),
            })
    }
}

/// Acuity chart settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSettings {
    /// Chart scale, 0 to 100.
    pub size_percent: u32,
    /// Linear blur amount, 0 to 20. The rendered radius is remapped.
    pub blur_amount: f64,
    /// Blur cycle speed, 1 (slow) to 5 (fast).
    pub blur_cycle_speed: u32,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            size_percent: 50,
            blur_amount: 0.0,
            blur_cycle_speed: 3,
        }
    }
}

/// Tracking exercise settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSettings {
    /// Motion path.
    pub path: TrackingPath,
    /// Object speed.
    pub speed: u32,
    /// Visibility flash frequency in Hz; 0 disables flashing.
    pub flash_frequency_hz: f64,
    /// Jump to random positions instead of moving smoothly.
    pub random_position: bool,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            path: TrackingPath::Linear,
            speed: 5,
            flash_frequency_hz: 0.0,
            random_position: false,
        }
    }
}

/// Saccades exercise settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaccadesSettings {
    /// Jump rate.
    pub jumps_per_second: f64,
    /// Number of targets on the canvas.
    pub target_count: u32,
}

impl Default for SaccadesSettings {
    fn default() -> Self {
        Self {
            jumps_per_second: 1.0,
            target_count: 5,
        }
    }
}

/// The complete settings tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Which exercise tab is live.
    pub active_tab: ExerciseId,
    /// Chart settings.
    pub chart: ChartSettings,
    /// Tracking settings.
    pub tracking: TrackingSettings,
    /// Saccades settings.
    pub saccades: SaccadesSettings,
}

/// Dotted path naming one leaf of the settings tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingPath {
    /// `activeTab`
    ActiveTab,
    /// `chart.sizePercent`
    ChartSizePercent,
    /// `chart.blurAmount`
    ChartBlurAmount,
    /// `chart.blurCycleSpeed`
    ChartBlurCycleSpeed,
    /// `tracking.path`
    TrackingPath,
    /// `tracking.speed`
    TrackingSpeed,
    /// `tracking.flashFrequencyHz`
    TrackingFlashFrequency,
    /// `tracking.randomPosition`
    TrackingRandomPosition,
    /// `saccades.jumpsPerSecond`
    SaccadesJumpsPerSecond,
    /// `saccades.targetCount`
    SaccadesTargetCount,
}

impl SettingPath {
    /// Every leaf path.
    pub const ALL: [Self; 10] = [
        Self::ActiveTab,
        Self::ChartSizePercent,
        Self::ChartBlurAmount,
        Self::ChartBlurCycleSpeed,
        Self::TrackingPath,
        Self::TrackingSpeed,
        Self::TrackingFlashFrequency,
        Self::TrackingRandomPosition,
        Self::SaccadesJumpsPerSecond,
        Self::SaccadesTargetCount,
    ];

    /// The dotted form of this path.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ActiveTab => "activeTab",
            Self::ChartSizePercent => "chart.sizePercent",
            Self::ChartBlurAmount => "chart.blurAmount",
            Self::ChartBlurCycleSpeed => "chart.blurCycleSpeed",
            Self::TrackingPath => "tracking.path",
            Self::TrackingSpeed => "tracking.speed",
            Self::TrackingFlashFrequency => "tracking.flashFrequencyHz",
            Self::TrackingRandomPosition => "tracking.randomPosition",
            Self::SaccadesJumpsPerSecond => "saccades.jumpsPerSecond",
            Self::SaccadesTargetCount => "saccades.targetCount",
        }
    }
}

impl fmt::Display for SettingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| CoreError::UnknownSettingPath(s.to_string()))
    }
}

/// A value written to (or read from) one settings leaf.
///
/// Input controls report strings or numbers; both are accepted for numeric
/// leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Boolean leaf value.
    Flag(bool),
    /// Numeric leaf value.
    Number(f64),
    /// Enumerated leaf value or unparsed control input.
    Text(String),
}

impl SettingValue {
    fn as_number(&self, path: SettingPath) -> CoreResult<f64> {
        let number = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().map_err(|_| invalid(path, "not a number"))?,
            Self::Flag(_) => return Err(invalid(path, "expected a number")),
        };
        if number.is_finite() {
            Ok(number)
        } else {
            Err(invalid(path, "number is not finite"))
        }
    }

    fn as_flag(&self, path: SettingPath) -> CoreResult<bool> {
        match self {
            Self::Flag(b) => Ok(*b),
            Self::Text(s) => s.trim().parse().map_err(|_| invalid(path, "not a boolean")),
            Self::Number(_) => Err(invalid(path, "expected a boolean")),
        }
    }

    fn as_text(&self, path: SettingPath) -> CoreResult<&str> {
        match self {
            Self::Text(s) => Ok(s.as_str()),
            _ => Err(invalid(path, "expected a string")),
        }
    }

    /// Numeric view, if this is a number.
    #[must_use]
    pub fn number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for SettingValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<ExerciseId> for SettingValue {
    fn from(value: ExerciseId) -> Self {
        Self::Text(value.as_str().to_string())
    }
}

impl From<TrackingPath> for SettingValue {
    fn from(value: TrackingPath) -> Self {
        Self::Text(value.as_str().to_string())
    }
}

fn invalid(path: SettingPath, reason: &str) -> CoreError {
    CoreError::InvalidValue {
        path: path.as_str().to_string(),
        reason: reason.to_string(),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_count(value: f64, min: u32, max: u32) -> u32 {
    value.round().clamp(f64::from(min), f64::from(max)) as u32
}

impl Settings {
    /// Read the value at `path`.
    #[must_use]
    pub fn get(&self, path: SettingPath) -> SettingValue {
        match path {
            SettingPath::ActiveTab => self.active_tab.into(),
            SettingPath::ChartSizePercent => self.chart.size_percent.into(),
            SettingPath::ChartBlurAmount => self.chart.blur_amount.into(),
            SettingPath::ChartBlurCycleSpeed => self.chart.blur_cycle_speed.into(),
            SettingPath::TrackingPath => self.tracking.path.into(),
            SettingPath::TrackingSpeed => self.tracking.speed.into(),
            SettingPath::TrackingFlashFrequency => self.tracking.flash_frequency_hz.into(),
            SettingPath::TrackingRandomPosition => self.tracking.random_position.into(),
            SettingPath::SaccadesJumpsPerSecond => self.saccades.jumps_per_second.into(),
            SettingPath::SaccadesTargetCount => self.saccades.target_count.into(),
        }
    }

    /// Write `value` at `path`, clamping numeric values into their bound.
    ///
    /// Returns the value actually stored.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidValue`] if the value has the wrong shape for
    /// the leaf (a word where a number is expected, an unknown enum member).
    /// Nothing is written on error.
    pub fn apply(&mut self, path: SettingPath, value: &SettingValue) -> CoreResult<SettingValue> {
        match path {
            SettingPath::ActiveTab => {
                self.active_tab = value.as_text(path)?.parse()?;
            }
            SettingPath::ChartSizePercent => {
                self.chart.size_percent =
                    clamp_count(value.as_number(path)?, SIZE_PERCENT_MIN, SIZE_PERCENT_MAX);
            }
            SettingPath::ChartBlurAmount => {
                self.chart.blur_amount = value.as_number(path)?.clamp(BLUR_MIN, BLUR_MAX);
            }
            SettingPath::ChartBlurCycleSpeed => {
                self.chart.blur_cycle_speed =
                    clamp_count(value.as_number(path)?, BLUR_SPEED_MIN, BLUR_SPEED_MAX);
            }
            SettingPath::TrackingPath => {
                self.tracking.path = value.as_text(path)?.parse()?;
            }
            SettingPath::TrackingSpeed => {
                self.tracking.speed =
                    clamp_count(value.as_number(path)?, TRACKING_SPEED_MIN, TRACKING_SPEED_MAX);
            }
            SettingPath::TrackingFlashFrequency => {
                self.tracking.flash_frequency_hz = value
                    .as_number(path)?
                    .clamp(FLASH_FREQUENCY_MIN, FLASH_FREQUENCY_MAX);
            }
            SettingPath::TrackingRandomPosition => {
                self.tracking.random_position = value.as_flag(path)?;
            }
            SettingPath::SaccadesJumpsPerSecond => {
                self.saccades.jumps_per_second = value
                    .as_number(path)?
                    .clamp(JUMPS_PER_SECOND_MIN, JUMPS_PER_SECOND_MAX);
            }
            SettingPath::SaccadesTargetCount => {
                self.saccades.target_count =
                    clamp_count(value.as_number(path)?, TARGET_COUNT_MIN, TARGET_COUNT_MAX);
            }
        }
        Ok(self.get(path))
    }

    /// Clamp every numeric leaf into its bound.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.chart.size_percent = self
            .chart
            .size_percent
            .clamp(SIZE_PERCENT_MIN, SIZE_PERCENT_MAX);
        self.chart.blur_amount = self.chart.blur_amount.clamp(BLUR_MIN, BLUR_MAX);
        self.chart.blur_cycle_speed = self
            .chart
            .blur_cycle_speed
            .clamp(BLUR_SPEED_MIN, BLUR_SPEED_MAX);
        self.tracking.speed = self
            .tracking
            .speed
            .clamp(TRACKING_SPEED_MIN, TRACKING_SPEED_MAX);
        self.tracking.flash_frequency_hz = self
            .tracking
            .flash_frequency_hz
            .clamp(FLASH_FREQUENCY_MIN, FLASH_FREQUENCY_MAX);
        self.saccades.jumps_per_second = self
            .saccades
            .jumps_per_second
            .clamp(JUMPS_PER_SECOND_MIN, JUMPS_PER_SECOND_MAX);
        self.saccades.target_count = self
            .saccades
            .target_count
            .clamp(TARGET_COUNT_MIN, TARGET_COUNT_MAX);
        self
    }

    /// Merge persisted JSON over the defaults.
    ///
    /// Each top-level section is merged field by field onto its default, so
    /// fields missing from older data keep their defaults and a single bad
    /// field does not discard its siblings. The result is clamped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Serialization`] if `json` is not valid JSON, or
    /// [`CoreError::InvalidValue`] if the top level is not an object.
    pub fn merge_persisted(json: &str) -> CoreResult<Self> {
        let stored: Value = serde_json::from_str(json)?;
        let Value::Object(stored) = stored else {
            return Err(CoreError::InvalidValue {
                path: String::new(),
                reason: "persisted settings are not an object".to_string(),
            });
        };

        let defaults = Self::default();
        let active_tab = match stored.get("activeTab") {
            Some(Value::String(id)) => id.parse().unwrap_or_else(|_| {
                tracing::warn!("Ignoring persisted activeTab '{id}'");
                defaults.active_tab
            }),
            Some(other) => {
                tracing::warn!("Ignoring persisted activeTab {other}");
                defaults.active_tab
            }
            None => defaults.active_tab,
        };

        let merged = Self {
            active_tab,
            chart: merge_section(defaults.chart, stored.get("chart"), "chart"),
            tracking: merge_section(defaults.tracking, stored.get("tracking"), "tracking"),
            saccades: merge_section(defaults.saccades, stored.get("saccades"), "saccades"),
        };
        Ok(merged.clamped())
    }
}

fn merge_section<T>(default: T, stored: Option<&Value>, section: &str) -> T
where
    T: Serialize + DeserializeOwned,
{
    let stored = match stored {
        Some(Value::Object(stored)) => stored,
        Some(other) => {
            tracing::warn!("Ignoring persisted {section}: expected an object, got {other}");
            return default;
        }
        None => return default,
    };
    let Ok(Value::Object(mut merged)) = serde_json::to_value(&default) else {
        return default;
    };

    for (field, value) in stored {
        let previous = merged.insert(field.clone(), value.clone());
        if serde_json::from_value::<T>(Value::Object(merged.clone())).is_err() {
            tracing::warn!("Ignoring persisted {section}.{field}: {value}");
            match previous {
                Some(previous) => merged.insert(field.clone(), previous),
                None => merged.remove(field),
            };
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or(default)
}
