//! # Vision Trainer Core
//!
//! Animation and state-synchronization engine for a tabbed vision-training
//! app. Pure Rust with no browser dependency; compiles to WASM.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 Trainer                     │
//! ├─────────────────────────────────────────────┤
//! │  TabController   │  Exercise controllers    │
//! │  - activeTab     │  - Chart (blur cycle)    │
//! │  - stop-all      │  - Tracking (frames)     │
//! │                  │  - Saccades (jumps)      │
//! │                  │  - Guided (audio)        │
//! ├─────────────────────────────────────────────┤
//! │  StateStore      │  ViewportController      │
//! │  - Settings tree │  - Resize debounce       │
//! │  - Persistence   │  - Fullscreen settle     │
//! ├─────────────────────────────────────────────┤
//! │  EventBus        │  Scheduler               │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Everything runs on one thread. Time only moves when the host calls
//! [`Trainer::tick`] (or drives the [`Scheduler`] directly in tests).

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod config;
pub mod error;
pub mod event;
pub mod exercise;
pub mod headless;
pub mod platform;
pub mod prng;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod surface;
pub mod tabs;
pub mod viewport;

pub use app::{Trainer, TrainerParts};
pub use config::{ChartConfig, SaccadesConfig, TrackingConfig, TrainerConfig, ViewportConfig};
pub use error::{CoreError, CoreResult, PlatformError, StorageError};
pub use event::{AppEvent, EventBus, SettingChange, SubscriptionId, Topic};
pub use exercise::{
    AnimationSession, ChartController, ChartParts, EOrientation, Exercise, GuidedController,
    GuidedParts, SaccadesController, SaccadesParts, TrackingController, TrackingParts,
};
pub use platform::{AudioPlayer, FullscreenPlatform, TabView, Widget};
pub use prng::Prng;
pub use scheduler::{Scheduler, TimerHandle};
pub use settings::{ExerciseId, SettingPath, SettingValue, Settings, TrackingPath};
pub use store::{FileStorage, MemoryStorage, SettingsStorage, StateStore, DEFAULT_STORAGE_KEY};
pub use surface::{Point, Rect, Surface};
pub use tabs::TabController;
pub use viewport::ViewportController;

/// Vision core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
