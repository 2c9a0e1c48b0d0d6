//! Observable settings store with persistence.
//!
//! [`StateStore`] is the single writer of the settings tree. Every write goes
//! through [`StateStore::update`], which clamps, persists the whole tree and
//! publishes [`AppEvent::StateChanged`] before returning.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use crate::error::StorageError;
use crate::event::{AppEvent, EventBus, SettingChange};
use crate::settings::{SettingPath, SettingValue, Settings};
use crate::CoreResult;

/// Default key the settings blob is stored under.
pub const DEFAULT_STORAGE_KEY: &str = "visionTrainerSettings";

/// Key-value persistence medium for the settings blob.
pub trait SettingsStorage {
    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the medium cannot be read.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the medium rejects the write.
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

impl<S: SettingsStorage + ?Sized> SettingsStorage for Rc<S> {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).save(key, value)
    }
}

/// In-memory storage, for tests and hosts without durable storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<String, String>>,
    reject_writes: Cell<bool>,
}

impl MemoryStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage holding `value` under `key`.
    #[must_use]
    pub fn with_entry(key: &str, value: &str) -> Self {
        let storage = Self::new();
        storage
            .entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        storage
    }

    /// Make every subsequent write fail with [`StorageError::QuotaExceeded`].
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.set(reject);
    }

    /// Current raw value under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }
}

impl SettingsStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get(key))
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.reject_writes.get() {
            return Err(StorageError::QuotaExceeded);
        }
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File-backed storage: one `<key>.json` file per key in a data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    data_dir: PathBuf,
}

impl FileStorage {
    /// Create file storage rooted at `data_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be created.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", sanitize_key(key)))
    }
}

impl SettingsStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }
}

/// Keep only characters that are safe in a file name.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// The settings store. Shared by reference (`Rc<StateStore>`) with every controller.
pub struct StateStore {
    settings: RefCell<Settings>,
    storage: Box<dyn SettingsStorage>,
    storage_key: String,
    bus: EventBus,
}

impl StateStore {
    /// Create a store holding the default settings.
    #[must_use]
    pub fn new(bus: EventBus, storage: Box<dyn SettingsStorage>) -> Self {
        Self::with_key(bus, storage, DEFAULT_STORAGE_KEY)
    }

    /// Create a store persisting under a custom key.
    #[must_use]
    pub fn with_key(bus: EventBus, storage: Box<dyn SettingsStorage>, key: &str) -> Self {
        Self {
            settings: RefCell::new(Settings::default()),
            storage,
            storage_key: key.to_string(),
            bus,
        }
    }

    /// Replace the in-memory tree with persisted data merged over the defaults.
    ///
    /// Absent, unreadable or corrupt data leaves the defaults in place. No
    /// event is published.
    pub fn load_state(&self) {
        let raw = match self.storage.load(&self.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!("No persisted settings under '{}'", self.storage_key);
                return;
            }
            Err(e) => {
                tracing::warn!("Failed to read persisted settings: {e}");
                return;
            }
        };
        match Settings::merge_persisted(&raw) {
            Ok(settings) => {
                tracing::debug!("Loaded persisted settings");
                *self.settings.borrow_mut() = settings;
            }
            Err(e) => tracing::warn!("Ignoring corrupt persisted settings: {e}"),
        }
    }

    /// A snapshot of the current settings.
    #[must_use]
    pub fn get_state(&self) -> Settings {
        self.settings.borrow().clone()
    }

    /// Read the current settings without cloning.
    pub fn with_state<R>(&self, f: impl FnOnce(&Settings) -> R) -> R {
        f(&self.settings.borrow())
    }

    /// Write `value` at the dotted `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownSettingPath`](crate::CoreError::UnknownSettingPath)
    /// if `path` names no leaf, or [`CoreError::InvalidValue`](crate::CoreError::InvalidValue)
    /// if the value does not fit the leaf. Nothing is stored or published on error.
    pub fn update_setting(
        &self,
        path: &str,
        value: impl Into<SettingValue>,
    ) -> CoreResult<SettingValue> {
        let path: SettingPath = path.parse()?;
        self.update(path, value)
    }

    /// Write `value` at `path`, persist and notify. Returns the stored value.
    ///
    /// Subscribers have all run by the time this returns.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidValue`](crate::CoreError::InvalidValue) if
    /// the value does not fit the leaf.
    pub fn update(
        &self,
        path: SettingPath,
        value: impl Into<SettingValue>,
    ) -> CoreResult<SettingValue> {
        let value = value.into();
        let stored = self.settings.borrow_mut().apply(path, &value)?;
        self.persist();
        tracing::trace!("Setting {path} = {stored:?}");
        self.bus.publish(AppEvent::StateChanged(SettingChange {
            path,
            value: stored.clone(),
        }));
        Ok(stored)
    }

    /// Write the whole tree to storage. Failures are logged, never raised.
    fn persist(&self) {
        let json = match serde_json::to_string(&*self.settings.borrow()) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize settings: {e}");
                return;
            }
        };
        if let Err(e) = self.storage.save(&self.storage_key, &json) {
            tracing::warn!("Failed to persist settings: {e}");
        }
    }

    /// The bus this store publishes on.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("settings", &self.settings.borrow())
            .field("storage_key", &self.storage_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Topic;
    use crate::settings::{ExerciseId, BLUR_MAX};
    use crate::CoreError;

    fn store_with(storage: &Rc<MemoryStorage>) -> (StateStore, EventBus) {
        let bus = EventBus::new();
        let store = StateStore::new(bus.clone(), Box::new(Rc::clone(storage)));
        (store, bus)
    }

    #[test]
    fn test_update_then_get_state() {
        let storage = Rc::new(MemoryStorage::new());
        let (store, _bus) = store_with(&storage);
        let before = store.get_state();

        store
            .update_setting("saccades.jumpsPerSecond", 2.5)
            .expect("update");
        let after = store.get_state();

        assert!((after.saccades.jumps_per_second - 2.5).abs() < f64::EPSILON);
        assert_eq!(after.saccades.target_count, before.saccades.target_count);
        assert_eq!(after.chart, before.chart);
        assert_eq!(after.tracking, before.tracking);
        assert_eq!(after.active_tab, before.active_tab);
    }

    #[test]
    fn test_update_clamps_and_reports_stored_value() {
        let storage = Rc::new(MemoryStorage::new());
        let (store, _bus) = store_with(&storage);
        let stored = store.update_setting("chart.blurAmount", 25.0).expect("update");
        assert_eq!(stored, SettingValue::Number(BLUR_MAX));
        assert!((store.get_state().chart.blur_amount - BLUR_MAX).abs() < f64::EPSILON);
    }

    #[test]
    fn test_update_persists_whole_tree() {
        let storage = Rc::new(MemoryStorage::new());
        let (store, _bus) = store_with(&storage);
        store
            .update(SettingPath::ActiveTab, ExerciseId::Saccades)
            .expect("update");

        let raw = storage.get(DEFAULT_STORAGE_KEY).expect("persisted");
        let persisted: Settings = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(persisted, store.get_state());
    }

    #[test]
    fn test_update_publishes_change_before_returning() {
        let storage = Rc::new(MemoryStorage::new());
        let (store, bus) = store_with(&storage);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.subscribe(Topic::StateChanged, move |event| {
            if let AppEvent::StateChanged(change) = event {
                sink.borrow_mut().push(change.clone());
            }
        });

        store.update_setting("tracking.speed", 50_u32).expect("update");
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].path, SettingPath::TrackingSpeed);
        assert_eq!(seen[0].value, SettingValue::Number(20.0));
    }

    #[test]
    fn test_subscribers_observe_the_new_value() {
        let storage = Rc::new(MemoryStorage::new());
        let bus = EventBus::new();
        let store = Rc::new(StateStore::new(
            bus.clone(),
            Box::new(Rc::clone(&storage)),
        ));
        let observed = Rc::new(Cell::new(0));
        let reader = Rc::clone(&store);
        let sink = Rc::clone(&observed);
        bus.subscribe(Topic::StateChanged, move |_| {
            sink.set(reader.get_state().chart.size_percent);
        });

        store.update_setting("chart.sizePercent", 90_u32).expect("update");
        assert_eq!(observed.get(), 90);
    }

    #[test]
    fn test_unknown_path_fails_fast_without_side_effects() {
        let storage = Rc::new(MemoryStorage::new());
        let (store, bus) = store_with(&storage);
        let published = Rc::new(Cell::new(false));
        let flag = Rc::clone(&published);
        bus.subscribe(Topic::StateChanged, move |_| flag.set(true));

        let err = store.update_setting("chart.contrast", 3_u32).unwrap_err();
        assert!(matches!(err, CoreError::UnknownSettingPath(_)));
        assert!(!published.get());
        assert!(storage.get(DEFAULT_STORAGE_KEY).is_none());
    }

    #[test]
    fn test_persistence_failure_keeps_in_memory_update() {
        let storage = Rc::new(MemoryStorage::new());
        storage.set_reject_writes(true);
        let (store, _bus) = store_with(&storage);

        store.update_setting("chart.sizePercent", 10_u32).expect("update");
        assert_eq!(store.get_state().chart.size_percent, 10);
        assert!(storage.get(DEFAULT_STORAGE_KEY).is_none());
    }

    #[test]
    fn test_load_state_merges_over_defaults() {
        let storage = Rc::new(MemoryStorage::with_entry(
            DEFAULT_STORAGE_KEY,
            r#"{"activeTab":"saccades","saccades":{"targetCount":8}}"#,
        ));
        let (store, _bus) = store_with(&storage);
        store.load_state();

        let state = store.get_state();
        assert_eq!(state.active_tab, ExerciseId::Saccades);
        assert_eq!(state.saccades.target_count, 8);
        assert!((state.saccades.jumps_per_second - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_state_ignores_corrupt_data() {
        let storage = Rc::new(MemoryStorage::with_entry(DEFAULT_STORAGE_KEY, "{{{{"));
        let (store, _bus) = store_with(&storage);
        store.load_state();
        assert_eq!(store.get_state(), Settings::default());
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path().join("settings")).expect("storage");
        assert!(storage.load("vision/settings").expect("load").is_none());

        storage.save("vision/settings", "{}").expect("save");
        assert_eq!(
            storage.load("vision/settings").expect("load").as_deref(),
            Some("{}")
        );
        assert!(dir.path().join("settings/vision_settings.json").exists());
    }
}
