//! Tab switching and cross-exercise mutual exclusion.
//!
//! Every activation publishes [`AppEvent::StopAllAnimations`] and lets it
//! finish before the pane is shown and [`AppEvent::TabChanged`] goes out, so
//! no two exercises ever animate at once.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::event::{AppEvent, EventBus, SubscriptionId, Topic};
use crate::platform::TabView;
use crate::settings::{ExerciseId, SettingPath, SettingValue};
use crate::store::StateStore;
use crate::CoreResult;

struct TabInner {
    view: Box<dyn TabView>,
    active: Option<ExerciseId>,
    subscription: Option<SubscriptionId>,
}

/// Tracks the live exercise and switches panes.
#[derive(Clone)]
pub struct TabController {
    store: Rc<StateStore>,
    bus: EventBus,
    inner: Rc<RefCell<TabInner>>,
}

impl TabController {
    /// Create a controller. Nothing happens until [`TabController::init`].
    #[must_use]
    pub fn new(store: Rc<StateStore>, bus: EventBus, view: Box<dyn TabView>) -> Self {
        Self {
            store,
            bus,
            inner: Rc::new(RefCell::new(TabInner {
                view,
                active: None,
                subscription: None,
            })),
        }
    }

    /// Start following `activeTab` and activate the stored tab.
    ///
    /// Calling this twice has no further effect.
    pub fn init(&self) {
        if self.inner.borrow().subscription.is_some() {
            return;
        }
        let store = Rc::clone(&self.store);
        let bus = self.bus.clone();
        let id = self
            .bus
            .subscribe_weak(Topic::StateChanged, &self.inner, move |inner, event| {
                if let AppEvent::StateChanged(change) = event {
                    if change.path == SettingPath::ActiveTab {
                        let tab = store.with_state(|s| s.active_tab);
                        activate(&bus, &inner, tab);
                    }
                }
            });
        self.inner.borrow_mut().subscription = Some(id);

        let initial = self.store.with_state(|s| s.active_tab);
        activate(&self.bus, &self.inner, initial);
    }

    /// Select `tab` through the settings store, as a tab selector click does.
    ///
    /// # Errors
    ///
    /// Propagates store update errors.
    pub fn select(&self, tab: ExerciseId) -> CoreResult<SettingValue> {
        self.store.update(SettingPath::ActiveTab, tab)
    }

    /// The tab most recently activated.
    #[must_use]
    pub fn active(&self) -> Option<ExerciseId> {
        self.inner.borrow().active
    }
}

fn activate(bus: &EventBus, inner: &Rc<RefCell<TabInner>>, tab: ExerciseId) {
    tracing::debug!("Activating tab {tab}");
    bus.publish(AppEvent::StopAllAnimations);
    match inner.try_borrow_mut() {
        Ok(mut inner) => {
            inner.view.show(tab);
            inner.active = Some(tab);
        }
        Err(_) => {
            tracing::warn!("Tab view busy; pane for {tab} not updated");
        }
    }
    bus.publish(AppEvent::TabChanged(tab));
}

impl fmt::Debug for TabController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabController")
            .field("active", &self.inner.borrow().active)
            .finish_non_exhaustive()
    }
}
