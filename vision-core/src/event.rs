//! Application events and the in-process publish/subscribe bus.
//!
//! Dispatch is synchronous and re-entrant: a handler may publish, and the
//! nested publish completes before the outer one returns. Handlers must not
//! republish the topic they are reacting to.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::settings::{ExerciseId, SettingPath, SettingValue};

/// Event topic, used to address subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// `state:changed`
    StateChanged,
    /// `app:stopAllAnimations`
    StopAllAnimations,
    /// `tab:changed`
    TabChanged,
    /// `canvas:resized`
    CanvasResized,
    /// `viewport:fullscreen`
    FullscreenChanged,
}

impl Topic {
    /// The wire name of this topic.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StateChanged => "state:changed",
            Self::StopAllAnimations => "app:stopAllAnimations",
            Self::TabChanged => "tab:changed",
            Self::CanvasResized => "canvas:resized",
            Self::FullscreenChanged => "viewport:fullscreen",
        }
    }
}

/// Payload of a `state:changed` event.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingChange {
    /// The leaf that was written.
    pub path: SettingPath,
    /// The value stored there, after clamping.
    pub value: SettingValue,
}

/// All events the application publishes.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A settings leaf was written.
    StateChanged(SettingChange),
    /// Every exercise must halt its animation session now.
    StopAllAnimations,
    /// A tab became active.
    TabChanged(ExerciseId),
    /// Canvas geometry may have changed (debounced resize or settled fullscreen transition).
    CanvasResized,
    /// Fullscreen became active (`true`) or inactive (`false`).
    FullscreenChanged(bool),
}

impl AppEvent {
    /// The topic this event is delivered on.
    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            Self::StateChanged(_) => Topic::StateChanged,
            Self::StopAllAnimations => Topic::StopAllAnimations,
            Self::TabChanged(_) => Topic::TabChanged,
            Self::CanvasResized => Topic::CanvasResized,
            Self::FullscreenChanged(_) => Topic::FullscreenChanged,
        }
    }
}

/// Identifies one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Rc<dyn Fn(&AppEvent)>;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    handlers: HashMap<Topic, Vec<(SubscriptionId, Handler)>>,
}

/// Shared publish/subscribe registry.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic`. Handlers run in registration order.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&AppEvent) + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner
            .handlers
            .entry(topic)
            .or_default()
            .push((id, Rc::new(handler)));
        id
    }

    /// Register a handler that holds `state` weakly.
    ///
    /// The handler is skipped once `state` has been dropped, so controllers
    /// can subscribe without keeping themselves alive.
    pub fn subscribe_weak<S, F>(&self, topic: Topic, state: &Rc<S>, handler: F) -> SubscriptionId
    where
        S: ?Sized + 'static,
        F: Fn(Rc<S>, &AppEvent) + 'static,
    {
        let weak = Rc::downgrade(state);
        self.subscribe(topic, move |event| {
            if let Some(state) = weak.upgrade() {
                handler(state, event);
            }
        })
    }

    /// Remove a handler. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            inner.handlers.values_mut().find_map(|list| {
                list.iter()
                    .position(|(sid, _)| *sid == id)
                    .map(|index| list.remove(index))
            })
        };
        removed.is_some()
    }

    /// Deliver `event` to every handler currently registered for its topic.
    ///
    /// The handler list is snapshotted before dispatch, so handlers may
    /// subscribe, unsubscribe or publish while running.
    pub fn publish(&self, event: AppEvent) {
        let topic = event.topic();
        let handlers: Vec<Handler> = {
            let inner = self.inner.borrow();
            match inner.handlers.get(&topic) {
                Some(list) => list.iter().map(|(_, h)| Rc::clone(h)).collect(),
                None => return,
            }
        };
        tracing::trace!(
            "Publishing {} to {} handler(s)",
            topic.as_str(),
            handlers.len()
        );
        for handler in handlers {
            handler(&event);
        }
    }

    /// Number of handlers registered for `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.inner
            .borrow()
            .handlers
            .get(&topic)
            .map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        let mut counts: Vec<_> = inner
            .handlers
            .iter()
            .map(|(topic, list)| (topic.as_str(), list.len()))
            .collect();
        counts.sort_unstable();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}
