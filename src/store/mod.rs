//! Store - shared entity state plus change notifications.
//!
//! Wraps an [`EntityState`] behind a lock and an
//! [`EventEmitter`](event_emitter_rs::EventEmitter). Every dispatch that
//! changes the state emits a `"change"` event carrying a JSON-encoded
//! [`StateChange`].
//!
//! Listeners run on the emitter's threads; `dispatch` returns their join
//! handles.

use event_emitter_rs::EventEmitter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;

use crate::error::CacheError;
use crate::item::Item;
use crate::state::{reduce, EntityAction, EntityState, StateConfig};

/// Event name used for state change notifications.
pub const CHANGE_EVENT: &str = "change";

/// Notification payload describing the action that changed the state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl StateChange {
    fn of<T: Item>(action: &EntityAction<T>) -> Self {
        StateChange {
            action: action.kind().to_string(),
            collection: action.collection().map(ToString::to_string),
        }
    }
}

/// Thread-safe owner of one entity type's state.
///
/// Clone-friendly via Arc.
#[derive(Clone)]
pub struct Store<T: Item> {
    state: Arc<RwLock<EntityState<T>>>,
    emitter: Arc<Mutex<EventEmitter>>,
}

impl<T: Item> Default for Store<T> {
    fn default() -> Self {
        Self::new(EntityState::default())
    }
}

impl<T: Item> Store<T> {
    pub fn new(state: EntityState<T>) -> Self {
        Store {
            state: Arc::new(RwLock::new(state)),
            emitter: Arc::new(Mutex::new(EventEmitter::new())),
        }
    }

    /// A store seeded from persisted JSON; invalid data starts empty.
    pub fn restore(value: &Value, config: StateConfig<T>) -> Self {
        Self::new(EntityState::restore(value, config))
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> Result<EntityState<T>, CacheError> {
        let state = self.state.read().map_err(|_| CacheError::LockPoisoned)?;
        Ok(state.clone())
    }

    /// Reduce `action` into the state and notify listeners if it changed.
    pub fn dispatch(&self, action: EntityAction<T>) -> Result<Vec<JoinHandle<()>>, CacheError> {
        let changed = {
            let mut state = self.state.write().map_err(|_| CacheError::LockPoisoned)?;
            let next = reduce(&state, &action);
            let changed = !next.ptr_eq(&state);
            *state = next;
            changed
        };

        if !changed {
            tracing::trace!(action = action.kind(), "dispatch left state unchanged");
            return Ok(Vec::new());
        }

        let payload = serde_json::to_string(&StateChange::of(&action))?;
        let mut emitter = self.emitter.lock().map_err(|_| CacheError::LockPoisoned)?;
        Ok(emitter.emit(CHANGE_EVENT, payload))
    }

    /// Register a change listener; returns its ID for [`Store::unsubscribe`].
    pub fn subscribe<F>(&self, listener: F) -> Result<String, CacheError>
    where
        F: Fn(StateChange) + Send + Sync + 'static,
    {
        let mut emitter = self.emitter.lock().map_err(|_| CacheError::LockPoisoned)?;
        Ok(emitter.on(CHANGE_EVENT, move |payload: String| {
            match serde_json::from_str::<StateChange>(&payload) {
                Ok(change) => listener(change),
                Err(err) => tracing::warn!(error = %err, "undecodable state change"),
            }
        }))
    }

    pub fn unsubscribe(&self, listener_id: &str) -> Result<bool, CacheError> {
        let mut emitter = self.emitter.lock().map_err(|_| CacheError::LockPoisoned)?;
        Ok(emitter.remove_listener(listener_id).is_some())
    }

    /// Persisted JSON of the current state.
    pub fn persist(&self) -> Result<Value, CacheError> {
        let state = self.state.read().map_err(|_| CacheError::LockPoisoned)?;
        state.to_value()
    }
}
