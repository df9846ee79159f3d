//! Capability-channel dispatch table.
//!
//! Handlers are keyed by event name. The empty name is the wildcard and
//! sees every event before the exact-name handlers do.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::foundation::SessionId;
use crate::domain::messages::DecodedMessage;
use crate::ports::{CapsEventHandler, WorkerPool};

use super::invoke::{invoke_isolated, Channel};
use super::same_handler;

/// Key that matches every capability event.
pub const WILDCARD: &str = "";

type Chain = Vec<Arc<dyn CapsEventHandler>>;

/// Registry of capability-event handlers.
///
/// The lock covers lookup and mutation only; handlers always run after it
/// is released, so they may register or unregister freely.
///
/// # Example
///
/// ```ignore
/// let table = CapsDispatchTable::new();
/// table.register(WILDCARD, logger);
/// table.register("TeleportFinish", teleport_watcher);
/// table.raise("TeleportFinish", &message, origin); // logger, then teleport_watcher
/// ```
pub struct CapsDispatchTable {
    handlers: Mutex<HashMap<String, Chain>>,
    pool: Option<Arc<dyn WorkerPool>>,
}

impl CapsDispatchTable {
    /// Creates a table whose `begin_raise` runs inline.
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            pool: None,
        }
    }

    /// Creates a table whose `begin_raise` hands delivery to `pool`.
    pub fn with_worker_pool(pool: Arc<dyn WorkerPool>) -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            pool: Some(pool),
        }
    }

    /// Appends `handler` to the chain for `event_name`.
    pub fn register(&self, event_name: &str, handler: Arc<dyn CapsEventHandler>) {
        self.handlers
            .lock()
            .entry(event_name.to_string())
            .or_default()
            .push(handler);
    }

    /// Removes one registration of `handler` for `event_name`.
    ///
    /// The key disappears with its last handler. Returns false if the
    /// handler was not registered there.
    pub fn unregister(&self, event_name: &str, handler: &Arc<dyn CapsEventHandler>) -> bool {
        let mut handlers = self.handlers.lock();
        let Some(chain) = handlers.get_mut(event_name) else {
            return false;
        };
        let Some(index) = chain.iter().rposition(|h| same_handler(h, handler)) else {
            return false;
        };
        chain.remove(index);
        if chain.is_empty() {
            handlers.remove(event_name);
        }
        true
    }

    /// True if any handler is registered under `event_name`.
    pub fn is_registered(&self, event_name: &str) -> bool {
        self.handlers.lock().contains_key(event_name)
    }

    /// Number of handlers registered under `event_name`.
    pub fn handler_count(&self, event_name: &str) -> usize {
        self.handlers.lock().get(event_name).map_or(0, Vec::len)
    }

    /// Delivers an event on the calling thread: wildcard chain first, then
    /// the exact-name chain.
    ///
    /// Returns false, after logging, when nobody is listening.
    pub fn raise(&self, event_name: &str, message: &DecodedMessage, origin: SessionId) -> bool {
        let Some((wildcard, exact)) = self.snapshot(event_name) else {
            tracing::warn!(event = event_name, session_id = %origin, "Unhandled capability event");
            return false;
        };
        deliver(event_name, &wildcard, &exact, message, origin);
        true
    }

    /// Same precedence as [`raise`](Self::raise), but delivery runs on the
    /// worker pool when one is configured. Both chains go out as a single
    /// task so the wildcard-then-exact order holds.
    pub fn begin_raise(
        &self,
        event_name: &str,
        message: Arc<DecodedMessage>,
        origin: SessionId,
    ) -> bool {
        let Some((wildcard, exact)) = self.snapshot(event_name) else {
            tracing::warn!(event = event_name, session_id = %origin, "Unhandled capability event");
            return false;
        };

        match &self.pool {
            Some(pool) => {
                let event_name = event_name.to_string();
                pool.submit(Box::new(move || {
                    deliver(&event_name, &wildcard, &exact, &message, origin);
                }));
            }
            None => deliver(event_name, &wildcard, &exact, &message, origin),
        }
        true
    }

    /// Copies out both chains for `event_name`, or `None` if both are empty.
    fn snapshot(&self, event_name: &str) -> Option<(Chain, Chain)> {
        let handlers = self.handlers.lock();
        let wildcard = handlers.get(WILDCARD).cloned().unwrap_or_default();
        let exact = if event_name == WILDCARD {
            Vec::new()
        } else {
            handlers.get(event_name).cloned().unwrap_or_default()
        };
        if wildcard.is_empty() && exact.is_empty() {
            None
        } else {
            Some((wildcard, exact))
        }
    }
}

impl Default for CapsDispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

fn deliver(
    event_name: &str,
    wildcard: &[Arc<dyn CapsEventHandler>],
    exact: &[Arc<dyn CapsEventHandler>],
    message: &DecodedMessage,
    origin: SessionId,
) {
    for handler in wildcard.iter().chain(exact) {
        invoke_isolated(Channel::Caps, event_name, handler.name(), || {
            handler.handle(event_name, message, origin)
        });
    }
}
