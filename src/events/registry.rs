//! Publish/subscribe table keyed by [`EventKind`]

use super::{Event, EventKind, ServerEvent};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

type Handler = Arc<dyn Fn(Event) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Identifies one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

/// A handler that returned an error or panicked
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    pub kind: EventKind,
    pub handler: HandlerId,
    pub message: String,
}

impl From<HandlerFailure> for crate::MailServerError {
    fn from(failure: HandlerFailure) -> Self {
        crate::MailServerError::Handler {
            event: failure.kind.to_string(),
            message: failure.message,
        }
    }
}

/// Handlers per event kind, in registration order
///
/// Registration is additive: the same closure registered twice runs twice.
#[derive(Default)]
pub struct EventRegistry {
    handlers: RwLock<HashMap<EventKind, Vec<(HandlerId, Handler)>>>,
    next_id: AtomicU64,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a registration for events of type `E`
    pub fn subscribe<E: ServerEvent>(&self) -> Subscription<'_, E> {
        Subscription {
            registry: self,
            _event: PhantomData,
        }
    }

    fn insert(&self, kind: EventKind, handler: Handler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.entry(kind).or_default().push((id, handler));
        debug!(kind = %kind, handler = id.0, "Registered event handler");
        id
    }

    /// Remove one registration; false if it was not registered
    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        for list in handlers.values_mut() {
            if let Some(pos) = list.iter().position(|(h, _)| *h == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Run every handler for the event's kind, in registration order
    ///
    /// All handlers run even when some fail; the failures come back in the
    /// order they happened. A kind without handlers is a no-op.
    pub async fn dispatch(&self, event: Event) -> Vec<HandlerFailure> {
        let kind = event.kind();
        // Snapshot so handlers can (un)subscribe while we await them
        let handlers: Vec<(HandlerId, Handler)> = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        let mut failures = Vec::new();
        for (id, handler) in handlers {
            // Calling the handler inside the future also catches panics
            // raised before it returns its future
            let call = async { handler(event.clone()).await };
            let outcome = AssertUnwindSafe(call).catch_unwind().await;

            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{:#}", e),
                Err(panic) => format!("handler panicked: {}", panic_message(&*panic)),
            };
            failures.push(HandlerFailure {
                kind,
                handler: id,
                message,
            });
        }
        failures
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        let counts: HashMap<EventKind, usize> =
            handlers.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventRegistry")
            .field("handlers", &counts)
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Pending registration for one event type
pub struct Subscription<'a, E> {
    registry: &'a EventRegistry,
    _event: PhantomData<fn(E)>,
}

impl<E: ServerEvent> Subscription<'_, E> {
    /// Register `handler` for every `E`
    pub fn register<F, Fut>(self, handler: F) -> HandlerId
    where
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |event: Event| match E::from_event(event) {
            Some(typed) => handler(typed).boxed(),
            None => async { Ok(()) }.boxed(),
        });
        self.registry.insert(E::KIND, handler)
    }
}
