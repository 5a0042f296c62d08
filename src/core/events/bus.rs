use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn, Span};

use super::event::{Event, EventKind};
use crate::domain::error::AtCliResult;

/// Event handler callback. A returned error is logged and does not stop delivery.
pub type Handler = Arc<dyn Fn(&Event) -> AtCliResult<()> + Send + Sync>;

/// Returned by [`EventBus::subscribe`]; the only way to remove that handler again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken {
    kind: EventKind,
    id: u64,
}

impl SubscriptionToken {
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

/// Synchronous publish/subscribe bus.
///
/// `publish` runs every handler registered for the event's kind, in registration
/// order, on the caller's thread. The subscriber list is snapshotted before
/// delivery so handlers may subscribe, unsubscribe or publish re-entrantly.
pub struct EventBus {
    subscribers: RwLock<HashMap<EventKind, Vec<(u64, Handler)>>>,
    next_id: AtomicU64,
    span: Span,
}

impl EventBus {
    pub fn new(span: Span) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            span,
        }
    }

    /// Register a handler for one event kind
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionToken
    where
        F: Fn(&Event) -> AtCliResult<()> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));

        debug!(parent: &self.span, %kind, id, "handler subscribed");
        SubscriptionToken { kind, id }
    }

    /// Remove a handler. Returns false if the token was already removed.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(handlers) = subscribers.get_mut(&token.kind) else {
            return false;
        };

        let before = handlers.len();
        handlers.retain(|(id, _)| *id != token.id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            subscribers.remove(&token.kind);
        }

        if removed {
            debug!(parent: &self.span, kind = %token.kind, id = token.id, "handler unsubscribed");
        }
        removed
    }

    /// Deliver an event to every handler currently registered for its kind
    pub fn publish(&self, event: Event) {
        let kind = event.kind();
        let handlers: Vec<(u64, Handler)> = {
            let subscribers = self
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            match subscribers.get(&kind) {
                Some(handlers) => handlers.clone(),
                None => return,
            }
        };

        for (id, handler) in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(parent: &self.span, %kind, id, error = %e, "event handler failed");
                }
                Err(_) => {
                    warn!(parent: &self.span, %kind, id, "event handler panicked");
                }
            }
        }
    }

    /// Number of handlers registered for a kind
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(Span::none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::command::{Command, Response};
    use crate::domain::error::AtCliError;
    use std::sync::Mutex;

    fn response(text: &str) -> Event {
        Event::ResponseReceived(Response::device(text))
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let bus = EventBus::default();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let calls = Arc::clone(&calls);
            bus.subscribe(EventKind::ResponseReceived, move |_| {
                calls.lock().unwrap().push(name);
                Ok(())
            });
        }

        bus.publish(response("OK"));
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_only_matching_kind_is_delivered() {
        let bus = EventBus::default();
        let count = Arc::new(AtomicU64::new(0));

        let seen = Arc::clone(&count);
        bus.subscribe(EventKind::CommandRequested, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(response("OK"));
        bus.publish(Event::CommandRequested(Command::unowned("AT")));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_handler_does_not_stop_others() {
        let bus = EventBus::default();
        let reached = Arc::new(AtomicU64::new(0));

        bus.subscribe(EventKind::ResponseReceived, |_| {
            Err(AtCliError::InvalidInput("bad payload".to_string()))
        });
        bus.subscribe(EventKind::ResponseReceived, |_| panic!("handler blew up"));
        let counter = Arc::clone(&reached);
        bus.subscribe(EventKind::ResponseReceived, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(response("OK"));
        bus.publish(response("OK"));
        assert_eq!(reached.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_by_token() {
        let bus = EventBus::default();
        let count = Arc::new(AtomicU64::new(0));

        let seen = Arc::clone(&count);
        let token = bus.subscribe(EventKind::ResponseReceived, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(bus.handler_count(EventKind::ResponseReceived), 1);

        bus.publish(response("one"));
        assert!(bus.unsubscribe(token));
        assert!(!bus.unsubscribe(token));
        bus.publish(response("two"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.handler_count(EventKind::ResponseReceived), 0);
    }

    #[test]
    fn test_handler_may_unsubscribe_itself_during_publish() {
        let bus = Arc::new(EventBus::default());
        let token_slot: Arc<Mutex<Option<SubscriptionToken>>> = Arc::new(Mutex::new(None));

        let inner_bus = Arc::clone(&bus);
        let slot = Arc::clone(&token_slot);
        let token = bus.subscribe(EventKind::ResponseReceived, move |_| {
            if let Some(token) = slot.lock().unwrap().take() {
                inner_bus.unsubscribe(token);
            }
            Ok(())
        });
        *token_slot.lock().unwrap() = Some(token);

        bus.publish(response("OK"));
        assert_eq!(bus.handler_count(EventKind::ResponseReceived), 0);
    }
}
