//! # In-Memory Message Bus
//!
//! Single-process implementation of [`MessageTransport`].
//!
//! Matching handlers are collected under the bus lock and invoked after it
//! is released, so a handler may publish or subscribe from inside its
//! callback.

use crate::topic;
use crate::transport::{BusError, MessageHandler, MessageTransport, SubscriptionId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

struct Subscription {
    id: SubscriptionId,
    pattern: String,
    handler: MessageHandler,
}

#[derive(Default)]
struct BusState {
    subscriptions: Vec<Subscription>,
    retained: HashMap<String, String>,
}

/// In-memory pub/sub bus with retained messages.
#[derive(Default)]
pub struct InMemoryMessageBus {
    state: RwLock<BusState>,

    /// Total messages published.
    messages_published: AtomicU64,
}

impl InMemoryMessageBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current retained message on an address.
    #[must_use]
    pub fn retained(&self, address: &str) -> Option<String> {
        self.state.read().retained.get(address).cloned()
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.state.read().subscriptions.len()
    }

    /// Number of active subscriptions with exactly this pattern.
    #[must_use]
    pub fn subscriptions_for(&self, pattern: &str) -> usize {
        self.state
            .read()
            .subscriptions
            .iter()
            .filter(|s| s.pattern == pattern)
            .count()
    }

    /// Total messages published.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}

impl MessageTransport for InMemoryMessageBus {
    fn publish(&self, address: &str, message: &str, retained: bool) -> Result<usize, BusError> {
        topic::validate_address(address)?;
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        let handlers: Vec<MessageHandler> = {
            let mut state = self.state.write();
            if retained {
                if message.is_empty() {
                    state.retained.remove(address);
                } else {
                    state
                        .retained
                        .insert(address.to_string(), message.to_string());
                }
            }
            state
                .subscriptions
                .iter()
                .filter(|s| topic::matches(&s.pattern, address))
                .map(|s| s.handler.clone())
                .collect()
        };

        debug!(
            address = address,
            retained = retained,
            receivers = handlers.len(),
            "Message published"
        );

        for handler in &handlers {
            handler(address, message);
        }
        Ok(handlers.len())
    }

    fn subscribe(
        &self,
        pattern: &str,
        handler: MessageHandler,
    ) -> Result<SubscriptionId, BusError> {
        topic::validate_pattern(pattern)?;
        let id = SubscriptionId::new();

        let retained: Vec<(String, String)> = {
            let mut state = self.state.write();
            state.subscriptions.push(Subscription {
                id,
                pattern: pattern.to_string(),
                handler: handler.clone(),
            });
            state
                .retained
                .iter()
                .filter(|(address, _)| topic::matches(pattern, address))
                .map(|(a, m)| (a.clone(), m.clone()))
                .collect()
        };

        debug!(pattern = pattern, subscription = %id, "New subscription created");

        for (address, message) in &retained {
            trace!(address = %address, "Delivering retained message");
            handler(address, message);
        }
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.write();
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| s.id != id);
        let removed = state.subscriptions.len() != before;
        if removed {
            debug!(subscription = %id, "Subscription removed");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recorder() -> (MessageHandler, Arc<Mutex<Vec<(String, String)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: MessageHandler = Arc::new(move |address: &str, message: &str| {
            sink.lock().push((address.to_string(), message.to_string()));
        });
        (handler, seen)
    }

    #[test]
    fn test_publish_no_subscribers() {
        let bus = InMemoryMessageBus::new();
        let receivers = bus.publish("dom/pub1/$identity", "{}", false).unwrap();
        assert_eq!(receivers, 0);
        assert_eq!(bus.messages_published(), 1);
    }

    #[test]
    fn test_publish_with_wildcard_subscriber() {
        let bus = InMemoryMessageBus::new();
        let (handler, seen) = recorder();
        bus.subscribe("dom/+/$identity", handler).unwrap();

        assert_eq!(bus.publish("dom/pub1/$identity", "a", false).unwrap(), 1);
        assert_eq!(bus.publish("dom/pub1/node1/$node", "b", false).unwrap(), 0);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], ("dom/pub1/$identity".to_string(), "a".to_string()));
    }

    #[test]
    fn test_retained_delivered_to_late_subscriber() {
        let bus = InMemoryMessageBus::new();
        bus.publish("dom/pub1/$identity", "id1", true).unwrap();
        bus.publish("dom/pub2/$identity", "id2", true).unwrap();

        let (handler, seen) = recorder();
        bus.subscribe("dom/+/$identity", handler).unwrap();

        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_empty_retained_clears() {
        let bus = InMemoryMessageBus::new();
        bus.publish("dom/pub1/node1/$node", "node", true).unwrap();
        assert_eq!(bus.retained("dom/pub1/node1/$node").as_deref(), Some("node"));

        bus.publish("dom/pub1/node1/$node", "", true).unwrap();
        assert!(bus.retained("dom/pub1/node1/$node").is_none());
    }

    #[test]
    fn test_unsubscribe() {
        let bus = InMemoryMessageBus::new();
        let (handler, seen) = recorder();
        let id = bus.subscribe("dom/#", handler).unwrap();

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish("dom/pub1/$identity", "x", false).unwrap();

        assert!(seen.lock().is_empty());
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn test_reentrant_publish_from_handler() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let (handler, seen) = recorder();
        bus.subscribe("dom/echo", handler).unwrap();

        let inner = bus.clone();
        let forward: MessageHandler = Arc::new(move |_: &str, message: &str| {
            let _ = inner.publish("dom/echo", message, false);
        });
        bus.subscribe("dom/in", forward).unwrap();

        bus.publish("dom/in", "ping", false).unwrap();
        assert_eq!(
            *seen.lock(),
            vec![("dom/echo".to_string(), "ping".to_string())]
        );
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let bus = InMemoryMessageBus::new();
        let (handler, _) = recorder();
        assert!(matches!(
            bus.publish("dom/+/x", "m", false),
            Err(BusError::InvalidAddress(_))
        ));
        assert!(matches!(
            bus.subscribe("dom/#/x", handler),
            Err(BusError::InvalidPattern(_))
        ));
        assert_eq!(bus.messages_published(), 0);
    }
}
