use futures::future::join_all;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tessera_core::{panic_message, Logger};
use tracing::{debug, info};

use crate::error::EventError;
use crate::handler::{EventHandler, FnHandler};
use crate::history::{EventRecord, History};
use crate::schema::EventSchema;

/// Default number of history entries kept.
pub const DEFAULT_MAX_HISTORY_SIZE: usize = 100;

/// Default age after which history entries are dropped.
pub const DEFAULT_HISTORY_RETENTION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct EventBusConfig {
    pub max_history_size: usize,
    pub history_retention: Duration,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            max_history_size: DEFAULT_MAX_HISTORY_SIZE,
            history_retention: DEFAULT_HISTORY_RETENTION,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventBusStatus {
    pub events: usize,
    pub subscriptions: usize,
    pub schemas: usize,
    pub history_len: usize,
}

struct Entry {
    id: u64,
    handler: Arc<dyn EventHandler>,
    once: bool,
    /// Set when a publish has claimed this once-subscription.
    claimed: AtomicBool,
    removed: AtomicBool,
}

impl Entry {
    /// Whether this entry takes part in a publish happening now.
    fn claim(&self) -> bool {
        if self.removed.load(Ordering::Acquire) {
            return false;
        }
        !self.once
            || self
                .claimed
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }
}

type SubscriberMap = HashMap<String, Vec<Arc<Entry>>>;

struct Inner {
    subscribers: Mutex<SubscriberMap>,
    schemas: RwLock<HashMap<String, Arc<dyn EventSchema>>>,
    history: Mutex<History>,
    next_id: AtomicU64,
    logger: Logger,
}

impl Inner {
    fn remove(&self, event: &str, id: u64) {
        let mut subscribers = self.subscribers.lock();
        if let Some(list) = subscribers.get_mut(event) {
            list.retain(|entry| entry.id != id);
            if list.is_empty() {
                subscribers.remove(event);
            }
        }
    }
}

/// Handle returned by `subscribe`. Dropping it does not unsubscribe.
pub struct Subscription {
    bus: Weak<Inner>,
    event: String,
    entry: Arc<Entry>,
}

impl Subscription {
    /// Remove the subscription. Returns `true` only for the call that removed it.
    pub fn unsubscribe(&self) -> bool {
        if self.entry.removed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(inner) = self.bus.upgrade() {
            inner.remove(&self.event, self.entry.id);
        }
        debug!(event = %self.event, id = self.entry.id, "Unsubscribed");
        true
    }

    pub fn is_active(&self) -> bool {
        !self.entry.removed.load(Ordering::Acquire)
    }

    pub fn event(&self) -> &str {
        &self.event
    }
}

/// Async publish/subscribe router. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    pub fn with_config(config: EventBusConfig) -> Self {
        Self::with_logger(config, Logger::default())
    }

    pub fn with_logger(config: EventBusConfig, logger: Logger) -> Self {
        info!(
            max_history_size = config.max_history_size,
            retention_secs = config.history_retention.as_secs(),
            "EventBus initialized"
        );
        Self {
            inner: Arc::new(Inner {
                subscribers: Mutex::new(HashMap::new()),
                schemas: RwLock::new(HashMap::new()),
                history: Mutex::new(History::new(config.max_history_size, config.history_retention)),
                next_id: AtomicU64::new(1),
                logger,
            }),
        }
    }

    /// Every later publish to `event` must pass `schema`.
    pub fn register_schema(
        &self,
        event: &str,
        schema: impl EventSchema + 'static,
    ) -> Result<(), EventError> {
        validate_event_name(event)?;
        self.inner.schemas.write().insert(event.to_string(), Arc::new(schema));
        debug!(event = %event, "Schema registered");
        Ok(())
    }

    pub fn unregister_schema(&self, event: &str) -> bool {
        self.inner.schemas.write().remove(event).is_some()
    }

    pub fn subscribe(
        &self,
        event: &str,
        handler: impl EventHandler + 'static,
    ) -> Result<Subscription, EventError> {
        self.add(event, Arc::new(handler), false)
    }

    /// Like `subscribe`, but delivered at most once.
    pub fn subscribe_once(
        &self,
        event: &str,
        handler: impl EventHandler + 'static,
    ) -> Result<Subscription, EventError> {
        self.add(event, Arc::new(handler), true)
    }

    pub fn subscribe_fn<F, Fut>(&self, event: &str, f: F) -> Result<Subscription, EventError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.subscribe(event, FnHandler(f))
    }

    pub fn subscribe_once_fn<F, Fut>(&self, event: &str, f: F) -> Result<Subscription, EventError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.subscribe_once(event, FnHandler(f))
    }

    fn add(
        &self,
        event: &str,
        handler: Arc<dyn EventHandler>,
        once: bool,
    ) -> Result<Subscription, EventError> {
        validate_event_name(event)?;
        let entry = Arc::new(Entry {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            handler,
            once,
            claimed: AtomicBool::new(false),
            removed: AtomicBool::new(false),
        });
        self.inner
            .subscribers
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(entry.clone());
        debug!(event = %event, id = entry.id, once, "Subscribed");
        Ok(Subscription { bus: Arc::downgrade(&self.inner), event: event.to_string(), entry })
    }

    /// Deliver `payload` to every current subscriber of `event`.
    ///
    /// Handlers run concurrently in subscription order. A handler that
    /// errors or panics is logged; it does not fail the publish.
    pub async fn publish(&self, event: &str, payload: Value) -> Result<(), EventError> {
        validate_event_name(event)?;

        let schema = self.inner.schemas.read().get(event).cloned();
        if let Some(schema) = schema {
            let result = schema.validate(&payload);
            if !result.valid {
                let errors = if result.errors.is_empty() {
                    vec!["payload rejected by schema".to_string()]
                } else {
                    result.errors
                };
                return Err(EventError::SchemaValidation { event: event.to_string(), errors });
            }
        }

        let snapshot: Vec<Arc<Entry>> = self
            .inner
            .subscribers
            .lock()
            .get(event)
            .map(|list| list.iter().filter(|e| e.claim()).cloned().collect())
            .unwrap_or_default();

        self.inner.history.lock().push(event, &payload, snapshot.len());
        debug!(event = %event, subscribers = snapshot.len(), "Publishing event");

        let deliveries = snapshot.iter().map(|entry| {
            let handler = entry.handler.clone();
            let payload = payload.clone();
            async move { AssertUnwindSafe(handler.handle(&payload)).catch_unwind().await }
        });
        let outcomes = join_all(deliveries).await;

        for outcome in outcomes {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self
                    .inner
                    .logger
                    .log(&format!("Event handler for '{event}' failed"), &format!("{e:#}")),
                Err(panic) => self.inner.logger.log(
                    &format!("Event handler for '{event}' panicked"),
                    &panic_message(panic.as_ref()),
                ),
            }
        }

        for entry in snapshot.iter().filter(|e| e.once) {
            entry.removed.store(true, Ordering::Release);
            self.inner.remove(event, entry.id);
        }
        Ok(())
    }

    /// Copies of recorded events, optionally filtered by name and trimmed to the last `limit`.
    pub fn get_history(&self, event: Option<&str>, limit: Option<usize>) -> Vec<EventRecord> {
        self.inner.history.lock().query(event, limit)
    }

    pub fn clear_history(&self) {
        self.inner.history.lock().clear();
    }

    /// Drop all subscriptions, schemas and history.
    pub fn clear(&self) {
        let drained: Vec<Arc<Entry>> = self
            .inner
            .subscribers
            .lock()
            .drain()
            .flat_map(|(_, list)| list)
            .collect();
        for entry in drained {
            entry.removed.store(true, Ordering::Release);
        }
        self.inner.schemas.write().clear();
        self.clear_history();
        info!("EventBus cleared");
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.inner.subscribers.lock().get(event).map_or(0, Vec::len)
    }

    pub fn has_subscribers(&self, event: &str) -> bool {
        self.subscriber_count(event) > 0
    }

    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.subscribers.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn status(&self) -> EventBusStatus {
        let (events, subscriptions) = {
            let subscribers = self.inner.subscribers.lock();
            (subscribers.len(), subscribers.values().map(Vec::len).sum())
        };
        EventBusStatus {
            events,
            subscriptions,
            schemas: self.inner.schemas.read().len(),
            history_len: self.inner.history.lock().len(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_event_name(event: &str) -> Result<(), EventError> {
    if event.trim().is_empty() {
        return Err(EventError::InvalidEventName(event.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RequiredFieldsSchema;
    use anyhow::bail;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn capturing_bus() -> (EventBus, Arc<Mutex<Vec<String>>>) {
        let logged = Arc::new(Mutex::new(Vec::new()));
        let sink = logged.clone();
        let logger = Logger::new(move |message, detail| sink.lock().push(format!("{message}: {detail}")));
        (EventBus::with_logger(EventBusConfig::default(), logger), logged)
    }

    async fn failing_handler(_: Value) -> anyhow::Result<()> {
        bail!("handler exploded")
    }

    async fn panicking_handler(_: Value) -> anyhow::Result<()> {
        panic!("kaboom")
    }

    fn recorder(bus: &EventBus, event: &str, into: &Arc<Mutex<Vec<Value>>>) -> Subscription {
        let into = into.clone();
        bus.subscribe_fn(event, move |payload| {
            let into = into.clone();
            async move {
                into.lock().push(payload);
                Ok(())
            }
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fan_out_reaches_every_subscriber() {
        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..3 {
            recorder(&bus, "account:created", &received);
        }

        let payload = json!({"id": "acc-1", "proxy": {"host": "127.0.0.1"}});
        bus.publish("account:created", payload.clone()).await.unwrap();

        let received = received.lock();
        assert_eq!(received.len(), 3);
        assert!(received.iter().all(|p| *p == payload));
    }

    #[tokio::test]
    async fn test_failing_subscriber_is_isolated() {
        let (bus, logged) = capturing_bus();
        let received = Arc::new(Mutex::new(Vec::new()));
        recorder(&bus, "tick", &received);
        bus.subscribe_fn("tick", failing_handler).unwrap();
        recorder(&bus, "tick", &received);

        bus.publish("tick", json!(1)).await.unwrap();

        assert_eq!(received.lock().len(), 2);
        let logged = logged.lock();
        assert_eq!(logged.len(), 1);
        assert!(logged[0].contains("handler exploded"));
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_isolated() {
        let (bus, logged) = capturing_bus();
        let received = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe_fn("tick", panicking_handler).unwrap();
        recorder(&bus, "tick", &received);

        bus.publish("tick", json!(null)).await.unwrap();

        assert_eq!(received.lock().len(), 1);
        assert!(logged.lock()[0].contains("kaboom"));
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sub = recorder(&bus, "tick", &received);

        bus.publish("tick", json!(1)).await.unwrap();
        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        assert!(!sub.is_active());
        bus.publish("tick", json!(2)).await.unwrap();

        assert_eq!(*received.lock(), vec![json!(1)]);
        assert_eq!(bus.subscriber_count("tick"), 0);
    }

    #[tokio::test]
    async fn test_subscribe_once_delivers_first_publish_only() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let sub = bus
            .subscribe_once_fn("ready", move |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .unwrap();

        bus.publish("ready", json!(1)).await.unwrap();
        bus.publish("ready", json!(2)).await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!sub.is_active());
        assert!(!bus.has_subscribers("ready"));
    }

    #[tokio::test]
    async fn test_concurrent_publishes_deliver_once_subscription_once() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        bus.subscribe_once_fn("ready", move |_| {
            let counter = counter.clone();
            async move {
                tokio::task::yield_now().await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .unwrap();

        let (a, b) = tokio::join!(bus.publish("ready", json!(1)), bus.publish("ready", json!(2)));
        a.unwrap();
        b.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_during_publish_keeps_snapshot() {
        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let late = Arc::new(Mutex::new(None::<Subscription>));

        let holder = late.clone();
        bus.subscribe_fn("tick", move |_| {
            let holder = holder.clone();
            async move {
                if let Some(sub) = holder.lock().as_ref() {
                    sub.unsubscribe();
                }
                Ok(())
            }
        })
        .unwrap();
        *late.lock() = Some(recorder(&bus, "tick", &received));

        bus.publish("tick", json!("first")).await.unwrap();
        bus.publish("tick", json!("second")).await.unwrap();

        assert_eq!(*received.lock(), vec![json!("first")]);
    }

    #[tokio::test]
    async fn test_handlers_run_concurrently() {
        let bus = EventBus::new();
        let gate = Arc::new(tokio::sync::Notify::new());

        let waiter = gate.clone();
        bus.subscribe_fn("sync", move |_| {
            let waiter = waiter.clone();
            async move {
                waiter.notified().await;
                Ok(())
            }
        })
        .unwrap();
        let opener = gate.clone();
        bus.subscribe_fn("sync", move |_| {
            let opener = opener.clone();
            async move {
                opener.notify_one();
                Ok(())
            }
        })
        .unwrap();

        // Sequential delivery would deadlock here.
        tokio::time::timeout(Duration::from_secs(1), bus.publish("sync", json!(null)))
            .await
            .expect("publish should not hang")
            .unwrap();
    }

    #[tokio::test]
    async fn test_invocation_order_matches_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..4 {
            let order = order.clone();
            bus.subscribe_fn("tick", move |_| {
                order.lock().push(i);
                async { Ok(()) }
            })
            .unwrap();
        }
        bus.publish("tick", json!(null)).await.unwrap();
        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_schema_failure_blocks_delivery() {
        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        recorder(&bus, "account:updated", &received);
        bus.register_schema("account:updated", RequiredFieldsSchema::new(["id"])).unwrap();

        let err = bus.publish("account:updated", json!({"name": "x"})).await.unwrap_err();
        match err {
            EventError::SchemaValidation { event, errors } => {
                assert_eq!(event, "account:updated");
                assert!(!errors.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(received.lock().is_empty());
        assert!(bus.get_history(None, None).is_empty());

        bus.publish("account:updated", json!({"id": "a"})).await.unwrap();
        assert_eq!(received.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_history_records_zero_subscriber_publishes() {
        let bus = EventBus::new();
        bus.publish("nobody:listens", json!({"n": 1})).await.unwrap();

        let history = bus.get_history(Some("nobody:listens"), None);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].subscriber_count, 0);
        assert_eq!(history[0].payload, json!({"n": 1}));
    }

    #[tokio::test]
    async fn test_history_copies_are_not_aliased() {
        let bus = EventBus::new();
        bus.publish("a", json!({"v": 1})).await.unwrap();

        let mut copy = bus.get_history(None, None);
        copy[0].payload = json!("mutated");

        assert_eq!(bus.get_history(None, None)[0].payload, json!({"v": 1}));
    }

    #[tokio::test]
    async fn test_history_respects_cap() {
        let bus = EventBus::with_config(EventBusConfig {
            max_history_size: 3,
            ..Default::default()
        });
        for i in 0..5 {
            bus.publish("n", json!(i)).await.unwrap();
        }
        let payloads: Vec<_> = bus.get_history(None, None).into_iter().map(|r| r.payload).collect();
        assert_eq!(payloads, vec![json!(2), json!(3), json!(4)]);
        assert_eq!(bus.get_history(None, Some(1))[0].payload, json!(4));
    }

    #[test]
    fn test_invalid_event_name_rejected_at_subscribe() {
        let bus = EventBus::new();
        let err = bus.subscribe_fn("  ", |_| async { Ok(()) }).err().unwrap();
        assert!(matches!(err, EventError::InvalidEventName(_)));
        assert!(bus.register_schema("", RequiredFieldsSchema::new(["a"])).is_err());
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sub = recorder(&bus, "a", &received);
        bus.register_schema("b", RequiredFieldsSchema::new(["x"])).unwrap();
        bus.publish("a", json!(1)).await.unwrap();

        bus.clear_history();
        assert!(bus.get_history(None, None).is_empty());
        assert_eq!(bus.subscriber_count("a"), 1);

        bus.clear();
        assert!(!sub.is_active());
        assert!(!sub.unsubscribe());
        let status = bus.status();
        assert_eq!((status.events, status.subscriptions, status.schemas), (0, 0, 0));
        bus.publish("b", json!({})).await.unwrap();
    }
}
