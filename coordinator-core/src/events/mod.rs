//! Event bus: pub/sub dispatch with wildcard subscribers, per-handler
//! failure isolation, a bounded history ring, and best-effort persistence.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{oneshot, RwLock};
use tracing::{error, warn};

use crate::error::Result;
use crate::persistence::{collections, PersistenceBackend};
use crate::resilience::with_fallback;
use crate::types::{Event, EventTypes, EVENT_HISTORY_LIMIT};

pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type Handler = Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>;

struct Subscription {
    id: u64,
    handler: Handler,
}

/// A process-local counter and timestamp pair producing monotonic,
/// lexically-sortable event ids within a process lifetime.
fn next_event_id(counter: &AtomicU64) -> String {
    let seq = counter.fetch_add(1, Ordering::SeqCst);
    format!("{}-{:020}", Utc::now().timestamp_nanos_opt().unwrap_or(0), seq)
}

pub struct EventBus {
    subscribers: RwLock<HashMap<String, Vec<Subscription>>>,
    history: Mutex<std::collections::VecDeque<Event>>,
    persistence: Option<Arc<dyn PersistenceBackend>>,
    event_counter: AtomicU64,
    subscription_counter: AtomicU64,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            history: Mutex::new(std::collections::VecDeque::with_capacity(EVENT_HISTORY_LIMIT)),
            persistence: None,
            event_counter: AtomicU64::new(0),
            subscription_counter: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_persistence(mut self, backend: Arc<dyn PersistenceBackend>) -> Self {
        self.persistence = Some(backend);
        self
    }

    /// Subscribes `handler` to `event_type`, or to every event when
    /// `event_type == "*"`. Returns a subscription id usable with
    /// `unsubscribe`.
    pub async fn subscribe(&self, event_type: impl Into<String>, handler: Handler) -> u64 {
        let id = self.subscription_counter.fetch_add(1, Ordering::SeqCst);
        let mut subs = self.subscribers.write().await;
        subs.entry(event_type.into())
            .or_default()
            .push(Subscription { id, handler });
        id
    }

    pub async fn unsubscribe(&self, event_type: &str, subscription_id: u64) {
        let mut subs = self.subscribers.write().await;
        if let Some(list) = subs.get_mut(event_type) {
            list.retain(|s| s.id != subscription_id);
        }
    }

    async fn handlers_for(&self, event_type: &str) -> Vec<Handler> {
        let subs = self.subscribers.read().await;
        let mut handlers: Vec<Handler> = Vec::new();
        if let Some(list) = subs.get(event_type) {
            handlers.extend(list.iter().map(|s| s.handler.clone()));
        }
        if event_type != EventTypes::WILDCARD {
            if let Some(list) = subs.get(EventTypes::WILDCARD) {
                handlers.extend(list.iter().map(|s| s.handler.clone()));
            }
        }
        handlers
    }

    fn record_history(&self, event: &Event) {
        let mut history = self.history.lock();
        if history.len() >= EVENT_HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(event.clone());
    }

    async fn persist(&self, event: &Event) {
        let Some(backend) = self.persistence.clone() else {
            return;
        };
        let event = event.clone();
        let value = match serde_json::to_value(&event) {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %err, "event not persisted, serialization failed");
                return;
            }
        };
        with_fallback(
            || async {
                backend
                    .store(collections::EVENTS, &event.event_id, value)
                    .await
                    .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
            },
            || async {
                warn!(event_id = %event.event_id, "failed to persist event, continuing in-memory only");
            },
        )
        .await;
    }

    async fn dispatch(&self, event: Event, wait_for_handlers: bool) {
        let handlers = self.handlers_for(&event.event_type).await;

        let run_one = |handler: Handler, event: Event| async move {
            handler(event).await;
        };

        if wait_for_handlers {
            for handler in handlers {
                run_one(handler, event.clone()).await;
            }
        } else {
            for handler in handlers {
                let event = event.clone();
                tokio::spawn(async move {
                    run_one(handler, event).await;
                });
            }
        }
    }

    /// Publishes an event. If `wait_for_handlers`, returns only after every
    /// subscriber has run; otherwise schedules handlers and returns as soon
    /// as scheduling completes.
    pub async fn publish(
        &self,
        event_type: impl Into<String>,
        source: impl Into<String>,
        data: HashMap<String, Value>,
        metadata: Option<HashMap<String, Value>>,
        wait_for_handlers: bool,
    ) -> Event {
        let event = Event {
            event_id: next_event_id(&self.event_counter),
            timestamp: Utc::now(),
            event_type: event_type.into(),
            source: source.into(),
            data,
            metadata,
        };

        self.record_history(&event);
        self.persist(&event).await;
        self.dispatch(event.clone(), wait_for_handlers).await;
        event
    }

    pub async fn publish_nowait(
        &self,
        event_type: impl Into<String>,
        source: impl Into<String>,
        data: HashMap<String, Value>,
        metadata: Option<HashMap<String, Value>>,
    ) -> Event {
        self.publish(event_type, source, data, metadata, false).await
    }

    pub fn get_history(
        &self,
        event_type: Option<&str>,
        source: Option<&str>,
        limit: usize,
    ) -> Vec<Event> {
        let history = self.history.lock();
        history
            .iter()
            .rev()
            .filter(|e| event_type.is_none_or(|t| e.event_type == t))
            .filter(|e| source.is_none_or(|s| e.source == s))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Installs a temporary handler that resolves as soon as a matching
    /// event is published, or returns `None` on timeout. The handler is
    /// unsubscribed in both cases.
    pub async fn wait_for_event(&self, event_type: &str, timeout: Option<Duration>) -> Option<Event> {
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));

        let handler: Handler = {
            let tx = tx.clone();
            Arc::new(move |event: Event| {
                let tx = tx.clone();
                Box::pin(async move {
                    if let Some(sender) = tx.lock().take() {
                        let _ = sender.send(event);
                    }
                })
            })
        };

        let subscription_id = self.subscribe(event_type, handler).await;

        let result = match timeout {
            Some(duration) => tokio::time::timeout(duration, rx).await.ok().and_then(Result::ok),
            None => rx.await.ok(),
        };

        self.unsubscribe(event_type, subscription_id).await;
        result
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps a handler closure so a panic during invocation is caught and
/// logged instead of unwinding into the dispatcher, isolating subscriber
/// failures from each other.
#[must_use]
pub fn isolate<F, Fut>(name: impl Into<String>, f: F) -> Handler
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let name = name.into();
    Arc::new(move |event: Event| {
        let name = name.clone();
        let fut = f(event);
        Box::pin(async move {
            let result = std::panic::AssertUnwindSafe(fut).catch_unwind().await;
            if result.is_err() {
                error!(handler = %name, "event handler panicked, isolated from other subscribers");
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn event_data() -> HashMap<String, Value> {
        HashMap::new()
    }

    #[tokio::test]
    async fn wildcard_subscriber_receives_every_event() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        bus.subscribe(
            EventTypes::WILDCARD,
            Arc::new(move |_event| {
                let count = count_clone.clone();
                Box::pin(async move {
                    count.fetch_add(1, Ordering::SeqCst);
                })
            }),
        )
        .await;

        bus.publish(EventTypes::TASK_ASSIGNED, "test", event_data(), None, true)
            .await;
        bus.publish(EventTypes::TASK_COMPLETED, "test", event_data(), None, true)
            .await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failing_handler_does_not_block_others() {
        let bus = EventBus::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let ran1 = ran.clone();
        bus.subscribe(
            EventTypes::TASK_ASSIGNED,
            isolate("h1", move |_e| {
                let ran = ran1.clone();
                async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                }
            }),
        )
        .await;

        bus.subscribe(
            EventTypes::TASK_ASSIGNED,
            isolate("h2-panics", move |_e| async move {
                panic!("boom");
            }),
        )
        .await;

        let ran3 = ran.clone();
        bus.subscribe(
            EventTypes::TASK_ASSIGNED,
            isolate("h3", move |_e| {
                let ran = ran3.clone();
                async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                }
            }),
        )
        .await;

        bus.publish(EventTypes::TASK_ASSIGNED, "test", event_data(), None, true)
            .await;

        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn history_is_bounded_fifo() {
        let bus = EventBus::new();
        for i in 0..(EVENT_HISTORY_LIMIT + 10) {
            bus.publish(
                EventTypes::TASK_PROGRESS,
                "test",
                HashMap::from([("i".to_string(), Value::from(i))]),
                None,
                true,
            )
            .await;
        }
        let history = bus.get_history(None, None, EVENT_HISTORY_LIMIT + 10);
        assert_eq!(history.len(), EVENT_HISTORY_LIMIT);
    }

    #[tokio::test]
    async fn wait_for_event_resolves_on_publish() {
        let bus = Arc::new(EventBus::new());
        let bus_clone = bus.clone();

        let waiter = tokio::spawn(async move {
            bus_clone
                .wait_for_event(EventTypes::TASK_COMPLETED, Some(Duration::from_secs(1)))
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.publish(EventTypes::TASK_COMPLETED, "test", event_data(), None, true)
            .await;

        let event = waiter.await.unwrap();
        assert!(event.is_some());
    }

    #[tokio::test]
    async fn wait_for_event_times_out() {
        let bus = EventBus::new();
        let event = bus
            .wait_for_event(EventTypes::TASK_COMPLETED, Some(Duration::from_millis(20)))
            .await;
        assert!(event.is_none());
    }
}
