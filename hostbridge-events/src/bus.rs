//! Typed event bus.
//!
//! One channel exists per event type. Each channel owns its subscriber list
//! and a pending queue; the queue is what turns re-entrant publishes into
//! FIFO deliveries instead of nested ones.

use crate::error::{EventError, EventResult};
use parking_lot::{Mutex, RwLock};
use std::any::{Any, TypeId, type_name};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, warn};

/// A subscriber callback. Returning `Err` marks this delivery as failed
/// without affecting other subscribers.
pub type Handler<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
    event: &'static str,
    type_id: TypeId,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Type name of the event this subscription listens to.
    #[must_use]
    pub fn event(&self) -> &'static str {
        self.event
    }
}

/// One handler that failed during a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub subscriber: String,
    pub message: String,
}

/// What a draining publish delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Events drained from the queue, including ones queued by handlers.
    pub events: usize,
    /// Successful handler invocations.
    pub deliveries: usize,
    pub failures: Vec<HandlerFailure>,
}

impl DeliveryReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of [`EventBus::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The event (and anything queued meanwhile) was delivered synchronously.
    Delivered(DeliveryReport),
    /// A delivery for this event type is already in progress; the event is
    /// queued and will be delivered when that delivery finishes.
    Queued,
    /// Nobody listens to this event type; the event was dropped.
    Unobserved,
}

impl PublishOutcome {
    #[must_use]
    pub fn report(&self) -> Option<&DeliveryReport> {
        match self {
            Self::Delivered(report) => Some(report),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }
}

struct Subscriber<E> {
    id: u64,
    name: String,
    handler: Handler<E>,
}

impl<E> Clone for Subscriber<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

struct Channel<E> {
    subscribers: RwLock<Vec<Subscriber<E>>>,
    pending: Mutex<VecDeque<E>>,
    delivering: AtomicBool,
}

impl<E: Send + Sync + 'static> Channel<E> {
    fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            delivering: AtomicBool::new(false),
        }
    }

    fn drain(&self, report: &mut DeliveryReport) {
        loop {
            let next = self.pending.lock().pop_front();
            let Some(event) = next else {
                break;
            };
            self.deliver(&event, report);
        }
    }

    fn deliver(&self, event: &E, report: &mut DeliveryReport) {
        // Snapshot so handlers may subscribe or unsubscribe while running.
        let subscribers = self.subscribers.read().clone();
        report.events += 1;

        for subscriber in subscribers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (subscriber.handler)(event)));
            let message = match outcome {
                Ok(Ok(())) => {
                    report.deliveries += 1;
                    continue;
                }
                Ok(Err(err)) => format!("{err:#}"),
                Err(payload) => panic_message(payload.as_ref()),
            };

            warn!(
                event = type_name::<E>(),
                subscriber = %subscriber.name,
                error = %message,
                "event handler failed, continuing delivery"
            );
            report.failures.push(HandlerFailure {
                subscriber: subscriber.name,
                message,
            });
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}

/// Type-erased view of a channel, for operations that do not need `E`.
trait ErasedChannel: Send + Sync {
    fn remove(&self, id: u64) -> bool;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<E: Send + Sync + 'static> ErasedChannel for Channel<E> {
    fn remove(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.id != id);
        subscribers.len() != before
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// The registration event channel shared by one bridge context.
pub struct EventBus {
    channels: RwLock<HashMap<TypeId, Arc<dyn ErasedChannel>>>,
    next_id: AtomicU64,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn channel<E: Send + Sync + 'static>(&self) -> Option<Arc<Channel<E>>> {
        let erased = self.channels.read().get(&TypeId::of::<E>()).cloned()?;
        erased.into_any().downcast::<Channel<E>>().ok()
    }

    fn channel_or_insert<E: Send + Sync + 'static>(&self) -> Arc<Channel<E>> {
        if let Some(channel) = self.channel::<E>() {
            return channel;
        }

        let mut channels = self.channels.write();
        let erased = channels
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Arc::new(Channel::<E>::new()));
        Arc::clone(erased)
            .into_any()
            .downcast::<Channel<E>>()
            .expect("event channels are keyed by their event TypeId")
    }

    /// Registers `handler` for events of type `E` under a unique name.
    pub fn subscribe<E, F>(&self, name: impl Into<String>, handler: F) -> EventResult<Subscription>
    where
        E: Send + Sync + 'static,
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        let channel = self.channel_or_insert::<E>();
        let mut subscribers = channel.subscribers.write();

        if subscribers.iter().any(|subscriber| subscriber.name == name) {
            return Err(EventError::DuplicateSubscriber {
                event: type_name::<E>(),
                name,
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(event = type_name::<E>(), subscriber = %name, id, "subscribed");
        subscribers.push(Subscriber {
            id,
            name,
            handler: Arc::new(handler),
        });

        Ok(Subscription {
            id,
            event: type_name::<E>(),
            type_id: TypeId::of::<E>(),
        })
    }

    /// Removes a subscription. Events already being delivered may still
    /// reach it.
    pub fn unsubscribe(&self, subscription: &Subscription) -> EventResult<()> {
        let erased = self.channels.read().get(&subscription.type_id).cloned();
        match erased {
            Some(channel) if channel.remove(subscription.id) => {
                debug!(event = subscription.event, id = subscription.id, "unsubscribed");
                Ok(())
            }
            _ => Err(EventError::UnknownSubscription {
                event: subscription.event,
                id: subscription.id,
            }),
        }
    }

    /// Number of subscribers listening to `E`.
    #[must_use]
    pub fn subscriber_count<E: Send + Sync + 'static>(&self) -> usize {
        self.channel::<E>()
            .map_or(0, |channel| channel.subscribers.read().len())
    }

    /// Names of the subscribers listening to `E`, in delivery order.
    #[must_use]
    pub fn subscribers<E: Send + Sync + 'static>(&self) -> Vec<String> {
        self.channel::<E>().map_or_else(Vec::new, |channel| {
            channel
                .subscribers
                .read()
                .iter()
                .map(|subscriber| subscriber.name.clone())
                .collect()
        })
    }

    /// Publishes `event` to every subscriber of `E`.
    ///
    /// When called from inside a handler of the same event type, the event is
    /// queued and [`PublishOutcome::Queued`] is returned; the outer publish
    /// delivers it after the current event.
    pub fn publish<E: Send + Sync + 'static>(&self, event: E) -> PublishOutcome {
        let Some(channel) = self.channel::<E>() else {
            debug!(event = type_name::<E>(), "no subscribers, event dropped");
            return PublishOutcome::Unobserved;
        };
        if channel.subscribers.read().is_empty() {
            debug!(event = type_name::<E>(), "no subscribers, event dropped");
            return PublishOutcome::Unobserved;
        }

        channel.pending.lock().push_back(event);
        if channel.delivering.swap(true, Ordering::AcqRel) {
            return PublishOutcome::Queued;
        }

        let mut report = DeliveryReport::default();
        loop {
            channel.drain(&mut report);
            channel.delivering.store(false, Ordering::Release);

            // Something may have been queued between the last pop and the
            // store above; pick it up unless another publisher already did.
            let queued = !channel.pending.lock().is_empty();
            if !queued || channel.delivering.swap(true, Ordering::AcqRel) {
                break;
            }
        }

        debug!(
            event = type_name::<E>(),
            events = report.events,
            deliveries = report.deliveries,
            failures = report.failures.len(),
            "delivered"
        );
        PublishOutcome::Delivered(report)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("channels", &self.channels.read().len())
            .finish()
    }
}
