//! Synchronous publish/subscribe for lifecycle events.
//!
//! [`EventBus::emit`] hands the event to every matching subscription and
//! returns only after each of them has processed it. Each subscription is
//! drained by its own task, so subscribers never wait on one another; only the
//! emitter waits for all of them.
//!
//! A subscription observes an event once the subscriber drops the
//! [`Delivery`] guard (or converts it with [`Delivery::into_event`]):
//!
//! ```rust,ignore
//! let mut sub = bus.on(EventName::ChannelEnter);
//! tokio::spawn(async move {
//!     while let Some(delivery) = sub.recv().await {
//!         greet(&delivery.envelope).await;
//!     } // delivery dropped here, the emitter resumes
//! });
//! ```
//!
//! A subscriber must not emit an event it is itself subscribed to while
//! still holding the delivery for it.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};

use courier_core::{EventName, LifecycleEvent};
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

struct Subscriber {
    id: u64,
    /// `None` subscribes to every name.
    filter: Option<EventName>,
    once: bool,
    tx: mpsc::UnboundedSender<Delivery>,
}

impl Subscriber {
    fn accepts(&self, name: EventName) -> bool {
        self.filter.is_none_or(|filter| filter == name)
    }
}

/// Named publish/subscribe with no replay buffer.
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribes to every event named `name`.
    pub fn on(&self, name: EventName) -> Subscription {
        self.subscribe(Some(name), false)
    }

    /// Subscribes to the first event named `name` only.
    pub fn once(&self, name: EventName) -> Subscription {
        self.subscribe(Some(name), true)
    }

    /// Subscribes to every event.
    pub fn on_any(&self) -> Subscription {
        self.subscribe(None, false)
    }

    fn subscribe(&self, filter: Option<EventName>, once: bool) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push(Subscriber {
            id,
            filter,
            once,
            tx,
        });
        trace!(subscription = id, filter = ?filter, once, "Subscribed");
        Subscription { id, rx }
    }

    /// Delivers `event` to every current subscriber of its name and to every
    /// wildcard subscriber, then waits until all of them processed it.
    ///
    /// Returns the number of subscribers the event was handed to.
    pub async fn emit(&self, event: LifecycleEvent) -> usize {
        let name = event.name;
        let mut pending = Vec::new();
        {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|sub| {
                if sub.tx.is_closed() {
                    return false;
                }
                if !sub.accepts(name) {
                    return true;
                }
                let (done_tx, done_rx) = oneshot::channel();
                let delivery = Delivery {
                    event: event.clone(),
                    done: Some(done_tx),
                };
                if sub.tx.send(delivery).is_err() {
                    return false;
                }
                pending.push(done_rx);
                !sub.once
            });
        }

        let delivered = pending.len();
        trace!(event = %name, subscribers = delivered, "Emitting event");
        // A dropped sender means the subscriber went away; either way it is done.
        join_all(pending).await;
        delivered
    }

    /// Returns the number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sub| !sub.tx.is_closed());
        subscribers.len()
    }

    /// Drops every subscription. Subscribers see the end of their stream
    /// once they drained what was already delivered.
    pub fn close(&self) {
        let dropped = std::mem::take(&mut *self.subscribers.lock());
        trace!(subscriptions = dropped.len(), "Event bus closed");
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<u64> = self.subscribers.lock().iter().map(|s| s.id).collect();
        f.debug_struct("EventBus").field("subscriptions", &ids).finish()
    }
}

/// The receiving end of a bus subscription.
///
/// Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl Subscription {
    /// Waits for the next event. `None` once the subscription ended.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// An event handed to one subscriber. The emitter is released when this is
/// dropped.
pub struct Delivery {
    event: LifecycleEvent,
    done: Option<oneshot::Sender<()>>,
}

impl Delivery {
    pub fn event(&self) -> &LifecycleEvent {
        &self.event
    }

    /// Acknowledges the delivery immediately and returns the event.
    pub fn into_event(mut self) -> LifecycleEvent {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
        std::mem::replace(&mut self.event, LifecycleEvent::bare(EventName::Started))
    }
}

impl Deref for Delivery {
    type Target = LifecycleEvent;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Delivery").field(&self.event.name).finish()
    }
}
