//! Typed, filterable publish/subscribe bus.
//!
//! Subscribers register an async handler and a predicate for one event type.
//! `publish` snapshots the matching handlers and awaits them one at a time in
//! registration order; the first handler error stops the dispatch and is
//! returned to the publisher. No lock is held while a handler runs, so a
//! handler may publish (nested publishes finish before the outer one returns)
//! or change subscriptions.

use futures::future::{self, BoxFuture, FutureExt};
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, trace};

use crate::error::CodeloomResult;

type AnyEvent = Arc<dyn Any + Send + Sync>;
type Handler = Arc<dyn Fn(AnyEvent) -> BoxFuture<'static, CodeloomResult<()>> + Send + Sync>;
type Predicate = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> bool + Send + Sync>;

/// Handle returned by `subscribe`; pass it to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken {
    id: u64,
    event: TypeId,
}

struct Subscription {
    id: u64,
    handler: Handler,
    predicate: Predicate,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    by_type: HashMap<TypeId, Vec<Subscription>>,
}

/// Cheaply cloneable bus; clones share subscriptions.
#[derive(Clone, Default)]
pub struct MessageBus {
    registry: Arc<RwLock<Registry>>,
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("subscribers", &self.total_subscribers())
            .finish()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event of type `E`.
    pub fn subscribe<E, H, Fut>(&self, handler: H) -> SubscriptionToken
    where
        E: Send + Sync + 'static,
        H: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CodeloomResult<()>> + Send + 'static,
    {
        self.subscribe_filtered(handler, |_: &E| true)
    }

    /// Subscribe to events of type `E` for which `predicate` holds.
    pub fn subscribe_filtered<E, H, Fut, P>(&self, handler: H, predicate: P) -> SubscriptionToken
    where
        E: Send + Sync + 'static,
        H: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CodeloomResult<()>> + Send + 'static,
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(move |event: AnyEvent| match event.downcast::<E>() {
            Ok(event) => handler(event).boxed(),
            // Subscriptions are stored per TypeId, so this arm is never taken.
            Err(_) => future::ready(Ok(())).boxed(),
        });
        let predicate: Predicate = Arc::new(move |event: &(dyn Any + Send + Sync)| {
            event.downcast_ref::<E>().is_some_and(&predicate)
        });

        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        registry.next_id += 1;
        let id = registry.next_id;
        let event = TypeId::of::<E>();
        registry.by_type.entry(event).or_default().push(Subscription {
            id,
            handler,
            predicate,
        });
        trace!(event = type_name::<E>(), id, "subscribed");

        SubscriptionToken { id, event }
    }

    /// Remove a subscription. Returns whether it was still registered;
    /// unsubscribing twice is a no-op.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let Some(subscriptions) = registry.by_type.get_mut(&token.event) else {
            return false;
        };
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != token.id);
        let removed = subscriptions.len() != before;
        if subscriptions.is_empty() {
            registry.by_type.remove(&token.event);
        }
        removed
    }

    /// Deliver `event` to every matching subscriber, in registration order.
    pub async fn publish<E: Send + Sync + 'static>(&self, event: E) -> CodeloomResult<()> {
        let event: AnyEvent = Arc::new(event);
        let handlers: Vec<Handler> = {
            let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
            registry
                .by_type
                .get(&TypeId::of::<E>())
                .map(|subs| {
                    subs.iter()
                        .filter(|s| (s.predicate)(event.as_ref()))
                        .map(|s| Arc::clone(&s.handler))
                        .collect()
                })
                .unwrap_or_default()
        };

        debug!(
            event = type_name::<E>(),
            handlers = handlers.len(),
            "Publishing event"
        );

        for handler in handlers {
            handler(Arc::clone(&event)).await?;
        }
        Ok(())
    }

    /// Number of live subscriptions for `E`.
    pub fn subscriber_count<E: 'static>(&self) -> usize {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry
            .by_type
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }

    pub fn total_subscribers(&self) -> usize {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry.by_type.values().map(Vec::len).sum()
    }
}

/// Releases its subscriptions when dropped.
#[derive(Debug)]
pub struct SubscriptionGuard {
    bus: MessageBus,
    tokens: Vec<SubscriptionToken>,
}

impl SubscriptionGuard {
    pub fn new(bus: MessageBus) -> Self {
        Self {
            bus,
            tokens: Vec::new(),
        }
    }

    pub fn push(&mut self, token: SubscriptionToken) {
        self.tokens.push(token);
    }

    pub fn tokens(&self) -> &[SubscriptionToken] {
        &self.tokens
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        for token in self.tokens.drain(..) {
            self.bus.unsubscribe(token);
        }
    }
}
