//! Optimistic todo client.
//!
//! [`TodoClient`] keeps one [`TodoCache`] snapshot, patches it as soon as a
//! mutation is requested, and reconciles each server reply against the
//! [`PendingLedger`] so replies that arrive out of order never regress the view.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::domain::{Resource, Todo, TodoId, TodoOrder};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};
use url::Url;

pub mod cache;
pub mod error;
pub mod ledger;
pub mod retry;
pub mod transport;

pub use cache::TodoCache;
pub use error::{ClientError, TransportError};
pub use ledger::{MutationStamp, PendingLedger, PendingValue};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, TodoTransport};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: Url,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(server_url: Url) -> Self {
        Self {
            server_url,
            retry: RetryPolicy::default(),
        }
    }
}

/// What the render surface should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderState {
    Loading,
    Ready(Arc<TodoCache>),
    LoadFailed(String),
    InvalidData(String),
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    CacheUpdated(Arc<TodoCache>),
    MutationFailed {
        resource: Resource,
        error: ClientError,
    },
    LoadFailed(ClientError),
}

/// Terminal state of one issued mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The server's value was written into the cache.
    Committed,
    /// A newer mutation of the same resource owns the final word.
    Superseded,
    /// The call failed and the resource was restored.
    RolledBack(ClientError),
    /// Nothing to mutate; no request was sent.
    Skipped,
}

/// Handle on an in-flight mutation. Dropping it does not cancel the mutation.
pub struct MutationTicket {
    resource: Resource,
    inner: TicketInner,
}

enum TicketInner {
    Ready(MutationOutcome),
    Running(JoinHandle<MutationOutcome>),
}

impl MutationTicket {
    fn ready(resource: Resource, outcome: MutationOutcome) -> Self {
        Self {
            resource,
            inner: TicketInner::Ready(outcome),
        }
    }

    fn running(resource: Resource, handle: JoinHandle<MutationOutcome>) -> Self {
        Self {
            resource,
            inner: TicketInner::Running(handle),
        }
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub async fn outcome(self) -> Result<MutationOutcome, ClientError> {
        match self.inner {
            TicketInner::Ready(outcome) => Ok(outcome),
            TicketInner::Running(handle) => handle.await.map_err(|err| {
                warn!(resource = %self.resource, error = %err, "mutation task did not complete");
                ClientError::Abandoned {
                    resource: self.resource,
                }
            }),
        }
    }
}

/// Value a successful remote call reported back.
#[derive(Debug, Clone)]
enum Confirmed {
    Todo(Todo),
    Order(TodoOrder),
}

/// Message delivered to the reconciler when a remote call finishes.
#[derive(Debug)]
struct Completion {
    resource: Resource,
    stamp: MutationStamp,
    sent: PendingValue,
    result: Result<Confirmed, TransportError>,
}

struct Reconciler {
    cache: Option<Arc<TodoCache>>,
    render: RenderState,
    ledger: PendingLedger,
}

impl Reconciler {
    fn install(&mut self, cache: TodoCache) -> Arc<TodoCache> {
        let cache = Arc::new(cache);
        self.cache = Some(Arc::clone(&cache));
        self.render = RenderState::Ready(Arc::clone(&cache));
        cache
    }

    /// Installs a fetched snapshot with every in-flight mutation laid back on
    /// top, so a fetch that raced a mutation cannot undo its optimistic patch.
    fn install_fetched(&mut self, fetched: TodoCache) -> Arc<TodoCache> {
        let mut cache = fetched;
        for (resource, record) in self.ledger.pending() {
            cache = match (resource, &record.desired) {
                (Resource::Done(id), PendingValue::Done(done)) => cache.with_done(id, *done),
                (Resource::Order, PendingValue::Order(order)) => {
                    match cache.with_order(order.clone()) {
                        Ok(next) => next,
                        Err(_) => {
                            debug!("pending order no longer fits fetched todos");
                            cache
                        }
                    }
                }
                _ => cache,
            };
        }
        self.install(cache)
    }

    fn complete(&mut self, completion: Completion) -> (MutationOutcome, Option<Arc<TodoCache>>) {
        let Completion {
            resource,
            stamp,
            sent,
            result,
        } = completion;

        let Some(cache) = self.cache.clone() else {
            self.ledger.settle(resource, stamp);
            return (MutationOutcome::Superseded, None);
        };

        match result {
            Ok(Confirmed::Todo(todo)) => {
                if self.ledger.settle(resource, stamp).is_some() {
                    let next = self.install(cache.with_todo(todo));
                    (MutationOutcome::Committed, Some(next))
                } else {
                    debug!(%resource, seq = stamp.seq(), "discarding superseded todo reply");
                    self.ledger.confirm(resource, PendingValue::Done(todo.done));
                    (MutationOutcome::Superseded, None)
                }
            }
            Ok(Confirmed::Order(order)) => {
                let matches_intent = sent == PendingValue::Order(order.clone());
                if !self.ledger.is_latest(resource, stamp) {
                    debug!(seq = stamp.seq(), "discarding superseded order reply");
                    self.ledger.confirm(resource, PendingValue::Order(order));
                    return (MutationOutcome::Superseded, None);
                }
                self.ledger.settle(resource, stamp);
                if !matches_intent {
                    warn!(
                        seq = stamp.seq(),
                        "server order differs from the order sent; keeping cache"
                    );
                    return (MutationOutcome::Superseded, None);
                }
                match cache.with_order(order) {
                    Ok(next) => (MutationOutcome::Committed, Some(self.install(next))),
                    Err(err) => {
                        warn!(error = %err, "server order does not fit the cached todos");
                        (MutationOutcome::Superseded, None)
                    }
                }
            }
            Err(err) => {
                let error = ClientError::from_mutation(resource, err);
                let Some(record) = self.ledger.settle(resource, stamp) else {
                    warn!(%resource, error = %error, "superseded mutation failed; newer one decides");
                    return (MutationOutcome::Superseded, None);
                };
                let restored = match record.rollback {
                    PendingValue::Done(done) => match resource {
                        Resource::Done(id) => cache.with_done(id, done),
                        Resource::Order => cache.as_ref().clone(),
                    },
                    PendingValue::Order(order) => cache
                        .with_order(order)
                        .unwrap_or_else(|_| cache.as_ref().clone()),
                };
                warn!(%resource, error = %error, "mutation failed; rolled back");
                let next = self.install(restored);
                (MutationOutcome::RolledBack(error), Some(next))
            }
        }
    }
}

pub struct TodoClient {
    transport: Arc<dyn TodoTransport>,
    retry: RetryPolicy,
    state: Mutex<Reconciler>,
    events: broadcast::Sender<ClientEvent>,
}

impl TodoClient {
    pub fn new(transport: Arc<dyn TodoTransport>, retry: RetryPolicy) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            transport,
            retry,
            state: Mutex::new(Reconciler {
                cache: None,
                render: RenderState::Loading,
                ledger: PendingLedger::new(),
            }),
            events,
        })
    }

    pub fn connect(config: ClientConfig) -> Arc<Self> {
        let transport = HttpTransport::new(config.server_url);
        Self::new(Arc::new(transport), config.retry)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> Option<Arc<TodoCache>> {
        self.state().cache.clone()
    }

    pub fn render_state(&self) -> RenderState {
        self.state().render.clone()
    }

    /// Number of mutations still waiting for their authoritative reply.
    pub fn pending_mutations(&self) -> usize {
        self.state().ledger.len()
    }

    /// Fetches the full list, retrying transient failures, and installs it.
    pub async fn load_all(&self) -> Result<Arc<TodoCache>, ClientError> {
        let fetched = self
            .retry
            .run("todos", || self.transport.fetch_all())
            .await;

        let result = match fetched {
            Ok(payload) => TodoCache::from_payload(payload),
            Err(TransportError::Malformed(message)) => Err(ClientError::InvalidShape(message)),
            Err(err) => Err(ClientError::LoadFailure(err.to_string())),
        };

        let mut state = self.state();
        match result {
            Ok(cache) => {
                let cache = state.install_fetched(cache);
                info!(todos = cache.len(), pending = state.ledger.len(), "todos loaded");
                self.emit(ClientEvent::CacheUpdated(Arc::clone(&cache)));
                Ok(cache)
            }
            Err(err) => {
                state.render = match &err {
                    ClientError::InvalidShape(message) => RenderState::InvalidData(message.clone()),
                    other => RenderState::LoadFailed(other.to_string()),
                };
                warn!(error = %err, "loading todos failed");
                self.emit(ClientEvent::LoadFailed(err.clone()));
                Err(err)
            }
        }
    }

    /// Marks one todo done or open. Unknown ids are ignored.
    pub fn set_done(self: &Arc<Self>, id: TodoId, done: bool) -> MutationTicket {
        let resource = Resource::Done(id);
        let stamp = {
            let mut state = self.state();
            let Some(cache) = state.cache.clone() else {
                debug!(%id, "set_done before load; ignoring");
                return MutationTicket::ready(resource, MutationOutcome::Skipped);
            };
            let Some(current) = cache.todo(id).map(|todo| todo.done) else {
                debug!(%id, "set_done for unknown todo; ignoring");
                return MutationTicket::ready(resource, MutationOutcome::Skipped);
            };
            let stamp = state.ledger.issue(
                resource,
                PendingValue::Done(done),
                PendingValue::Done(current),
            );
            let next = state.install(cache.with_done(id, done));
            self.emit(ClientEvent::CacheUpdated(next));
            stamp
        };
        debug!(%id, done, seq = stamp.seq(), "issued done mutation");

        let client = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = client
                .retry
                .run(resource, || client.transport.update_done(id, done))
                .await
                .map(Confirmed::Todo);
            client.finish(Completion {
                resource,
                stamp,
                sent: PendingValue::Done(done),
                result,
            })
        });
        MutationTicket::running(resource, handle)
    }

    /// Replaces the display order. `order` must list every loaded todo once.
    pub fn set_order(self: &Arc<Self>, order: TodoOrder) -> Result<MutationTicket, ClientError> {
        let resource = Resource::Order;
        let stamp = {
            let mut state = self.state();
            let Some(cache) = state.cache.clone() else {
                debug!("set_order before load; ignoring");
                return Ok(MutationTicket::ready(resource, MutationOutcome::Skipped));
            };
            let next = cache.with_order(order.clone())?;
            let stamp = state.ledger.issue(
                resource,
                PendingValue::Order(order.clone()),
                PendingValue::Order(cache.order().clone()),
            );
            let next = state.install(next);
            self.emit(ClientEvent::CacheUpdated(next));
            stamp
        };
        debug!(seq = stamp.seq(), "issued order mutation");

        let client = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = client
                .retry
                .run(resource, || client.transport.update_order(&order))
                .await
                .map(Confirmed::Order);
            client.finish(Completion {
                resource,
                stamp,
                sent: PendingValue::Order(order),
                result,
            })
        });
        Ok(MutationTicket::running(resource, handle))
    }

    fn finish(&self, completion: Completion) -> MutationOutcome {
        let resource = completion.resource;
        let failure = completion.result.as_ref().err().cloned();
        // Events leave under the lock so listeners see caches in install order.
        let mut state = self.state();
        let (outcome, updated) = state.complete(completion);

        if let Some(cache) = updated {
            self.emit(ClientEvent::CacheUpdated(cache));
        }
        if let Some(err) = failure {
            self.emit(ClientEvent::MutationFailed {
                resource,
                error: ClientError::from_mutation(resource, err),
            });
        }
        outcome
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    fn state(&self) -> MutexGuard<'_, Reconciler> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
