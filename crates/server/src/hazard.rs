//! Fault injection that makes write responses overtake each other.
//!
//! Each [`Resource`] remembers when it was last written. A write that lands
//! inside the hazard window after the previous one is held for the long delay,
//! so a request issued after it can answer first. Only one long response per
//! [`ResourceKind`] is outstanding at a time; the others get the normal delay.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use shared::domain::{Resource, ResourceKind};
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HazardPolicy {
    pub normal: Duration,
    pub long: Duration,
    pub window: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Idle,
    RecentlyMutated,
    LongResponseInFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseDelay {
    Normal(Duration),
    Long(Duration),
}

impl ResponseDelay {
    pub fn duration(&self) -> Duration {
        match self {
            ResponseDelay::Normal(d) | ResponseDelay::Long(d) => *d,
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self, ResponseDelay::Long(_))
    }
}

#[derive(Default)]
struct HazardBook {
    last_mutated: HashMap<Resource, Instant>,
    long_in_flight: HashMap<ResourceKind, Resource>,
}

impl HazardBook {
    fn state_at(&self, resource: Resource, now: Instant, window: Duration) -> ResourceState {
        if self.long_in_flight.get(&resource.kind()) == Some(&resource) {
            return ResourceState::LongResponseInFlight;
        }
        match self.last_mutated.get(&resource) {
            Some(at) if now.saturating_duration_since(*at) < window => {
                ResourceState::RecentlyMutated
            }
            _ => ResourceState::Idle,
        }
    }
}

pub struct HazardSimulator {
    policy: HazardPolicy,
    book: Mutex<HazardBook>,
}

impl HazardSimulator {
    pub fn new(policy: HazardPolicy) -> Arc<Self> {
        Arc::new(Self {
            policy,
            book: Mutex::new(HazardBook::default()),
        })
    }

    /// Latency every read pays. Reads never get the long delay.
    pub fn read_latency(&self) -> Duration {
        self.policy.normal
    }

    /// Records a write to `resource` and decides how long its response is held.
    ///
    /// Call this once the mutation has been applied. The returned ticket owns
    /// the long-response slot for the resource kind until it is dropped.
    pub fn begin_write(self: &Arc<Self>, resource: Resource) -> WriteTicket {
        let now = Instant::now();
        let mut book = self.book();

        let slot_free = !book.long_in_flight.contains_key(&resource.kind());
        let delay = match book.state_at(resource, now, self.policy.window) {
            ResourceState::RecentlyMutated if slot_free => {
                book.long_in_flight.insert(resource.kind(), resource);
                info!(
                    %resource,
                    delay_ms = self.policy.long.as_millis() as u64,
                    "simulating long response"
                );
                ResponseDelay::Long(self.policy.long)
            }
            _ => {
                debug!(%resource, "normal response delay");
                ResponseDelay::Normal(self.policy.normal)
            }
        };
        book.last_mutated.insert(resource, now);

        WriteTicket {
            simulator: Arc::clone(self),
            resource,
            delay,
        }
    }

    pub fn state_of(&self, resource: Resource) -> ResourceState {
        self.book()
            .state_at(resource, Instant::now(), self.policy.window)
    }

    fn book(&self) -> MutexGuard<'_, HazardBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A write whose response is being held back.
#[must_use = "a write ticket must be held for its delay"]
pub struct WriteTicket {
    simulator: Arc<HazardSimulator>,
    resource: Resource,
    delay: ResponseDelay,
}

impl WriteTicket {
    pub fn delay(&self) -> ResponseDelay {
        self.delay
    }

    pub async fn hold(self) {
        tokio::time::sleep(self.delay.duration()).await;
    }
}

impl Drop for WriteTicket {
    fn drop(&mut self) {
        if !self.delay.is_long() {
            return;
        }
        let mut book = self.simulator.book();
        if book.long_in_flight.get(&self.resource.kind()) == Some(&self.resource) {
            book.long_in_flight.remove(&self.resource.kind());
        }
    }
}

#[cfg(test)]
#[path = "tests/hazard_tests.rs"]
mod tests;
