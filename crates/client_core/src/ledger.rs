//! Latest-issued mutation per resource.
//!
//! Issuing writes a record; completion reads it and clears it only when the
//! completing call still owns the latest stamp. Anything older is superseded.

use std::{collections::HashMap, time::Instant};

use shared::domain::{Resource, TodoOrder};

/// Issue stamp of one mutation. `seq` is strictly increasing per ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationStamp {
    seq: u64,
    issued_at: Instant,
}

impl MutationStamp {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingValue {
    Done(bool),
    Order(TodoOrder),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
    pub desired: PendingValue,
    /// Last value of the resource known to match the server.
    pub rollback: PendingValue,
    pub stamp: MutationStamp,
}

#[derive(Debug, Default)]
pub struct PendingLedger {
    next_seq: u64,
    records: HashMap<Resource, PendingRecord>,
}

impl PendingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new mutation of `resource`, superseding any pending one.
    ///
    /// `current` is the resource's value before this mutation's optimistic
    /// patch. It becomes the rollback target unless an older mutation is still
    /// pending, whose rollback target is inherited instead.
    pub fn issue(
        &mut self,
        resource: Resource,
        desired: PendingValue,
        current: PendingValue,
    ) -> MutationStamp {
        self.next_seq += 1;
        let stamp = MutationStamp {
            seq: self.next_seq,
            issued_at: Instant::now(),
        };
        let rollback = match self.records.get(&resource) {
            Some(previous) => previous.rollback.clone(),
            None => current,
        };
        self.records.insert(
            resource,
            PendingRecord {
                desired,
                rollback,
                stamp,
            },
        );
        stamp
    }

    /// Every resource that still has a mutation in flight.
    pub fn pending(&self) -> impl Iterator<Item = (Resource, &PendingRecord)> {
        self.records
            .iter()
            .map(|(resource, record)| (*resource, record))
    }

    pub fn is_latest(&self, resource: Resource, stamp: MutationStamp) -> bool {
        self.records
            .get(&resource)
            .is_some_and(|record| record.stamp == stamp)
    }

    /// Removes the record if `stamp` still owns it.
    pub fn settle(&mut self, resource: Resource, stamp: MutationStamp) -> Option<PendingRecord> {
        if self.is_latest(resource, stamp) {
            self.records.remove(&resource)
        } else {
            None
        }
    }

    /// The server acknowledged a superseded call with `confirmed`; the newer
    /// pending mutation rolls back to that value if it fails.
    pub fn confirm(&mut self, resource: Resource, confirmed: PendingValue) {
        if let Some(record) = self.records.get_mut(&resource) {
            record.rollback = confirmed;
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/ledger_tests.rs"]
mod tests;
