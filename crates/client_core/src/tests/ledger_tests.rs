use shared::domain::TodoId;

use super::*;

const TODO: Resource = Resource::Done(TodoId(3));

#[test]
fn stamps_increase_and_newest_wins() {
    let mut ledger = PendingLedger::new();
    let first = ledger.issue(TODO, PendingValue::Done(true), PendingValue::Done(false));
    let second = ledger.issue(TODO, PendingValue::Done(false), PendingValue::Done(true));

    assert!(second.seq() > first.seq());
    assert!(second.issued_at() >= first.issued_at());
    assert!(!ledger.is_latest(TODO, first));
    assert!(ledger.is_latest(TODO, second));
    assert_eq!(ledger.len(), 1);
}

#[test]
fn only_the_latest_stamp_settles() {
    let mut ledger = PendingLedger::new();
    let first = ledger.issue(TODO, PendingValue::Done(true), PendingValue::Done(false));
    let second = ledger.issue(TODO, PendingValue::Done(false), PendingValue::Done(true));

    assert!(ledger.settle(TODO, first).is_none());
    let record = ledger.settle(TODO, second).expect("latest");
    assert_eq!(record.desired, PendingValue::Done(false));
    assert!(ledger.is_empty());
    assert!(ledger.settle(TODO, second).is_none());
}

#[test]
fn resources_are_tracked_independently() {
    let mut ledger = PendingLedger::new();
    let todo = ledger.issue(TODO, PendingValue::Done(true), PendingValue::Done(false));
    let order = ledger.issue(
        Resource::Order,
        PendingValue::Order(TodoOrder::from(vec![2, 1])),
        PendingValue::Order(TodoOrder::from(vec![1, 2])),
    );

    assert!(ledger.is_latest(TODO, todo));
    assert!(ledger.is_latest(Resource::Order, order));
    assert!(!ledger.is_latest(Resource::Done(TodoId(4)), todo));
}

#[test]
fn superseding_mutation_inherits_rollback_target() {
    let mut ledger = PendingLedger::new();
    ledger.issue(TODO, PendingValue::Done(true), PendingValue::Done(false));
    // The optimistic value `true` is what the cache shows now.
    ledger.issue(TODO, PendingValue::Done(false), PendingValue::Done(true));

    let pending: Vec<_> = ledger.pending().collect();
    assert!(matches!(
        pending.as_slice(),
        [(TODO, record)] if record.rollback == PendingValue::Done(false)
    ));
}

#[test]
fn confirmation_of_superseded_call_moves_rollback_target() {
    let mut ledger = PendingLedger::new();
    ledger.issue(TODO, PendingValue::Done(true), PendingValue::Done(false));
    let newest = ledger.issue(TODO, PendingValue::Done(false), PendingValue::Done(true));

    ledger.confirm(TODO, PendingValue::Done(true));
    let record = ledger.settle(TODO, newest).expect("latest");
    assert_eq!(record.rollback, PendingValue::Done(true));
}

#[test]
fn confirmation_without_pending_record_is_ignored() {
    let mut ledger = PendingLedger::new();
    ledger.confirm(Resource::Order, PendingValue::Order(TodoOrder::default()));
    assert!(ledger.is_empty());
}
