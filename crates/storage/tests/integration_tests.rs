//! Integration tests for the in-memory fact store
//!
//! These tests verify that MemoryFactStore works correctly as a complete system:
//! - Commit serialization and CAS guards under concurrent access
//! - Snapshot isolation of readers
//! - Speculative application
//! - History replay

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use factgraph_core::{
    AttributeDef, EntityId, EntityRef, Error, FactStore, FactValue, Ident, Snapshot, Statement,
    TempId, Value, ValueType,
};
use factgraph_storage::MemoryFactStore;
use proptest::prelude::*;

// ============================================================================
// Helper Functions
// ============================================================================

fn counter() -> Ident {
    Ident::new(":counter.long.vertex")
}

fn name() -> Ident {
    Ident::new(":name.string.vertex")
}

/// Store with two attributes and one entity whose counter is 0
fn seeded() -> (Arc<MemoryFactStore>, EntityId) {
    let store = Arc::new(MemoryFactStore::new("integration"));
    store
        .transact(vec![
            Statement::InstallAttribute(AttributeDef::scalar(counter(), ValueType::Long)),
            Statement::InstallAttribute(AttributeDef::scalar(name(), ValueType::String)),
        ])
        .unwrap();
    let report = store
        .transact(vec![Statement::Add {
            e: EntityRef::Temp(TempId(-1)),
            a: counter(),
            v: FactValue::Scalar(Value::Long(0)),
        }])
        .unwrap();
    let e = report.resolve_tempid(TempId(-1)).unwrap();
    (store, e)
}

fn read_counter(db: &dyn Snapshot, e: EntityId) -> Option<i64> {
    db.entity(e)
        .and_then(|entity| entity.scalar(counter().as_str()).and_then(Value::as_long))
}

// ============================================================================
// Concurrency
// ============================================================================

mod concurrency {
    use super::*;

    #[test]
    fn test_concurrent_cas_exactly_one_winner() {
        let (store, e) = seeded();
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let winners = Arc::new(AtomicUsize::new(0));
        let conflicts = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                let winners = Arc::clone(&winners);
                let conflicts = Arc::clone(&conflicts);
                thread::spawn(move || {
                    barrier.wait();
                    let result = store.transact(vec![Statement::Cas {
                        e,
                        a: counter(),
                        expected: Some(Value::Long(0)),
                        new: Value::Long(i as i64 + 1),
                    }]);
                    match result {
                        Ok(_) => winners.fetch_add(1, Ordering::SeqCst),
                        Err(err) => {
                            assert!(err.is_conflict(), "unexpected error {err}");
                            conflicts.fetch_add(1, Ordering::SeqCst)
                        }
                    };
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(conflicts.load(Ordering::SeqCst), threads - 1);
        assert_ne!(read_counter(store.db().as_ref(), e), Some(0));
    }

    #[test]
    fn test_concurrent_increments_with_retry() {
        let (store, e) = seeded();
        let threads = 4;
        let per_thread = 25;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        loop {
                            let current = read_counter(store.db().as_ref(), e).unwrap();
                            let result = store.transact(vec![Statement::Cas {
                                e,
                                a: counter(),
                                expected: Some(Value::Long(current)),
                                new: Value::Long(current + 1),
                            }]);
                            match result {
                                Ok(_) => break,
                                Err(Error::Conflict(_)) => continue,
                                Err(other) => panic!("unexpected error {other}"),
                            }
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            read_counter(store.db().as_ref(), e),
            Some((threads * per_thread) as i64)
        );
    }
}

// ============================================================================
// Isolation
// ============================================================================

mod isolation {
    use super::*;

    #[test]
    fn test_snapshot_unaffected_by_later_commits() {
        let (store, e) = seeded();
        let before = store.db();
        store
            .transact(vec![Statement::Add {
                e: e.into(),
                a: counter(),
                v: FactValue::Scalar(Value::Long(5)),
            }])
            .unwrap();
        assert_eq!(read_counter(before.as_ref(), e), Some(0));
        assert_eq!(read_counter(store.db().as_ref(), e), Some(5));
    }

    #[test]
    fn test_with_does_not_commit() {
        let (store, e) = seeded();
        let basis = store.basis_t();
        let report = store
            .db()
            .with(vec![Statement::Add {
                e: e.into(),
                a: counter(),
                v: FactValue::Scalar(Value::Long(9)),
            }])
            .unwrap();
        assert_eq!(read_counter(report.db_after.as_ref(), e), Some(9));
        assert_eq!(read_counter(store.db().as_ref(), e), Some(0));
        assert_eq!(store.basis_t(), basis);
    }

    #[test]
    fn test_with_reports_same_errors_as_transact() {
        let (store, e) = seeded();
        let batch = vec![Statement::Cas {
            e,
            a: counter(),
            expected: Some(Value::Long(7)),
            new: Value::Long(8),
        }];
        assert!(store.db().with(batch.clone()).unwrap_err().is_conflict());
        assert!(store.transact(batch).unwrap_err().is_conflict());
    }
}

// ============================================================================
// History
// ============================================================================

mod history {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_as_of_replays_every_basis(values in proptest::collection::vec(-1000i64..1000, 1..12)) {
            let (store, e) = seeded();
            let mut expected = vec![(store.basis_t(), 0i64)];
            for v in &values {
                let report = store.transact(vec![Statement::Add {
                    e: e.into(),
                    a: counter(),
                    v: FactValue::Scalar(Value::Long(*v)),
                }]).unwrap();
                expected.push((report.basis_t, *v));
            }
            for (t, v) in expected {
                let past = store.as_of(t).unwrap();
                prop_assert_eq!(read_counter(past.as_ref(), e), Some(v));
            }
        }
    }
}
