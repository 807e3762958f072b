//! Behavioural tests for the bulk seeder against the in-memory store.
//!
//! These cover the guarantees callers rely on: exact row counts, values
//! drawn only from the candidate set, the in-flight cap, and fail-slow
//! error aggregation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use identifiers::{FaultKind, MemoryStore, Store, Table};
use rand::SeedableRng;
use rand::rngs::StdRng;
use seeder::db::{BulkSeeder, SeedError};
use seeder::generators::CandidateSet;

fn candidates(values: &[&str]) -> CandidateSet {
    CandidateSet::new(values.iter().map(|v| v.to_string()).collect()).unwrap()
}

#[tokio::test]
async fn test_count_is_zero_before_and_n_after_seeding() {
    let store = Arc::new(MemoryStore::new());
    let mut rng = StdRng::seed_from_u64(100);

    assert_eq!(store.count(Table::IdentifierListValues).await.unwrap(), 0);

    let summary = BulkSeeder::new(Arc::clone(&store))
        .with_max_in_flight(8)
        .seed(250, &candidates(&["A", "B", "C"]), 1, &mut rng)
        .await
        .unwrap();

    assert_eq!(summary.inserted, 250);
    assert_eq!(store.count(Table::IdentifierListValues).await.unwrap(), 250);
}

#[tokio::test]
async fn test_rows_only_use_candidate_values_and_parent_ref() {
    let store = Arc::new(MemoryStore::new());
    let mut rng = StdRng::seed_from_u64(101);
    let set = CandidateSet::generate(10, 15, &mut rng).unwrap();

    BulkSeeder::new(Arc::clone(&store))
        .seed(500, &set, 42, &mut rng)
        .await
        .unwrap();

    let rows = store.list_values();
    assert_eq!(rows.len(), 500);
    for row in &rows {
        assert_eq!(row.definition_id, 42);
        assert!(set.contains(&row.identifier_value));
    }

    // Surrogate keys are unique
    let ids: HashSet<_> = rows.iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), 500);
}

#[tokio::test]
async fn test_single_candidate_set() {
    let store = Arc::new(MemoryStore::new());
    let mut rng = StdRng::seed_from_u64(102);

    BulkSeeder::new(Arc::clone(&store))
        .seed(20, &candidates(&["ONLY"]), 1, &mut rng)
        .await
        .unwrap();

    assert!(store.list_values().iter().all(|r| r.identifier_value == "ONLY"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_flight_never_exceeds_cap() {
    for cap in [1, 3, 16] {
        let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(2)));
        let mut rng = StdRng::seed_from_u64(103);

        BulkSeeder::new(Arc::clone(&store))
            .with_max_in_flight(cap)
            .seed(120, &candidates(&["A", "B"]), 1, &mut rng)
            .await
            .unwrap();

        assert!(
            store.peak_in_flight() <= cap,
            "peak {} exceeded cap {cap}",
            store.peak_in_flight()
        );
        assert_eq!(store.list_values().len(), 120);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cap_is_actually_used() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(20)));
    let mut rng = StdRng::seed_from_u64(104);

    BulkSeeder::new(Arc::clone(&store))
        .with_max_in_flight(8)
        .seed(64, &candidates(&["A"]), 1, &mut rng)
        .await
        .unwrap();

    // With slow inserts the seeder keeps more than one in flight.
    assert!(store.peak_in_flight() > 1);
}

#[tokio::test]
async fn test_fault_on_third_call_is_aggregated() {
    let store = Arc::new(MemoryStore::new().with_fault(3, FaultKind::Constraint));
    let set = candidates(&["A", "B", "C"]);
    let mut rng = StdRng::seed_from_u64(105);

    let err = BulkSeeder::new(Arc::clone(&store))
        .seed(5, &set, 1, &mut rng)
        .await
        .unwrap_err();

    let SeedError::Aggregate(aggregate) = err else {
        panic!("expected aggregate error, got {err:?}");
    };
    assert_eq!(aggregate.errors.len(), 1);
    assert_eq!(aggregate.succeeded, 4);

    let rows = store.list_values();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| set.contains(&r.identifier_value)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_k_failures_leave_count_minus_k_rows() {
    let failing_calls = [1, 7, 8, 30, 64];
    let mut store = MemoryStore::new().with_latency(Duration::from_millis(1));
    for call in failing_calls {
        store = store.with_fault(call, FaultKind::Connection);
    }
    let store = Arc::new(store);
    let mut rng = StdRng::seed_from_u64(106);

    let err = BulkSeeder::new(Arc::clone(&store))
        .with_max_in_flight(6)
        .seed(64, &candidates(&["A", "B", "C"]), 1, &mut rng)
        .await
        .unwrap_err();

    let SeedError::Aggregate(aggregate) = err else {
        panic!("expected aggregate error, got {err:?}");
    };
    assert_eq!(aggregate.errors.len(), failing_calls.len());
    assert_eq!(aggregate.succeeded, 64 - failing_calls.len());
    assert_eq!(store.list_values().len(), 64 - failing_calls.len());
    // Fail-slow: every row was attempted despite early failures
    assert_eq!(store.insert_calls(), 64);
}

#[tokio::test]
async fn test_seeding_twice_inserts_disjoint_rows() {
    let store = Arc::new(MemoryStore::new());
    let seeder = BulkSeeder::new(Arc::clone(&store));
    let set = candidates(&["A", "B"]);
    let mut rng = StdRng::seed_from_u64(107);

    seeder.seed(10, &set, 1, &mut rng).await.unwrap();
    seeder.seed(10, &set, 1, &mut rng).await.unwrap();

    let ids: HashSet<_> = store.list_values().iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), 20);
}
