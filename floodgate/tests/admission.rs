//! Admission decisions for a single governor instance, driven by a
//! manual clock so every bound asserts exactly.

#![allow(missing_docs)]

use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, Method};
use floodgate::{
    bucket_key,
    AtomicStorage,
    Error,
    Governor,
    GovernorOptions,
    ManualTimeSource,
    MemoryStorage,
    Rule,
};

const TENANT: &str = "acme";

fn clock() -> ManualTimeSource {
    ManualTimeSource::new(Duration::from_secs(1_000))
}

fn governor(
    refill_rate: f64,
    burst_capacity: u64,
    time: ManualTimeSource,
) -> Governor<MemoryStorage, ManualTimeSource> {
    Governor::with_time_source(
        MemoryStorage::new(),
        GovernorOptions::new(refill_rate, burst_capacity),
        time,
    )
    .unwrap()
}

async fn call(
    governor: &Governor<impl AtomicStorage, ManualTimeSource>,
    path: &str,
) -> floodgate::Decision {
    governor
        .allow(TENANT, &Method::GET, path, &HeaderMap::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn it_exhausts_the_burst_exactly() {
    let governor = governor(1_000.0, 100, clock());

    for i in 0..100 {
        let decision = call(&governor, "/x").await;
        assert!(decision.is_allowed(), "call {i} should pass");
        assert_eq!(decision.remaining(), 99 - i);
        assert_eq!(decision.retry_after(), Duration::ZERO);
    }

    let decision = call(&governor, "/x").await;
    assert!(decision.is_denied());
    assert_eq!(decision.remaining(), 0);
    assert_eq!(decision.retry_after(), Duration::from_millis(1));
}

#[tokio::test]
async fn it_throttles_expensive_routes_earlier() {
    let governor = governor(10.0, 100, clock());
    governor.register(Rule::get("/cheap").cost(1)).unwrap();
    governor.register(Rule::get("/expensive").cost(50)).unwrap();
    let headers = HeaderMap::new();

    let mut cheap_allowed = 0;
    let mut expensive_allowed = 0;
    for _ in 0..200 {
        let cheap = governor.allow("frugal", &Method::GET, "/cheap", &headers).await.unwrap();
        if cheap.is_allowed() {
            cheap_allowed += 1;
        }
        let expensive = governor.allow("lavish", &Method::GET, "/expensive", &headers).await.unwrap();
        if expensive.is_allowed() {
            expensive_allowed += 1;
        }
    }

    assert_eq!(cheap_allowed, 100);
    assert_eq!(expensive_allowed, 2);
}

#[tokio::test]
async fn it_refills_from_burst_to_sustained_rate() {
    let time = clock();
    let governor = governor(10.0, 50, time.clone());

    for _ in 0..50 {
        assert!(call(&governor, "/x").await.is_allowed());
    }
    assert!(call(&governor, "/x").await.is_denied());

    time.advance(Duration::from_millis(1_100));

    let mut allowed = 0;
    for _ in 0..15 {
        if call(&governor, "/x").await.is_allowed() {
            allowed += 1;
        }
    }

    // 1.1 s at 10 tokens/s credits exactly 11 tokens.
    assert_eq!(allowed, 11);
    assert!(call(&governor, "/x").await.is_denied());
}

#[tokio::test]
async fn it_scales_the_cooldown_with_the_rejected_cost() {
    let governor = governor(10.0, 10, clock());
    governor.register(Rule::get("/five").cost(5)).unwrap();

    for _ in 0..10 {
        assert!(call(&governor, "/one").await.is_allowed());
    }

    let single = call(&governor, "/one").await;
    let batch = call(&governor, "/five").await;

    assert!(single.is_denied());
    assert!(batch.is_denied());
    assert_eq!(single.retry_after(), Duration::from_millis(100));
    assert_eq!(batch.retry_after(), single.retry_after() * 5);
}

#[tokio::test]
async fn it_persists_the_refill_on_denial() {
    let time = clock();
    let governor = governor(10.0, 10, time.clone());
    governor.register(Rule::get("/ten").cost(10)).unwrap();

    for _ in 0..10 {
        assert!(call(&governor, "/one").await.is_allowed());
    }
    let key = bucket_key(TENANT);
    let drained = governor.storage().get(&key).await.unwrap().unwrap();

    time.advance(Duration::from_millis(500));

    let decision = call(&governor, "/ten").await;
    assert!(decision.is_denied());
    assert_eq!(decision.remaining(), 5);
    assert_eq!(decision.retry_after(), Duration::from_millis(500));

    // The denial wrote the refreshed state back so peers see the
    // advanced timestamp.
    let refreshed = governor.storage().get(&key).await.unwrap().unwrap();
    assert_ne!(refreshed, drained);

    // The five refilled tokens are spendable.
    for _ in 0..5 {
        assert!(call(&governor, "/one").await.is_allowed());
    }
    assert!(call(&governor, "/one").await.is_denied());
}

#[tokio::test]
async fn it_creates_the_bucket_on_a_denied_first_contact() {
    let governor = governor(10.0, 100, clock());
    governor.register(Rule::get("/heavy").cost(200)).unwrap();

    let decision = call(&governor, "/heavy").await;

    assert!(decision.is_denied());
    assert_eq!(decision.remaining(), 100);
    // Deficit of 100 tokens at 10 tokens/s.
    assert_eq!(decision.retry_after(), Duration::from_secs(10));
    assert_eq!(governor.storage().len(), 1);
}

#[tokio::test]
async fn it_isolates_tenants_from_each_other() {
    let governor = governor(10.0, 2, clock());
    let headers = HeaderMap::new();

    for _ in 0..2 {
        let decision = governor.allow("first", &Method::GET, "/x", &headers).await.unwrap();
        assert!(decision.is_allowed());
    }
    let decision = governor.allow("first", &Method::GET, "/x", &headers).await.unwrap();
    assert!(decision.is_denied());

    let decision = governor.allow("second", &Method::GET, "/x", &headers).await.unwrap();
    assert!(decision.is_allowed());
}

/// A backend whose reads work but whose writes always report a conflict.
#[derive(Debug, Default, Clone)]
struct ConflictStorage {
    inner: MemoryStorage,
}

#[async_trait]
impl AtomicStorage for ConflictStorage {
    async fn get(&self, key: &str) -> Result<Option<u128>, Error> {
        self.inner.get(key).await
    }

    async fn compare_and_swap(&self, _key: &str, _old: u128, _new: u128) -> Result<bool, Error> {
        Ok(false)
    }

    async fn atomic_increment(&self, key: &str, delta: i64) -> Result<u128, Error> {
        self.inner.atomic_increment(key, delta).await
    }
}

#[tokio::test]
async fn it_gives_up_after_the_cas_budget() {
    let governor = Governor::with_time_source(
        ConflictStorage::default(),
        GovernorOptions::new(10.0, 100).with_max_cas_attempts(3),
        clock(),
    )
    .unwrap();

    let err = governor
        .allow(TENANT, &Method::GET, "/x", &HeaderMap::new())
        .await
        .unwrap_err();

    assert!(err.is_contention());
    assert!(err.is_transient());
    match err {
        Error::Contention { attempts } => assert_eq!(attempts, 3),
        other => panic!("unexpected error: {other}"),
    }
}

/// A backend that is down: every operation fails.
#[derive(Debug, Default, Clone)]
struct DownStorage;

#[async_trait]
impl AtomicStorage for DownStorage {
    async fn get(&self, _key: &str) -> Result<Option<u128>, Error> {
        Err(Error::storage(std::io::Error::other("backend down")))
    }

    async fn compare_and_swap(&self, _key: &str, _old: u128, _new: u128) -> Result<bool, Error> {
        Err(Error::storage(std::io::Error::other("backend down")))
    }

    async fn atomic_increment(&self, _key: &str, _delta: i64) -> Result<u128, Error> {
        Err(Error::storage(std::io::Error::other("backend down")))
    }
}

#[tokio::test]
async fn it_surfaces_storage_errors_unchanged() {
    let governor = Governor::with_time_source(
        DownStorage,
        GovernorOptions::new(10.0, 100),
        clock(),
    )
    .unwrap();

    let err = governor
        .allow(TENANT, &Method::GET, "/x", &HeaderMap::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Storage(_)));
    assert!(err.is_transient());
}

/// Reads delegate, deduction writes fail, so only the best-effort denial
/// write ever errors.
#[derive(Debug, Default, Clone)]
struct WriteDownStorage {
    inner: MemoryStorage,
}

#[async_trait]
impl AtomicStorage for WriteDownStorage {
    async fn get(&self, key: &str) -> Result<Option<u128>, Error> {
        self.inner.get(key).await
    }

    async fn compare_and_swap(&self, _key: &str, _old: u128, _new: u128) -> Result<bool, Error> {
        Err(Error::storage(std::io::Error::other("write path down")))
    }

    async fn atomic_increment(&self, key: &str, delta: i64) -> Result<u128, Error> {
        self.inner.atomic_increment(key, delta).await
    }
}

#[tokio::test]
async fn it_still_denies_when_best_effort_persistence_fails() {
    let governor = Governor::with_time_source(
        WriteDownStorage::default(),
        GovernorOptions::new(10.0, 1),
        clock(),
    )
    .unwrap();
    governor.register(Rule::get("/heavy").cost(5)).unwrap();

    // The deny verdict is computed locally; the failed persistence write
    // must not turn it into an error.
    let decision = call(&governor, "/heavy").await;
    assert!(decision.is_denied());

    // The deduction path, by contrast, must surface the failure.
    let err = governor
        .allow(TENANT, &Method::GET, "/cheap", &HeaderMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
}
