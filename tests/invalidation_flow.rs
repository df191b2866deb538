//! Ordered invalidation against real tier stores.

mod support;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use tokio::sync::Notify;

use tenant_edge::cache::{
    CacheConfig, CacheKey, CacheStatus, CachedResponse, HostClass, InvalidationCoordinator,
    InvalidationError, InvalidationState, InvalidationTarget, MemoryTierStore, Origin,
    OriginError, OriginRequest, OriginResponse, ServedFrom, Stage, Tier, TierPolicy, TieredCache,
    Upstream, entry_tags,
};
use tenant_edge::domain::tenant::TenantId;

use support::{FakeOrigin, Traced, trace, trace_of};

struct Tiers {
    regional: Arc<MemoryTierStore>,
    shield: Arc<MemoryTierStore>,
    cache: TieredCache,
    origin: Arc<FakeOrigin>,
}

fn tiers() -> Tiers {
    let config = CacheConfig::default();
    let regional = Arc::new(MemoryTierStore::new(Tier::Regional, &config));
    let shield = Arc::new(MemoryTierStore::new(Tier::Shield, &config));
    let origin = Arc::new(FakeOrigin::default());
    let cache = TieredCache::new(config, regional.clone(), shield.clone(), origin.clone());
    Tiers {
        regional,
        shield,
        cache,
        origin,
    }
}

async fn warm(tiers: &Tiers, tenant: &str, path: &str, tags: &str) {
    let namespaced = format!("/s/{tenant}{path}");
    tiers.origin.tag(&namespaced, tags);
    let key = CacheKey::new(
        HostClass::Tenant(TenantId::parse(tenant).unwrap()),
        namespaced.clone(),
    );
    tiers
        .cache
        .serve(&key, OriginRequest::new(Upstream::Pages, namespaced))
        .await
        .unwrap();
}

/// Shield target that records how many regional entries still carried the
/// tag at the moment it ran.
struct ShieldWitness {
    regional: Arc<MemoryTierStore>,
    shield: Arc<MemoryTierStore>,
    seen_in_regional: AtomicUsize,
    trace: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl InvalidationTarget for ShieldWitness {
    async fn invalidate_tag(&self, tag: &str) -> Result<usize, InvalidationError> {
        self.trace.lock().unwrap().push("shield");
        self.seen_in_regional
            .store(self.regional.tagged(tag), Ordering::SeqCst);
        self.shield.invalidate_tag(tag).await
    }
}

#[tokio::test]
async fn stages_run_origin_then_regional_then_shield() {
    let tiers = tiers();
    warm(&tiers, "cool", "/posts/42", "post:42").await;
    warm(&tiers, "hot", "/posts/42", "post:42").await;
    warm(&tiers, "cool", "/about", "").await;
    assert_eq!(tiers.regional.tagged("post:42"), 2);
    assert_eq!(tiers.shield.tagged("post:42"), 2);

    let trace = trace();
    let purge = Traced::new("origin", None, trace.clone());
    let regional = Traced::new("regional", Some(tiers.regional.clone()), trace.clone());
    let witness = Arc::new(ShieldWitness {
        regional: tiers.regional.clone(),
        shield: tiers.shield.clone(),
        seen_in_regional: AtomicUsize::new(usize::MAX),
        trace: trace.clone(),
    });
    let coordinator = InvalidationCoordinator::new(purge, regional, witness.clone());

    let result = coordinator.invalidate("post:42").await.unwrap();

    assert!(result.success);
    assert_eq!(result.state, InvalidationState::Complete);
    assert_eq!(trace_of(&trace), vec!["origin", "regional", "shield"]);
    assert_eq!(witness.seen_in_regional.load(Ordering::SeqCst), 0);
    let removed: Vec<(Stage, usize)> = result
        .stages
        .iter()
        .map(|report| (report.stage, report.removed))
        .collect();
    assert_eq!(
        removed,
        vec![(Stage::Origin, 0), (Stage::Regional, 2), (Stage::Shield, 2)]
    );
    assert_eq!(tiers.regional.len(), 1);
    assert_eq!(tiers.shield.len(), 1);
}

#[tokio::test]
async fn origin_failure_leaves_both_tiers_untouched() {
    let tiers = tiers();
    warm(&tiers, "cool", "/", "").await;

    let trace = trace();
    let purge = Traced::new("origin", None, trace.clone());
    purge.fail(true);
    let coordinator = InvalidationCoordinator::new(
        purge,
        Traced::new("regional", Some(tiers.regional.clone()), trace.clone()),
        Traced::new("shield", Some(tiers.shield.clone()), trace.clone()),
    );

    let result = coordinator.invalidate("cool").await.unwrap();

    assert!(!result.success);
    assert_eq!(result.failed_tier, Some(Stage::Origin));
    assert_eq!(trace_of(&trace), vec!["origin"]);
    assert_eq!(tiers.regional.tagged("cool"), 1);
    assert_eq!(tiers.shield.tagged("cool"), 1);
    assert_eq!(coordinator.pending().len(), 1);
}

#[tokio::test]
async fn invalidating_twice_succeeds_both_times() {
    let tiers = tiers();
    warm(&tiers, "cool", "/", "").await;

    let coordinator = InvalidationCoordinator::new(
        Traced::new("origin", None, trace()),
        tiers.regional.clone(),
        tiers.shield.clone(),
    );

    let first = coordinator.invalidate("cool").await.unwrap();
    let second = coordinator.invalidate("cool").await.unwrap();

    assert!(first.success);
    assert!(second.success);
    assert!(second.stages.iter().all(|report| report.removed == 0));
    assert!(coordinator.pending().is_empty());
}

#[tokio::test]
async fn unknown_tags_succeed_and_empty_tags_are_rejected() {
    let tiers = tiers();
    let coordinator = InvalidationCoordinator::new(
        Traced::new("origin", None, trace()),
        tiers.regional.clone(),
        tiers.shield.clone(),
    );

    assert!(coordinator.invalidate("never-seen").await.unwrap().success);
    assert!(coordinator.invalidate("   ").await.is_err());
}

#[tokio::test(start_paused = true)]
async fn timed_out_stage_resumes_without_repeating_origin() {
    let tiers = tiers();
    warm(&tiers, "cool", "/", "").await;

    let trace = trace();
    let regional = Traced::new("regional", Some(tiers.regional.clone()), trace.clone());
    regional.hang(true);
    let coordinator = InvalidationCoordinator::new(
        Traced::new("origin", None, trace.clone()),
        regional.clone(),
        Traced::new("shield", Some(tiers.shield.clone()), trace.clone()),
    )
    .with_stage_timeout(Duration::from_millis(50));

    let failed = coordinator.invalidate("cool").await.unwrap();
    assert_eq!(failed.state, InvalidationState::Failed(Stage::Regional));
    assert_eq!(trace_of(&trace), vec!["origin", "regional"]);
    assert_eq!(tiers.shield.tagged("cool"), 1);
    let pending = coordinator.pending();
    assert_eq!(pending[0].remaining, vec![Stage::Regional, Stage::Shield]);

    regional.hang(false);
    let results = coordinator.retry_pending().await;

    assert_eq!(results.len(), 1);
    assert!(results[0].success);
    assert_eq!(results[0].resumed_from, Some(Stage::Regional));
    assert_eq!(results[0].attempts, 2);
    assert_eq!(
        trace_of(&trace),
        vec!["origin", "regional", "regional", "shield"]
    );
    assert_eq!(tiers.regional.tagged("cool"), 0);
    assert_eq!(tiers.shield.tagged("cool"), 0);
    assert!(coordinator.ledger().is_empty());
}

/// Origin that, once closed, holds every fetch until it is released.
#[derive(Default)]
struct GatedOrigin {
    inner: FakeOrigin,
    closed: AtomicBool,
    release: Notify,
}

#[async_trait]
impl Origin for GatedOrigin {
    async fn fetch(&self, request: OriginRequest) -> Result<OriginResponse, OriginError> {
        if self.closed.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        self.inner.fetch(request).await
    }
}

fn cool_root() -> (CacheKey, OriginRequest) {
    (
        CacheKey::new(HostClass::Tenant(TenantId::parse("cool").unwrap()), "/s/cool"),
        OriginRequest::new(Upstream::Pages, "/s/cool"),
    )
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn backfill_racing_an_invalidation_does_not_restore_the_entry() {
    let tiers = tiers();
    let (key, request) = cool_root();
    let policy = tiers.cache.config().shield;
    tiers
        .cache
        .put(
            Tier::Shield,
            key.clone(),
            CachedResponse::new(StatusCode::OK, HeaderMap::new(), "old"),
            entry_tags(&key.host, ["post:1"]),
            &policy,
        )
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(1)).await;

    // The shield hit queues a regional backfill that has not run yet.
    let served = tiers.cache.serve(&key, request.clone()).await.unwrap();
    assert_eq!(served.source, ServedFrom::Tier(Tier::Shield));
    assert!(!tiers.regional.contains(&key));

    let coordinator = InvalidationCoordinator::new(
        Traced::new("origin", None, trace()),
        tiers.regional.clone(),
        tiers.shield.clone(),
    );
    assert!(coordinator.invalidate("cool").await.unwrap().success);
    settle().await;

    assert!(!tiers.regional.contains(&key));
    assert!(!tiers.shield.contains(&key));

    tokio::time::advance(Duration::from_secs(1)).await;
    let refetched = tiers.cache.serve(&key, request).await.unwrap();
    assert_eq!(refetched.status, CacheStatus::Miss);
    assert_eq!(refetched.response.body, "origin:/s/cool");
    assert_eq!(tiers.origin.call_count(), 1);
    assert!(tiers.regional.contains(&key));
}

#[tokio::test(start_paused = true)]
async fn refresh_started_before_an_invalidation_is_discarded() {
    let config = CacheConfig {
        shield: TierPolicy::from_secs(10, 10, 10),
        regional: TierPolicy::from_secs(10, 10, 10),
        origin_timeout: Duration::from_secs(60),
        ..CacheConfig::default()
    };
    let regional = Arc::new(MemoryTierStore::new(Tier::Regional, &config));
    let shield = Arc::new(MemoryTierStore::new(Tier::Shield, &config));
    let origin = Arc::new(GatedOrigin::default());
    let cache = TieredCache::new(config, regional.clone(), shield.clone(), origin.clone());
    let coordinator = InvalidationCoordinator::new(
        Traced::new("origin", None, trace()),
        regional.clone(),
        shield.clone(),
    );
    let (key, request) = cool_root();

    cache.serve(&key, request.clone()).await.unwrap();
    tokio::time::advance(Duration::from_secs(15)).await;

    // Stale hit starts a refresh that stalls at the origin.
    origin.closed.store(true, Ordering::SeqCst);
    let stale = cache.serve(&key, request.clone()).await.unwrap();
    assert_eq!(stale.status, CacheStatus::Stale);
    settle().await;
    assert_eq!(cache.refreshes_in_flight(), 1);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(coordinator.invalidate("cool").await.unwrap().success);

    origin.closed.store(false, Ordering::SeqCst);
    origin.release.notify_one();
    settle().await;

    assert_eq!(cache.refreshes_in_flight(), 0);
    assert_eq!(origin.inner.call_count(), 2);
    assert!(!regional.contains(&key));
    assert!(!shield.contains(&key));

    tokio::time::advance(Duration::from_secs(1)).await;
    let refetched = cache.serve(&key, request).await.unwrap();
    assert_eq!(refetched.status, CacheStatus::Miss);
    assert!(regional.contains(&key));
    assert!(shield.contains(&key));
}
