//! End-to-end tests for the controller: cache, queue, limiter and workers
//! wired together the way an operator binary would.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use syncloop_core::{Handler, SyncContext, WorkerMetrics};
use syncloop_domain::{
    ControllerConfig, DomainError, DynamicObject, Event, ObjectKey, ObjectMeta, RateLimiterConfig,
    Result as DomainResult,
};
use syncloop_infra::{Controller, ControllerError, MemoryIndexer};

#[derive(Clone, Copy)]
enum Behaviour {
    FailFirst(usize),
    WaitForCancel,
    IgnoreCancel,
}

struct TestHandler {
    behaviour: Behaviour,
    calls: AtomicUsize,
    seen: Mutex<Vec<ObjectKey>>,
}

impl TestHandler {
    fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self { behaviour, calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()) })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Handler for TestHandler {
    async fn handle(&self, ctx: &SyncContext, event: Event) -> DomainResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let mut object = event.object.ok_or_else(|| DomainError::handler("missing object"))?;
        self.seen.lock().push(object.key());

        // Handlers own their copy and may scribble on it.
        object.data.insert("status".to_string(), json!({ "observed": call }));

        match self.behaviour {
            Behaviour::FailFirst(n) if call < n => Err(DomainError::handler("not ready")),
            Behaviour::FailFirst(_) => Ok(()),
            Behaviour::WaitForCancel => {
                ctx.cancelled().await;
                Ok(())
            }
            Behaviour::IgnoreCancel => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

fn deployment(name: &str) -> DynamicObject {
    DynamicObject::new("apps/v1", "Deployment", ObjectMeta::namespaced("default", name))
        .with_field("spec", json!({ "replicas": 1 }))
}

fn fast_config() -> ControllerConfig {
    ControllerConfig {
        rate_limiter: RateLimiterConfig::Exponential { base_delay_ms: 10, max_delay_ms: 1_000 },
        ..ControllerConfig::default()
    }
}

fn controller(
    indexer: Arc<MemoryIndexer>,
    handler: Arc<TestHandler>,
    config: ControllerConfig,
) -> Controller {
    Controller::new(indexer, handler, config, Arc::new(WorkerMetrics::new())).unwrap()
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(60), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test(start_paused = true)]
async fn reconciles_cached_objects_and_skips_absent_ones() {
    let indexer = Arc::new(MemoryIndexer::with_objects([deployment("web")]));
    let handler = TestHandler::new(Behaviour::FailFirst(0));
    let mut controller = controller(indexer, Arc::clone(&handler), fast_config());

    controller.start().await.unwrap();
    controller.enqueue(ObjectKey::new("default/web"));
    controller.enqueue(ObjectKey::new("default/gone"));

    wait_for(|| controller.metrics().syncs == 2).await;
    controller.stop().await.unwrap();

    let metrics = controller.metrics();
    assert_eq!(metrics.successes, 1);
    assert_eq!(metrics.absent, 1);
    assert_eq!(handler.calls(), 1);
    assert_eq!(*handler.seen.lock(), vec![ObjectKey::new("default/web")]);
}

#[tokio::test(start_paused = true)]
async fn failed_syncs_back_off_until_success() {
    let indexer = Arc::new(MemoryIndexer::with_objects([deployment("web")]));
    let handler = TestHandler::new(Behaviour::FailFirst(3));
    let mut controller = controller(indexer, Arc::clone(&handler), fast_config());

    controller.start().await.unwrap();
    let started = tokio::time::Instant::now();
    controller.enqueue(ObjectKey::new("default/web"));

    wait_for(|| controller.metrics().successes == 1).await;
    controller.stop().await.unwrap();

    // 10ms + 20ms + 40ms of backoff before the fourth attempt
    assert!(started.elapsed() >= Duration::from_millis(70));
    let metrics = controller.metrics();
    assert_eq!(handler.calls(), 4);
    assert_eq!(metrics.failures, 3);
    assert_eq!(metrics.requeues, 3);
    assert_eq!(metrics.drops, 0);
    assert_eq!(controller.queue_metrics().total_forgotten, 1);
}

#[tokio::test(start_paused = true)]
async fn key_is_dropped_once_retries_are_exhausted() {
    let indexer = Arc::new(MemoryIndexer::with_objects([deployment("web")]));
    let handler = TestHandler::new(Behaviour::FailFirst(usize::MAX));
    let config = ControllerConfig { max_retries: 2, ..fast_config() };
    let mut controller = controller(indexer, Arc::clone(&handler), config);

    controller.start().await.unwrap();
    controller.enqueue(ObjectKey::new("default/web"));

    wait_for(|| controller.metrics().drops == 1).await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    controller.stop().await.unwrap();

    assert_eq!(handler.calls(), 3);
    assert_eq!(controller.metrics().requeues, 2);
}

#[tokio::test(start_paused = true)]
async fn bucket_only_limiter_drops_after_max_retries() {
    let indexer = Arc::new(MemoryIndexer::with_objects([deployment("web")]));
    let handler = TestHandler::new(Behaviour::FailFirst(usize::MAX));
    let config = ControllerConfig {
        max_retries: 3,
        rate_limiter: RateLimiterConfig::Bucket { qps: 1000.0, burst: 1000 },
        ..ControllerConfig::default()
    };
    let mut controller = controller(indexer, Arc::clone(&handler), config);

    controller.start().await.unwrap();
    controller.enqueue(ObjectKey::new("default/web"));

    wait_for(|| controller.metrics().drops == 1).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    controller.stop().await.unwrap();

    assert_eq!(handler.calls(), 4);
    assert_eq!(controller.metrics().requeues, 3);
}

#[tokio::test(start_paused = true)]
async fn starved_bucket_parks_the_key_without_killing_workers() {
    let indexer = Arc::new(MemoryIndexer::with_objects([deployment("web")]));
    let handler = TestHandler::new(Behaviour::FailFirst(usize::MAX));
    let config = ControllerConfig {
        workers: 1,
        rate_limiter: RateLimiterConfig::Bucket { qps: 1e-30, burst: 1 },
        ..ControllerConfig::default()
    };
    let mut controller = controller(indexer, Arc::clone(&handler), config);

    controller.start().await.unwrap();
    controller.enqueue(ObjectKey::new("default/web"));
    // The first requeue spends the only token; the second waits on a
    // practically empty bucket.
    wait_for(|| controller.metrics().requeues == 2).await;

    controller.enqueue(ObjectKey::new("default/web"));
    wait_for(|| controller.metrics().requeues == 3).await;
    controller.stop().await.unwrap();

    assert_eq!(handler.calls(), 3);
}

#[test]
fn controller_built_outside_a_runtime_still_retries() {
    let indexer = Arc::new(MemoryIndexer::with_objects([deployment("web")]));
    let handler = TestHandler::new(Behaviour::FailFirst(1));
    let mut controller = controller(indexer, Arc::clone(&handler), fast_config());

    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    rt.block_on(async {
        controller.start().await.unwrap();
        controller.enqueue(ObjectKey::new("default/web"));
        wait_for(|| controller.metrics().successes == 1).await;
        controller.stop().await.unwrap();
    });

    assert_eq!(handler.calls(), 2);
    let metrics = controller.metrics();
    assert_eq!(metrics.failures, 1);
    assert_eq!(metrics.requeues, 1);
}

#[tokio::test(start_paused = true)]
async fn handler_mutations_never_reach_the_cache() {
    let indexer = Arc::new(MemoryIndexer::with_objects([deployment("web")]));
    let handler = TestHandler::new(Behaviour::FailFirst(0));
    let mut controller = controller(Arc::clone(&indexer), Arc::clone(&handler), fast_config());

    controller.start().await.unwrap();
    controller.enqueue(ObjectKey::new("default/web"));
    wait_for(|| handler.calls() == 1).await;
    controller.stop().await.unwrap();

    let cached = indexer.get(&ObjectKey::new("default/web")).unwrap();
    assert!(cached.field("status").is_none());
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_in_flight_handlers() {
    let indexer = Arc::new(MemoryIndexer::with_objects([deployment("web")]));
    let handler = TestHandler::new(Behaviour::WaitForCancel);
    let mut controller = controller(indexer, Arc::clone(&handler), fast_config());

    controller.start().await.unwrap();
    controller.enqueue(ObjectKey::new("default/web"));
    wait_for(|| handler.calls() == 1).await;

    controller.stop().await.unwrap();
    assert!(!controller.is_running());
    assert_eq!(controller.metrics().successes, 1);
}

#[tokio::test(start_paused = true)]
async fn stuck_worker_hits_join_timeout() {
    let indexer = Arc::new(MemoryIndexer::with_objects([deployment("web")]));
    let handler = TestHandler::new(Behaviour::IgnoreCancel);
    let config = ControllerConfig { join_timeout_ms: 100, ..fast_config() };
    let mut controller = controller(indexer, Arc::clone(&handler), config);

    controller.start().await.unwrap();
    controller.enqueue(ObjectKey::new("default/web"));
    wait_for(|| handler.calls() == 1).await;

    let err = controller.stop().await.unwrap_err();
    assert!(matches!(err, ControllerError::JoinTimeout { worker: 0, .. }));
    assert!(!controller.is_running());
}

#[tokio::test(start_paused = true)]
async fn controller_can_restart_after_stop() {
    let indexer = Arc::new(MemoryIndexer::with_objects([deployment("web"), deployment("api")]));
    let handler = TestHandler::new(Behaviour::FailFirst(0));
    let config = ControllerConfig { workers: 3, ..fast_config() };
    let mut controller = controller(indexer, Arc::clone(&handler), config);

    controller.start().await.unwrap();
    controller.enqueue(ObjectKey::new("default/web"));
    wait_for(|| handler.calls() == 1).await;
    controller.stop().await.unwrap();

    controller.start().await.unwrap();
    assert!(controller.is_running());
    controller.enqueue(ObjectKey::new("default/api"));
    wait_for(|| handler.calls() == 2).await;
    controller.stop().await.unwrap();

    assert_eq!(
        *handler.seen.lock(),
        vec![ObjectKey::new("default/web"), ObjectKey::new("default/api")]
    );
}
