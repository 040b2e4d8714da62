//! Recording fakes for the core ports

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use syncloop_core::{Handler, Indexer, SyncContext, WorkQueue};
use syncloop_domain::{
    DomainError, DynamicObject, Event, ObjectKey, ObjectMeta, Result as DomainResult,
};

/// Queue operations observed by [`RecordingQueue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueCall {
    Get(ObjectKey),
    Done(ObjectKey),
    Forget(ObjectKey),
    AddRateLimited(ObjectKey),
}

/// In-memory queue without delays
///
/// `add_rate_limited` requeues immediately and counts the requeue; `get`
/// returns `None` once nothing is pending, which ends the worker loop.
#[derive(Default)]
pub struct RecordingQueue {
    pending: Mutex<VecDeque<ObjectKey>>,
    requeues: Mutex<HashMap<ObjectKey, u32>>,
    calls: Mutex<Vec<QueueCall>>,
}

impl RecordingQueue {
    pub fn with_keys(keys: &[&str]) -> Self {
        let queue = Self::default();
        queue.pending.lock().extend(keys.iter().map(|key| ObjectKey::new(*key)));
        queue
    }

    pub fn calls(&self) -> Vec<QueueCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&QueueCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| matches(call)).count()
    }

    pub fn gets(&self) -> usize {
        self.count(|call| matches!(call, QueueCall::Get(_)))
    }

    pub fn dones(&self) -> usize {
        self.count(|call| matches!(call, QueueCall::Done(_)))
    }

    pub fn forgets(&self) -> usize {
        self.count(|call| matches!(call, QueueCall::Forget(_)))
    }

    pub fn rate_limited_adds(&self) -> usize {
        self.count(|call| matches!(call, QueueCall::AddRateLimited(_)))
    }
}

#[async_trait]
impl WorkQueue for RecordingQueue {
    async fn get(&self) -> Option<ObjectKey> {
        let key = self.pending.lock().pop_front()?;
        self.calls.lock().push(QueueCall::Get(key.clone()));
        Some(key)
    }

    fn done(&self, key: &ObjectKey) {
        self.calls.lock().push(QueueCall::Done(key.clone()));
    }

    fn forget(&self, key: &ObjectKey) {
        self.requeues.lock().remove(key);
        self.calls.lock().push(QueueCall::Forget(key.clone()));
    }

    fn add_rate_limited(&self, key: ObjectKey) {
        *self.requeues.lock().entry(key.clone()).or_insert(0) += 1;
        self.calls.lock().push(QueueCall::AddRateLimited(key.clone()));
        self.pending.lock().push_back(key);
    }

    fn num_requeues(&self, key: &ObjectKey) -> u32 {
        self.requeues.lock().get(key).copied().unwrap_or(0)
    }
}

/// Indexer over a fixed map, optionally failing every lookup
#[derive(Default)]
pub struct MapIndexer {
    objects: Mutex<HashMap<ObjectKey, Arc<DynamicObject>>>,
    fail_lookups: bool,
}

impl MapIndexer {
    pub fn with_objects(objects: impl IntoIterator<Item = DynamicObject>) -> Self {
        let indexer = Self::default();
        for object in objects {
            indexer.insert(object);
        }
        indexer
    }

    pub fn failing() -> Self {
        Self { fail_lookups: true, ..Self::default() }
    }

    pub fn insert(&self, object: DynamicObject) {
        self.objects.lock().insert(object.key(), Arc::new(object));
    }

    pub fn stored(&self, key: &str) -> Option<Arc<DynamicObject>> {
        self.objects.lock().get(&ObjectKey::new(key)).cloned()
    }
}

#[async_trait]
impl Indexer for MapIndexer {
    async fn get_by_key(&self, key: &ObjectKey) -> DomainResult<Option<Arc<DynamicObject>>> {
        if self.fail_lookups {
            return Err(DomainError::Cache("informer store unavailable".into()));
        }
        Ok(self.objects.lock().get(key).cloned())
    }
}

/// Per-call behaviour of [`ScriptedHandler`]
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Succeed,
    Fail,
    Panic,
}

/// Handler that follows a script of outcomes, then repeats `fallback`
///
/// Every event's object is mutated before the outcome is applied, so tests
/// can check the cache never sees handler writes.
pub struct ScriptedHandler {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
    events: Mutex<Vec<Event>>,
}

impl ScriptedHandler {
    pub fn new(script: impl IntoIterator<Item = Step>, fallback: Step) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            calls: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn always(step: Step) -> Self {
        Self::new([], step)
    }

    /// Fail the first `failures` calls, succeed afterwards
    pub fn failing_times(failures: usize) -> Self {
        Self::new(std::iter::repeat(Step::Fail).take(failures), Step::Succeed)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl Handler for ScriptedHandler {
    async fn handle(&self, _ctx: &SyncContext, mut event: Event) -> DomainResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(object) = event.object.as_mut() {
            object.data.insert("status".to_string(), json!({ "handledBy": call }));
        }
        self.events.lock().push(event);

        let step = self.script.lock().pop_front().unwrap_or(self.fallback);
        match step {
            Step::Succeed => Ok(()),
            Step::Fail => Err(DomainError::handler(format!("call {call} failed"))),
            Step::Panic => panic!("handler panicked on call {call}"),
        }
    }
}

pub fn config_map(namespace: &str, name: &str) -> DynamicObject {
    DynamicObject::new("v1", "ConfigMap", ObjectMeta::namespaced(namespace, name))
        .with_field("data", json!({ "color": "blue" }))
}
