// Work queue port backed by the common rate-limited queue

use async_trait::async_trait;
use syncloop_common::sync::RateLimitedQueue;
use syncloop_domain::ObjectKey;

use super::ports::WorkQueue;

#[async_trait]
impl WorkQueue for RateLimitedQueue<ObjectKey> {
    async fn get(&self) -> Option<ObjectKey> {
        RateLimitedQueue::get(self).await
    }

    fn done(&self, key: &ObjectKey) {
        RateLimitedQueue::done(self, key);
    }

    fn forget(&self, key: &ObjectKey) {
        RateLimitedQueue::forget(self, key);
    }

    fn add_rate_limited(&self, key: ObjectKey) {
        RateLimitedQueue::add_rate_limited(self, key);
    }

    fn num_requeues(&self, key: &ObjectKey) -> u32 {
        RateLimitedQueue::num_requeues(self, key)
    }
}
