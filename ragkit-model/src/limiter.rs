//! Global concurrency cap shared by embedding and generation calls.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Caps the number of backend calls in flight across every clone.
///
/// A permit is held only for the duration of a single call, never across
/// a retry backoff sleep, so waiting callers make progress while another
/// caller is backing off.
#[derive(Debug, Clone)]
pub struct CallLimiter {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl CallLimiter {
    /// Create a limiter that allows `max_concurrent` calls at once (minimum 1).
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self { permits: Arc::new(Semaphore::new(max_concurrent)), max_concurrent }
    }

    /// A limiter that lets a single call through at a time.
    pub fn sequential() -> Self {
        Self::new(1)
    }

    /// The configured cap.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of permits currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run one backend call while holding a permit.
    pub async fn run<T, Fut>(&self, call: Fut) -> T
    where
        Fut: Future<Output = T>,
    {
        // The semaphore is never closed, so acquire cannot fail.
        let _permit = self.permits.acquire().await.ok();
        call.await
    }
}

impl Default for CallLimiter {
    fn default() -> Self {
        Self::new(4)
    }
}
