//! Retry and rate-limit decorator for any [`StructuredLlm`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::limiter::CallLimiter;
use crate::llm::{StructuredLlm, StructuredRequest};
use crate::retry::{RetryPolicy, with_retry};

/// Wraps a backend so every call respects a shared [`CallLimiter`] and is
/// retried under a [`RetryPolicy`].
///
/// Schema violations are permanent and are never retried.
pub struct ResilientLlm {
    inner: Arc<dyn StructuredLlm>,
    policy: RetryPolicy,
    limiter: CallLimiter,
}

impl ResilientLlm {
    /// Wrap `inner` with the given policy and limiter.
    pub fn new(inner: Arc<dyn StructuredLlm>, policy: RetryPolicy, limiter: CallLimiter) -> Self {
        Self { inner, policy, limiter }
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &Arc<dyn StructuredLlm> {
        &self.inner
    }
}

#[async_trait]
impl StructuredLlm for ResilientLlm {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate_structured(&self, request: StructuredRequest) -> Result<Value> {
        let operation = format!("generate '{}'", request.schema.name());
        with_retry(&self.policy, &operation, || {
            let request = request.clone();
            async move { self.limiter.run(self.inner.generate_structured(request)).await }
        })
        .await
    }
}
