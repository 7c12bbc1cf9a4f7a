//! Scriptable in-process model for tests and demos.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ModelError, Result};
use crate::llm::{StructuredLlm, StructuredRequest};

type Responder = Box<dyn Fn(&StructuredRequest) -> Result<Value> + Send + Sync>;

/// A [`StructuredLlm`] that answers from a closure or a queue of canned values.
///
/// Responses are validated against the request schema exactly like a real
/// backend, so a canned value with the wrong shape surfaces as
/// [`ModelError::SchemaViolation`]. Every request is recorded for later
/// inspection.
pub struct MockLlm {
    name: String,
    responder: Option<Responder>,
    queue: Mutex<VecDeque<Result<Value>>>,
    requests: Mutex<Vec<StructuredRequest>>,
}

impl MockLlm {
    /// Create a mock with an empty response queue.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responder: None,
            queue: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request by calling `responder`.
    pub fn with_responder<F>(name: impl Into<String>, responder: F) -> Self
    where
        F: Fn(&StructuredRequest) -> Result<Value> + Send + Sync + 'static,
    {
        Self { responder: Some(Box::new(responder)), ..Self::new(name) }
    }

    /// Queue a response; queued responses take priority over the responder.
    pub fn push_response(&self, response: Result<Value>) -> &Self {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(response);
        }
        self
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<StructuredRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl StructuredLlm for MockLlm {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_structured(&self, request: StructuredRequest) -> Result<Value> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let queued = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        let value = match (queued, &self.responder) {
            (Some(response), _) => response?,
            (None, Some(responder)) => responder(&request)?,
            (None, None) => {
                return Err(ModelError::Config(format!(
                    "MockLlm '{}' has no response for schema '{}'",
                    self.name,
                    request.schema.name()
                )));
            }
        };

        request.schema.validate(&value)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OutputSchema;
    use serde_json::json;

    fn schema() -> OutputSchema {
        OutputSchema::new(
            "answer",
            json!({
                "type": "object",
                "properties": { "answer": { "type": "string" } },
                "required": ["answer"]
            }),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn queue_then_responder() {
        let llm = MockLlm::with_responder("mock", |_| Ok(json!({"answer": "fallback"})));
        llm.push_response(Ok(json!({"answer": "queued"})));

        let first = llm.generate_structured(StructuredRequest::new("q", schema())).await.unwrap();
        let second = llm.generate_structured(StructuredRequest::new("q", schema())).await.unwrap();

        assert_eq!(first["answer"], "queued");
        assert_eq!(second["answer"], "fallback");
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn wrong_shape_is_a_schema_violation() {
        let llm = MockLlm::new("mock");
        llm.push_response(Ok(json!({"text": "no answer field"})));
        let err = llm.generate_structured(StructuredRequest::new("q", schema())).await.unwrap_err();
        assert!(matches!(err, ModelError::SchemaViolation { .. }));
    }

    #[tokio::test]
    async fn empty_mock_errors() {
        let llm = MockLlm::new("mock");
        assert!(llm.generate_structured(StructuredRequest::new("q", schema())).await.is_err());
    }
}
