//! # ragkit-model
//!
//! The model-backend seam for ragkit.
//!
//! ## Overview
//!
//! - [`StructuredLlm`]: "generate structured output from a prompt", the one
//!   language-model capability the RAG pipeline and its evaluators need
//! - [`OutputSchema`]: a compiled JSON Schema every response is validated against
//! - [`RetryPolicy`] / [`with_retry`]: exponential backoff with jitter for
//!   rate limits and other transient failures
//! - [`CallLimiter`]: a global cap on concurrent backend calls
//! - [`ResilientLlm`]: applies both to any backend
//! - [`MockLlm`]: scriptable backend for tests
//! - `openai::OpenAIChatModel`: OpenAI / Azure OpenAI (feature `openai`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragkit_model::{CallLimiter, ResilientLlm, RetryPolicy};
//! use ragkit_model::openai::OpenAIChatModel;
//!
//! let llm = ResilientLlm::new(
//!     Arc::new(OpenAIChatModel::from_env()?),
//!     RetryPolicy::default(),
//!     CallLimiter::new(4),
//! );
//! ```

pub mod error;
pub mod limiter;
pub mod llm;
pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;
pub mod resilient;
pub mod retry;
pub mod schema;

pub use error::{ModelError, Result};
pub use limiter::CallLimiter;
pub use llm::{GenerationConfig, StructuredLlm, StructuredRequest};
pub use mock::MockLlm;
pub use resilient::ResilientLlm;
pub use retry::{RetryPolicy, RetryableError, with_retry};
pub use schema::OutputSchema;
