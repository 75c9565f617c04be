//! The provider traits -- the adapter interface for hosted model APIs.
//!
//! Both traits are object-safe so pipelines can hold `Arc<dyn ...>` and
//! tests can substitute scripted implementations.

use async_trait::async_trait;

use super::LlmError;
use super::types::CompletionRequest;

/// A hosted chat-completion API.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short provider name for logs (e.g. "openai").
    fn name(&self) -> &str;

    /// Send the request and return the model's raw text reply.
    ///
    /// The reply is not parsed here; callers own the defensive JSON handling.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// A hosted text-to-image API.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one illustration for `prompt` and return a URL the browser
    /// can display directly (normally a `data:image/png;base64,` URI).
    async fn generate_image(&self, prompt: &str) -> Result<String, LlmError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn CompletionProvider, _: &dyn ImageGenerator) {}
};
