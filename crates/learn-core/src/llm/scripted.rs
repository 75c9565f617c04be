//! In-memory providers that replay canned replies.
//!
//! Used by the pipeline and router tests across the workspace.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::LlmError;
use super::trait_def::{CompletionProvider, ImageGenerator};
use super::types::CompletionRequest;

/// Replays queued replies in order and records every request it saw.
///
/// When the queue runs dry, `complete` returns [`LlmError::EmptyResponse`].
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, String>>>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider pre-loaded with successful replies.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new();
        for reply in replies {
            provider.push_reply(reply);
        }
        provider
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        lock(&self.replies).push_back(Ok(reply.into()));
    }

    /// Queue a transport failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        lock(&self.replies).push_back(Err(message.into()));
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.seen).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.seen).len()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        lock(&self.seen).push(request.clone());
        match lock(&self.replies).pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(LlmError::Other(message)),
            None => Err(LlmError::EmptyResponse("scripted")),
        }
    }
}

/// Image generator that always answers with a fixed URL, or always fails.
#[derive(Debug, Clone)]
pub struct StaticImageGenerator {
    url: Option<String>,
}

impl StaticImageGenerator {
    pub fn returning(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }

    pub fn failing() -> Self {
        Self { url: None }
    }
}

#[async_trait]
impl ImageGenerator for StaticImageGenerator {
    async fn generate_image(&self, prompt: &str) -> Result<String, LlmError> {
        if prompt.trim().is_empty() {
            return Err(LlmError::Other("image prompt is empty".to_owned()));
        }
        self.url
            .clone()
            .ok_or_else(|| LlmError::Other("image generation unavailable".to_owned()))
    }
}
