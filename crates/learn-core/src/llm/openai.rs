//! OpenAI chat-completions and image-generation adapters.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use super::LlmError;
use super::trait_def::{CompletionProvider, ImageGenerator};
use super::types::{CompletionRequest, ContentPart, Message, bare_base64};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_IMAGE_MODEL: &str = "gpt-image-1.5";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub(super) fn build_client() -> Result<Client, LlmError> {
    Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// Chat completions against `{endpoint}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    endpoint: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(
        api_key: &str,
        model: Option<&str>,
        endpoint: Option<&str>,
    ) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey("openai"));
        }
        Ok(Self {
            api_key: api_key.to_owned(),
            model: model.unwrap_or(DEFAULT_MODEL).to_owned(),
            endpoint: endpoint
                .unwrap_or(DEFAULT_ENDPOINT)
                .trim_end_matches('/')
                .to_owned(),
            client: build_client()?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the JSON body for a completion request.
    fn request_body(&self, request: &CompletionRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(message_json).collect();
        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if request.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

/// Plain-text messages go out as a string; anything with a file part uses
/// the content-array form.
fn message_json(message: &Message) -> Value {
    if !message.has_file() {
        return json!({ "role": message.role.as_str(), "content": message.text() });
    }

    let parts: Vec<Value> = message
        .content
        .iter()
        .map(|part| match part {
            ContentPart::Text(text) => json!({ "type": "text", "text": text }),
            ContentPart::File { filename, data } => json!({
                "type": "file",
                "file": {
                    "filename": filename,
                    "file_data": format!("data:application/pdf;base64,{}", bare_base64(data)),
                }
            }),
        })
        .collect();
    json!({ "role": message.role.as_str(), "content": parts })
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub(super) async fn error_for_status(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LlmError::Api {
        provider,
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        tracing::info!(
            model = %self.model,
            json_mode = request.json_mode,
            prompt_chars = request.prompt_chars(),
            "sending chat completion"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request))
            .send()
            .await?;
        let response = error_for_status("openai", response).await?;
        let parsed: ChatResponse = response.json().await?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse("openai"));
        }
        tracing::debug!(reply_chars = content.len(), "chat completion received");
        Ok(content)
    }
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// Wrap a learner-facing concept in the house illustration style.
pub fn illustration_prompt(concept: &str) -> String {
    format!(
        "A clear, educational diagram or illustration explaining: {concept}. \
         Simple, modern flat style, white background, high quality."
    )
}

/// Image generation against `{endpoint}/images/generations`.
#[derive(Debug, Clone)]
pub struct OpenAiImageGenerator {
    api_key: String,
    model: String,
    endpoint: String,
    client: Client,
}

impl OpenAiImageGenerator {
    pub fn new(api_key: &str, endpoint: Option<&str>) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey("openai images"));
        }
        Ok(Self {
            api_key: api_key.to_owned(),
            model: DEFAULT_IMAGE_MODEL.to_owned(),
            endpoint: endpoint
                .unwrap_or(DEFAULT_ENDPOINT)
                .trim_end_matches('/')
                .to_owned(),
            client: build_client()?,
        })
    }

    /// Download a hosted image and inline it. Falls back to the hosted URL
    /// if the download fails.
    async fn inline_url(&self, url: &str) -> String {
        let fetched = async {
            let response = self.client.get(url).send().await?.error_for_status()?;
            response.bytes().await
        }
        .await;

        match fetched {
            Ok(bytes) => format!("data:image/png;base64,{}", STANDARD.encode(&bytes)),
            Err(e) => {
                tracing::warn!(error = %e, "failed to inline generated image, using hosted URL");
                url.to_owned()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
    url: Option<String>,
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    async fn generate_image(&self, prompt: &str) -> Result<String, LlmError> {
        if prompt.trim().is_empty() {
            return Err(LlmError::Other("image prompt is empty".to_owned()));
        }
        tracing::info!(model = %self.model, prompt_chars = prompt.len(), "generating illustration");

        let body = json!({
            "model": self.model,
            "prompt": illustration_prompt(prompt),
            "n": 1,
            "size": "1024x1024",
            "quality": "medium",
        });
        let response = self
            .client
            .post(format!("{}/images/generations", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = error_for_status("openai images", response).await?;
        let parsed: ImageResponse = response.json().await?;

        let Some(datum) = parsed.data.into_iter().next() else {
            return Err(LlmError::EmptyResponse("openai images"));
        };
        match (datum.b64_json, datum.url) {
            (Some(b64), _) if !b64.is_empty() => Ok(format!("data:image/png;base64,{b64}")),
            (_, Some(url)) if !url.is_empty() => Ok(self.inline_url(&url).await),
            _ => Err(LlmError::EmptyResponse("openai images")),
        }
    }
}
