//! Google Gemini `generateContent` adapter.
//!
//! Gemini has no system role in `contents`; system messages are folded into
//! `systemInstruction` and every other message becomes a user turn.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use super::LlmError;
use super::openai::{build_client, error_for_status};
use super::trait_def::CompletionProvider;
use super::types::{CompletionRequest, ContentPart, Role, bare_base64};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    api_key: String,
    model: String,
    endpoint: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(
        api_key: &str,
        model: Option<&str>,
        endpoint: Option<&str>,
    ) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey("gemini"));
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

    fn request_body(request: &CompletionRequest) -> Value {
        let mut system = Vec::new();
        let mut parts = Vec::new();

        for message in &request.messages {
            if message.role == Role::System {
                system.push(message.text());
                continue;
            }
            for part in &message.content {
                parts.push(match part {
                    ContentPart::Text(text) => json!({ "text": text }),
                    ContentPart::File { data, .. } => json!({
                        "inlineData": {
                            "mimeType": "application/pdf",
                            "data": bare_base64(data),
                        }
                    }),
                });
            }
        }

        let mut body = json!({
            "contents": [{ "role": "user", "parts": parts }],
        });
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system.join("\n\n") }] });
        }
        if request.json_mode {
            body["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        tracing::info!(
            model = %self.model,
            json_mode = request.json_mode,
            prompt_chars = request.prompt_chars(),
            "sending generateContent"
        );

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.endpoint, self.model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::request_body(request))
            .send()
            .await?;
        let response = error_for_status("gemini", response).await?;
        let parsed: GenerateResponse = response.json().await?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse("gemini"));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::Message;

    #[test]
    fn system_messages_become_system_instruction() {
        let request = CompletionRequest::json(vec![
            Message::system("You are a tutor."),
            Message::user_parts(vec![
                ContentPart::pdf("a.pdf", "data:application/pdf;base64,JVBERi0="),
                ContentPart::text("Outline this."),
            ]),
        ]);
        let body = GeminiProvider::request_body(&request);

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You are a tutor.");
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(parts[0]["inlineData"]["data"], "JVBERi0=");
        assert_eq!(parts[1]["text"], "Outline this.");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[tokio::test]
    async fn complete_joins_candidate_parts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-test:generateContent")
            .match_query(mockito::Matcher::UrlEncoded("key".into(), "g-key".into()))
            .with_status(200)
            .with_body(
                r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}}]}"#,
            )
            .create_async()
            .await;

        let provider =
            GeminiProvider::new("g-key", Some("gemini-test"), Some(&server.url())).unwrap();
        let reply = provider
            .complete(&CompletionRequest::json(vec![Message::user("hi")]))
            .await
            .unwrap();
        assert_eq!(reply, r#"{"a":1}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn no_candidates_is_empty_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"candidates":[]}"#)
            .create_async()
            .await;

        let provider = GeminiProvider::new("g-key", None, Some(&server.url())).unwrap();
        let err = provider
            .complete(&CompletionRequest::json(vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse("gemini")));
    }
}
