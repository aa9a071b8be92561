//! Client for OpenAI-compatible chat completion endpoints (Groq, OpenAI, vLLM, ...).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{GenerationOptions, LlmProvider, Message, Role};

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

pub struct OpenAiProvider {
    client: reqwest::Client,
    provider_name: String,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("provider_name", &self.provider_name)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl Clone for OpenAiProvider {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            provider_name: self.provider_name.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
        }
    }
}

impl OpenAiProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        provider_name: impl Into<String>,
        api_key: String,
        mut base_url: String,
        model: String,
        max_tokens: u32,
    ) -> Result<Self, LlmError> {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            client: crate::http::default_client()?,
            provider_name: provider_name.into(),
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send_request(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<String, LlmError> {
        let api_messages = convert_messages(messages);
        let body = ChatRequest {
            model: &self.model,
            messages: &api_messages,
            max_tokens: options.max_tokens.unwrap_or(self.max_tokens),
            temperature: options.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(classify_transport_error)?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(LlmError::Unavailable);
        }

        if !status.is_success() {
            tracing::error!(provider = %self.provider_name, "chat API error {status}: {text}");
            return Err(LlmError::Status {
                provider: self.provider_name.clone(),
                status: status.as_u16(),
            });
        }

        let resp: ChatResponse = serde_json::from_str(&text)?;

        if let Some(usage) = resp.usage {
            tracing::debug!(
                provider = %self.provider_name,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "chat API usage"
            );
        }

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyResponse {
                provider: self.provider_name.clone(),
            })
    }
}

fn classify_transport_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else if e.is_connect() {
        tracing::warn!("inference service unreachable: {e}");
        LlmError::Unavailable
    } else {
        LlmError::Http(e)
    }
}

impl LlmProvider for OpenAiProvider {
    async fn chat(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<String, LlmError> {
        self.send_request(messages, options).await
    }

    fn name(&self) -> &str {
        &self.provider_name
    }
}

fn convert_messages(messages: &[Message]) -> Vec<ApiMessage<'_>> {
    messages
        .iter()
        .map(|msg| {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            ApiMessage {
                role,
                content: &msg.content,
            }
        })
        .collect()
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage<'a>],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn provider_for(uri: &str) -> OpenAiProvider {
        OpenAiProvider::new(
            "groq",
            "test-key".into(),
            format!("{uri}/"),
            "llama-3.3-70b-versatile".into(),
            1024,
        )
        .unwrap()
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        })
    }

    #[test]
    fn trailing_slashes_trimmed() {
        let p = provider_for("http://localhost:1234");
        assert_eq!(p.base_url, "http://localhost:1234");
    }

    #[test]
    fn debug_redacts_api_key() {
        let debug = format!("{:?}", provider_for("http://localhost"));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("test-key"));
    }

    #[test]
    fn convert_messages_maps_roles() {
        let msgs = vec![Message::system("rules"), Message::user("question")];
        let api = convert_messages(&msgs);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].role, "user");
        assert_eq!(api[1].content, "question");
    }

    #[test]
    fn request_serializes_temperature() {
        let msgs = [ApiMessage {
            role: "user",
            content: "hi",
        }];
        let body = ChatRequest {
            model: "m",
            messages: &msgs,
            max_tokens: 10,
            temperature: 0.5,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["temperature"], 0.5);
        assert_eq!(json["max_tokens"], 10);
    }

    #[tokio::test]
    async fn chat_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama-3.3-70b-versatile",
                "temperature": 0.0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("It is on [Page 2].")))
            .mount(&server)
            .await;

        let p = provider_for(&server.uri());
        let text = p
            .chat(&[Message::user("where?")], &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(text, "It is on [Page 2].");
    }

    #[tokio::test]
    async fn options_override_max_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"max_tokens": 64})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .mount(&server)
            .await;

        let p = provider_for(&server.uri());
        let opts = GenerationOptions {
            temperature: 0.2,
            max_tokens: Some(64),
        };
        assert_eq!(p.chat(&[Message::user("q")], &opts).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn rate_limit_surfaces_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let p = provider_for(&server.uri());
        let err = p
            .chat(&[Message::user("q")], &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RateLimited));
    }

    #[tokio::test]
    async fn server_error_maps_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&server)
            .await;

        let p = provider_for(&server.uri());
        let err = p
            .chat(&[Message::user("q")], &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_json_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let p = provider_for(&server.uri());
        let err = p
            .chat(&[Message::user("q")], &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Json(_)));
    }

    #[tokio::test]
    async fn null_content_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })))
            .mount(&server)
            .await;

        let p = provider_for(&server.uri());
        let err = p
            .chat(&[Message::user("q")], &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("late"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = crate::http::client_with_timeout(Duration::from_millis(50)).unwrap();
        let p = provider_for(&server.uri()).with_client(client);
        let err = p
            .chat(&[Message::user("q")], &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err:?}");
    }

    #[tokio::test]
    async fn unreachable_host_errors() {
        let p = provider_for("http://127.0.0.1:1");
        let result = p
            .chat(&[Message::user("q")], &GenerationOptions::default())
            .await;
        assert!(result.is_err());
    }
}
