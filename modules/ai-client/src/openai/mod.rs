mod client;
pub(crate) mod types;

use async_trait::async_trait;

use crate::error::Result;
use crate::traits::{ChatModel, ChatOptions, Message};

pub(crate) use client::OpenAiClient;
use types::{ChatRequest, ResponseFormat, WireMessage};

// =============================================================================
// OpenAi
// =============================================================================

/// Client for OpenAI and any server speaking the same `/chat/completions` API.
#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    pub(crate) model: String,
    base_url: Option<String>,
    http: reqwest::Client,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Share a preconfigured `reqwest::Client` (timeouts, proxies).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(client::OPENAI_API_URL)
    }

    pub(crate) fn client(&self) -> OpenAiClient {
        let client = OpenAiClient::new(&self.api_key).with_http(self.http.clone());
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }

    fn request(&self, messages: &[Message], options: &ChatOptions) -> ChatRequest {
        let mut request = ChatRequest::new(&self.model)
            .messages(messages.iter().map(WireMessage::from))
            .temperature(options.temperature)
            .top_p(options.top_p)
            .max_tokens(options.max_tokens);
        if options.json_mode {
            request = request.response_format(ResponseFormat::json_object());
        }
        request
    }
}

#[async_trait]
impl ChatModel for OpenAi {
    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<String> {
        self.client()
            .chat_text(&self.request(messages, options))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_new() {
        let ai = OpenAi::new("sk-test", "gpt-4o");
        assert_eq!(ai.model, "gpt-4o");
        assert_eq!(ai.api_key, "sk-test");
        assert_eq!(ai.base_url(), "https://api.openai.com/v1");
    }

    #[test]
    fn test_openai_with_base_url() {
        let ai = OpenAi::new("sk-test", "gpt-4o").with_base_url("https://custom.api.com");
        assert_eq!(ai.base_url, Some("https://custom.api.com".to_string()));
    }

    #[test]
    fn json_mode_sets_response_format() {
        let ai = OpenAi::new("sk-test", "gpt-4o");
        let request = ai.request(
            &[Message::user("hi")],
            &ChatOptions::default().json_mode(true),
        );
        let format = request.response_format.expect("json mode");
        assert_eq!(format.format_type, "json_object");
    }
}
