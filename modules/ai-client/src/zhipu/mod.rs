//! Zhipu GLM provider.
//!
//! The BigModel open platform speaks the OpenAI chat-completions protocol,
//! so this wraps [`OpenAi`] with the GLM endpoint. GLM honors
//! `response_format: json_object` (see [`ChatOptions::json_mode`]) but not
//! strict JSON schemas, so callers parse replies leniently.

use async_trait::async_trait;

use crate::error::Result;
use crate::openai::OpenAi;
use crate::traits::{ChatModel, ChatOptions, Message};

pub const ZHIPU_API_URL: &str = "https://open.bigmodel.cn/api/paas/v4";
pub const DEFAULT_MODEL: &str = "glm-4-flash";

#[derive(Clone)]
pub struct Zhipu {
    inner: OpenAi,
}

impl Zhipu {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            inner: OpenAi::new(api_key, model).with_base_url(ZHIPU_API_URL),
        }
    }

    /// Point at a different OpenAI-compatible host (proxy, self-hosted GLM).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.inner = self.inner.with_base_url(url);
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.inner = self.inner.with_http_client(http);
        self
    }

    pub fn base_url(&self) -> &str {
        self.inner.base_url()
    }
}

#[async_trait]
impl ChatModel for Zhipu {
    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<String> {
        self.inner.chat(messages, options).await
    }
}
