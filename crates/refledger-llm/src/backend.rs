//! Model backend trait and the OpenAI-compatible HTTP implementation.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::json;

use crate::LlmError;

/// A language-model backend that completes a prompt to text.
pub trait ModelBackend: Send + Sync {
    /// The canonical name of this backend (e.g., "openai").
    fn name(&self) -> &str;

    /// Complete `prompt` to raw model output text.
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>>;
}

/// Chat-completions backend for OpenAI-compatible endpoints.
pub struct OpenAiBackend {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl OpenAiBackend {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: "https://api.openai.com/v1".into(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

impl ModelBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn complete<'a>(
        &'a self,
        prompt: &'a str,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
            let body = json!({
                "model": self.model,
                "temperature": 0,
                "messages": [{"role": "user", "content": prompt}],
            });

            let resp = client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| LlmError::Http(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(LlmError::Backend(format!("HTTP {status}")));
            }

            let data: serde_json::Value =
                resp.json().await.map_err(|e| LlmError::Http(e.to_string()))?;
            let content = data["choices"][0]["message"]["content"]
                .as_str()
                .ok_or_else(|| LlmError::Backend("response missing message content".into()))?;

            Ok(content.to_string())
        })
    }
}
