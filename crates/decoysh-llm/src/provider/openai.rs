// OpenAI-compatible Chat Completions provider
// POST {base_url}/chat/completions
// Works with OpenAI itself and with compatible gateways (Anyscale, vLLM, ...)

use async_trait::async_trait;
use decoysh::BackendError;

use super::{TextGenerator, env_var};
use crate::http;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiCompatGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatGenerator {
    /// Create a generator. `base_url` defaults to the OpenAI API.
    pub fn new(
        base_url: Option<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, BackendError> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(BackendError::Config("model must be provided".to_string()));
        }
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self {
            client: http::client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model,
        })
    }

    /// Create from `OPENAI_BASE_URL`, `OPENAI_API_KEY` and `OPENAI_MODEL`.
    /// An explicit `model` wins over the environment.
    pub fn from_env(model: Option<&str>) -> Result<Self, BackendError> {
        let api_key = env_var("OPENAI_API_KEY")
            .ok_or_else(|| BackendError::Config("OPENAI_API_KEY env var not set".to_string()))?;
        let model = model
            .map(str::to_string)
            .or_else(|| env_var("OPENAI_MODEL"))
            .ok_or_else(|| BackendError::Config("OPENAI_MODEL env var not set".to_string()))?;
        Self::new(env_var("OPENAI_BASE_URL"), api_key, model)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.0
        })
    }
}

/// Text of the first choice.
fn parse_response(body: &serde_json::Value) -> Result<String, BackendError> {
    let choice = body["choices"]
        .as_array()
        .and_then(|c| c.first())
        .ok_or_else(|| BackendError::InvalidResponse("no choices in response".to_string()))?;
    choice["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| BackendError::InvalidResponse("choice has no text content".to_string()))
}

#[async_trait]
impl TextGenerator for OpenAiCompatGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let body = self.build_request_body(prompt);
        let url = format!("{}/chat/completions", self.base_url);
        let resp = http::send_json("openai", || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;
        parse_response(&resp)
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
