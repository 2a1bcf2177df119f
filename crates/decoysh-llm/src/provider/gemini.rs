// Google Gemini provider
// POST https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent
// Auth via x-goog-api-key header

use async_trait::async_trait;
use decoysh::BackendError;

use super::{TextGenerator, env_var};
use crate::http;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used when neither the caller nor `GEMINI_MODEL` names one.
pub const DEFAULT_MODEL: &str = "gemini-1.0";

pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, BackendError> {
        Ok(Self {
            client: http::client()?,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Create from `GOOGLE_API_KEY` and `GEMINI_MODEL`.
    pub fn from_env(model: Option<&str>) -> Result<Self, BackendError> {
        let api_key = env_var("GOOGLE_API_KEY")
            .ok_or_else(|| BackendError::Config("GOOGLE_API_KEY env var not set".to_string()))?;
        let model = model
            .map(str::to_string)
            .or_else(|| env_var("GEMINI_MODEL"))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Self::new(api_key, model)
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", API_BASE, self.model)
    }

    fn build_request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}]
        })
    }
}

/// Concatenated text parts of the first candidate.
fn parse_response(body: &serde_json::Value) -> Result<String, BackendError> {
    let parts = body["candidates"]
        .as_array()
        .and_then(|c| c.first())
        .and_then(|c| c["content"]["parts"].as_array())
        .ok_or_else(|| BackendError::InvalidResponse("no candidates in response".to_string()))?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.is_empty() {
        return Err(BackendError::InvalidResponse(
            "candidate has no text parts".to_string(),
        ));
    }
    Ok(text)
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let body = self.build_request_body(prompt);
        let url = self.endpoint();
        let resp = http::send_json("gemini", || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .await?;
        parse_response(&resp)
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint() {
        let g = GeminiGenerator::new("k", "gemini-2.0-flash").unwrap();
        assert_eq!(
            g.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_request_body() {
        let g = GeminiGenerator::new("k", DEFAULT_MODEL).unwrap();
        let body = g.build_request_body("ls");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "ls");
    }

    #[test]
    fn test_parse_response_joins_parts() {
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "{\"std"}, {"text": "out\":\"x\"}"}]}}]
        });
        assert_eq!(parse_response(&body).unwrap(), "{\"stdout\":\"x\"}");
    }

    #[test]
    fn test_parse_response_empty() {
        assert!(parse_response(&json!({"candidates": []})).is_err());
        let body = json!({"candidates": [{"content": {"parts": [{"inlineData": {}}]}}]});
        assert!(parse_response(&body).is_err());
    }
}
