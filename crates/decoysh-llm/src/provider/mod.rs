// Provider abstraction for text generation APIs
// Each provider turns one prompt into the model's raw text; parsing and
// validation happen in the backend, once, for every provider.

pub mod gemini;
pub mod openai;

use std::str::FromStr;

use async_trait::async_trait;
use decoysh::BackendError;

pub use gemini::GeminiGenerator;
pub use openai::OpenAiCompatGenerator;

/// Something that completes a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Raw model output for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, BackendError>;

    fn name(&self) -> &str;
    fn model(&self) -> &str;
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Box<T> {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        (**self).generate(prompt).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn model(&self) -> &str {
        (**self).model()
    }
}

/// Supported provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Any endpoint speaking the OpenAI chat completions API.
    OpenAiCompat,
    /// Google Gemini.
    Gemini,
}

impl FromStr for ProviderKind {
    type Err = BackendError;

    fn from_str(kind: &str) -> Result<Self, Self::Err> {
        match kind.to_ascii_lowercase().as_str() {
            "openai" | "openai-compat" | "anyscale" => Ok(Self::OpenAiCompat),
            "gemini" | "google" | "google-gemini" => Ok(Self::Gemini),
            other => Err(BackendError::Config(format!(
                "unknown llm kind: '{}'. Use 'openai' or 'gemini'",
                other
            ))),
        }
    }
}

/// Create a generator from kind + optional model override.
///
/// Credentials and defaults come from the environment.
pub fn create_generator(kind: &str, model: Option<&str>) -> Result<Box<dyn TextGenerator>, BackendError> {
    match kind.parse::<ProviderKind>()? {
        ProviderKind::OpenAiCompat => Ok(Box::new(OpenAiCompatGenerator::from_env(model)?)),
        ProviderKind::Gemini => Ok(Box::new(GeminiGenerator::from_env(model)?)),
    }
}

/// Read a non-empty environment variable.
pub(crate) fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_aliases() {
        for kind in ["openai", "OpenAI-Compat", "anyscale"] {
            assert_eq!(kind.parse::<ProviderKind>().unwrap(), ProviderKind::OpenAiCompat);
        }
        for kind in ["gemini", "google", "google-gemini"] {
            assert_eq!(kind.parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        }
    }

    #[test]
    fn test_unknown_kind() {
        let err = "claude".parse::<ProviderKind>().unwrap_err();
        assert!(matches!(err, BackendError::Config(msg) if msg.contains("claude")));
        assert!(create_generator("bogus", None).is_err());
    }
}
