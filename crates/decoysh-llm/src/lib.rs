//! Language-model simulation backends for decoysh
//!
//! Two providers are supported: any OpenAI-compatible chat completions
//! endpoint and Google Gemini. Both are wrapped by [`LlmBackend`], which
//! owns the prompts and rejects model output that does not match the
//! response schema.
//!
//! # Example
//!
//! ```rust,no_run
//! use decoysh::{Router, ScenarioLocator};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), decoysh::BackendError> {
//! // reads OPENAI_API_KEY / OPENAI_MODEL / OPENAI_BASE_URL
//! let backend = decoysh_llm::create_backend("openai", None)?;
//! let router = Router::new(ScenarioLocator::new("scenarios")).with_backend(Arc::new(backend));
//! # Ok(())
//! # }
//! ```

mod backend;
mod http;
pub mod prompt;
pub mod provider;
pub mod validate;

pub use backend::LlmBackend;
pub use prompt::FsGenOptions;
pub use provider::{
    GeminiGenerator, OpenAiCompatGenerator, ProviderKind, TextGenerator, create_generator,
};

use decoysh::BackendError;

/// Backend over a provider chosen at runtime.
pub type DynBackend = LlmBackend<Box<dyn TextGenerator>>;

/// Create a backend from kind + optional model override.
///
/// Kinds: `openai`, `openai-compat`, `anyscale`, `gemini`, `google`,
/// `google-gemini`.
pub fn create_backend(kind: &str, model: Option<&str>) -> Result<DynBackend, BackendError> {
    let generator = create_generator(kind, model)?;
    tracing::info!(kind, model = generator.model(), "simulation backend ready");
    Ok(LlmBackend::new(generator))
}
