//! Simulation backend over any [`TextGenerator`]

use async_trait::async_trait;
use decoysh::{BackendError, FileSystemNode, SimulationBackend, SimulationResponse};

use crate::prompt::{FsGenOptions, generate_fs_prompt, simulate_prompt};
use crate::provider::TextGenerator;
use crate::validate::{parse_filesystem, parse_simulation};

/// Prompts a model to play terminal and validates what comes back.
pub struct LlmBackend<G> {
    generator: G,
}

impl<G: TextGenerator> LlmBackend<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Ask the model for a snapshot tree.
    ///
    /// Never fails: a transport error or an invalid tree yields an empty
    /// root directory named after the last segment of `target_dir`.
    pub async fn generate_filesystem(&self, opts: &FsGenOptions) -> FileSystemNode {
        let prompt = generate_fs_prompt(opts);
        let parsed = match self.generator.generate(&prompt).await {
            Ok(text) => parse_filesystem(&text),
            Err(e) => Err(e),
        };
        match parsed {
            Ok(root) => root,
            Err(e) => {
                tracing::warn!(
                    backend = self.generator.name(),
                    error = %e,
                    "filesystem generation failed, using empty root"
                );
                let name = opts
                    .target_dir
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .filter(|n| !n.is_empty())
                    .unwrap_or("user");
                FileSystemNode::empty_root(name)
            }
        }
    }
}

#[async_trait]
impl<G: TextGenerator> SimulationBackend for LlmBackend<G> {
    async fn simulate_command(
        &self,
        command: &str,
        fs: &FileSystemNode,
        history: &[String],
    ) -> Result<SimulationResponse, BackendError> {
        let prompt = simulate_prompt(command, fs, history)?;
        let text = self.generator.generate(&prompt).await?;
        parse_simulation(&text).inspect_err(|e| {
            tracing::debug!(
                backend = self.generator.name(),
                model = self.generator.model(),
                error = %e,
                "model output rejected"
            );
        })
    }

    fn name(&self) -> &str {
        self.generator.name()
    }
}
