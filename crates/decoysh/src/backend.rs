//! Simulation backend interface
//!
//! A backend guesses what a command would print. Implementations usually
//! prompt a language model (see the `decoysh-llm` crate) and must validate
//! the model's output before returning: a malformed answer is a
//! [`BackendError::InvalidResponse`], never a half-filled response.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fs::FileSystemNode;

/// Validated result of one simulated command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResponse {
    /// What the command printed to stdout.
    #[serde(default)]
    pub stdout: String,
    /// What the command printed to stderr.
    #[serde(default)]
    pub stderr: String,
    /// Process exit status.
    #[serde(default)]
    pub exit_code: i64,
    /// The backend's note on its assumptions. Never shown to the remote party.
    #[serde(default)]
    pub explanation: String,
}

impl SimulationResponse {
    /// Successful response with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// Failed response with the given stderr.
    pub fn err(stderr: impl Into<String>, exit_code: i64) -> Self {
        Self {
            stderr: stderr.into(),
            exit_code,
            ..Self::default()
        }
    }

    /// Attach an explanation.
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    /// Terminal text: stdout and stderr joined by a newline when both are
    /// present, otherwise whichever one is, otherwise nothing.
    pub fn format_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
            (false, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (true, true) => String::new(),
        }
    }
}

/// Simulation backend failure. Logged, never shown to the remote party.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Network or connection failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered with an error status.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The model's output failed parsing or schema validation.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The call did not finish within the deadline.
    #[error("timed out")]
    Timeout,

    /// Missing credentials, model name, or similar.
    #[error("backend config error: {0}")]
    Config(String),
}

/// Something that can guess the output of a command.
///
/// Implementations must be cheap to share: the router holds them behind
/// `Arc` and calls them from many sessions at once.
#[async_trait]
pub trait SimulationBackend: Send + Sync {
    /// Simulate `command` against a snapshot and the session's history
    /// (oldest first, including `command` itself).
    async fn simulate_command(
        &self,
        command: &str,
        fs: &FileSystemNode,
        history: &[String],
    ) -> Result<SimulationResponse, BackendError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}
