//! Server configuration
//!
//! Loaded from a TOML file; every field has a default so an empty file (or
//! no file at all) gives a working server on port 2323.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use decoysh::{DEFAULT_MAX_LINE_LENGTH, DEFAULT_MAX_OUTPUT, DEFAULT_SCENARIO, Limits};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub paths: PathsSection,
    pub auth: AuthSection,
    pub limits: LimitsSection,
    pub llm: LlmSection,
    /// Config schema version, reported at startup.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            paths: PathsSection::default(),
            auth: AuthSection::default(),
            limits: LimitsSection::default(),
            llm: LlmSection::default(),
            version: decoysh::AUDIT_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub banner: String,
    pub scenario: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 2323,
            banner: "Welcome to mini-telnetd".to_string(),
            scenario: DEFAULT_SCENARIO.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub logs_dir: PathBuf,
    pub tty_dir: PathBuf,
    pub events_file: PathBuf,
    pub scenarios_root: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from("logs"),
            tty_dir: PathBuf::from("logs/tty"),
            events_file: PathBuf::from("logs/events.jsonl"),
            scenarios_root: PathBuf::from("scenarios"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub max_attempts: u32,
    pub fail_delay_secs: f64,
    pub read_timeout_secs: u64,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            fail_delay_secs: 2.0,
            read_timeout_secs: 60,
        }
    }
}

impl AuthSection {
    pub fn fail_delay(&self) -> Duration {
        Duration::from_secs_f64(self.fail_delay_secs.max(0.0))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    pub max_output_bytes: usize,
    pub max_line_length: usize,
    /// Per-call deadline for simulation backends; unset means none.
    pub backend_timeout_secs: Option<u64>,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            backend_timeout_secs: None,
        }
    }
}

impl LimitsSection {
    pub fn to_limits(&self) -> Limits {
        let limits = Limits::new()
            .max_output(self.max_output_bytes)
            .max_line_length(self.max_line_length);
        match self.backend_timeout_secs {
            Some(secs) => limits.backend_timeout(Duration::from_secs(secs)),
            None => limits,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub primary: Option<BackendSection>,
    pub secondary: Option<BackendSection>,
    /// Query primary and secondary together and keep the better answer.
    pub ensemble: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendSection {
    /// `openai`, `openai-compat`, `anyscale`, `gemini`, `google`, `google-gemini`
    pub kind: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl ServerConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config: {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: ServerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.limits.max_output_bytes == 0 {
            anyhow::bail!("limits.max_output_bytes must be positive");
        }
        if self.limits.max_line_length == 0 {
            anyhow::bail!("limits.max_line_length must be positive");
        }
        if self.auth.max_attempts == 0 {
            anyhow::bail!("auth.max_attempts must be positive");
        }
        if self.llm.ensemble && (self.llm.primary.is_none() || self.llm.secondary.is_none()) {
            anyhow::bail!("llm.ensemble needs both llm.primary and llm.secondary");
        }
        Ok(())
    }
}
