//! Scenario asset lookup
//!
//! Layout under the scenarios root:
//!
//! ```text
//! <root>/<scenario>/txtcmds/<name>.txt   canned command output
//! <root>/<scenario>/fs.json              filesystem snapshot
//! ```
//!
//! Every lookup tries the requested scenario first and then
//! [`DEFAULT_SCENARIO`]. A missing or unreadable file is a normal
//! condition: the caller gets `None` and moves on to the next layer.

use std::path::{Path, PathBuf};

use crate::fs::FileSystemNode;

/// Scenario used when a session names none, and the fallback for every lookup.
pub const DEFAULT_SCENARIO: &str = "default";

const TXTCMDS_DIR: &str = "txtcmds";
const SNAPSHOT_FILE: &str = "fs.json";

/// Resolves scenario-scoped canned text and filesystem snapshots.
#[derive(Debug, Clone)]
pub struct ScenarioLocator {
    root: PathBuf,
}

impl ScenarioLocator {
    /// Create a locator over a scenarios directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The scenarios directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(&self, scenario: &str) -> Vec<PathBuf> {
        let mut dirs = Vec::with_capacity(2);
        if is_safe_name(scenario) && scenario != DEFAULT_SCENARIO {
            dirs.push(self.root.join(scenario));
        }
        dirs.push(self.root.join(DEFAULT_SCENARIO));
        dirs
    }

    /// Path of the first existing canned text file for `name`.
    pub async fn canned_text_path(&self, scenario: &str, name: &str) -> Option<PathBuf> {
        if !is_safe_name(name) {
            return None;
        }
        let file = format!("{}.txt", name);
        for dir in self.candidates(scenario) {
            let path = dir.join(TXTCMDS_DIR).join(&file);
            if matches!(tokio::fs::try_exists(&path).await, Ok(true)) {
                return Some(path);
            }
        }
        None
    }

    /// Contents of the canned text file for `name`.
    ///
    /// A file that exists but cannot be read as UTF-8 counts as empty,
    /// not as missing: the command is known to this scenario.
    pub async fn read_canned_text(&self, scenario: &str, name: &str) -> Option<String> {
        let path = self.canned_text_path(scenario, name).await?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "canned text unreadable");
                Some(String::new())
            }
        }
    }

    /// Parsed and normalized snapshot for `scenario`.
    ///
    /// Unreadable files and invalid JSON fall through to the next candidate.
    pub async fn load_snapshot(&self, scenario: &str) -> Option<FileSystemNode> {
        for dir in self.candidates(scenario) {
            let path = dir.join(SNAPSHOT_FILE);
            let text = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(_) => continue,
            };
            match FileSystemNode::from_json(&text) {
                Ok(node) => return Some(node),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "invalid snapshot");
                }
            }
        }
        None
    }
}

/// Reject names that could leave the asset tree. Command tokens come
/// straight from the remote party.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
