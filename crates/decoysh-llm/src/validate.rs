//! Model output parsing and schema validation
//!
//! Models are told to answer with JSON only, but often wrap it in prose or
//! code fences. The first `{` through the last `}` is tried when the whole
//! text does not parse. The result must then match a strict schema: unknown
//! keys and wrong types are rejected, never patched up.

use decoysh::{BackendError, FileSystemNode, NodeKind, SimulationResponse};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Wire shape of a simulated command result.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireResponse {
    stdout: String,
    exit_code: i64,
    #[serde(default)]
    stderr: String,
    #[serde(default)]
    explanation: String,
}

/// Wire shape of a snapshot node.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireNode {
    #[serde(rename = "type")]
    kind: NodeKind,
    name: String,
    #[serde(default)]
    children: Vec<WireNode>,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    content_summary: Option<String>,
}

impl From<WireNode> for FileSystemNode {
    fn from(wire: WireNode) -> Self {
        let node = match wire.kind {
            NodeKind::File => FileSystemNode::file(wire.name, wire.size),
            NodeKind::Dir => FileSystemNode::dir(
                wire.name,
                wire.children.into_iter().map(FileSystemNode::from).collect(),
            ),
        };
        match wire.content_summary {
            Some(summary) => node.with_summary(summary),
            None => node,
        }
    }
}

/// Parse `text` as `T`, falling back to the outermost braces.
fn extract<T: DeserializeOwned>(text: &str) -> Result<T, BackendError> {
    if text.trim().is_empty() {
        return Err(BackendError::InvalidResponse("empty model output".to_string()));
    }
    if let Ok(value) = serde_json::from_str::<T>(text) {
        return Ok(value);
    }
    let (start, end) = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => (start, end),
        _ => {
            return Err(BackendError::InvalidResponse(
                "no JSON object in model output".to_string(),
            ));
        }
    };
    serde_json::from_str(&text[start..=end])
        .map_err(|e| BackendError::InvalidResponse(format!("schema validation failed: {}", e)))
}

/// Validate a simulated command result.
pub fn parse_simulation(text: &str) -> Result<SimulationResponse, BackendError> {
    let wire: WireResponse = extract(text)?;
    Ok(SimulationResponse {
        stdout: wire.stdout,
        stderr: wire.stderr,
        exit_code: wire.exit_code,
        explanation: wire.explanation,
    })
}

/// Validate a generated snapshot tree.
pub fn parse_filesystem(text: &str) -> Result<FileSystemNode, BackendError> {
    let wire: WireNode = extract(text)?;
    Ok(FileSystemNode::from(wire).normalized())
}
