//! Snapshot tree nodes
//!
//! The on-disk and model-generated format is:
//!
//! ```json
//! {"type": "dir", "name": "user", "children": [
//!     {"type": "file", "name": "README.txt", "size": 10,
//!      "content_summary": "welcome text"}
//! ]}
//! ```
//!
//! Decoding is lenient per entry: an unknown `type` reads as a file, a
//! missing or non-string `name` reads as empty (and is later dropped), and
//! a `size` that is not a non-negative integer reads as zero. Only a root
//! that is not a JSON object is rejected.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Type of a snapshot node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Regular file
    #[default]
    File,
    /// Directory
    Dir,
}

/// One file or directory in a scenario snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSystemNode {
    /// Entry name (basename).
    pub name: String,

    /// File or directory.
    #[serde(rename = "type")]
    pub kind: NodeKind,

    /// Size in bytes. Files only.
    #[serde(skip_serializing_if = "is_zero")]
    pub size: u64,

    /// Children in source order. Directories only.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Arc<FileSystemNode>>,

    /// Free-text description of the contents. Never interpreted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_summary: Option<String>,
}

fn is_zero(size: &u64) -> bool {
    *size == 0
}

impl<'de> Deserialize<'de> for FileSystemNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if !value.is_object() {
            return Err(D::Error::custom("snapshot node must be a JSON object"));
        }
        Ok(Self::from_value(&value))
    }
}

impl FileSystemNode {
    /// Create a file node.
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File,
            size,
            children: Vec::new(),
            content_summary: None,
        }
    }

    /// Create a directory node.
    pub fn dir(name: impl Into<String>, children: Vec<FileSystemNode>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Dir,
            size: 0,
            children: children.into_iter().map(Arc::new).collect(),
            content_summary: None,
        }
    }

    /// Attach a content summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.content_summary = Some(summary.into());
        self
    }

    /// Build a node from arbitrary JSON, tolerating malformed fields.
    ///
    /// Anything that is not an object becomes a nameless file.
    fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::file("", 0);
        };
        let kind = match obj.get("type").and_then(Value::as_str) {
            Some("dir") => NodeKind::Dir,
            _ => NodeKind::File,
        };
        let children = obj
            .get("children")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| Arc::new(Self::from_value(item)))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: obj
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            kind,
            size: obj.get("size").and_then(Value::as_u64).unwrap_or(0),
            children,
            content_summary: obj
                .get("content_summary")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    /// Empty directory used when a scenario ships no snapshot.
    pub fn empty_root(name: impl Into<String>) -> Self {
        Self::dir(name, Vec::new())
    }

    /// Check if this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Dir
    }

    /// Check if this node is a file.
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Parse a snapshot from JSON and normalize it.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let node: FileSystemNode = serde_json::from_str(text)?;
        Ok(node.normalized())
    }

    /// Enforce the tree invariants on data from an untrusted source.
    ///
    /// Files lose any children, nameless children are dropped, and of
    /// several siblings sharing a name only the first is kept. Never fails.
    pub fn normalized(self) -> Self {
        let FileSystemNode {
            name,
            kind,
            size,
            children,
            content_summary,
        } = self;

        let children = match kind {
            NodeKind::File => Vec::new(),
            NodeKind::Dir => {
                let mut seen = HashSet::new();
                children
                    .into_iter()
                    .filter(|child| !child.name.is_empty())
                    .filter(|child| seen.insert(child.name.clone()))
                    .map(|child| {
                        let owned = Arc::try_unwrap(child).unwrap_or_else(|arc| (*arc).clone());
                        Arc::new(owned.normalized())
                    })
                    .collect()
            }
        };

        Self {
            name,
            kind,
            size: if kind == NodeKind::Dir { 0 } else { size },
            children,
            content_summary,
        }
    }
}
