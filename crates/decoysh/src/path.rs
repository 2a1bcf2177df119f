//! Path resolution inside the root boundary
//!
//! Every session path lives under [`ROOT_PATH`]. Resolution is pure path
//! algebra: it never consults a filesystem, so callers check existence
//! against the [`VirtualFileSystem`](crate::fs::VirtualFileSystem) index.

use std::fmt;
use thiserror::Error;

/// Segments of the root boundary.
pub const ROOT_SEGMENTS: [&str; 2] = ["home", "user"];

/// The root boundary as an absolute path.
pub const ROOT_PATH: &str = "/home/user";

/// Path resolution failure.
///
/// Callers present this as "No such file or directory".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The path resolves outside the root boundary.
    #[error("{0}: outside root boundary")]
    OutsideRoot(String),
}

/// An absolute, normalized path known to be inside the root boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    segments: Vec<String>,
}

impl ResolvedPath {
    /// The root boundary itself.
    pub fn root() -> Self {
        Self {
            segments: ROOT_SEGMENTS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// All segments, root boundary included.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Segments below the root boundary; the snapshot index key.
    pub fn relative(&self) -> &[String] {
        &self.segments[ROOT_SEGMENTS.len()..]
    }

    /// True when this is the root boundary.
    pub fn is_root(&self) -> bool {
        self.segments.len() == ROOT_SEGMENTS.len()
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

fn has_root_prefix(segments: &[String]) -> bool {
    segments.len() >= ROOT_SEGMENTS.len()
        && segments
            .iter()
            .zip(ROOT_SEGMENTS.iter())
            .all(|(seg, root)| seg == root)
}

/// Resolve `target` against `cwd`.
///
/// Absolute targets ignore `cwd`; `..` may climb freely but the result
/// must still sit under the root boundary. Relative targets start from
/// `cwd` (or the root, if `cwd` is somehow outside it) and `..` stops at
/// the boundary instead of failing.
///
/// # Example
///
/// ```rust
/// use decoysh::path::resolve;
///
/// let p = resolve("/home/user", "logs/./../bin").unwrap();
/// assert_eq!(p.to_string(), "/home/user/bin");
///
/// let p = resolve("/home/user", "../../..").unwrap();
/// assert_eq!(p.to_string(), "/home/user");
///
/// assert!(resolve("/home/user", "/etc").is_err());
/// ```
pub fn resolve(cwd: &str, target: &str) -> Result<ResolvedPath, PathError> {
    let target = target.trim();

    if target.starts_with('/') {
        let mut segments: Vec<String> = Vec::new();
        for entry in target.split('/') {
            match entry {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                name => segments.push(name.to_string()),
            }
        }
        if !has_root_prefix(&segments) {
            return Err(PathError::OutsideRoot(target.to_string()));
        }
        return Ok(ResolvedPath { segments });
    }

    let mut segments: Vec<String> = cwd
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if !has_root_prefix(&segments) {
        segments = ResolvedPath::root().segments;
    }

    for entry in target.split('/') {
        match entry {
            "" | "." => {}
            ".." => {
                if segments.len() > ROOT_SEGMENTS.len() {
                    segments.pop();
                }
            }
            name => segments.push(name.to_string()),
        }
    }
    Ok(ResolvedPath { segments })
}
