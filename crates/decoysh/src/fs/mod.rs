//! Scenario filesystem snapshots
//!
//! A snapshot is a JSON tree describing what lives under the root boundary.
//! It is parsed into [`FileSystemNode`]s and indexed once per session by
//! [`VirtualFileSystem`]; nothing ever writes to it afterwards.

mod node;
mod snapshot;

pub use node::{FileSystemNode, NodeKind};
pub use snapshot::VirtualFileSystem;
