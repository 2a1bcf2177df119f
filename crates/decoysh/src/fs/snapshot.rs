//! Indexed, read-only view of a snapshot tree

use std::collections::HashMap;
use std::sync::Arc;

use super::node::FileSystemNode;

/// Read-only filesystem built from one scenario snapshot.
///
/// Every node is reachable in O(1) by its path relative to the root
/// boundary (`/home/user` is the empty path). Nothing can be mutated after
/// [`VirtualFileSystem::build`].
#[derive(Debug, Clone)]
pub struct VirtualFileSystem {
    root: Arc<FileSystemNode>,
    index: HashMap<Vec<String>, Arc<FileSystemNode>>,
}

impl VirtualFileSystem {
    /// Index a tree with a single depth-first traversal.
    ///
    /// Children without a name are skipped along with their subtrees.
    pub fn build(root: FileSystemNode) -> Self {
        let root = Arc::new(root);
        let mut index = HashMap::new();
        let mut stack: Vec<(Vec<String>, Arc<FileSystemNode>)> = vec![(Vec::new(), root.clone())];

        while let Some((path, node)) = stack.pop() {
            if node.is_dir() {
                for child in node.children.iter().rev() {
                    if child.name.is_empty() {
                        continue;
                    }
                    let mut child_path = path.clone();
                    child_path.push(child.name.clone());
                    stack.push((child_path, child.clone()));
                }
            }
            index.entry(path).or_insert(node);
        }

        Self { root, index }
    }

    /// The root node (the directory at the root boundary).
    pub fn root(&self) -> &Arc<FileSystemNode> {
        &self.root
    }

    /// Look up the node at a relative path.
    pub fn get_node(&self, path: &[String]) -> Option<&Arc<FileSystemNode>> {
        self.index.get(path)
    }

    /// Children of the directory at `path`, in source order.
    ///
    /// Returns `None` if the path is missing or names a file.
    pub fn list_children(&self, path: &[String]) -> Option<&[Arc<FileSystemNode>]> {
        let node = self.get_node(path)?;
        if !node.is_dir() {
            return None;
        }
        Some(&node.children)
    }

    /// Number of indexed nodes, root included.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Always false: the root is always indexed.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// All indexed relative paths, in no particular order.
    pub fn paths(&self) -> impl Iterator<Item = &Vec<String>> {
        self.index.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> VirtualFileSystem {
        VirtualFileSystem::build(FileSystemNode::dir(
            "user",
            vec![
                FileSystemNode::file("README.txt", 10),
                FileSystemNode::dir("logs", vec![FileSystemNode::file("system.log", 42)]),
                FileSystemNode::dir("bin", vec![]),
            ],
        ))
    }

    #[test]
    fn test_root_is_empty_path() {
        let vfs = sample();
        let root = vfs.get_node(&[]).unwrap();
        assert!(Arc::ptr_eq(root, vfs.root()));
        assert_eq!(vfs.len(), 5);
    }

    #[test]
    fn test_nested_lookup() {
        let vfs = sample();
        let node = vfs.get_node(&p(&["logs", "system.log"])).unwrap();
        assert_eq!(node.size, 42);
        assert!(vfs.get_node(&p(&["logs", "missing"])).is_none());
    }

    #[test]
    fn test_list_children() {
        let vfs = sample();
        let names: Vec<_> = vfs
            .list_children(&[])
            .unwrap()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names, vec!["README.txt", "logs", "bin"]);
        assert!(vfs.list_children(&p(&["README.txt"])).is_none());
        assert!(vfs.list_children(&p(&["nope"])).is_none());
    }

    #[test]
    fn test_nameless_child_skipped() {
        let mut root = FileSystemNode::dir("user", vec![FileSystemNode::file("ok", 1)]);
        root.children.push(Arc::new(FileSystemNode::dir(
            "",
            vec![FileSystemNode::file("hidden", 1)],
        )));
        let vfs = VirtualFileSystem::build(root);
        assert_eq!(vfs.len(), 2);
        assert!(vfs.get_node(&p(&["hidden"])).is_none());
    }

    #[test]
    fn test_round_trip_every_path() {
        let vfs = sample();
        for path in vfs.paths() {
            let node = vfs.get_node(path).unwrap();
            match path.last() {
                Some(name) => assert_eq!(&node.name, name),
                None => assert!(Arc::ptr_eq(node, vfs.root())),
            }
        }
    }
}
