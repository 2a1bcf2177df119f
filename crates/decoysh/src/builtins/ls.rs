//! Directory listing builtin (ls)
//!
//! Always prints the long format. Flags are accepted and ignored so that
//! `ls`, `ls -la` and `ls -lhtr` print the same thing.

use super::Context;
use crate::fs::FileSystemNode;
use crate::path::resolve;

const DIR_PERMS: &str = "drwxr-xr-x";
const FILE_PERMS: &str = "-rw-r--r--";
const OWNER: &str = "user";
const GROUP: &str = "user";
const TIMESTAMP: &str = "Jan 01 00:00";

/// Format one `ls -l` line for `node`, shown as `name`.
///
/// ```rust
/// use decoysh::builtins::format_entry;
/// use decoysh::fs::FileSystemNode;
///
/// let line = format_entry(&FileSystemNode::file("a.txt", 10), "a.txt");
/// assert_eq!(line, "-rw-r--r--   1 user user       10 Jan 01 00:00 a.txt");
/// ```
pub fn format_entry(node: &FileSystemNode, name: &str) -> String {
    let (perms, links) = if node.is_dir() {
        (DIR_PERMS, 2)
    } else {
        (FILE_PERMS, 1)
    };
    format!(
        "{} {:>3} {} {} {:>8} {} {}",
        perms, links, OWNER, GROUP, node.size, TIMESTAMP, name
    )
}

/// The ls builtin.
///
/// At most one non-flag argument is the target; extra operands are ignored.
pub(super) fn ls(ctx: &Context<'_>) -> Option<String> {
    let fs = ctx.fs?;
    let target = ctx
        .args
        .iter()
        .find(|arg| !arg.is_empty() && !arg.starts_with('-'))
        .map(String::as_str)
        .unwrap_or("");
    let display = if target.is_empty() { "." } else { target };
    let not_found = || format!("ls: cannot access '{}': No such file or directory", display);

    let resolved = match resolve(ctx.session.cwd(), target) {
        Ok(resolved) => resolved,
        Err(_) => return Some(not_found()),
    };
    let rel = resolved.relative();
    let node = match fs.get_node(rel) {
        Some(node) => node,
        None => return Some(not_found()),
    };

    if !node.is_dir() {
        let name = if node.name.is_empty() {
            target
        } else {
            node.name.as_str()
        };
        return Some(format_entry(node, name));
    }

    let parent = if rel.is_empty() {
        node
    } else {
        fs.get_node(&rel[..rel.len() - 1]).unwrap_or(node)
    };

    let mut children: Vec<&FileSystemNode> = fs
        .list_children(rel)
        .unwrap_or_default()
        .iter()
        .map(|c| c.as_ref())
        .collect();
    children.sort_by(|a, b| a.name.cmp(&b.name));

    let mut lines = Vec::with_capacity(children.len() + 2);
    lines.push(format_entry(node, "."));
    lines.push(format_entry(parent, ".."));
    lines.extend(children.into_iter().map(|c| format_entry(c, &c.name)));
    Some(lines.join("\n"))
}
