//! Navigation builtins (cd, pwd)

use super::Context;
use crate::path::{ROOT_PATH, resolve};

/// The pwd builtin - print working directory.
pub(super) fn pwd(ctx: &Context<'_>) -> String {
    ctx.session.cwd().to_string()
}

/// The cd builtin - change directory.
///
/// With no argument, returns to the root boundary. The session only moves
/// when the target resolves inside the boundary and names a directory in
/// the snapshot.
pub(super) fn cd(ctx: Context<'_>) -> Option<String> {
    let fs = ctx.fs?;
    let target = ctx.args.first().map(String::as_str).unwrap_or(ROOT_PATH);
    let not_found = || format!("bash: cd: {}: No such file or directory", target);

    let resolved = match resolve(ctx.session.cwd(), target) {
        Ok(resolved) => resolved,
        Err(_) => return Some(not_found()),
    };
    match fs.get_node(resolved.relative()) {
        Some(node) if node.is_dir() => {
            ctx.session.set_cwd(resolved.to_string());
            Some(String::new())
        }
        _ => Some(not_found()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::NullAuditLog;
    use crate::fs::{FileSystemNode, VirtualFileSystem};
    use crate::session::Session;
    use std::sync::Arc;

    fn fixture() -> (Session, VirtualFileSystem) {
        let session = Session::new("127.0.0.1:1".parse().unwrap(), Arc::new(NullAuditLog));
        let fs = VirtualFileSystem::build(FileSystemNode::dir(
            "user",
            vec![
                FileSystemNode::file("README.txt", 10),
                FileSystemNode::dir("logs", vec![]),
                FileSystemNode::dir("bin", vec![]),
            ],
        ));
        (session, fs)
    }

    fn run_cd(session: &mut Session, fs: &VirtualFileSystem, args: &[&str]) -> Option<String> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        cd(Context {
            args: &args,
            session,
            fs: Some(fs),
        })
    }

    #[test]
    fn test_cd_into_dir() {
        let (mut s, fs) = fixture();
        assert_eq!(run_cd(&mut s, &fs, &["logs"]).unwrap(), "");
        assert_eq!(s.cwd(), "/home/user/logs");
    }

    #[test]
    fn test_cd_no_args_goes_home() {
        let (mut s, fs) = fixture();
        run_cd(&mut s, &fs, &["logs"]);
        assert_eq!(run_cd(&mut s, &fs, &[]).unwrap(), "");
        assert_eq!(s.cwd(), "/home/user");
    }

    #[test]
    fn test_cd_into_file_fails() {
        let (mut s, fs) = fixture();
        assert_eq!(
            run_cd(&mut s, &fs, &["README.txt"]).unwrap(),
            "bash: cd: README.txt: No such file or directory"
        );
        assert_eq!(s.cwd(), "/home/user");
    }

    #[test]
    fn test_cd_outside_root_fails() {
        let (mut s, fs) = fixture();
        assert_eq!(
            run_cd(&mut s, &fs, &["/etc"]).unwrap(),
            "bash: cd: /etc: No such file or directory"
        );
        assert_eq!(s.cwd(), "/home/user");
    }

    #[test]
    fn test_cd_without_snapshot_not_handled() {
        let (mut s, _) = fixture();
        let args = vec!["logs".to_string()];
        let out = cd(Context {
            args: &args,
            session: &mut s,
            fs: None,
        });
        assert!(out.is_none());
    }
}
