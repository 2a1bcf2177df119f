//! Built-in shell commands
//!
//! Builtins answer from session state and the snapshot alone; they never
//! touch canned assets or a simulation backend.
//!
//! - identity: `id`, `whoami`, `history`
//! - navigation: `pwd`, `cd`
//! - listing: `ls`

mod identity;
mod ls;
mod navigation;

pub use ls::format_entry;

use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::fs::VirtualFileSystem;
use crate::session::Session;

/// The closed set of builtins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Id,
    Whoami,
    History,
    Pwd,
    Cd,
    Ls,
}

impl Builtin {
    /// Map a command name to a builtin.
    pub(crate) fn lookup(name: &str) -> Option<Self> {
        match name {
            "id" => Some(Self::Id),
            "whoami" => Some(Self::Whoami),
            "history" => Some(Self::History),
            "pwd" => Some(Self::Pwd),
            "cd" => Some(Self::Cd),
            "ls" => Some(Self::Ls),
            _ => None,
        }
    }

    /// Builtins computed purely from session identity and history.
    pub(crate) fn is_identity(self) -> bool {
        matches!(self, Self::Id | Self::Whoami | Self::History)
    }
}

/// Execution context for builtin commands.
pub(crate) struct Context<'a> {
    /// Command arguments (not including the command name).
    pub args: &'a [String],

    /// Session being served. Only `cd` mutates it.
    pub session: &'a mut Session,

    /// Snapshot of the bound scenario, if it ships one.
    pub fs: Option<&'a VirtualFileSystem>,
}

/// Run an identity builtin.
///
/// A panic inside the builtin is contained and replaced by the builtin's
/// canned default.
pub(crate) fn run_identity(builtin: Builtin, session: &Session, args: &[String]) -> String {
    let result = catch_unwind(AssertUnwindSafe(|| identity::execute(builtin, session, args)));
    match result {
        Ok(Some(out)) => out,
        Ok(None) | Err(_) => {
            tracing::warn!(?builtin, "identity builtin failed, using default");
            identity::fallback(builtin, session)
        }
    }
}

/// Run a filesystem-aware builtin.
///
/// Returns `None` when the builtin cannot answer (no snapshot for `cd` and
/// `ls`), letting the next layer try.
pub(crate) fn run_filesystem(builtin: Builtin, ctx: Context<'_>) -> Option<String> {
    match builtin {
        Builtin::Pwd => Some(navigation::pwd(&ctx)),
        Builtin::Cd => navigation::cd(ctx),
        Builtin::Ls => ls::ls(&ctx),
        Builtin::Id | Builtin::Whoami | Builtin::History => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(Builtin::lookup("ls"), Some(Builtin::Ls));
        assert_eq!(Builtin::lookup("id"), Some(Builtin::Id));
        assert_eq!(Builtin::lookup("netstat"), None);
    }

    #[test]
    fn test_identity_partition() {
        assert!(Builtin::Id.is_identity());
        assert!(Builtin::History.is_identity());
        assert!(!Builtin::Cd.is_identity());
    }

    fn session() -> Session {
        Session::new(
            "127.0.0.1:1".parse().unwrap(),
            std::sync::Arc::new(crate::audit::NullAuditLog),
        )
    }

    #[test]
    fn test_run_identity_panic_uses_fallback() {
        let mut s = session();
        s.username = Some("admin".into());

        identity::FAIL_NEXT.with(|fail| fail.set(true));
        assert_eq!(run_identity(Builtin::Id, &s, &[]), identity::FALLBACK_ID);

        identity::FAIL_NEXT.with(|fail| fail.set(true));
        assert_eq!(run_identity(Builtin::Whoami, &s, &[]), "admin");

        // The injected failure is one-shot.
        assert_eq!(
            run_identity(Builtin::Id, &s, &[]),
            "uid=1000(admin) gid=1000(admin) groups=1000(admin)"
        );
    }

    #[test]
    fn test_run_identity_no_answer_uses_fallback() {
        let s = session();
        assert_eq!(run_identity(Builtin::Ls, &s, &[]), "");
    }
}
