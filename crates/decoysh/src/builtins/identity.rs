//! Identity builtins (id, whoami, history)
//!
//! Answers come from the login name and the recorded history only, so the
//! same session always sees the same identity.

use super::Builtin;
use crate::session::Session;

/// Uid/gid shown for the logged-in user.
pub const SESSION_UID: u32 = 1000;

/// `id` output when the builtin itself fails.
pub const FALLBACK_ID: &str = "uid=0(root) gid=0(root) groups=0(root)";

/// Name shown by `whoami` when nobody logged in.
pub const ANONYMOUS_USER: &str = "guest";

#[cfg(test)]
thread_local! {
    /// Makes the next `execute` on this thread panic.
    pub(super) static FAIL_NEXT: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

pub(super) fn execute(builtin: Builtin, session: &Session, _args: &[String]) -> Option<String> {
    #[cfg(test)]
    if FAIL_NEXT.with(|fail| fail.replace(false)) {
        panic!("identity builtin failure injected");
    }

    match builtin {
        Builtin::Id => {
            let user = session.username.as_deref().unwrap_or("root");
            Some(format!(
                "uid={uid}({user}) gid={uid}({user}) groups={uid}({user})",
                uid = SESSION_UID,
                user = user
            ))
        }
        Builtin::Whoami => Some(
            session
                .username
                .clone()
                .unwrap_or_else(|| ANONYMOUS_USER.to_string()),
        ),
        Builtin::History => Some(session.history().join("\n")),
        _ => None,
    }
}

pub(super) fn fallback(builtin: Builtin, session: &Session) -> String {
    match builtin {
        Builtin::Id => FALLBACK_ID.to_string(),
        Builtin::Whoami => session
            .username
            .clone()
            .unwrap_or_else(|| ANONYMOUS_USER.to_string()),
        Builtin::History => session.history().join("\n"),
        _ => String::new(),
    }
}
