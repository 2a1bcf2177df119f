//! Command router
//!
//! Turns one raw line into the text shown to the remote party. Handlers
//! are tried in a fixed order and the first one that answers wins:
//!
//! 1. identity builtins (`id`, `whoami`, `history`)
//! 2. `cat /etc/passwd` and `cat /etc/shadow`
//! 3. filesystem builtins (`pwd`, `cd`, `ls`)
//! 4. canned text from the scenario
//! 5. a simulation backend, or two of them in an ensemble
//!
//! Anything left over is `sh: <cmd>: command not found`. Dispatch never
//! fails: every error is turned into shell text and logged.

use std::sync::Arc;

use serde_json::json;

use crate::builtins::{self, Builtin, Context};
use crate::backend::SimulationBackend;
use crate::ensemble::{self, EnsembleArbiter, Outcome, SimulationRequest};
use crate::fs::{FileSystemNode, VirtualFileSystem};
use crate::limits::{Dispatch, Limits};
use crate::path::ROOT_SEGMENTS;
use crate::scenario::ScenarioLocator;
use crate::session::{Session, SnapshotCache};

/// Commands that always answer from canned text. A scenario without the
/// asset makes them "command not found" instead of reaching a backend.
const MAPPED_COMMANDS: &[&str] = &["pwd", "ls", "df", "ps", "busybox"];

/// How commands nobody else answers are simulated.
#[derive(Clone, Default)]
pub enum Simulation {
    /// No backend: unknown commands are not found.
    #[default]
    Disabled,
    /// One backend.
    Single(Arc<dyn SimulationBackend>),
    /// Two backends, best answer wins.
    Ensemble(Arc<EnsembleArbiter>),
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Simulation::Disabled => f.write_str("Disabled"),
            Simulation::Single(b) => f.debug_tuple("Single").field(&b.name()).finish(),
            Simulation::Ensemble(a) => f.debug_tuple("Ensemble").field(a).finish(),
        }
    }
}

/// Dispatch layers, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handler {
    Identity,
    SpecialFile,
    Filesystem,
    StaticCorpus,
    Simulate,
}

const CHAIN: [Handler; 5] = [
    Handler::Identity,
    Handler::SpecialFile,
    Handler::Filesystem,
    Handler::StaticCorpus,
    Handler::Simulate,
];

/// Resolves command lines for any number of sessions.
///
/// A router holds no per-session state and can be shared behind `Arc`.
///
/// # Example
///
/// ```rust
/// use decoysh::{NullAuditLog, Router, ScenarioLocator, Session};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let router = Router::new(ScenarioLocator::new("scenarios"));
/// let mut session = Session::new("127.0.0.1:2323".parse().unwrap(), Arc::new(NullAuditLog));
/// session.record_command("pwd");
/// let reply = router.dispatch(&mut session, "pwd").await;
/// assert_eq!(reply.output, "/home/user");
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct Router {
    locator: ScenarioLocator,
    limits: Limits,
    simulation: Simulation,
}

impl Router {
    /// Router with default limits and no simulation backend.
    pub fn new(locator: ScenarioLocator) -> Self {
        Self {
            locator,
            limits: Limits::default(),
            simulation: Simulation::Disabled,
        }
    }

    /// Set resource limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set how unknown commands are simulated.
    pub fn with_simulation(mut self, simulation: Simulation) -> Self {
        self.simulation = simulation;
        self
    }

    /// Simulate with a single backend.
    pub fn with_backend(self, backend: Arc<dyn SimulationBackend>) -> Self {
        self.with_simulation(Simulation::Single(backend))
    }

    /// Simulate with an ensemble of two backends.
    pub fn with_ensemble(self, arbiter: Arc<EnsembleArbiter>) -> Self {
        self.with_simulation(Simulation::Ensemble(arbiter))
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn locator(&self) -> &ScenarioLocator {
        &self.locator
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Resolve one line for `session`.
    ///
    /// The caller records the raw line in the session history first. Only
    /// `cd` changes the session, and only its working directory.
    pub async fn dispatch(&self, session: &mut Session, line: &str) -> Dispatch {
        let line = line.trim();
        if line.is_empty() {
            return Dispatch::empty();
        }
        let argv = tokenize(line);
        let Some((cmd, args)) = argv.split_first() else {
            return Dispatch::empty();
        };

        for handler in CHAIN {
            if let Some(reply) = self.run(handler, session, line, cmd, args).await {
                tracing::debug!(session = %session.id(), cmd = %cmd, ?handler, "dispatched");
                return reply;
            }
        }
        Dispatch::command_not_found(cmd)
    }

    async fn run(
        &self,
        handler: Handler,
        session: &mut Session,
        line: &str,
        cmd: &str,
        args: &[String],
    ) -> Option<Dispatch> {
        let max = self.limits.max_output;
        match handler {
            Handler::Identity => {
                let builtin = Builtin::lookup(cmd).filter(|b| b.is_identity())?;
                let out = builtins::run_identity(builtin, session, args);
                Some(Dispatch::clipped(out, max))
            }
            Handler::SpecialFile => {
                let asset = special_file(cmd, args)?;
                let text = self
                    .locator
                    .read_canned_text(session.scenario_id(), asset)
                    .await
                    .unwrap_or_default();
                Some(Dispatch::clipped(text, max))
            }
            Handler::Filesystem => {
                let builtin = Builtin::lookup(cmd).filter(|b| !b.is_identity())?;
                let fs = self.snapshot(session).await;
                let out = builtins::run_filesystem(
                    builtin,
                    Context {
                        args,
                        session,
                        fs: fs.as_deref(),
                    },
                )?;
                Some(Dispatch::clipped(out, max))
            }
            Handler::StaticCorpus => {
                let text = self.locator.read_canned_text(session.scenario_id(), cmd).await;
                match text {
                    Some(text) => Some(Dispatch::clipped(text, max)),
                    None if MAPPED_COMMANDS.contains(&cmd) => Some(Dispatch::command_not_found(cmd)),
                    None => None,
                }
            }
            Handler::Simulate => {
                if matches!(self.simulation, Simulation::Disabled) {
                    return None;
                }
                let request = self.request(session, line).await;
                match &self.simulation {
                    Simulation::Disabled => None,
                    Simulation::Single(backend) => {
                        Some(self.simulate_single(session, backend, request, cmd).await)
                    }
                    Simulation::Ensemble(arbiter) => {
                        Some(arbiter.arbitrate(session, request, cmd, &self.limits).await)
                    }
                }
            }
        }
    }

    /// The session's snapshot, loading and caching it on first use.
    async fn snapshot(&self, session: &mut Session) -> Option<Arc<VirtualFileSystem>> {
        match session.snapshot_cache() {
            SnapshotCache::Loaded(fs) => return Some(fs.clone()),
            SnapshotCache::Missing => return None,
            SnapshotCache::Unloaded => {}
        }
        match self.locator.load_snapshot(session.scenario_id()).await {
            Some(root) => {
                let fs = Arc::new(VirtualFileSystem::build(root));
                tracing::debug!(
                    session = %session.id(),
                    scenario = %session.scenario_id(),
                    nodes = fs.len(),
                    "snapshot loaded"
                );
                session.set_snapshot_cache(SnapshotCache::Loaded(fs.clone()));
                Some(fs)
            }
            None => {
                session.set_snapshot_cache(SnapshotCache::Missing);
                None
            }
        }
    }

    async fn request(&self, session: &mut Session, line: &str) -> SimulationRequest {
        let fs = match self.snapshot(session).await {
            Some(vfs) => vfs.root().clone(),
            None => Arc::new(FileSystemNode::empty_root(ROOT_SEGMENTS[1])),
        };
        SimulationRequest {
            command: line.to_string(),
            fs,
            history: session.history().into(),
        }
    }

    async fn simulate_single(
        &self,
        session: &Session,
        backend: &Arc<dyn SimulationBackend>,
        request: SimulationRequest,
        cmd: &str,
    ) -> Dispatch {
        let line = request.command.clone();
        match ensemble::query(backend.clone(), request, self.limits.backend_timeout).await {
            Outcome::Valid(resp) => {
                let output = resp.format_output();
                let reply = Dispatch::clipped(output.clone(), self.limits.max_output);
                session
                    .log(
                        "llm.simulate_command",
                        "llm",
                        json!({
                            "command": line,
                            "response": resp,
                            "output": output,
                            "truncated": reply.truncated,
                        }),
                    )
                    .await;
                reply
            }
            Outcome::Failed(error) => {
                session
                    .log(
                        "llm.simulate_command",
                        "llm",
                        json!({ "command": line, "error": error }),
                    )
                    .await;
                Dispatch::command_not_found(cmd)
            }
            Outcome::Cancelled => Dispatch::command_not_found(cmd),
        }
    }
}

/// Canned asset for `cat` of a sensitive system file.
fn special_file(cmd: &str, args: &[String]) -> Option<&'static str> {
    if cmd != "cat" {
        return None;
    }
    match args.first().map(String::as_str) {
        Some("/etc/passwd" | "etc/passwd") => Some("etc_passwd"),
        Some("/etc/shadow" | "etc/shadow") => Some("etc_shadow"),
        _ => None,
    }
}

/// Split a line shell-style. Unbalanced quotes fall back to whitespace
/// splitting so a malformed line is still answered.
fn tokenize(line: &str) -> Vec<String> {
    match shell_words::split(line) {
        Ok(words) if !words.is_empty() => words,
        _ => line.split_whitespace().map(String::from).collect(),
    }
}
