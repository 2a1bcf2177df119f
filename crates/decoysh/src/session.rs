//! Per-connection session state

use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::audit::{AuditRecord, AuditSink, Direction, Transcript};
use crate::fs::VirtualFileSystem;
use crate::path::ROOT_PATH;
use crate::scenario::DEFAULT_SCENARIO;

/// Snapshot cache state for the bound scenario.
#[derive(Debug, Clone, Default)]
pub(crate) enum SnapshotCache {
    /// Not looked up yet.
    #[default]
    Unloaded,
    /// Looked up; the scenario (and the default) ship no snapshot.
    Missing,
    /// Built and ready.
    Loaded(Arc<VirtualFileSystem>),
}

/// State of one remote shell session.
///
/// Created once the auth gate lets a connection through; mutated by the
/// router on every command; dropped when the connection closes.
pub struct Session {
    id: String,
    remote_addr: SocketAddr,
    started_at: DateTime<Utc>,
    /// Name given at the login prompt.
    pub username: Option<String>,
    cwd: String,
    history: Vec<String>,
    scenario_id: String,
    snapshot: SnapshotCache,
    /// Bytes received from the remote party.
    pub bytes_in: u64,
    /// Bytes sent to the remote party.
    pub bytes_out: u64,
    audit: Arc<dyn AuditSink>,
    transcript: Option<Transcript>,
}

impl Session {
    /// Create a session with a fresh id, bound to the default scenario.
    pub fn new(remote_addr: SocketAddr, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            remote_addr,
            started_at: Utc::now(),
            username: None,
            cwd: ROOT_PATH.to_string(),
            history: Vec::new(),
            scenario_id: DEFAULT_SCENARIO.to_string(),
            snapshot: SnapshotCache::Unloaded,
            bytes_in: 0,
            bytes_out: 0,
            audit,
            transcript: None,
        }
    }

    /// Attach a TTY transcript.
    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    /// Bind to a scenario at creation time.
    pub fn with_scenario(mut self, scenario_id: impl Into<String>) -> Self {
        self.set_scenario(scenario_id);
        self
    }

    /// Session id (UUID v4).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Peer address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// When the session was created.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Current directory; always under the root boundary.
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Only `cd` moves the session, and only to resolver output.
    pub(crate) fn set_cwd(&mut self, cwd: String) {
        debug_assert!(cwd.starts_with(ROOT_PATH));
        self.cwd = cwd;
    }

    /// Raw command lines, oldest first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Record a raw line. Callers do this before dispatching it.
    pub fn record_command(&mut self, line: impl Into<String>) {
        self.history.push(line.into());
    }

    /// Bound scenario id.
    pub fn scenario_id(&self) -> &str {
        &self.scenario_id
    }

    /// Rebind the scenario and drop the cached snapshot.
    pub fn set_scenario(&mut self, scenario_id: impl Into<String>) {
        let scenario_id = scenario_id.into();
        if scenario_id != self.scenario_id {
            self.snapshot = SnapshotCache::Unloaded;
        }
        self.scenario_id = scenario_id;
    }

    pub(crate) fn snapshot_cache(&self) -> &SnapshotCache {
        &self.snapshot
    }

    pub(crate) fn set_snapshot_cache(&mut self, cache: SnapshotCache) {
        self.snapshot = cache;
    }

    /// Transcript file, if one is attached.
    pub fn transcript(&self) -> Option<&Transcript> {
        self.transcript.as_ref()
    }

    /// Append an audit event for this session.
    ///
    /// Audit failures are logged and swallowed: the remote party must never
    /// notice them.
    pub async fn log(&self, event: &str, phase: &str, payload: serde_json::Value) {
        let record = AuditRecord::new(
            self.id.clone(),
            self.remote_addr.to_string(),
            event,
            phase,
            payload,
        );
        if let Err(e) = self.audit.append(record).await {
            tracing::warn!(session = %self.id, event, error = %e, "audit append failed");
        }
    }

    /// Append a line to the TTY transcript, if any.
    pub async fn write_tty(&self, direction: Direction, data: &str) {
        if let Some(tty) = &self.transcript {
            if let Err(e) = tty.write(direction, data).await {
                tracing::warn!(session = %self.id, error = %e, "transcript write failed");
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("remote_addr", &self.remote_addr)
            .field("username", &self.username)
            .field("cwd", &self.cwd)
            .field("scenario_id", &self.scenario_id)
            .field("history_len", &self.history.len())
            .finish()
    }
}
