//! Append-only audit stream and per-session TTY transcripts
//!
//! Each audit record is one JSON object on one line:
//!
//! ```json
//! {"timestamp":"2026-01-01T00:00:00Z","sessionId":"...","remoteAddress":"10.0.0.1:5555",
//!  "event":"command.input","phase":"shell","version":"0.1","payload":{"raw":"ls"}}
//! ```
//!
//! Writers serialize the full line before taking the per-file lock and hand
//! the write to a blocking task. A caller that is cancelled while waiting
//! does not stop that task, so a record is either fully written or absent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

/// Record format version.
pub const AUDIT_VERSION: &str = "0.1";

/// Longest string kept in a payload before it is clipped.
pub const DEFAULT_MAX_VALUE_LENGTH: usize = 4_096;

/// One audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// UTC timestamp, seconds precision, `Z` suffix.
    pub timestamp: String,
    pub session_id: String,
    pub remote_address: String,
    /// Dotted event name, e.g. `llm.ensemble`.
    pub event: String,
    /// Coarse phase: `connect`, `auth`, `shell`, `llm`, `close`.
    pub phase: String,
    pub version: String,
    pub payload: serde_json::Value,
}

impl AuditRecord {
    /// Build a record stamped with the current time.
    pub fn new(
        session_id: impl Into<String>,
        remote_address: impl Into<String>,
        event: impl Into<String>,
        phase: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            timestamp: iso_timestamp(),
            session_id: session_id.into(),
            remote_address: remote_address.into(),
            event: event.into(),
            phase: phase.into(),
            version: AUDIT_VERSION.to_string(),
            payload: clip_payload(payload, DEFAULT_MAX_VALUE_LENGTH),
        }
    }

    fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// `2026-01-01T00:00:00Z`
pub fn iso_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

/// Clip a single value, keeping a marker of how much was dropped.
///
/// Handles UTF-8 char boundaries properly to avoid panics on multi-byte chars.
fn clip_value(value: &str, max: usize) -> Cow<'_, str> {
    if value.len() <= max {
        return Cow::Borrowed(value);
    }
    let mut end = max;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    Cow::Owned(format!(
        "{}...[truncated {} bytes]",
        &value[..end],
        value.len() - end
    ))
}

fn clip_payload(value: serde_json::Value, max: usize) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::String(s) => match clip_value(&s, max) {
            Cow::Borrowed(_) => Value::String(s),
            Cow::Owned(clipped) => Value::String(clipped),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(|v| clip_payload(v, max)).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, clip_payload(v, max)))
                .collect(),
        ),
        other => other,
    }
}

/// Destination for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one record. Must be atomic per record.
    async fn append(&self, record: AuditRecord) -> Result<()>;
}

/// Appends records as JSON lines to a file.
#[derive(Debug, Clone)]
pub struct JsonlAuditLog {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl JsonlAuditLog {
    /// Create a log writing to `path`. Parent directories are created on
    /// first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Target file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for JsonlAuditLog {
    async fn append(&self, record: AuditRecord) -> Result<()> {
        let line = record.to_line()?;
        append_locked(self.path.clone(), self.lock.clone(), line).await
    }
}

/// Keeps records in memory. Useful in tests and for embedding.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Records whose event name equals `event`.
    pub fn events(&self, event: &str) -> Vec<AuditRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.event == event)
            .collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn append(&self, record: AuditRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| Error::Internal("audit buffer poisoned".to_string()))?
            .push(record);
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditLog;

#[async_trait]
impl AuditSink for NullAuditLog {
    async fn append(&self, _record: AuditRecord) -> Result<()> {
        Ok(())
    }
}

/// Direction of transcript traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the remote party.
    In,
    /// To the remote party.
    Out,
}

impl Direction {
    fn prefix(self) -> &'static str {
        match self {
            Direction::In => "< ",
            Direction::Out => "> ",
        }
    }
}

/// Raw terminal transcript of one session, one file per session id.
///
/// Each session owns its transcript and its lock, so sessions never wait
/// on each other here.
#[derive(Debug, Clone)]
pub struct Transcript {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl Transcript {
    /// Transcript for `session_id` under `dir`.
    pub fn new(dir: &Path, session_id: &str) -> Self {
        Self {
            path: dir.join(format!("{}.log", session_id)),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Transcript file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one prefixed line.
    pub async fn write(&self, direction: Direction, data: &str) -> Result<()> {
        let line = format!("{}{}\n", direction.prefix(), data);
        append_locked(self.path.clone(), self.lock.clone(), line).await
    }
}

async fn append_locked(path: PathBuf, lock: Arc<Mutex<()>>, line: String) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let _guard = lock
            .lock()
            .map_err(|_| Error::Internal("log lock poisoned".to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    })
    .await
    .map_err(|e| Error::Internal(format!("log writer task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_field_names() {
        let rec = AuditRecord::new("s1", "127.0.0.1:1", "command.input", "shell", json!({"raw": "ls"}));
        let value = serde_json::to_value(&rec).unwrap();
        for key in [
            "timestamp",
            "sessionId",
            "remoteAddress",
            "event",
            "phase",
            "version",
            "payload",
        ] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["version"], "0.1");
        assert!(rec.timestamp.ends_with('Z'));
    }

    #[test]
    fn test_payload_clipped() {
        let long = "a".repeat(DEFAULT_MAX_VALUE_LENGTH + 10);
        let rec = AuditRecord::new("s", "r", "e", "p", json!({"nested": [long]}));
        let clipped = rec.payload["nested"][0].as_str().unwrap();
        assert!(clipped.ends_with("...[truncated 10 bytes]"));
    }

    #[tokio::test]
    async fn test_jsonl_appends_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let log = JsonlAuditLog::new(tmp.path().join("logs/events.jsonl"));
        log.append(AuditRecord::new("s", "r", "a", "p", json!({}))).await.unwrap();
        log.append(AuditRecord::new("s", "r", "b", "p", json!({}))).await.unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        let events: Vec<String> = text
            .lines()
            .map(|l| serde_json::from_str::<AuditRecord>(l).unwrap().event)
            .collect();
        assert_eq!(events, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_concurrent_writers_never_interleave() {
        let tmp = tempfile::tempdir().unwrap();
        let log = Arc::new(JsonlAuditLog::new(tmp.path().join("events.jsonl")));
        let mut handles = Vec::new();
        for i in 0..16 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                let payload = json!({"blob": "x".repeat(2000), "i": i});
                log.append(AuditRecord::new("s", "r", "e", "p", payload)).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        let text = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.lines().count(), 16);
        for line in text.lines() {
            serde_json::from_str::<AuditRecord>(line).unwrap();
        }
    }

    #[tokio::test]
    async fn test_transcript_prefixes() {
        let tmp = tempfile::tempdir().unwrap();
        let tty = Transcript::new(tmp.path(), "abc");
        tty.write(Direction::In, "ls").await.unwrap();
        tty.write(Direction::Out, "bin").await.unwrap();
        assert_eq!(tty.path(), tmp.path().join("abc.log"));
        assert_eq!(std::fs::read_to_string(tty.path()).unwrap(), "< ls\n> bin\n");
    }
}
