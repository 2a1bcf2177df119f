//! Decoysh - Simulated shell for interactive honeypots
//!
//! A remote party types commands; decoysh answers each one from a fixed
//! filesystem snapshot, canned per-scenario text, or a simulation backend,
//! and never executes anything for real.
//!
//! # Example
//!
//! ```rust
//! use decoysh::{FileSystemNode, NullAuditLog, Router, ScenarioLocator, Session};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let scenarios = tempfile::tempdir()?;
//!     let default = scenarios.path().join("default");
//!     std::fs::create_dir_all(&default)?;
//!     let snapshot = FileSystemNode::dir("user", vec![FileSystemNode::dir("logs", vec![])]);
//!     std::fs::write(default.join("fs.json"), serde_json::to_string(&snapshot)?)?;
//!
//!     let router = Router::new(ScenarioLocator::new(scenarios.path()));
//!     let mut session = Session::new("127.0.0.1:2323".parse()?, Arc::new(NullAuditLog));
//!
//!     session.record_command("cd logs");
//!     router.dispatch(&mut session, "cd logs").await;
//!     assert_eq!(session.cwd(), "/home/user/logs");
//!     Ok(())
//! }
//! ```

mod audit;
mod backend;
pub mod builtins;
mod ensemble;
mod error;
pub mod fs;
mod limits;
pub mod path;
mod router;
mod scenario;
mod session;

pub use audit::{
    AUDIT_VERSION, AuditRecord, AuditSink, DEFAULT_MAX_VALUE_LENGTH, Direction, JsonlAuditLog,
    MemoryAuditLog, NullAuditLog, Transcript, iso_timestamp,
};
pub use backend::{BackendError, SimulationBackend, SimulationResponse};
pub use ensemble::{
    EnsembleArbiter, EnsembleStats, Outcome, SUMMARY_INTERVAL, SimulationRequest, Winner, query,
    score, select,
};
pub use error::{Error, Result};
pub use fs::{FileSystemNode, NodeKind, VirtualFileSystem};
pub use limits::{DEFAULT_MAX_LINE_LENGTH, DEFAULT_MAX_OUTPUT, Dispatch, Limits};
pub use path::{PathError, ROOT_PATH, ROOT_SEGMENTS, ResolvedPath, resolve};
pub use router::{Router, Simulation};
pub use scenario::{DEFAULT_SCENARIO, ScenarioLocator};
pub use session::Session;
