//! Ensemble arbitration between two simulation backends
//!
//! Both backends are asked the same question at the same time. Each answer
//! is scored with a fixed heuristic and the better one is shown. The primary
//! backend wins ties.
//!
//! Backend calls run as spawned tasks so a slow model never holds up other
//! sessions, and so a dropped session (connection closed mid-command) can be
//! told apart from a backend that failed.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;

use crate::backend::{BackendError, SimulationBackend, SimulationResponse};
use crate::fs::FileSystemNode;
use crate::limits::{Dispatch, Limits};
use crate::session::Session;

/// Decisions between two summary emissions.
pub const SUMMARY_INTERVAL: u64 = 10;

/// Everything a backend sees for one command.
#[derive(Debug, Clone)]
pub struct SimulationRequest {
    /// Raw command line.
    pub command: String,
    /// Snapshot root (an empty `user` dir when the scenario has none).
    pub fs: Arc<FileSystemNode>,
    /// Copy of the session history, oldest first.
    pub history: Arc<[String]>,
}

/// How one backend call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The backend returned a validated response.
    Valid(SimulationResponse),
    /// Error, timeout or panic.
    Failed(String),
    /// The call was torn down before it finished.
    Cancelled,
}

impl Outcome {
    /// The response, if valid.
    pub fn response(&self) -> Option<&SimulationResponse> {
        match self {
            Outcome::Valid(resp) => Some(resp),
            _ => None,
        }
    }

    /// True for [`Outcome::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, Outcome::Valid(_))
    }
}

/// Aborts the backend task if the caller goes away first.
struct Call(JoinHandle<Result<SimulationResponse, BackendError>>);

impl Drop for Call {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run one backend call in its own task and classify how it ended.
pub async fn query(
    backend: Arc<dyn SimulationBackend>,
    request: SimulationRequest,
    timeout: Option<Duration>,
) -> Outcome {
    let name = backend.name().to_string();
    let mut call = Call(tokio::spawn(async move {
        let fut = backend.simulate_command(&request.command, &request.fs, &request.history);
        match timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .unwrap_or(Err(BackendError::Timeout)),
            None => fut.await,
        }
    }));

    match (&mut call.0).await {
        Ok(Ok(resp)) => Outcome::Valid(resp),
        Ok(Err(e)) => {
            tracing::warn!(backend = %name, error = %e, "simulation backend failed");
            Outcome::Failed(e.to_string())
        }
        Err(e) if e.is_cancelled() => Outcome::Cancelled,
        Err(e) => {
            tracing::warn!(backend = %name, error = %e, "simulation backend panicked");
            Outcome::Failed(format!("backend task panicked: {}", e))
        }
    }
}

/// Heuristic quality score. Zero for anything that is not a valid response.
pub fn score(outcome: &Outcome) -> u32 {
    let Some(resp) = outcome.response() else {
        return 0;
    };
    let mut score = 10;
    if resp.exit_code == 0 {
        score += 5;
    }
    if !resp.stdout.is_empty() {
        score += 5;
        if resp.stdout.chars().count() > 10 {
            score += 3;
        }
    }
    if resp.stderr.is_empty() {
        score += 2;
    }
    if !resp.explanation.is_empty() {
        score += 1;
    }
    score
}

/// Which backend's answer is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Primary,
    Secondary,
    Neither,
}

impl Winner {
    pub fn as_str(self) -> &'static str {
        match self {
            Winner::Primary => "primary",
            Winner::Secondary => "secondary",
            Winner::Neither => "none",
        }
    }
}

/// Pick a winner from two scores. The primary takes ties.
pub fn select(primary: u32, secondary: u32) -> Winner {
    if primary >= secondary && primary > 0 {
        Winner::Primary
    } else if secondary > 0 {
        Winner::Secondary
    } else {
        Winner::Neither
    }
}

/// Cumulative arbitration counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnsembleStats {
    pub total: u64,
    pub primary_wins: u64,
    pub secondary_wins: u64,
    pub both_failed: u64,
    /// `total` at the last summary.
    pub last_logged: u64,
}

impl EnsembleStats {
    fn record(&mut self, winner: Winner) {
        self.total += 1;
        match winner {
            Winner::Primary => self.primary_wins += 1,
            Winner::Secondary => self.secondary_wins += 1,
            Winner::Neither => self.both_failed += 1,
        }
    }

    /// Marks a summary as emitted and returns true when one is due.
    fn take_summary(&mut self) -> bool {
        if self.total > 0 && self.total - self.last_logged >= SUMMARY_INTERVAL {
            self.last_logged = self.total;
            true
        } else {
            false
        }
    }

    fn pct(&self, count: u64) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64 * 100.0
        }
    }
}

/// Queries two backends and keeps the better answer.
///
/// One arbiter serves every session of a running service; its statistics
/// live and die with it.
pub struct EnsembleArbiter {
    primary: Arc<dyn SimulationBackend>,
    secondary: Arc<dyn SimulationBackend>,
    stats: Mutex<EnsembleStats>,
}

impl EnsembleArbiter {
    pub fn new(primary: Arc<dyn SimulationBackend>, secondary: Arc<dyn SimulationBackend>) -> Self {
        Self {
            primary,
            secondary,
            stats: Mutex::new(EnsembleStats::default()),
        }
    }

    /// Copy of the current counters.
    pub fn stats(&self) -> EnsembleStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask both backends about `request` and return the winning output.
    ///
    /// If the caller is dropped while the backends are running, both calls
    /// are aborted and the statistics are left untouched.
    pub async fn arbitrate(
        &self,
        session: &Session,
        request: SimulationRequest,
        cmd: &str,
        limits: &Limits,
    ) -> Dispatch {
        let line = request.command.clone();
        let (primary, secondary) = tokio::join!(
            query(self.primary.clone(), request.clone(), limits.backend_timeout),
            query(self.secondary.clone(), request, limits.backend_timeout),
        );
        if primary == Outcome::Cancelled || secondary == Outcome::Cancelled {
            tracing::debug!(session = %session.id(), "ensemble call cancelled");
            return Dispatch::command_not_found(cmd);
        }

        let primary_score = score(&primary);
        let secondary_score = score(&secondary);
        let winner = select(primary_score, secondary_score);
        let (stats, summary_due) = {
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            stats.record(winner);
            let due = stats.take_summary();
            (*stats, due)
        };

        let response = match winner {
            Winner::Primary => primary.response(),
            Winner::Secondary => secondary.response(),
            Winner::Neither => None,
        };

        let dispatch = match response {
            Some(resp) => {
                let output = resp.format_output();
                let dispatch = Dispatch::clipped(output.clone(), limits.max_output);
                session
                    .log(
                        "llm.ensemble",
                        "llm",
                        json!({
                            "command": line,
                            "primary_score": primary_score,
                            "secondary_score": secondary_score,
                            "winner": winner.as_str(),
                            "primary_valid": primary.is_valid(),
                            "secondary_valid": secondary.is_valid(),
                            "output": output,
                            "truncated": dispatch.truncated,
                        }),
                    )
                    .await;
                dispatch
            }
            None => {
                session
                    .log(
                        "llm.ensemble",
                        "llm",
                        json!({
                            "command": line,
                            "primary_score": primary_score,
                            "secondary_score": secondary_score,
                            "winner": winner.as_str(),
                        }),
                    )
                    .await;
                Dispatch::command_not_found(cmd)
            }
        };

        if summary_due {
            log_summary(session, &stats).await;
        }
        dispatch
    }
}

async fn log_summary(session: &Session, stats: &EnsembleStats) {
    let primary_pct = stats.pct(stats.primary_wins);
    let secondary_pct = stats.pct(stats.secondary_wins);
    let failed_pct = stats.pct(stats.both_failed);
    session
        .log(
            "llm.ensemble.summary",
            "llm",
            json!({
                "total_commands": stats.total,
                "primary_wins": stats.primary_wins,
                "secondary_wins": stats.secondary_wins,
                "both_failed": stats.both_failed,
                "primary_win_rate": format!("{:.1}%", primary_pct),
                "secondary_win_rate": format!("{:.1}%", secondary_pct),
                "failure_rate": format!("{:.1}%", failed_pct),
            }),
        )
        .await;
    tracing::info!(
        total = stats.total,
        "ensemble stats: primary {} ({:.1}%) | secondary {} ({:.1}%) | failed {} ({:.1}%)",
        stats.primary_wins,
        primary_pct,
        stats.secondary_wins,
        secondary_pct,
        stats.both_failed,
        failed_pct
    );
}

impl std::fmt::Debug for EnsembleArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnsembleArbiter")
            .field("primary", &self.primary.name())
            .field("secondary", &self.secondary.name())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use async_trait::async_trait;

    struct Fixed(Result<SimulationResponse, BackendError>);

    #[async_trait]
    impl SimulationBackend for Fixed {
        async fn simulate_command(
            &self,
            _command: &str,
            _fs: &FileSystemNode,
            _history: &[String],
        ) -> Result<SimulationResponse, BackendError> {
            self.0.clone()
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct Slow;

    #[async_trait]
    impl SimulationBackend for Slow {
        async fn simulate_command(
            &self,
            _command: &str,
            _fs: &FileSystemNode,
            _history: &[String],
        ) -> Result<SimulationResponse, BackendError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(SimulationResponse::ok("late"))
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    struct Panics;

    #[async_trait]
    impl SimulationBackend for Panics {
        async fn simulate_command(
            &self,
            _command: &str,
            _fs: &FileSystemNode,
            _history: &[String],
        ) -> Result<SimulationResponse, BackendError> {
            panic!("model exploded")
        }

        fn name(&self) -> &str {
            "panics"
        }
    }

    fn fixed(resp: Result<SimulationResponse, BackendError>) -> Arc<dyn SimulationBackend> {
        Arc::new(Fixed(resp))
    }

    fn request(cmd: &str) -> SimulationRequest {
        SimulationRequest {
            command: cmd.to_string(),
            fs: Arc::new(FileSystemNode::empty_root("user")),
            history: vec![cmd.to_string()].into(),
        }
    }

    fn session() -> (Session, Arc<MemoryAuditLog>) {
        let audit = Arc::new(MemoryAuditLog::new());
        (
            Session::new("10.0.0.1:4000".parse().unwrap(), audit.clone()),
            audit,
        )
    }

    fn good() -> SimulationResponse {
        SimulationResponse::ok("ok")
    }

    fn bad() -> SimulationResponse {
        SimulationResponse::err("err", 1)
    }

    #[test]
    fn test_score_values() {
        assert_eq!(score(&Outcome::Valid(good())), 22);
        assert_eq!(score(&Outcome::Valid(bad())), 10);
        let long = SimulationResponse::ok("01234567890").with_explanation("guess");
        assert_eq!(score(&Outcome::Valid(long)), 26);
        assert_eq!(score(&Outcome::Failed("boom".into())), 0);
        assert_eq!(score(&Outcome::Cancelled), 0);
    }

    #[test]
    fn test_score_counts_chars_not_bytes() {
        // ten chars, twenty bytes
        let resp = SimulationResponse::ok("éééééééééé");
        assert_eq!(score(&Outcome::Valid(resp)), 22);
    }

    #[test]
    fn test_select() {
        assert_eq!(select(22, 10), Winner::Primary);
        assert_eq!(select(10, 22), Winner::Secondary);
        assert_eq!(select(15, 15), Winner::Primary);
        assert_eq!(select(0, 12), Winner::Secondary);
        assert_eq!(select(0, 0), Winner::Neither);
    }

    #[test]
    fn test_summary_every_ten() {
        let mut stats = EnsembleStats::default();
        for _ in 0..9 {
            stats.record(Winner::Primary);
            assert!(!stats.take_summary());
        }
        stats.record(Winner::Neither);
        assert!(stats.take_summary());
        assert_eq!(stats.last_logged, 10);
        assert!(!stats.take_summary());
        assert_eq!(stats.pct(stats.both_failed), 10.0);
    }

    #[tokio::test]
    async fn test_primary_wins_on_score() {
        let (s, audit) = session();
        let arbiter = EnsembleArbiter::new(fixed(Ok(good())), fixed(Ok(bad())));
        let out = arbiter
            .arbitrate(&s, request("ls"), "ls", &Limits::default())
            .await;
        assert_eq!(out.output, "ok");
        assert!(!out.truncated);
        assert_eq!(arbiter.stats().primary_wins, 1);

        let events = audit.events("llm.ensemble");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["winner"], "primary");
        assert_eq!(events[0].payload["primary_score"], 22);
        assert_eq!(events[0].payload["secondary_score"], 10);
    }

    #[tokio::test]
    async fn test_secondary_wins_when_primary_fails() {
        let (s, _) = session();
        let arbiter = EnsembleArbiter::new(
            fixed(Err(BackendError::InvalidResponse("not json".into()))),
            fixed(Ok(bad())),
        );
        let out = arbiter
            .arbitrate(&s, request("ls"), "ls", &Limits::default())
            .await;
        assert_eq!(out.output, "err");
        assert_eq!(arbiter.stats().secondary_wins, 1);
    }

    #[tokio::test]
    async fn test_both_failed() {
        let (s, audit) = session();
        let arbiter = EnsembleArbiter::new(
            fixed(Err(BackendError::Timeout)),
            Arc::new(Panics),
        );
        let out = arbiter
            .arbitrate(&s, request("nmap"), "nmap", &Limits::default())
            .await;
        assert_eq!(out.output, "sh: nmap: command not found");
        assert_eq!(arbiter.stats().both_failed, 1);
        assert_eq!(audit.events("llm.ensemble")[0].payload["winner"], "none");
    }

    #[tokio::test]
    async fn test_timeout_is_failure() {
        let (s, _) = session();
        let arbiter = EnsembleArbiter::new(Arc::new(Slow), fixed(Ok(bad())));
        let limits = Limits::new().backend_timeout(Duration::from_millis(20));
        let out = arbiter.arbitrate(&s, request("ls"), "ls", &limits).await;
        assert_eq!(out.output, "err");
        assert_eq!(arbiter.stats().secondary_wins, 1);
    }

    #[tokio::test]
    async fn test_dropped_arbitration_leaves_stats() {
        let (s, audit) = session();
        let arbiter = EnsembleArbiter::new(Arc::new(Slow), Arc::new(Slow));
        let res = tokio::time::timeout(
            Duration::from_millis(20),
            arbiter.arbitrate(&s, request("ls"), "ls", &Limits::default()),
        )
        .await;
        assert!(res.is_err());
        assert_eq!(arbiter.stats(), EnsembleStats::default());
        assert!(audit.records().is_empty());
    }

    #[tokio::test]
    async fn test_summary_event() {
        let (s, audit) = session();
        let arbiter = EnsembleArbiter::new(fixed(Ok(good())), fixed(Ok(bad())));
        for _ in 0..10 {
            arbiter
                .arbitrate(&s, request("ls"), "ls", &Limits::default())
                .await;
        }
        let summary = audit.events("llm.ensemble.summary");
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].payload["total_commands"], 10);
        assert_eq!(summary[0].payload["primary_win_rate"], "100.0%");
        assert_eq!(summary[0].payload["failure_rate"], "0.0%");
    }

    #[tokio::test]
    async fn test_output_clipped() {
        let (s, _) = session();
        let arbiter = EnsembleArbiter::new(
            fixed(Ok(SimulationResponse::ok("abcdefghij"))),
            fixed(Ok(bad())),
        );
        let limits = Limits::new().max_output(4);
        let out = arbiter.arbitrate(&s, request("x"), "x", &limits).await;
        assert_eq!(out.output, "abcd");
        assert!(out.truncated);
    }
}
