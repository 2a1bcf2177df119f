//! Per-connection shell loop

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use decoysh::{AuditSink, Direction, Router, Session, Transcript};
use serde_json::json;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::auth::{AuthGate, AuthOutcome};
use crate::telnet::{LineReader, send};

/// Everything a connection needs, shared by all connections.
#[derive(Clone)]
pub struct Shell {
    pub router: Arc<Router>,
    pub audit: Arc<dyn AuditSink>,
    pub auth: AuthGate,
    pub banner: String,
    pub scenario: String,
    pub tty_dir: PathBuf,
}

impl Shell {
    /// Serve one connection until the remote party leaves.
    ///
    /// I/O errors end the session quietly; `session.close` is always
    /// recorded.
    pub async fn handle<R, W>(&self, reader: R, mut writer: W, peer: SocketAddr)
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let session = Session::new(peer, self.audit.clone()).with_scenario(self.scenario.as_str());
        let transcript = Transcript::new(&self.tty_dir, session.id());
        let mut session = session.with_transcript(transcript);
        let mut reader = LineReader::new(reader, self.router.limits().max_line_length);

        tracing::info!(session = %session.id(), %peer, "connection opened");

        if let Err(e) = self.converse(&mut session, &mut reader, &mut writer).await {
            tracing::debug!(session = %session.id(), error = %e, "connection error");
        }

        let duration_ms = (Utc::now() - session.started_at()).num_milliseconds();
        let tty_path = session
            .transcript()
            .map(|t| t.path().display().to_string())
            .unwrap_or_default();
        session
            .log(
                "session.close",
                "close",
                json!({
                    "duration_ms": duration_ms,
                    "tty_path": tty_path,
                    "bytes_in": session.bytes_in,
                    "bytes_out": session.bytes_out,
                }),
            )
            .await;
        tracing::info!(
            session = %session.id(),
            commands = session.history().len(),
            duration_ms,
            "connection closed"
        );
    }

    async fn converse<R, W>(
        &self,
        session: &mut Session,
        reader: &mut LineReader<R>,
        writer: &mut W,
    ) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        session
            .log("session.connect", "connect", json!({ "banner": self.banner }))
            .await;
        session.write_tty(Direction::Out, &self.banner).await;
        send(writer, session, &format!("{}\r\n", self.banner)).await?;

        let username = match self.auth.run(session, reader, writer).await? {
            AuthOutcome::Accepted(username) => username,
            AuthOutcome::Disconnected | AuthOutcome::Exhausted => return Ok(()),
        };
        let prompt = format!("{}@honeypot$ ", username);

        loop {
            send(writer, session, &prompt).await?;
            let Some(line) = reader.next_line(session).await? else {
                return Ok(());
            };
            if line.is_empty() {
                continue;
            }

            session.record_command(line.as_str());
            session.write_tty(Direction::In, &line).await;
            let argv: Vec<&str> = line.split_whitespace().collect();
            session
                .log("command.input", "shell", json!({ "raw": line, "argv": argv }))
                .await;

            let result = self.router.dispatch(session, &line).await;

            session.write_tty(Direction::Out, &result.output).await;
            session
                .log(
                    "command.output",
                    "shell",
                    json!({ "bytes": result.output.len(), "truncated": result.truncated }),
                )
                .await;
            send(writer, session, &format!("{}\r\n", result.output)).await?;
        }
    }
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("router", &self.router)
            .field("auth", &self.auth)
            .field("banner", &self.banner)
            .field("scenario", &self.scenario)
            .field("tty_dir", &self.tty_dir)
            .finish_non_exhaustive()
    }
}
