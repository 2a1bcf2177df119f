//! Login prompt stub
//!
//! Shows a login/password exchange and records what the remote party
//! typed. Every credential pair is accepted.

use std::time::Duration;

use decoysh::Session;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::AuthSection;
use crate::telnet::{LineReader, send};

const LOGIN_PROMPT: &str = "\r\nlogin: ";
const PASSWORD_PROMPT: &str = "\r\nPassword: ";
const DEFAULT_USERNAME: &str = "guest";

/// How the login exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Let through as this user.
    Accepted(String),
    /// Connection closed mid-login.
    Disconnected,
    /// Ran out of attempts.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct AuthGate {
    max_attempts: u32,
    fail_delay: Duration,
    read_timeout: Duration,
}

/// Result of reading one prompt answer.
enum Answer {
    Line(String),
    TimedOut,
    Eof,
}

impl AuthGate {
    pub fn new(max_attempts: u32, fail_delay: Duration, read_timeout: Duration) -> Self {
        Self {
            max_attempts,
            fail_delay,
            read_timeout,
        }
    }

    pub fn from_config(auth: &AuthSection) -> Self {
        Self::new(auth.max_attempts, auth.fail_delay(), auth.read_timeout())
    }

    /// Run the exchange. On success `session.username` is set.
    ///
    /// A timed-out prompt uses up an attempt.
    pub async fn run<R, W>(
        &self,
        session: &mut Session,
        reader: &mut LineReader<R>,
        writer: &mut W,
    ) -> std::io::Result<AuthOutcome>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        session.log("auth.start", "auth", json!({})).await;

        let mut attempts = 0;
        while attempts < self.max_attempts {
            send(writer, session, LOGIN_PROMPT).await?;
            let username = match self.answer(session, reader, "username").await? {
                Answer::Line(line) => line,
                Answer::TimedOut => {
                    attempts += 1;
                    continue;
                }
                Answer::Eof => return Ok(AuthOutcome::Disconnected),
            };

            send(writer, session, PASSWORD_PROMPT).await?;
            let password = match self.answer(session, reader, "password").await? {
                Answer::Line(line) => line,
                Answer::TimedOut => {
                    attempts += 1;
                    continue;
                }
                Answer::Eof => return Ok(AuthOutcome::Disconnected),
            };
            send(writer, session, "\r\n").await?;

            let success = verify(&username, &password);
            session
                .log(
                    "login.attempt",
                    "auth",
                    json!({ "username": username, "success": success }),
                )
                .await;

            if success {
                let username = if username.is_empty() {
                    DEFAULT_USERNAME.to_string()
                } else {
                    username
                };
                session
                    .log("auth.success", "auth", json!({ "username": username }))
                    .await;
                session.username = Some(username.clone());
                return Ok(AuthOutcome::Accepted(username));
            }

            attempts += 1;
            tokio::time::sleep(self.fail_delay).await;
        }

        session
            .log("auth.exhausted", "auth", json!({ "attempts": attempts }))
            .await;
        Ok(AuthOutcome::Exhausted)
    }

    async fn answer<R: AsyncRead + Unpin>(
        &self,
        session: &mut Session,
        reader: &mut LineReader<R>,
        field: &str,
    ) -> std::io::Result<Answer> {
        let read = tokio::time::timeout(self.read_timeout, reader.next_line(session)).await;
        match read {
            Ok(Ok(Some(line))) => Ok(Answer::Line(line)),
            Ok(Ok(None)) => {
                session
                    .log("login.eof", "auth", json!({ "field": field }))
                    .await;
                Ok(Answer::Eof)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                session
                    .log(
                        "login.timeout",
                        "auth",
                        json!({ "message": format!("{} read timed out", field) }),
                    )
                    .await;
                Ok(Answer::TimedOut)
            }
        }
    }
}

/// Any credentials pass.
fn verify(_username: &str, _password: &str) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use decoysh::MemoryAuditLog;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;

    fn session() -> (Session, Arc<MemoryAuditLog>) {
        let audit = Arc::new(MemoryAuditLog::new());
        let session = Session::new("198.51.100.7:40000".parse().unwrap(), audit.clone());
        (session, audit)
    }

    fn gate() -> AuthGate {
        AuthGate::new(3, Duration::ZERO, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_accepts_any_credentials() {
        let (mut session, audit) = session();
        let mut reader = LineReader::new(&b"root\r\nhunter2\r\n"[..], 4096);
        let mut out = Vec::new();

        let outcome = gate().run(&mut session, &mut reader, &mut out).await.unwrap();

        assert_eq!(outcome, AuthOutcome::Accepted("root".into()));
        assert_eq!(session.username.as_deref(), Some("root"));
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\r\nlogin: \r\nPassword: \r\n"
        );
        let attempt = &audit.events("login.attempt")[0];
        assert_eq!(attempt.payload["username"], "root");
        assert_eq!(attempt.payload["success"], true);
        assert_eq!(audit.events("auth.success")[0].payload["username"], "root");
        assert_eq!(session.bytes_in, 14);
    }

    #[tokio::test]
    async fn test_empty_username_is_guest() {
        let (mut session, _audit) = session();
        let mut reader = LineReader::new(&b"\r\n\r\n"[..], 4096);
        let mut out = Vec::new();
        let outcome = gate().run(&mut session, &mut reader, &mut out).await.unwrap();
        assert_eq!(outcome, AuthOutcome::Accepted("guest".into()));
    }

    #[tokio::test]
    async fn test_eof_disconnects() {
        let (mut session, audit) = session();
        let mut reader = LineReader::new(&b"admin\r\n"[..], 4096);
        let mut out = Vec::new();
        let outcome = gate().run(&mut session, &mut reader, &mut out).await.unwrap();
        assert_eq!(outcome, AuthOutcome::Disconnected);
        assert_eq!(audit.events("login.eof")[0].payload["field"], "password");
        assert!(session.username.is_none());
    }

    #[tokio::test]
    async fn test_timeouts_exhaust_attempts() {
        let (mut session, audit) = session();
        let (client, server) = tokio::io::duplex(64);
        let mut reader = LineReader::new(server, 4096);
        let mut out = Vec::new();

        let outcome = gate().run(&mut session, &mut reader, &mut out).await.unwrap();

        assert_eq!(outcome, AuthOutcome::Exhausted);
        assert_eq!(audit.events("login.timeout").len(), 3);
        assert_eq!(audit.events("auth.exhausted")[0].payload["attempts"], 3);
        drop(client);
    }

    #[tokio::test]
    async fn test_partial_line_survives_timeout() {
        let (mut session, _audit) = session();
        let (mut client, server) = tokio::io::duplex(64);
        let mut reader = LineReader::new(server, 4096);
        let mut out = Vec::new();

        client.write_all(b"ro").await.unwrap();
        let gate = AuthGate::new(3, Duration::ZERO, Duration::from_millis(200));
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            client.write_all(b"ot\r\npw\r\n").await.unwrap();
            client
        });

        let outcome = gate.run(&mut session, &mut reader, &mut out).await.unwrap();
        assert_eq!(outcome, AuthOutcome::Accepted("root".into()));
        writer.await.unwrap();
    }
}
