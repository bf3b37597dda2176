//! External reasoner driven as a child process.
//!
//! One child is spawned per session. Each consistency query is written to its
//! stdin as a single JSON line:
//!
//! ```text
//! {"rigid":["guitar","-acoustic"],"typical":["happy","slow"]}
//! ```
//!
//! and answered by one line on stdout: `consistent` or `inconsistent`
//! (`true`/`false` are accepted too). A writer thread feeds stdin and a
//! reader thread forwards stdout lines, so a reasoner that stops reading or
//! answering is bounded by the session deadline either way. The child is
//! killed and reaped when the session is dropped.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{OracleError, OracleResult};
use crate::property::Property;

use super::{OracleSession, ReasoningOracle};

/// Reasoner reached by spawning `command args...`.
#[derive(Debug, Clone)]
pub struct ProcessOracle {
    command: String,
    args: Vec<String>,
}

impl ProcessOracle {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

impl ReasoningOracle for ProcessOracle {
    fn name(&self) -> &str {
        &self.command
    }

    fn open_session(&self, timeout: Duration) -> OracleResult<Box<dyn OracleSession + '_>> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| OracleError::Unavailable {
                command: self.command.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (tx, replies) = mpsc::channel();
        let (queries, pending) = mpsc::channel::<String>();

        if let Some(mut stdin) = stdin {
            std::thread::spawn(move || {
                for line in pending {
                    if writeln!(stdin, "{line}").and_then(|()| stdin.flush()).is_err() {
                        break;
                    }
                }
            });
        }

        if let Some(stdout) = stdout {
            std::thread::spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
        }

        tracing::debug!(command = %self.command, pid = child.id(), "oracle process started");

        Ok(Box::new(ProcessSession {
            child,
            queries: Some(queries),
            replies,
            deadline: Instant::now() + timeout,
            timeout,
        }))
    }
}

#[derive(Serialize)]
struct Query<'a> {
    rigid: Vec<&'a str>,
    typical: Vec<&'a str>,
}

struct ProcessSession {
    child: Child,
    /// Lines for the writer thread; dropping it closes the child's stdin.
    queries: Option<Sender<String>>,
    replies: Receiver<String>,
    deadline: Instant,
    timeout: Duration,
}

impl ProcessSession {
    fn timed_out(&self) -> OracleError {
        OracleError::Timeout {
            timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl OracleSession for ProcessSession {
    fn check_consistency(
        &mut self,
        rigid: &[Property],
        typical: &[Property],
    ) -> OracleResult<bool> {
        let query = Query {
            rigid: rigid.iter().map(|p| p.name.as_str()).collect(),
            typical: typical.iter().map(|p| p.name.as_str()).collect(),
        };
        let line = serde_json::to_string(&query).map_err(|e| OracleError::Protocol {
            message: format!("cannot encode query: {e}"),
        })?;

        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(self.timed_out());
        }

        let queries = self.queries.as_ref().ok_or_else(|| OracleError::Protocol {
            message: "oracle input already closed".into(),
        })?;
        queries.send(line).map_err(|_| OracleError::Protocol {
            message: "oracle process closed its input".into(),
        })?;

        match self.replies.recv_timeout(remaining) {
            Ok(reply) => parse_verdict(&reply),
            Err(RecvTimeoutError::Timeout) => Err(self.timed_out()),
            Err(RecvTimeoutError::Disconnected) => Err(OracleError::Protocol {
                message: "oracle process exited before answering".into(),
            }),
        }
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        drop(self.queries.take());
        let _ = self.child.kill();
        let _ = self.child.wait();
        tracing::debug!(pid = self.child.id(), "oracle process released");
    }
}

fn parse_verdict(reply: &str) -> OracleResult<bool> {
    match reply.trim().to_ascii_lowercase().as_str() {
        "consistent" | "true" | "sat" => Ok(true),
        "inconsistent" | "false" | "unsat" => Ok(false),
        other => Err(OracleError::Protocol {
            message: format!("unexpected answer \"{other}\""),
        }),
    }
}
