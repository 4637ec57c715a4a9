//! External grammar-parser invocation.
//!
//! The parser is an external executable that consumes a path to a domain
//! file and prints a JSON symbol table on stdout. A rejection carries the
//! parser's own diagnostic text, which the correction loop quotes verbatim
//! back to the model.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use super::SymbolTable;

/// Typed failure from the external parser.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The parser process could not be started or awaited
    #[error("failed to run domain parser: {0}")]
    Launch(#[from] std::io::Error),

    /// The parser rejected the domain; kind/message/trace come from stderr
    #[error("{kind}: {message}\nTraceback:\n{trace}")]
    Rejected {
        kind: String,
        message: String,
        trace: String,
    },

    /// The parser accepted the domain but its symbol table was unreadable
    #[error("parser produced an unreadable symbol table: {0}")]
    BadSymbols(#[from] serde_json::Error),

    #[error("domain parser timed out after {0}ms")]
    Timeout(u64),
}

/// Parses a domain file into its symbol table.
#[async_trait]
pub trait DomainParser: Send + Sync {
    async fn parse(&self, path: &Path) -> Result<SymbolTable, ParseError>;
}

/// Runs an external parser command: `<command> <path>`, JSON symbol table on
/// stdout, Python-style traceback on stderr when the domain is rejected.
pub struct CommandParser {
    command: String,
    timeout_ms: u64,
}

impl CommandParser {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout_ms: 60_000,
        }
    }

    /// Set the parser timeout in milliseconds
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }
}

#[async_trait]
impl DomainParser for CommandParser {
    async fn parse(&self, path: &Path) -> Result<SymbolTable, ParseError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(format!("{} '{}'", self.command, path.display()));
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let child = cmd.spawn()?;

        let timeout = tokio::time::Duration::from_millis(self.timeout_ms);
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => return Err(ParseError::Timeout(self.timeout_ms)),
        };

        if output.status.success() {
            Ok(serde_json::from_slice(&output.stdout)?)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(rejected_from_stderr(&stderr, output.status.code()))
        }
    }
}

/// Split the last non-empty stderr line into `Kind: message`; fall back to a
/// generic kind when stderr has no such shape.
fn rejected_from_stderr(stderr: &str, code: Option<i32>) -> ParseError {
    let last = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("");
    let (kind, message) = match last.split_once(':') {
        Some((k, m)) if !k.trim().is_empty() && !k.trim().contains(' ') => {
            (k.trim().to_string(), m.trim().to_string())
        }
        _ => (
            "ParseError".to_string(),
            format!("parser exited with status {code:?}"),
        ),
    };
    ParseError::Rejected {
        kind,
        message,
        trace: stderr.trim().to_string(),
    }
}
