//! Error taxonomy for per-line and per-file failures.
//!
//! Both kinds are contained where they happen: a malformed line is skipped,
//! a failed tool skips that file's contribution. Only setup failures abort a
//! run, and those travel as `anyhow::Error` from `main`.

use std::path::PathBuf;
use thiserror::Error;

/// A line that does not match its expected grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected field {index} but the line has {found} field(s)")]
    MissingField { index: usize, found: usize },

    #[error("missing delimiter {delimiter:?}")]
    MissingDelimiter { delimiter: char },

    #[error("invalid number {value:?}")]
    InvalidNumber { value: String },

    #[error("statistics output ended before line {line}")]
    Truncated { line: usize },
}

/// A failed external tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}: {stderr}", status_text(.status))]
    NonZeroExit {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("failed to read output {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn status_text(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}
