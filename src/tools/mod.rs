//! External capture tools.
//!
//! Every subprocess goes through [`ToolRunner`], so the pipeline can be
//! driven by scripted runners in tests.

pub mod commands;

pub use commands::{Invocation, Toolchain, TrafficFilter};

use crate::error::ToolError;
use std::process::Command;
use tracing::debug;

/// Captured result of one tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs a program to completion and captures its output.
pub trait ToolRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput, ToolError>;
}

/// Runs real processes with `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput, ToolError> {
        debug!("Running {} {:?}", program, args);

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| ToolError::Spawn {
                program: program.to_string(),
                source,
            })?;

        Ok(ToolOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run `invocation` and turn a non-zero exit into an error carrying stderr.
pub fn run_checked(
    runner: &dyn ToolRunner,
    invocation: &Invocation,
) -> Result<ToolOutput, ToolError> {
    let output = runner.run(&invocation.program, &invocation.args)?;

    if output.success() {
        Ok(output)
    } else {
        Err(ToolError::NonZeroExit {
            program: invocation.program.clone(),
            status: output.status,
            stderr: output.stderr.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRunner(ToolOutput);

    impl ToolRunner for FixedRunner {
        fn run(&self, _program: &str, _args: &[String]) -> Result<ToolOutput, ToolError> {
            Ok(self.0.clone())
        }
    }

    fn invocation() -> Invocation {
        Invocation {
            program: "tcpdstat".to_string(),
            args: vec!["trace.pcap".to_string()],
        }
    }

    #[test]
    fn test_run_checked_success() {
        let runner = FixedRunner(ToolOutput {
            status: Some(0),
            stdout: "ok".to_string(),
            stderr: String::new(),
        });
        let output = run_checked(&runner, &invocation()).unwrap();
        assert_eq!(output.stdout, "ok");
    }

    #[test]
    fn test_run_checked_failure_keeps_stderr() {
        let runner = FixedRunner(ToolOutput {
            status: Some(2),
            stdout: String::new(),
            stderr: "tcpdstat: cannot open file\n".to_string(),
        });
        match run_checked(&runner, &invocation()) {
            Err(ToolError::NonZeroExit {
                program,
                status,
                stderr,
            }) => {
                assert_eq!(program, "tcpdstat");
                assert_eq!(status, Some(2));
                assert_eq!(stderr, "tcpdstat: cannot open file");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let result = SystemRunner.run("captally-no-such-program", &[]);
        assert!(matches!(result, Err(ToolError::Spawn { .. })));
    }
}
