//! Drives one analysis over a set of capture files.
//!
//! Tool stages run on the blocking thread pool with bounded concurrency.
//! Results come back in input order and are merged by the driving task
//! alone, so the store never needs a lock and its snapshot is deterministic.

pub mod stages;
pub mod workspace;

pub use stages::{execute, parse_output, plan, Plan};
pub use workspace::Workspace;

use crate::analysis::AggregationStore;
use crate::domains::{Canonicalizer, NoopResolver};
use crate::error::ToolError;
use crate::models::{Analysis, ParsedRecord};
use crate::parsers::Parsed;
use crate::scanner::CaptureFile;
use crate::tools::{ToolRunner, Toolchain};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A capture file whose contribution was skipped.
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub name: String,
    pub reason: String,
}

/// Everything a run produced.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub store: AggregationStore,
    pub files_processed: usize,
    pub failures: Vec<FileFailure>,
    pub malformed_lines: usize,
}

impl RunOutcome {
    pub fn files_failed(&self) -> usize {
        self.failures.len()
    }
}

/// Runs the tool stages for every capture and aggregates the results.
pub struct Pipeline {
    runner: Arc<dyn ToolRunner>,
    toolchain: Arc<Toolchain>,
    canonicalizer: Canonicalizer,
    concurrency: usize,
    show_progress: bool,
}

impl Pipeline {
    pub fn new(runner: Arc<dyn ToolRunner>, toolchain: Toolchain) -> Self {
        Self {
            runner,
            toolchain: Arc::new(toolchain),
            canonicalizer: Canonicalizer::new(
                Arc::new(NoopResolver),
                Duration::from_millis(2000),
                1,
            ),
            concurrency: 4,
            show_progress: false,
        }
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn canonicalizer(mut self, canonicalizer: Canonicalizer) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Commands that would run for `capture`, without running them.
    pub fn plan_for(
        &self,
        analysis: Analysis,
        capture: &CaptureFile,
        workspace: &Workspace,
    ) -> Plan {
        plan(
            &self.toolchain,
            analysis,
            &capture.path,
            &workspace.filtered_path(capture),
            &workspace.data_path(capture),
        )
    }

    /// Process `files` and return the merged, and for domain analyses
    /// canonicalized, store.
    pub async fn run(
        &self,
        analysis: Analysis,
        files: &[CaptureFile],
        workspace: &Workspace,
    ) -> RunOutcome {
        info!("Running {} analysis over {} file(s)", analysis, files.len());

        let progress = self.progress_bar(files.len());
        let mut outcome = RunOutcome::default();

        let mut results = stream::iter(files)
            .map(|capture| {
                let runner = Arc::clone(&self.runner);
                let plan = self.plan_for(analysis, capture, workspace);
                let name = capture.name.clone();

                async move {
                    let source = name.clone();
                    let result = tokio::task::spawn_blocking(move || {
                        let text = execute(runner.as_ref(), &plan)?;
                        Ok::<_, ToolError>(parse_output(analysis, &source, &text))
                    })
                    .await;
                    (name, result)
                }
            })
            .buffered(self.concurrency);

        while let Some((name, result)) = results.next().await {
            match result {
                Ok(Ok(parsed)) => self.merge(&mut outcome, &name, parsed),
                Ok(Err(e)) => {
                    warn!("Skipping {}: {}", name, e);
                    outcome.failures.push(FileFailure {
                        name,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Processing {} panicked or was cancelled: {}", name, e);
                    outcome.failures.push(FileFailure {
                        name,
                        reason: e.to_string(),
                    });
                }
            }

            if let Some(ref pb) = progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        if analysis.canonicalizes_hosts() {
            outcome.store.hosts = self.canonicalizer.roll_up(&outcome.store.hosts).await;
        }

        info!(
            "Processed {} file(s), {} failed, {} malformed line(s)",
            outcome.files_processed,
            outcome.files_failed(),
            outcome.malformed_lines
        );
        outcome
    }

    fn merge(&self, outcome: &mut RunOutcome, name: &str, parsed: Parsed<ParsedRecord>) {
        info!(
            "{}: {} record(s), {} malformed",
            name,
            parsed.records.len(),
            parsed.malformed
        );
        outcome.files_processed += 1;
        outcome.malformed_lines += parsed.malformed;
        outcome.store.extend(parsed.records);
    }

    fn progress_bar(&self, len: usize) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        Some(pb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::ReverseResolver;
    use crate::models::Direction;
    use crate::tools::ToolOutput;
    use futures::future::BoxFuture;
    use std::collections::HashMap;
    use std::net::IpAddr;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Pretends to be every tool. Output files named after `-o`/`-w` are
    /// written with the scripted text; captures whose name contains
    /// `broken` make the filter stage fail.
    struct ScriptedRunner {
        text: HashMap<&'static str, String>,
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl ScriptedRunner {
        fn new(text: &[(&'static str, &str)]) -> Self {
            Self {
                text: text.iter().map(|(p, t)| (*p, t.to_string())).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl ToolRunner for ScriptedRunner {
        fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput, ToolError> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_string(), args.to_vec()));

            if args.iter().any(|a| a.contains("broken")) {
                return Ok(ToolOutput {
                    status: Some(1),
                    stdout: String::new(),
                    stderr: "truncated dump file".to_string(),
                });
            }

            let text = self.text.get(program).cloned().unwrap_or_default();
            let target = args
                .iter()
                .position(|a| a == "-o" || a == "-w")
                .and_then(|i| args.get(i + 1));

            match target {
                Some(path) => {
                    std::fs::write(path, &text).unwrap();
                    Ok(ToolOutput {
                        status: Some(0),
                        ..Default::default()
                    })
                }
                None => Ok(ToolOutput {
                    status: Some(0),
                    stdout: text,
                    stderr: String::new(),
                }),
            }
        }
    }

    struct StaticResolver;

    impl ReverseResolver for StaticResolver {
        fn reverse(&self, ip: IpAddr) -> BoxFuture<'_, Option<String>> {
            let name = (ip.to_string() == "151.101.1.69").then(|| "www.example.com".to_string());
            Box::pin(async move { name })
        }
    }

    fn captures(dir: &TempDir, names: &[&str]) -> Vec<CaptureFile> {
        names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                std::fs::write(&path, b"pcap").unwrap();
                CaptureFile {
                    name: name.to_string(),
                    path,
                    size: 4,
                }
            })
            .collect()
    }

    fn pipeline(runner: ScriptedRunner) -> Pipeline {
        Pipeline::new(Arc::new(runner), Toolchain::default()).concurrency(2)
    }

    #[tokio::test]
    async fn test_domains_rolled_up_across_files() {
        let input = TempDir::new().unwrap();
        let files = captures(&input, &["a.pcap", "b.pcap"]);
        let workspace = Workspace::create(None).unwrap();
        let runner = ScriptedRunner::new(&[(
            "httpry",
            "# httpry output\nwww.example.com\nimg.example.com\n\ncdn.other.org\n",
        )]);

        let outcome = pipeline(runner).run(Analysis::Domains, &files, &workspace).await;

        assert_eq!(outcome.files_processed, 2);
        assert_eq!(outcome.files_failed(), 0);
        assert_eq!(
            outcome.store.hosts.snapshot(),
            vec![
                vec!["*.example.com".to_string(), "4".to_string()],
                vec!["*.other.org".to_string(), "2".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn test_ip_domains_resolve_and_keep_unresolved() {
        let input = TempDir::new().unwrap();
        let files = captures(&input, &["a.pcap"]);
        let workspace = Workspace::create(None).unwrap();
        let runner = ScriptedRunner::new(&[(
            "ipaggcreate",
            "!IPAggregate 1.0\n!num_nonzero 2\n151.101.1.69 10\n203.0.113.9 3\n",
        )]);
        let canonicalizer =
            Canonicalizer::new(Arc::new(StaticResolver), Duration::from_millis(100), 2);

        let outcome = pipeline(runner)
            .canonicalizer(canonicalizer)
            .run(Analysis::IpDomains, &files, &workspace)
            .await;

        assert_eq!(outcome.store.hosts.get("*.example.com"), Some(10));
        assert_eq!(outcome.store.hosts.get("203.0.113.9"), Some(3));
    }

    #[tokio::test]
    async fn test_failed_file_is_skipped() {
        let input = TempDir::new().unwrap();
        let files = captures(&input, &["a.pcap", "broken.pcap", "c.pcap"]);
        let workspace = Workspace::create(None).unwrap();
        let runner = ScriptedRunner::new(&[("ipsumdump", "!data\necho-request 0\necho\n")]);

        let outcome = pipeline(runner).run(Analysis::Icmp, &files, &workspace).await;

        assert_eq!(outcome.files_processed, 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].name, "broken.pcap");
        assert!(outcome.failures[0].reason.contains("truncated dump file"));
        assert_eq!(outcome.store.icmp_types.get("echo-request", "0"), Some(2));
        assert_eq!(outcome.malformed_lines, 2);
    }

    #[tokio::test]
    async fn test_bandwidth_rows_follow_file_order() {
        let input = TempDir::new().unwrap();
        let files = captures(&input, &["one.pcap", "two.pcap", "three.pcap"]);
        let workspace = Workspace::create(None).unwrap();
        let stats = "\nDumpFile: x\nFileSize: 1MB\nId: 200604281200\n\
StartTime: Fri Apr 28 12:00:01 2006\nEndTime: Fri Apr 28 12:59:58 2006\n\
TotalTime: 3597.00 seconds\nTotalCapSize: 0.09MB CapLen: 96 bytes\n\
# of packets: 120\nAvgRate: 196.00bps stddev:1.02Kbps PeakRate: 9.41Kbps\n";
        let runner = ScriptedRunner::new(&[("tcpdstat", stats)]);

        let outcome = Pipeline::new(Arc::new(runner), Toolchain::default())
            .concurrency(3)
            .run(Analysis::Bandwidth(Direction::Downlink), &files, &workspace)
            .await;

        assert_eq!(outcome.store.bandwidth.len(), 3);
        assert_eq!(outcome.store.bandwidth[0].id, "200604281200");
        assert_eq!(outcome.store.bandwidth[2].peak_rate, "9.41Kbps");
    }

    #[tokio::test]
    async fn test_filter_writes_into_workspace() {
        let input = TempDir::new().unwrap();
        let files = captures(&input, &["a.pcap"]);
        let workspace = Workspace::create(None).unwrap();
        let runner = Arc::new(ScriptedRunner::new(&[]));

        Pipeline::new(runner.clone(), Toolchain::default())
            .run(Analysis::Ports, &files, &workspace)
            .await;

        let calls = runner.calls.lock().unwrap();
        let (program, args) = &calls[0];
        assert_eq!(program, "tcpdump");
        assert_eq!(
            PathBuf::from(args.last().unwrap()),
            workspace.filtered_path(&files[0])
        );
    }
}
