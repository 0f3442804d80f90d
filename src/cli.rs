//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{Analysis, Direction};
use clap::Parser;
use std::path::{Component, Path, PathBuf};

/// Captally - traffic capture aggregation
///
/// Runs tcpdump, tcpdstat, httpry, ipsumdump or ipaggcreate over a folder of
/// capture files and tallies their output into a single report.
///
/// Examples:
///   captally --dir ./captures --analysis domains
///   captally --dir ./captures --analysis bandwidth --direction downlink
///   captally --dir ./captures --file monday.pcap --analysis ports --format json
///   captally --dir ./captures --analysis icmp --dry-run
///   captally --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Folder containing the capture files
    #[arg(short, long, value_name = "DIR", required_unless_present = "init_config")]
    pub dir: Option<PathBuf>,

    /// Process a single capture file from --dir instead of the whole folder
    #[arg(short, long, value_name = "NAME")]
    pub file: Option<String>,

    /// Analysis to run
    #[arg(
        short,
        long,
        value_name = "ANALYSIS",
        required_unless_present = "init_config"
    )]
    pub analysis: Option<AnalysisKind>,

    /// Traffic direction for the bandwidth analysis
    #[arg(long, default_value = "uplink", value_name = "DIRECTION")]
    pub direction: Direction,

    /// Output file path for the report
    ///
    /// Defaults to the analysis' report name inside the output directory.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Directory reports are written to
    #[arg(long, value_name = "DIR", env = "CAPTALLY_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format (csv, json, markdown)
    #[arg(long, default_value = "csv", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .captally.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of capture files processed concurrently
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// File extensions to include (comma-separated)
    ///
    /// Example: --extensions pcap,dump
    #[arg(long, value_name = "EXTS", value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// File names to skip (comma-separated)
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// Maximum number of capture files to process
    #[arg(long, value_name = "COUNT")]
    pub max_files: Option<usize>,

    /// Local networks for the capture filters (comma-separated)
    ///
    /// Example: --local-nets 192.168.0.0/16,10.0.0.0/8
    #[arg(long, value_name = "NETS", value_delimiter = ',')]
    pub local_nets: Option<Vec<String>>,

    /// Parent directory for the temporary working directory
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Timeout for each reverse DNS lookup in milliseconds
    #[arg(long, value_name = "MS")]
    pub dns_timeout_ms: Option<u64>,

    /// Skip reverse DNS; IP addresses are reported as-is
    #[arg(long)]
    pub no_resolve: bool,

    /// Keep the working directory with the filtered captures and tool output
    #[arg(long)]
    pub keep_temp: bool,

    /// Dry run: list the capture files and the commands without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with code 2 if any capture file failed
    #[arg(long)]
    pub fail_on_errors: bool,

    /// Generate a default .captally.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Analysis selector on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AnalysisKind {
    /// HTTP hosts rolled up to site domains
    Domains,
    /// Aggregated destination IPs rolled up to site domains
    IpDomains,
    /// ICMP type/code tallies
    Icmp,
    /// ICMP categories from tcpdump text
    IcmpLegacy,
    /// Per-service byte totals
    Ports,
    /// Bandwidth statistics per capture
    Bandwidth,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Comma-separated rows (default)
    #[default]
    Csv,
    /// JSON format
    Json,
    /// Markdown table
    Markdown,
}

impl OutputFormat {
    /// File extension for reports in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "md",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The selected analysis, with the direction applied to bandwidth.
    pub fn analysis(&self) -> Option<Analysis> {
        self.analysis.map(|kind| match kind {
            AnalysisKind::Domains => Analysis::Domains,
            AnalysisKind::IpDomains => Analysis::IpDomains,
            AnalysisKind::Icmp => Analysis::Icmp,
            AnalysisKind::IcmpLegacy => Analysis::IcmpLegacy,
            AnalysisKind::Ports => Analysis::Ports,
            AnalysisKind::Bandwidth => Analysis::Bandwidth(self.direction),
        })
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let dir = self.dir.as_deref().unwrap_or_else(|| Path::new(""));
        if !dir.exists() {
            return Err(format!("Capture folder does not exist: {}", dir.display()));
        }
        if !dir.is_dir() {
            return Err(format!("Capture path is not a directory: {}", dir.display()));
        }

        if let Some(ref name) = self.file {
            let mut components = Path::new(name).components();
            if !matches!(
                (components.next(), components.next()),
                (Some(Component::Normal(_)), None)
            ) {
                return Err(format!("--file must be a file name inside --dir: {}", name));
            }
            if !dir.join(name).is_file() {
                return Err(format!(
                    "Capture file does not exist: {}",
                    dir.join(name).display()
                ));
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.max_files == Some(0) {
            return Err("Max files must be at least 1".to_string());
        }

        if self.dns_timeout_ms == Some(0) {
            return Err("DNS timeout must be at least 1 ms".to_string());
        }

        if let Some(ref nets) = self.local_nets {
            if nets.iter().all(|net| net.trim().is_empty()) {
                return Err("--local-nets must name at least one network".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
