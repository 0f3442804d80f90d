//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.captally.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".captally.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// External tool programs.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Capture file selection.
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Local network definitions used in capture filters.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Reverse DNS settings.
    #[serde(default)]
    pub dns: DnsConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory reports are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Number of capture files processed at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Keep the working directory after the run.
    #[serde(default)]
    pub keep_temp: bool,

    /// Parent directory for the working directory (system temp if unset).
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
            keep_temp: false,
            work_dir: None,
            verbose: false,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_concurrency() -> usize {
    4
}

/// Program names or paths of the external tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_tcpdump")]
    pub tcpdump: String,

    #[serde(default = "default_tcpdstat")]
    pub tcpdstat: String,

    #[serde(default = "default_ipsumdump")]
    pub ipsumdump: String,

    #[serde(default = "default_httpry")]
    pub httpry: String,

    #[serde(default = "default_ipaggcreate")]
    pub ipaggcreate: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tcpdump: default_tcpdump(),
            tcpdstat: default_tcpdstat(),
            ipsumdump: default_ipsumdump(),
            httpry: default_httpry(),
            ipaggcreate: default_ipaggcreate(),
        }
    }
}

fn default_tcpdump() -> String {
    "tcpdump".to_string()
}

fn default_tcpdstat() -> String {
    "tcpdstat".to_string()
}

fn default_ipsumdump() -> String {
    "ipsumdump".to_string()
}

fn default_httpry() -> String {
    "httpry".to_string()
}

fn default_ipaggcreate() -> String {
    "ipaggcreate".to_string()
}

/// Capture file selection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// File extensions to include. Empty means every file.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// File names to skip.
    #[serde(default)]
    pub excludes: Vec<String>,

    /// Maximum number of capture files per run.
    #[serde(default)]
    pub max_files: Option<usize>,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Networks considered local, in tcpdump `net` syntax.
    #[serde(default = "default_local_nets")]
    pub local_nets: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            local_nets: default_local_nets(),
        }
    }
}

fn default_local_nets() -> Vec<String> {
    vec!["192.168.0.0/16", "10.0.0.0/8"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Reverse DNS settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Resolve IP tokens when rolling up domains.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Per-lookup timeout in milliseconds.
    #[serde(default = "default_dns_timeout")]
    pub timeout_ms: u64,

    /// Lookups in flight at once.
    #[serde(default = "default_dns_concurrency")]
    pub concurrency: usize,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: default_dns_timeout(),
            concurrency: default_dns_concurrency(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_dns_timeout() -> u64 {
    2000
}

fn default_dns_concurrency() -> usize {
    8
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output_dir) = args.output_dir {
            self.general.output_dir = output_dir.clone();
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(ref work_dir) = args.work_dir {
            self.general.work_dir = Some(work_dir.clone());
        }

        if let Some(ref extensions) = args.extensions {
            self.scanner.extensions = extensions.clone();
        }
        if let Some(ref excludes) = args.exclude {
            self.scanner.excludes = excludes.clone();
        }
        if args.max_files.is_some() {
            self.scanner.max_files = args.max_files;
        }

        if let Some(ref local_nets) = args.local_nets {
            self.network.local_nets = local_nets.clone();
        }

        if let Some(timeout) = args.dns_timeout_ms {
            self.dns.timeout_ms = timeout;
        }

        // Flags always override
        if args.no_resolve {
            self.dns.enabled = false;
        }
        if args.keep_temp {
            self.general.keep_temp = true;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check values a config file may have set out of range.
    pub fn validate(&self) -> Result<()> {
        if self.general.concurrency == 0 {
            anyhow::bail!("general.concurrency must be at least 1");
        }
        if self.dns.concurrency == 0 {
            anyhow::bail!("dns.concurrency must be at least 1");
        }
        if self.dns.timeout_ms == 0 {
            anyhow::bail!("dns.timeout_ms must be at least 1");
        }
        if self.network.local_nets.is_empty() {
            anyhow::bail!("network.local_nets must name at least one network");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
