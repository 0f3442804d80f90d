//! Data models for the capture aggregator.
//!
//! This module contains the records produced by the line grammars, the
//! analysis selection types, and the report structures shared by the
//! pipeline and the report generator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport protocol of a protocol-breakdown sub-table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traffic direction for bandwidth analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Traffic leaving the local networks
    #[default]
    Uplink,
    /// Traffic entering the local networks
    Downlink,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Uplink => write!(f, "uplink"),
            Direction::Downlink => write!(f, "downlink"),
        }
    }
}

/// The analysis performed by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Analysis {
    /// HTTP host names rolled up to site domains.
    Domains,
    /// Aggregated IP counts, reverse-resolved and rolled up to site domains.
    IpDomains,
    /// ICMP type/code tallies.
    Icmp,
    /// ICMP message categories from tcpdump's text output.
    IcmpLegacy,
    /// Per-service byte totals for TCP and UDP.
    Ports,
    /// One bandwidth statistics row per capture.
    Bandwidth(Direction),
}

impl Analysis {
    /// Column header line of the CSV report.
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            Analysis::Domains | Analysis::IpDomains => &["host", "count"],
            Analysis::Icmp => &["type", "code", "count"],
            Analysis::IcmpLegacy => &["category", "count"],
            Analysis::Ports => &["protocol", "service", "bytes"],
            Analysis::Bandwidth(_) => &BandwidthRecord::HEADER,
        }
    }

    /// Default report file name.
    pub fn default_file_name(&self) -> &'static str {
        match self {
            Analysis::Domains => "domain-analysis.csv",
            Analysis::IpDomains => "ip-domain-analysis.csv",
            Analysis::Icmp => "icmp-analysis.csv",
            Analysis::IcmpLegacy => "icmp-category-analysis.csv",
            Analysis::Ports => "port-analysis.csv",
            Analysis::Bandwidth(Direction::Uplink) => "uplink-analysis.csv",
            Analysis::Bandwidth(Direction::Downlink) => "downlink-analysis.csv",
        }
    }

    /// Whether report keys go through the domain canonicalizer.
    pub fn canonicalizes_hosts(&self) -> bool {
        matches!(self, Analysis::Domains | Analysis::IpDomains)
    }
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Analysis::Domains => write!(f, "domains"),
            Analysis::IpDomains => write!(f, "ip-domains"),
            Analysis::Icmp => write!(f, "icmp"),
            Analysis::IcmpLegacy => write!(f, "icmp-legacy"),
            Analysis::Ports => write!(f, "ports"),
            Analysis::Bandwidth(direction) => write!(f, "bandwidth ({})", direction),
        }
    }
}

/// One capture's bandwidth statistics, copied verbatim from tcpdstat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthRecord {
    pub id: String,
    pub start_day: String,
    pub start_time: String,
    pub end_day: String,
    pub end_time: String,
    pub total_time_sec: String,
    pub total_cap_size: String,
    pub cap_len_bytes: String,
    pub avg_rate: String,
    pub peak_rate: String,
}

impl BandwidthRecord {
    pub const HEADER: [&'static str; 10] = [
        "Id",
        "StartDay",
        "StartTime",
        "EndDay",
        "EndTime",
        "TotalTime(s)",
        "TotalCapSize",
        "Caplen (bytes)",
        "AvgRate",
        "PeakRate",
    ];

    /// Fields in report column order.
    pub fn fields(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.start_day.clone(),
            self.start_time.clone(),
            self.end_day.clone(),
            self.end_time.clone(),
            self.total_time_sec.clone(),
            self.total_cap_size.clone(),
            self.cap_len_bytes.clone(),
            self.avg_rate.clone(),
            self.peak_rate.clone(),
        ]
    }
}

/// A single record produced by one of the line grammars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRecord {
    /// A raw host token from host extraction; each line counts once.
    HostCount { host: String, count: u64 },
    /// One ICMP packet's type and code names.
    IcmpEvent { icmp_type: String, code: String },
    /// One ICMP message category folded from tcpdump text.
    IcmpCategory { category: String },
    /// An address and its packet count from IP aggregation.
    IpCount { ip: String, count: u64 },
    /// Bytes carried by one service of a protocol sub-table.
    ProtocolByteSample {
        protocol: Protocol,
        service: String,
        bytes: u64,
    },
    /// Statistics for a whole capture.
    Bandwidth(BandwidthRecord),
}

/// Metadata about a generated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Analysis that produced the report.
    pub analysis: String,
    /// Folder the captures were read from.
    pub input: String,
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Number of capture files processed.
    pub files_processed: usize,
    /// Number of capture files whose contribution was skipped.
    pub files_failed: usize,
    /// Number of output lines skipped as malformed.
    pub malformed_lines: usize,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// A complete tabular report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}
