//! The tool stages run for one capture file, and parsing of their output.

use crate::error::ToolError;
use crate::models::{Analysis, Direction, ParsedRecord};
use crate::parsers::{
    parse_protocol_breakdown, parse_text, FixedPositionExtractor, HostGrammar,
    IcmpTypeCodeGrammar, IpAggregateGrammar, LegacyIcmpGrammar, Parsed, StatsExtractor,
};
use crate::tools::{run_checked, Invocation, ToolRunner, Toolchain, TrafficFilter};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where the final stage leaves the text to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSource {
    File(PathBuf),
    Stdout,
}

/// Commands for one capture, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub steps: Vec<Invocation>,
    pub output: OutputSource,
}

/// Build the commands `analysis` runs for the capture at `input`.
pub fn plan(
    toolchain: &Toolchain,
    analysis: Analysis,
    input: &Path,
    filtered: &Path,
    data: &Path,
) -> Plan {
    let filter = |traffic: TrafficFilter| toolchain.filter(traffic, input, filtered);

    match analysis {
        Analysis::Domains => Plan {
            steps: vec![
                filter(TrafficFilter::UplinkWeb),
                toolchain.http_hosts(filtered, data),
            ],
            output: OutputSource::File(data.to_path_buf()),
        },
        Analysis::IpDomains => Plan {
            steps: vec![
                filter(TrafficFilter::Uplink),
                toolchain.ip_aggregate(filtered, data),
            ],
            output: OutputSource::File(data.to_path_buf()),
        },
        Analysis::Icmp => Plan {
            steps: vec![
                filter(TrafficFilter::ExternalIcmp),
                toolchain.icmp_summary(filtered, data),
            ],
            output: OutputSource::File(data.to_path_buf()),
        },
        Analysis::IcmpLegacy => Plan {
            steps: vec![toolchain.icmp_text(input)],
            output: OutputSource::Stdout,
        },
        Analysis::Ports => Plan {
            steps: vec![
                filter(TrafficFilter::External),
                toolchain.statistics(filtered),
            ],
            output: OutputSource::Stdout,
        },
        Analysis::Bandwidth(direction) => {
            let traffic = match direction {
                Direction::Uplink => TrafficFilter::Uplink,
                Direction::Downlink => TrafficFilter::Downlink,
            };
            Plan {
                steps: vec![filter(traffic), toolchain.statistics(filtered)],
                output: OutputSource::Stdout,
            }
        }
    }
}

/// Run every step of `plan`, stopping at the first failure, and return the
/// text the last step produced.
pub fn execute(runner: &dyn ToolRunner, plan: &Plan) -> Result<String, ToolError> {
    let mut stdout = String::new();

    for step in &plan.steps {
        debug!("Running {}", step);
        stdout = run_checked(runner, step)?.stdout;
    }

    match &plan.output {
        OutputSource::Stdout => Ok(stdout),
        OutputSource::File(path) => {
            std::fs::read_to_string(path).map_err(|source| ToolError::Output {
                path: path.clone(),
                source,
            })
        }
    }
}

/// Parse one capture's tool output with the grammar of `analysis`.
pub fn parse_output(analysis: Analysis, source: &str, text: &str) -> Parsed<ParsedRecord> {
    match analysis {
        Analysis::Domains => parse_text(&HostGrammar, source, text),
        Analysis::IpDomains => parse_text(&IpAggregateGrammar, source, text),
        Analysis::Icmp => parse_text(&IcmpTypeCodeGrammar, source, text),
        Analysis::IcmpLegacy => parse_text(&LegacyIcmpGrammar, source, text),
        Analysis::Ports => parse_protocol_breakdown(source, text),
        Analysis::Bandwidth(_) => match FixedPositionExtractor.extract(text) {
            Ok(record) => Parsed {
                records: vec![ParsedRecord::Bandwidth(record)],
                malformed: 0,
            },
            Err(e) => {
                warn!("{}: skipping bandwidth statistics: {}", source, e);
                Parsed {
                    records: Vec::new(),
                    malformed: 1,
                }
            }
        },
    }
}
