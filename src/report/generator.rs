//! CSV, JSON and Markdown report generation.
//!
//! Every format carries the same header and rows; CSV is the format the
//! downstream spreadsheets read, the others are for people and scripts.

use crate::analysis::AggregationStore;
use crate::cli::OutputFormat;
use crate::models::{Analysis, Report, ReportMetadata};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Field separator of CSV rows.
pub const CSV_SEPARATOR: &str = ", ";

/// Rows of `analysis` from the store, in first-seen order.
pub fn rows(analysis: Analysis, store: &AggregationStore) -> Vec<Vec<String>> {
    match analysis {
        Analysis::Domains | Analysis::IpDomains => store.hosts.snapshot(),
        Analysis::Icmp => store.icmp_types.snapshot(),
        Analysis::IcmpLegacy => store.icmp_categories.snapshot(),
        Analysis::Ports => store.services.snapshot(),
        Analysis::Bandwidth(_) => store.bandwidth.iter().map(|r| r.fields()).collect(),
    }
}

/// Assemble the report for `analysis`.
pub fn build_report(
    analysis: Analysis,
    store: &AggregationStore,
    metadata: ReportMetadata,
) -> Report {
    Report {
        metadata,
        header: analysis.header().iter().map(|h| h.to_string()).collect(),
        rows: rows(analysis, store),
    }
}

/// Generate the CSV text: header line, then one line per row.
pub fn generate_csv_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str(&report.header.join(CSV_SEPARATOR));
    output.push('\n');

    for row in &report.rows {
        output.push_str(&row.join(CSV_SEPARATOR));
        output.push('\n');
    }

    output
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Generate a Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Captally Report: {}\n\n", report.metadata.analysis));
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table(report));

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Input:** `{}`\n", metadata.input));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Files Processed:** {}\n",
        metadata.files_processed
    ));
    if metadata.files_failed > 0 {
        section.push_str(&format!("- **Files Failed:** {}\n", metadata.files_failed));
    }
    if metadata.malformed_lines > 0 {
        section.push_str(&format!(
            "- **Malformed Lines Skipped:** {}\n",
            metadata.malformed_lines
        ));
    }
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn generate_table(report: &Report) -> String {
    let mut table = String::new();

    table.push_str("## Results\n\n");
    if report.rows.is_empty() {
        table.push_str("*No records.*\n");
        return table;
    }

    table.push_str(&markdown_row(&report.header));
    table.push_str(&format!(
        "|{}\n",
        "---|".repeat(report.header.len())
    ));
    for row in &report.rows {
        table.push_str(&markdown_row(row));
    }

    table
}

fn markdown_row(cells: &[String]) -> String {
    let escaped: Vec<String> = cells.iter().map(|c| c.replace('|', "\\|")).collect();
    format!("| {} |\n", escaped.join(" | "))
}

/// Render `report` in `format`.
pub fn render(report: &Report, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Csv => Ok(generate_csv_report(report)),
        OutputFormat::Json => generate_json_report(report),
        OutputFormat::Markdown => Ok(generate_markdown_report(report)),
    }
}

/// Where the report goes: `output` if given, else the analysis' default
/// file name inside `output_dir`, with the extension of `format`.
pub fn output_path(
    analysis: Analysis,
    format: OutputFormat,
    output: Option<&Path>,
    output_dir: &Path,
) -> PathBuf {
    match output {
        Some(path) => path.to_path_buf(),
        None => output_dir
            .join(analysis.default_file_name())
            .with_extension(format.extension()),
    }
}

/// Write the rendered report, creating missing parent directories.
pub fn write_report(report: &Report, format: OutputFormat, path: &Path) -> Result<()> {
    let content = render(report, format)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write report {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BandwidthRecord, Direction, ParsedRecord, Protocol};
    use chrono::Utc;
    use tempfile::TempDir;

    fn metadata(analysis: Analysis) -> ReportMetadata {
        ReportMetadata {
            analysis: analysis.to_string(),
            input: "captures".to_string(),
            generated_at: Utc::now(),
            files_processed: 2,
            files_failed: 1,
            malformed_lines: 3,
            duration_seconds: 1.5,
        }
    }

    fn ports_store() -> AggregationStore {
        let mut store = AggregationStore::new();
        store.extend([
            ParsedRecord::ProtocolByteSample {
                protocol: Protocol::Tcp,
                service: "http(80)".to_string(),
                bytes: 1200,
            },
            ParsedRecord::ProtocolByteSample {
                protocol: Protocol::Udp,
                service: "dns(53)".to_string(),
                bytes: 300,
            },
            ParsedRecord::ProtocolByteSample {
                protocol: Protocol::Tcp,
                service: "http(80)".to_string(),
                bytes: 800,
            },
        ]);
        store
    }

    #[test]
    fn test_csv_rows_joined_with_comma_space() {
        let report = build_report(Analysis::Ports, &ports_store(), metadata(Analysis::Ports));
        let csv = generate_csv_report(&report);

        assert_eq!(
            csv,
            "protocol, service, bytes\ntcp, http(80), 2000\nudp, dns(53), 300\n"
        );
    }

    #[test]
    fn test_bandwidth_rows() {
        let mut store = AggregationStore::new();
        store.record(ParsedRecord::Bandwidth(BandwidthRecord {
            id: "200604281200".to_string(),
            avg_rate: "196.00bps".to_string(),
            ..Default::default()
        }));
        let analysis = Analysis::Bandwidth(Direction::Uplink);
        let report = build_report(analysis, &store, metadata(analysis));

        assert_eq!(report.header[0], "Id");
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0][0], "200604281200");
        assert_eq!(report.rows[0][8], "196.00bps");
    }

    #[test]
    fn test_empty_store_has_header_only() {
        let report = build_report(
            Analysis::Icmp,
            &AggregationStore::new(),
            metadata(Analysis::Icmp),
        );
        assert_eq!(generate_csv_report(&report), "type, code, count\n");
    }

    #[test]
    fn test_json_report() {
        let report = build_report(Analysis::Ports, &ports_store(), metadata(Analysis::Ports));
        let json = generate_json_report(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["metadata"]["analysis"], "ports");
        assert_eq!(value["header"][1], "service");
        assert_eq!(value["rows"][0][2], "2000");
    }

    #[test]
    fn test_markdown_report() {
        let report = build_report(Analysis::Ports, &ports_store(), metadata(Analysis::Ports));
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# Captally Report: ports"));
        assert!(markdown.contains("- **Files Failed:** 1"));
        assert!(markdown.contains("| protocol | service | bytes |"));
        assert!(markdown.contains("|---|---|---|"));
        assert!(markdown.contains("| tcp | http(80) | 2000 |"));
    }

    #[test]
    fn test_output_path() {
        let dir = Path::new("reports");
        assert_eq!(
            output_path(Analysis::Ports, OutputFormat::Csv, None, dir),
            PathBuf::from("reports/port-analysis.csv")
        );
        assert_eq!(
            output_path(Analysis::Icmp, OutputFormat::Json, None, dir),
            PathBuf::from("reports/icmp-analysis.json")
        );
        assert_eq!(
            output_path(
                Analysis::Icmp,
                OutputFormat::Markdown,
                Some(Path::new("out.txt")),
                dir
            ),
            PathBuf::from("out.txt")
        );
    }

    #[test]
    fn test_write_report_creates_parent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("port-analysis.csv");
        let report = build_report(Analysis::Ports, &ports_store(), metadata(Analysis::Ports));

        write_report(&report, OutputFormat::Csv, &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("protocol, service, bytes\n"));
    }
}
