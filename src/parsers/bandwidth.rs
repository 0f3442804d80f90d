//! Bandwidth statistics from the head of a tcpdstat report.
//!
//! tcpdstat prints its summary at fixed line positions:
//!
//! ```text
//! DumpFile:  temp_trace.pcap
//! FileSize: 0.09MB
//! Id: 200604281200
//! StartTime: Fri Apr 28 12:00:01 2006
//! EndTime:   Fri Apr 28 12:59:58 2006
//! TotalTime: 3597.00 seconds
//! TotalCapSize: 0.09MB  CapLen: 96 bytes
//! # of packets: 120 (88.10KB)
//! AvgRate: 196.00bps  stddev:1.02Kbps   PeakRate: 9.41Kbps
//! ```
//!
//! (The leading blank line of the real output makes `Id` line 4.) Nothing in
//! the output is self-describing, so the extraction sits behind
//! [`StatsExtractor`] and callers never see line numbers.

use super::{field, fields};
use crate::error::ParseError;
use crate::models::BandwidthRecord;

/// Produces one [`BandwidthRecord`] from a complete statistics report.
pub trait StatsExtractor: Send + Sync {
    fn extract(&self, output: &str) -> Result<BandwidthRecord, ParseError>;
}

#[derive(Debug, Clone, Copy)]
enum Column {
    Id,
    StartDay,
    StartTime,
    EndDay,
    EndTime,
    TotalTime,
    TotalCapSize,
    CapLen,
    AvgRate,
    PeakRate,
}

/// (1-indexed line, whitespace field index, column)
const POSITIONS: [(usize, usize, Column); 10] = [
    (4, 1, Column::Id),
    (5, 1, Column::StartDay),
    (5, 4, Column::StartTime),
    (6, 1, Column::EndDay),
    (6, 4, Column::EndTime),
    (7, 1, Column::TotalTime),
    (8, 1, Column::TotalCapSize),
    (8, 3, Column::CapLen),
    (10, 1, Column::AvgRate),
    (10, 4, Column::PeakRate),
];

/// Reads fields from fixed line numbers of tcpdstat output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPositionExtractor;

impl StatsExtractor for FixedPositionExtractor {
    fn extract(&self, output: &str) -> Result<BandwidthRecord, ParseError> {
        let lines: Vec<&str> = output.lines().collect();
        let mut record = BandwidthRecord::default();

        for (line_number, index, column) in POSITIONS {
            let line = lines
                .get(line_number - 1)
                .ok_or(ParseError::Truncated { line: line_number })?;
            let value = field(&fields(line), index)?.to_string();

            match column {
                Column::Id => record.id = value,
                Column::StartDay => record.start_day = value,
                Column::StartTime => record.start_time = value,
                Column::EndDay => record.end_day = value,
                Column::EndTime => record.end_time = value,
                Column::TotalTime => record.total_time_sec = value,
                Column::TotalCapSize => record.total_cap_size = value,
                Column::CapLen => record.cap_len_bytes = value,
                Column::AvgRate => record.avg_rate = value,
                Column::PeakRate => record.peak_rate = value,
            }
        }

        Ok(record)
    }
}
