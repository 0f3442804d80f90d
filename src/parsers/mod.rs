//! Parsers for the text output of the external capture tools.
//!
//! Line-oriented formats implement [`LineGrammar`]; the statistics report is
//! handled by the stateful [`protocol::ProtocolBreakdownParser`] and the
//! [`StatsExtractor`] implementations.

pub mod bandwidth;
pub mod lines;
pub mod protocol;

pub use bandwidth::{FixedPositionExtractor, StatsExtractor};
pub use lines::{HostGrammar, IcmpTypeCodeGrammar, IpAggregateGrammar, LegacyIcmpGrammar};
pub use protocol::parse_protocol_breakdown;

use crate::error::ParseError;
use tracing::warn;

/// Grammar for one line of a tool's output.
pub trait LineGrammar {
    type Record;

    /// Parse one line. `Ok(None)` means the line is a comment, header or
    /// blank and carries no record.
    fn parse_line(&self, line: &str) -> Result<Option<Self::Record>, ParseError>;
}

/// Records parsed from one output, plus how many lines were rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed<R> {
    pub records: Vec<R>,
    pub malformed: usize,
}

impl<R> Default for Parsed<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            malformed: 0,
        }
    }
}

/// Parse every line of `text`, logging and skipping malformed ones.
pub fn parse_text<G: LineGrammar>(grammar: &G, source: &str, text: &str) -> Parsed<G::Record> {
    let mut parsed = Parsed::default();

    for (number, line) in text.lines().enumerate() {
        match grammar.parse_line(line) {
            Ok(Some(record)) => parsed.records.push(record),
            Ok(None) => {}
            Err(e) => {
                warn!(
                    "{}:{}: skipping malformed line {:?}: {}",
                    source,
                    number + 1,
                    line,
                    e
                );
                parsed.malformed += 1;
            }
        }
    }

    parsed
}

/// Split on runs of whitespace.
pub(crate) fn fields(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

pub(crate) fn field<'a>(fields: &[&'a str], index: usize) -> Result<&'a str, ParseError> {
    fields.get(index).copied().ok_or(ParseError::MissingField {
        index,
        found: fields.len(),
    })
}

pub(crate) fn parse_count(value: &str) -> Result<u64, ParseError> {
    value.parse::<u64>().map_err(|_| ParseError::InvalidNumber {
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_counts_malformed() {
        let text = "!header\n1.2.3.4 10\nnot-a-row\n5.6.7.8 x\n\n9.9.9.9 1\n";
        let parsed = parse_text(&IpAggregateGrammar, "agg.txt", text);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.malformed, 2);
    }

    #[test]
    fn test_field_out_of_range() {
        let parts = fields("only");
        assert_eq!(field(&parts, 0), Ok("only"));
        assert_eq!(
            field(&parts, 1),
            Err(ParseError::MissingField { index: 1, found: 1 })
        );
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("42"), Ok(42));
        assert!(parse_count("-1").is_err());
        assert!(parse_count("4.2").is_err());
    }
}
