//! Protocol breakdown section of tcpdstat output.
//!
//! ```text
//! ### Protocol Breakdown ###
//! <<<<
//!      protocol		packets			bytes		bytes/pkt
//! ------------------------------------------------------------------------
//! [0] total	      120 (100.00%)	          90210 (100.00%)    751.75
//! [1] ip	      120 (100.00%)	          90210 (100.00%)    751.75
//! [2]  tcp	      100 ( 83.33%)	          85000 ( 94.22%)    850.00
//! [3]   http(s)	       80 ( 66.67%)	          80000 ( 88.68%)   1000.00
//! [2]  udp	       20 ( 16.67%)	           5210 (  5.78%)    260.50
//! [3]   dns	       20 ( 16.67%)	           5210 (  5.78%)    260.50
//! >>>>
//! ```
//!
//! The marker, `<<<<`, the column header and the rule are the four header
//! lines of the section. Rows after a `tcp` or `udp` row are services of that
//! protocol until the next `[2]` row.

use super::{field, fields, parse_count, Parsed};
use crate::error::ParseError;
use crate::models::{ParsedRecord, Protocol};
use tracing::warn;

pub const SECTION_START: &str = "### Protocol Breakdown ###";
pub const SECTION_END: &str = ">>>>";
/// Section lines, marker included, that precede the first table row.
pub const HEADER_LINES: usize = 4;

/// Position of the parser relative to the breakdown section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakdownState {
    #[default]
    Outside,
    NoProtocol,
    Tcp,
    Udp,
}

impl BreakdownState {
    fn protocol(&self) -> Option<Protocol> {
        match self {
            BreakdownState::Tcp => Some(Protocol::Tcp),
            BreakdownState::Udp => Some(Protocol::Udp),
            BreakdownState::Outside | BreakdownState::NoProtocol => None,
        }
    }

    fn in_section(&self) -> bool {
        !matches!(self, BreakdownState::Outside)
    }
}

/// Line-at-a-time state machine over one tcpdstat report.
#[derive(Debug, Clone, Default)]
pub struct ProtocolBreakdownParser {
    state: BreakdownState,
    section_line: usize,
}

impl ProtocolBreakdownParser {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn state(&self) -> BreakdownState {
        self.state
    }

    /// Feed the next line. Returns a sample when the line is a service row
    /// of the current protocol.
    pub fn feed(&mut self, line: &str) -> Result<Option<ParsedRecord>, ParseError> {
        let line = line.trim_end();
        if line == SECTION_START {
            self.state = BreakdownState::NoProtocol;
            self.section_line = 1;
            return Ok(None);
        }
        if line == SECTION_END {
            self.state = BreakdownState::Outside;
            return Ok(None);
        }
        if !self.state.in_section() {
            return Ok(None);
        }

        self.section_line += 1;
        if self.section_line <= HEADER_LINES {
            return Ok(None);
        }

        let collapsed = collapse_paren_padding(line);
        let parts = fields(&collapsed);
        let Some(&level) = parts.first() else {
            return Ok(None);
        };

        if level == "[2]" {
            self.state = BreakdownState::NoProtocol;
        }

        let sample = match self.state.protocol() {
            Some(protocol) => Some(service_sample(protocol, &parts)),
            None => None,
        };

        match parts.get(1).copied() {
            Some("tcp") => self.state = BreakdownState::Tcp,
            Some("udp") => self.state = BreakdownState::Udp,
            Some("other") => self.state = BreakdownState::NoProtocol,
            _ => {}
        }

        sample.transpose()
    }
}

fn service_sample(protocol: Protocol, parts: &[&str]) -> Result<ParsedRecord, ParseError> {
    let service = field(parts, 1)?;
    let bytes = parse_count(field(parts, 4)?)?;

    Ok(ParsedRecord::ProtocolByteSample {
        protocol,
        service: service.to_string(),
        bytes,
    })
}

/// Remove whitespace directly after each `(`, so `( 83.33%)` stays a single
/// field.
pub fn collapse_paren_padding(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut after_paren = false;

    for c in line.chars() {
        if after_paren && c.is_whitespace() {
            continue;
        }
        after_paren = c == '(';
        out.push(c);
    }

    out
}

/// Run the state machine over a whole report.
pub fn parse_protocol_breakdown(source: &str, text: &str) -> Parsed<ParsedRecord> {
    let mut parser = ProtocolBreakdownParser::new();
    let mut parsed = Parsed::default();

    for (number, line) in text.lines().enumerate() {
        match parser.feed(line) {
            Ok(Some(sample)) => parsed.records.push(sample),
            Ok(None) => {}
            Err(e) => {
                warn!(
                    "{}:{}: skipping malformed breakdown row {:?}: {}",
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
