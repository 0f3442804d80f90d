//! Line grammars for host extraction, IP aggregation and ICMP output.

use super::{field, fields, parse_count, LineGrammar};
use crate::error::ParseError;
use crate::models::ParsedRecord;

/// Category every "unreachable" ICMP message folds into.
pub const UNREACHABLE_CATEGORY: &str = "ICMP Destination unreachable";

/// `httpry -f host` output: one host per line, `#` marks comments.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostGrammar;

impl LineGrammar for HostGrammar {
    type Record = ParsedRecord;

    fn parse_line(&self, line: &str) -> Result<Option<ParsedRecord>, ParseError> {
        if line.contains('#') {
            return Ok(None);
        }

        let host = line.trim();
        if host.is_empty() {
            return Ok(None);
        }

        Ok(Some(ParsedRecord::HostCount {
            host: host.to_string(),
            count: 1,
        }))
    }
}

/// `ipaggcreate` output: `<ip> <count>`, `!` marks headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpAggregateGrammar;

impl LineGrammar for IpAggregateGrammar {
    type Record = ParsedRecord;

    fn parse_line(&self, line: &str) -> Result<Option<ParsedRecord>, ParseError> {
        if line.contains('!') || line.trim().is_empty() {
            return Ok(None);
        }

        let parts = fields(line);
        let ip = field(&parts, 0)?;
        let count = parse_count(field(&parts, 1)?)?;

        Ok(Some(ParsedRecord::IpCount {
            ip: ip.to_string(),
            count,
        }))
    }
}

/// `ipsumdump --icmp-type-name --icmp-code-name` output: `<type> <code>`,
/// one packet per line, `!` marks headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct IcmpTypeCodeGrammar;

impl LineGrammar for IcmpTypeCodeGrammar {
    type Record = ParsedRecord;

    fn parse_line(&self, line: &str) -> Result<Option<ParsedRecord>, ParseError> {
        if line.contains('!') || line.trim().is_empty() {
            return Ok(None);
        }

        // Single-space separated: an empty column is still a column.
        let parts: Vec<&str> = line.split(' ').collect();
        let icmp_type = field(&parts, 0)?;
        let code = field(&parts, 1)?;

        Ok(Some(ParsedRecord::IcmpEvent {
            icmp_type: icmp_type.to_string(),
            code: code.to_string(),
        }))
    }
}

/// `tcpdump -t` text for ICMP packets, e.g.
/// `IP 10.0.0.1 > 8.8.8.8: ICMP echo request, id 1, seq 2, length 64`.
///
/// The message sits between the first `:` and the first `,`; any message
/// mentioning "unreachable" folds into [`UNREACHABLE_CATEGORY`].
///
/// IPv4 only: the colons in IPv6 addresses (`IP6 fe80::1 > ff02::1: ...`)
/// split early and yield an empty or garbled category.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyIcmpGrammar;

impl LegacyIcmpGrammar {
    pub fn categorize(message: &str) -> String {
        if message.contains("unreachable") {
            UNREACHABLE_CATEGORY.to_string()
        } else {
            message.to_string()
        }
    }
}

impl LineGrammar for LegacyIcmpGrammar {
    type Record = ParsedRecord;

    fn parse_line(&self, line: &str) -> Result<Option<ParsedRecord>, ParseError> {
        if line.trim().is_empty() {
            return Ok(None);
        }

        let head = line.split(',').next().unwrap_or_default().trim();
        let message = head
            .split(':')
            .nth(1)
            .ok_or(ParseError::MissingDelimiter { delimiter: ':' })?
            .trim();

        Ok(Some(ParsedRecord::IcmpCategory {
            category: Self::categorize(message),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::parse_text;

    #[test]
    fn test_host_grammar_skips_comments_and_blanks() {
        let text = "#comment\nwww.example.com\n\n";
        let parsed = parse_text(&HostGrammar, "hosts", text);

        assert_eq!(parsed.malformed, 0);
        assert_eq!(
            parsed.records,
            vec![ParsedRecord::HostCount {
                host: "www.example.com".to_string(),
                count: 1,
            }]
        );
    }

    #[test]
    fn test_host_grammar_trims() {
        let record = HostGrammar.parse_line("   cdn.example.org \t").unwrap();
        assert_eq!(
            record,
            Some(ParsedRecord::HostCount {
                host: "cdn.example.org".to_string(),
                count: 1,
            })
        );
    }

    #[test]
    fn test_host_grammar_comment_anywhere() {
        assert_eq!(HostGrammar.parse_line("host # trailing").unwrap(), None);
    }

    #[test]
    fn test_ip_aggregate_grammar() {
        assert_eq!(
            IpAggregateGrammar.parse_line("!IPAggregate 1.0").unwrap(),
            None
        );
        assert_eq!(
            IpAggregateGrammar.parse_line("93.184.216.34\t57").unwrap(),
            Some(ParsedRecord::IpCount {
                ip: "93.184.216.34".to_string(),
                count: 57,
            })
        );
    }

    #[test]
    fn test_ip_aggregate_grammar_rejects_bad_rows() {
        assert_eq!(
            IpAggregateGrammar.parse_line("1.2.3.4"),
            Err(ParseError::MissingField { index: 1, found: 1 })
        );
        assert_eq!(
            IpAggregateGrammar.parse_line("1.2.3.4 many"),
            Err(ParseError::InvalidNumber {
                value: "many".to_string()
            })
        );
    }

    #[test]
    fn test_icmp_type_code_grammar() {
        let text = "!IPSummaryDump 1.3\n!data icmp_type_name icmp_code_name\necho-reply 0\nunreachable port\n";
        let parsed = parse_text(&IcmpTypeCodeGrammar, "icmp", text);

        assert_eq!(parsed.malformed, 0);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(
            parsed.records[1],
            ParsedRecord::IcmpEvent {
                icmp_type: "unreachable".to_string(),
                code: "port".to_string(),
            }
        );
    }

    #[test]
    fn test_icmp_type_code_grammar_missing_code() {
        assert!(IcmpTypeCodeGrammar.parse_line("echo-reply").is_err());
    }

    #[test]
    fn test_legacy_icmp_folds_unreachable() {
        let line = "IP 203.0.113.9 > 10.0.0.5: ICMP 203.0.113.9 udp port 53 unreachable, length 68";
        assert_eq!(
            LegacyIcmpGrammar.parse_line(line).unwrap(),
            Some(ParsedRecord::IcmpCategory {
                category: UNREACHABLE_CATEGORY.to_string(),
            })
        );
    }

    #[test]
    fn test_legacy_icmp_keeps_other_messages() {
        let line = "IP 8.8.8.8 > 10.0.0.5: ICMP echo reply, id 7, seq 1, length 64";
        assert_eq!(
            LegacyIcmpGrammar.parse_line(line).unwrap(),
            Some(ParsedRecord::IcmpCategory {
                category: "ICMP echo reply".to_string(),
            })
        );
        assert_eq!(LegacyIcmpGrammar::categorize("echo reply"), "echo reply");
        assert_eq!(
            LegacyIcmpGrammar::categorize("host unreachable - admin prohibited"),
            UNREACHABLE_CATEGORY
        );
    }

    #[test]
    fn test_legacy_icmp_missing_colon() {
        assert_eq!(
            LegacyIcmpGrammar.parse_line("no delimiter here, length 4"),
            Err(ParseError::MissingDelimiter { delimiter: ':' })
        );
    }

    #[test]
    fn test_legacy_icmp_ipv6_line_has_empty_category() {
        let line = "IP6 fe80::1 > ff02::1: ICMP6, neighbor solicitation, length 32";
        assert_eq!(
            LegacyIcmpGrammar.parse_line(line).unwrap(),
            Some(ParsedRecord::IcmpCategory {
                category: String::new()
            })
        );
    }
}
