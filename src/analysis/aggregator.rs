//! Counter aggregation across capture files.
//!
//! Counters only grow during a run. Keys keep the order in which they were
//! first seen so report rows come out in a stable, reproducible order.

use crate::models::{BandwidthRecord, ParsedRecord};
use std::collections::HashMap;

/// Single-level counter keyed by string, iterated in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    index: HashMap<String, usize>,
    entries: Vec<(String, u64)>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `key`, inserted with 0 if absent.
    fn slot(&mut self, key: &str) -> &mut u64 {
        let position = match self.index.get(key) {
            Some(&position) => position,
            None => {
                self.entries.push((key.to_string(), 0));
                self.index.insert(key.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[position].1
    }

    /// Count one occurrence of `key`.
    pub fn increment(&mut self, key: &str) {
        self.add(key, 1);
    }

    /// Add `delta` to `key`, inserting it with `delta` if absent.
    pub fn add(&mut self, key: &str, delta: u64) {
        let slot = self.slot(key);
        *slot = slot.saturating_add(delta);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries
            .iter()
            .map(|(key, count)| (key.as_str(), *count))
    }

    /// Report rows as `(key, count)`.
    pub fn snapshot(&self) -> Vec<Vec<String>> {
        self.iter()
            .map(|(key, count)| vec![key.to_string(), count.to_string()])
            .collect()
    }
}

#[cfg(test)]
impl Tally {
    pub fn get(&self, key: &str) -> Option<u64> {
        self.index.get(key).map(|&position| self.entries[position].1)
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |acc, (_, count)| acc.saturating_add(*count))
    }
}

/// Two-level counter: outer key to an inner [`Tally`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NestedTally {
    index: HashMap<String, usize>,
    entries: Vec<(String, Tally)>,
}

impl NestedTally {
    fn inner(&mut self, outer: &str) -> &mut Tally {
        let position = match self.index.get(outer) {
            Some(&position) => position,
            None => {
                self.entries.push((outer.to_string(), Tally::new()));
                self.index.insert(outer.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[position].1
    }

    /// Count one occurrence of the `(outer, inner)` pair.
    pub fn increment(&mut self, outer: &str, inner: &str) {
        self.inner(outer).increment(inner);
    }

    /// Add `delta` to the `(outer, inner)` pair.
    pub fn add(&mut self, outer: &str, inner: &str, delta: u64) {
        self.inner(outer).add(inner, delta);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, u64)> {
        self.entries.iter().flat_map(|(outer, tally)| {
            tally
                .iter()
                .map(move |(inner, count)| (outer.as_str(), inner, count))
        })
    }

    /// Report rows as `(outer, inner, count)`.
    pub fn snapshot(&self) -> Vec<Vec<String>> {
        self.iter()
            .map(|(outer, inner, count)| {
                vec![outer.to_string(), inner.to_string(), count.to_string()]
            })
            .collect()
    }
}

#[cfg(test)]
impl NestedTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, outer: &str, inner: &str) -> Option<u64> {
        self.index
            .get(outer)
            .and_then(|&position| self.entries[position].1.get(inner))
    }

    /// Number of `(outer, inner)` pairs.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|(_, tally)| tally.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// All tallies of a run. Each analysis fills the parts it produces.
#[derive(Debug, Clone, Default)]
pub struct AggregationStore {
    /// Raw host tokens (or IPs) before canonicalization.
    pub hosts: Tally,
    /// ICMP type to code.
    pub icmp_types: NestedTally,
    /// Folded ICMP message categories.
    pub icmp_categories: Tally,
    /// Protocol to service byte totals.
    pub services: NestedTally,
    /// One row per capture, in processing order.
    pub bandwidth: Vec<BandwidthRecord>,
}

impl AggregationStore {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a single parsed record.
    pub fn record(&mut self, record: ParsedRecord) {
        match record {
            ParsedRecord::HostCount { host, count } => self.hosts.add(&host, count),
            ParsedRecord::IpCount { ip, count } => self.hosts.add(&ip, count),
            ParsedRecord::IcmpEvent { icmp_type, code } => {
                self.icmp_types.increment(&icmp_type, &code)
            }
            ParsedRecord::IcmpCategory { category } => self.icmp_categories.increment(&category),
            ParsedRecord::ProtocolByteSample {
                protocol,
                service,
                bytes,
            } => self.services.add(protocol.as_str(), &service, bytes),
            ParsedRecord::Bandwidth(row) => self.bandwidth.push(row),
        }
    }

    /// Merge every record of one file.
    pub fn extend<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = ParsedRecord>,
    {
        for record in records {
            self.record(record);
        }
    }
}
