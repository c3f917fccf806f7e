// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Concrete address values
//!
//! The resolver turns every address token into a set of [`AddressValue`]s.
//! Containment between two such sets is decided here: IP networks and IP
//! ranges are compared as numeric intervals, FQDNs by exact pattern
//! equality, and [`AddressValue::Any`] dominates everything.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeSet;
use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::{Serialize, Serializer};

/// A fully resolved address, free of any name indirection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressValue {
    /// Universal sentinel; a superset of every other value.
    Any,
    /// A single host or a CIDR block.
    Network { addr: IpAddr, prefix: u8 },
    /// An inclusive `start-end` range within one address family.
    Range { start: IpAddr, end: IpAddr },
    /// An FQDN pattern. Compared literally; no wildcard-DNS inference.
    Fqdn(String),
}

/// Resolved value set of one token or one rule field.
pub type ValueSet = BTreeSet<AddressValue>;

/// Why a raw address could not be turned into a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressParseError {
    Empty,
    InvalidNetwork(String),
    InvalidRange(String),
    MixedFamilies,
    ReversedRange,
    Unsupported(&'static str),
}

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressParseError::Empty => write!(f, "empty address value"),
            AddressParseError::InvalidNetwork(msg) => write!(f, "invalid ip-netmask: {}", msg),
            AddressParseError::InvalidRange(msg) => write!(f, "invalid ip-range: {}", msg),
            AddressParseError::MixedFamilies => {
                write!(f, "ip-range mixes IPv4 and IPv6 endpoints")
            }
            AddressParseError::ReversedRange => write!(f, "ip-range start is above its end"),
            AddressParseError::Unsupported(kind) => write!(f, "{} values are not supported", kind),
        }
    }
}

impl std::error::Error for AddressParseError {}

impl AddressValue {
    /// Parse an `ip-netmask` value: a bare address or `address/prefix`.
    pub fn parse_netmask(raw: &str) -> Result<Self, AddressParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AddressParseError::Empty);
        }
        IpNetwork::from_str(raw)
            .map(|net| AddressValue::Network {
                addr: net.ip(),
                prefix: net.prefix(),
            })
            .map_err(|e| AddressParseError::InvalidNetwork(e.to_string()))
    }

    /// Parse an `ip-range` value of the form `start-end`.
    pub fn parse_range(raw: &str) -> Result<Self, AddressParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AddressParseError::Empty);
        }
        let (start, end) = raw
            .split_once('-')
            .ok_or_else(|| AddressParseError::InvalidRange(format!("`{}` has no `-`", raw)))?;
        let start = IpAddr::from_str(start.trim())
            .map_err(|e| AddressParseError::InvalidRange(e.to_string()))?;
        let end = IpAddr::from_str(end.trim())
            .map_err(|e| AddressParseError::InvalidRange(e.to_string()))?;
        if start.is_ipv4() != end.is_ipv4() {
            return Err(AddressParseError::MixedFamilies);
        }
        if start > end {
            return Err(AddressParseError::ReversedRange);
        }
        Ok(AddressValue::Range { start, end })
    }

    pub fn parse_fqdn(raw: &str) -> Result<Self, AddressParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AddressParseError::Empty);
        }
        Ok(AddressValue::Fqdn(raw.to_string()))
    }

    /// Interpret a rule token that names no object or group as a literal
    /// address, if it looks like one.
    pub fn parse_literal(token: &str) -> Option<Self> {
        if let Ok(value) = Self::parse_netmask(token) {
            return Some(value);
        }
        if token.contains('-') {
            return Self::parse_range(token).ok();
        }
        None
    }

    /// The inclusive numeric interval covered by an IP value.
    pub fn interval(&self) -> Option<IpInterval> {
        match self {
            AddressValue::Network { addr, prefix } => {
                Some(IpInterval::from_network(*addr, *prefix))
            }
            AddressValue::Range { start, end } => Some(IpInterval {
                v6: start.is_ipv6(),
                start: addr_to_u128(*start),
                end: addr_to_u128(*end),
            }),
            AddressValue::Any | AddressValue::Fqdn(_) => None,
        }
    }
}

impl fmt::Display for AddressValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressValue::Any => write!(f, "any"),
            AddressValue::Network { addr, prefix } => write!(f, "{}/{}", addr, prefix),
            AddressValue::Range { start, end } => write!(f, "{}-{}", start, end),
            AddressValue::Fqdn(name) => write!(f, "{}", name),
        }
    }
}

impl Serialize for AddressValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// Interval arithmetic
// ============================================================================

/// An inclusive span of addresses within one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IpInterval {
    pub v6: bool,
    pub start: u128,
    pub end: u128,
}

impl IpInterval {
    fn from_network(addr: IpAddr, prefix: u8) -> Self {
        let (v6, bits) = match addr {
            IpAddr::V4(_) => (false, 32u32),
            IpAddr::V6(_) => (true, 128u32),
        };
        let host_bits = bits.saturating_sub(u32::from(prefix));
        let base = addr_to_u128(addr);
        let span = if host_bits >= 128 {
            u128::MAX
        } else {
            (1u128 << host_bits) - 1
        };
        let start = base & !span;
        Self {
            v6,
            start,
            end: start | span,
        }
    }

    pub fn contains(&self, other: &IpInterval) -> bool {
        self.v6 == other.v6 && self.start <= other.start && other.end <= self.end
    }
}

fn addr_to_u128(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// Sort and coalesce intervals so that overlapping or touching spans of the
/// same family become one.
fn merge_intervals(mut intervals: Vec<IpInterval>) -> Vec<IpInterval> {
    intervals.sort();
    let mut merged: Vec<IpInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last)
                if last.v6 == interval.v6
                    && (last.end == u128::MAX || interval.start <= last.end + 1) =>
            {
                last.end = last.end.max(interval.end);
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// A resolved field together with the merged IP spans of its values.
///
/// The spans are computed once, so a field can be compared against every
/// later rule without rebuilding them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedValues {
    values: ValueSet,
    spans: Vec<IpInterval>,
}

impl ResolvedValues {
    pub fn new(values: ValueSet) -> Self {
        let spans = merge_intervals(values.iter().filter_map(AddressValue::interval).collect());
        Self { values, spans }
    }

    pub fn values(&self) -> &ValueSet {
        &self.values
    }

    /// Merged, sorted IP spans; FQDNs and `any` are not included.
    pub fn spans(&self) -> &[IpInterval] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether every address matched by `following` is also matched here.
    ///
    /// Empty sets never cover and are never covered: an empty resolution
    /// means the analysis could not establish what the field matches.
    pub fn covers(&self, following: &ValueSet) -> bool {
        if self.values.is_empty() || following.is_empty() {
            return false;
        }
        if self.values.contains(&AddressValue::Any) {
            return true;
        }

        following.iter().all(|value| match value {
            AddressValue::Any => false,
            AddressValue::Fqdn(_) => self.values.contains(value),
            AddressValue::Network { .. } | AddressValue::Range { .. } => match value.interval() {
                Some(interval) => self.spans.iter().any(|span| span.contains(&interval)),
                None => false,
            },
        })
    }
}

impl From<ValueSet> for ResolvedValues {
    fn from(values: ValueSet) -> Self {
        Self::new(values)
    }
}

/// Whether every address matched by `following` is also matched by
/// `preceding`. Builds the spans of `preceding` on every call; hold a
/// [`ResolvedValues`] to compare one field repeatedly.
pub fn values_cover(preceding: &ValueSet, following: &ValueSet) -> bool {
    ResolvedValues::new(preceding.clone()).covers(following)
}
