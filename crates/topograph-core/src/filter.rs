//! # Filters
//!
//! Attribute predicates used to look nodes up in the topology graph.
//!
//! A `Filter` is evaluated against a node's [`Metadata`]. Keys are dotted
//! paths, exactly as for [`Metadata::get_field`].

use crate::{Metadata, TopologyError};
use serde_json::Value;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

// =============================================================================
// IPV4 CIDR
// =============================================================================

/// An IPv4 address with a prefix length, e.g. `10.0.0.5/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ipv4Cidr {
    addr: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    /// Create a CIDR value. Returns `None` when `prefix > 32`.
    #[must_use]
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Option<Self> {
        (prefix <= 32).then_some(Self { addr, prefix })
    }

    /// A host-scope (`/32`) range around a single address.
    #[must_use]
    pub fn host(addr: Ipv4Addr) -> Self {
        Self { addr, prefix: 32 }
    }

    /// The address part.
    #[must_use]
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    /// The prefix length.
    #[must_use]
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    fn mask(&self) -> u32 {
        match self.prefix {
            0 => 0,
            p => u32::MAX << (32 - u32::from(p)),
        }
    }

    /// Check whether `addr` lies in this network.
    #[must_use]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let mask = self.mask();
        (u32::from(addr) & mask) == (u32::from(self.addr) & mask)
    }

    /// Check whether `other` is entirely inside this network.
    #[must_use]
    pub fn encloses(&self, other: &Ipv4Cidr) -> bool {
        self.prefix <= other.prefix && self.contains(other.addr)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = TopologyError;

    /// Parse `a.b.c.d/len`; a bare address is taken as `/32`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TopologyError::AddressParse(s.to_string());
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, prefix.parse::<u8>().map_err(|_| err())?),
            None => (s, 32),
        };
        let addr = addr.trim().parse::<Ipv4Addr>().map_err(|_| err())?;
        Self::new(addr, prefix).ok_or_else(err)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

// =============================================================================
// FILTER
// =============================================================================

/// A predicate over node attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// The field is a string equal to the given value (case-sensitive).
    Term(String, String),
    /// The field holds one or more `a.b.c.d/len` strings, one of which
    /// denotes a network enclosing the given range.
    Ipv4Range(String, Ipv4Cidr),
    /// Negation.
    Not(Box<Filter>),
    /// Conjunction. An empty conjunction matches everything.
    And(Vec<Filter>),
}

impl Filter {
    /// Shorthand for [`Filter::Term`].
    pub fn term(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Term(key.into(), value.into())
    }

    /// Shorthand for [`Filter::Not`].
    #[must_use]
    pub fn not(inner: Filter) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Evaluate the filter against a set of attributes.
    #[must_use]
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Self::Term(key, expected) => metadata.get_str(key) == Some(expected.as_str()),
            Self::Ipv4Range(key, range) => match metadata.get_field(key) {
                Some(Value::String(s)) => cidr_encloses(s, range),
                Some(Value::Array(values)) => values
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|s| cidr_encloses(s, range)),
                _ => false,
            },
            Self::Not(inner) => !inner.matches(metadata),
            Self::And(filters) => filters.iter().all(|f| f.matches(metadata)),
        }
    }
}

fn cidr_encloses(value: &str, range: &Ipv4Cidr) -> bool {
    value
        .parse::<Ipv4Cidr>()
        .is_ok_and(|network| network.encloses(range))
}

// =============================================================================
// TESTS
// =============================================================================
