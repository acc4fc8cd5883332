//! Identifier types shared by the loaders and the reconciler.
//!
//! Monitor and event identifiers are only ever turned into path segments from
//! their integer form, so a directory name has to parse as one of these before
//! the audit will touch it.

use std::fmt;

/// Database identity of a monitor (also the name of its directory)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonitorId(pub u64);

/// Database identity of an event (also the name of its directory)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(pub u64);

impl MonitorId {
    /// Parse a directory name, accepting only plain decimal digits
    pub fn from_dir_name(name: &str) -> Option<Self> {
        parse_numeric(name).map(Self)
    }
}

impl EventId {
    /// Parse a directory name, accepting only plain decimal digits
    pub fn from_dir_name(name: &str) -> Option<Self> {
        parse_numeric(name).map(Self)
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// `u64::from_str` would also take "+7", which is not a name the recorder writes.
fn parse_numeric(name: &str) -> Option<u64> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}
