use std::fmt;
use std::time::{Duration, SystemTime};

/// How long ago an event directory or row came into being
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Age {
    /// Measured age in whole seconds
    Bounded(u64),
    /// Outside the recent window; old enough for any threshold
    AlwaysEligible,
}

impl Age {
    /// Age from a database-side seconds difference; clock skew clamps to zero
    pub fn from_db_seconds(seconds: i64) -> Self {
        Age::Bounded(seconds.max(0) as u64)
    }

    /// Whether this age is past the grace window
    pub fn exceeds(&self, min_age: Duration) -> bool {
        match self {
            Age::Bounded(secs) => *secs > min_age.as_secs(),
            Age::AlwaysEligible => true,
        }
    }
}

impl fmt::Display for Age {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Age::Bounded(secs) => write!(f, "{}s", secs),
            Age::AlwaysEligible => f.write_str("aged out"),
        }
    }
}

/// Reference time for every filesystem age computed during one pass
#[derive(Debug, Clone, Copy)]
pub struct PassClock {
    started: SystemTime,
}

impl PassClock {
    /// Capture the current time as the start of a pass
    pub fn start() -> Self {
        Self::at(SystemTime::now())
    }

    /// Use a fixed reference time
    pub fn at(started: SystemTime) -> Self {
        Self { started }
    }

    /// Age of something last modified at `modified`
    pub fn age_of(&self, modified: SystemTime) -> Age {
        let elapsed = self
            .started
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        Age::Bounded(elapsed.as_secs())
    }
}
