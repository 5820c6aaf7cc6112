//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different identifier kinds (e.g.,
//! using a recipient ID where a station code is expected) and make the code
//! more self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The closed set of notification domains the herald manages.
///
/// Each domain has its own persisted state record, scheduler task, and
/// command vocabulary. Adding a domain means touching this enum; there is
/// deliberately no open-ended registration mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Weekly allowance accrual and balance tracking.
    Budget,
    /// Bin collection reminders.
    Bins,
    /// Live train departure watches.
    Trains,
}

impl Domain {
    /// All domains, in scheduler startup order.
    pub const ALL: [Domain; 3] = [Domain::Budget, Domain::Bins, Domain::Trains];

    /// The filename stem used for this domain's persisted record.
    pub fn record_stem(&self) -> &'static str {
        match self {
            Domain::Budget => "budget",
            Domain::Bins => "bins",
            Domain::Trains => "trains",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.record_stem())
    }
}

/// Error returned when a string does not name a known domain.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown domain: {0}")]
pub struct ParseDomainError(pub String);

impl FromStr for Domain {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "budget" => Ok(Domain::Budget),
            "bins" => Ok(Domain::Bins),
            "trains" => Ok(Domain::Trains),
            other => Err(ParseDomainError(other.to_string())),
        }
    }
}

/// A National Rail CRS station code (3 ASCII letters, stored uppercase).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrsCode(String);

/// Error returned when a string is not a valid CRS code.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid CRS code: {0:?} (expected 3 letters)")]
pub struct InvalidCrsCode(pub String);

impl CrsCode {
    /// Parses a CRS code, uppercasing it.
    ///
    /// # Errors
    ///
    /// Returns an error unless the input is exactly 3 ASCII letters.
    pub fn parse(s: &str) -> Result<Self, InvalidCrsCode> {
        if s.len() == 3 && s.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(CrsCode(s.to_ascii_uppercase()))
        } else {
            Err(InvalidCrsCode(s.to_string()))
        }
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque delivery recipient identifier (e.g., a messaging group ID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(pub String);

impl RecipientId {
    pub fn new(s: impl Into<String>) -> Self {
        RecipientId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RecipientId {
    fn from(s: String) -> Self {
        RecipientId(s)
    }
}

impl From<&str> for RecipientId {
    fn from(s: &str) -> Self {
        RecipientId(s.to_string())
    }
}
