use std::fmt;
use std::str::FromStr;

use crate::error_handling::types::RejectionReason;

/// Output format shared by every persisted timestamp.
pub const CANONICAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An accepted timezone report.
///
/// Only [`validate`](super::validate) builds one, so holding a `TimezoneReport` means the
/// city, offset and timestamp already passed validation. Fields are read-only.
///
/// The `Display` impl renders the canonical line written to the record file:
/// `city,UTC±n,yyyy-MM-dd HH:mm:ss`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimezoneReport {
    city: String,
    utc_offset: i8,
    zone: String,
    timestamp: String,
}

impl TimezoneReport {
    pub(crate) fn new(city: String, utc_offset: i8, zone: String, timestamp: String) -> Self {
        Self {
            city,
            utc_offset,
            zone,
            timestamp,
        }
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    /// Offset in hours, always within `-12..=12`.
    pub fn utc_offset(&self) -> i8 {
        self.utc_offset
    }

    /// Offset exactly as the client wrote it, e.g. `UTC+8` or `UTC-03`.
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Zero-padded `yyyy-MM-dd HH:mm:ss`.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

impl fmt::Display for TimezoneReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.city, self.zone, self.timestamp)
    }
}

impl FromStr for TimezoneReport {
    type Err = RejectionReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        super::validate(s)
    }
}
