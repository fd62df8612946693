//! Check-in time classification.
//!
//! Two rules are in use: the home summary counts anything after 08:15 on
//! the office clock as late and anything before 08:00 as early, while the
//! records table reads the UTC clock with a 09:15 cutoff and has no early
//! band. Both are kept as named presets and are configurable.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of labels shown for a check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeStatus {
    Early,
    #[serde(rename = "On Time")]
    OnTime,
    Late,
    Absent,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl TimeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TimeStatus::Early => "Early",
            TimeStatus::OnTime => "On Time",
            TimeStatus::Late => "Late",
            TimeStatus::Absent => "Absent",
            TimeStatus::NotApplicable => "N/A",
        }
    }

    /// Parse a label supplied by the backend. Only the three labels the
    /// backend is authoritative for are accepted.
    pub fn from_backend_label(label: &str) -> Option<Self> {
        match label {
            "Early" => Some(TimeStatus::Early),
            "Late" => Some(TimeStatus::Late),
            "On Time" => Some(TimeStatus::OnTime),
            _ => None,
        }
    }
}

impl fmt::Display for TimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which wall clock the hour and minute are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleClock {
    Utc,
    Office,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRule {
    pub cutoff_hour: u32,
    pub cutoff_minute: u32,
    /// Check-ins strictly before this hour are early. `None` disables the band.
    #[serde(default)]
    pub early_before_hour: Option<u32>,
    pub clock: RuleClock,
    /// Label used when there is no usable check-in timestamp
    pub missing: TimeStatus,
}

impl StatusRule {
    /// Late after 08:15 office time, early before 08:00.
    pub fn home() -> Self {
        Self {
            cutoff_hour: 8,
            cutoff_minute: 15,
            early_before_hour: Some(8),
            clock: RuleClock::Office,
            missing: TimeStatus::Absent,
        }
    }

    /// Late after 09:15 UTC, no early band.
    pub fn records() -> Self {
        Self {
            cutoff_hour: 9,
            cutoff_minute: 15,
            early_before_hour: None,
            clock: RuleClock::Utc,
            missing: TimeStatus::NotApplicable,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.cutoff_hour > 23 {
            return Err(format!("cutoff hour {} is not a valid hour", self.cutoff_hour));
        }
        if self.cutoff_minute > 59 {
            return Err(format!(
                "cutoff minute {} is not a valid minute",
                self.cutoff_minute
            ));
        }
        if let Some(early) = self.early_before_hour {
            if early > self.cutoff_hour {
                return Err(format!(
                    "early band ({}:00) ends after the cutoff ({}:{:02})",
                    early, self.cutoff_hour, self.cutoff_minute
                ));
            }
        }
        if !matches!(self.missing, TimeStatus::Absent | TimeStatus::NotApplicable) {
            return Err(format!("'{}' cannot label a missing check-in", self.missing));
        }
        Ok(())
    }

    /// Classify a check-in timestamp.
    ///
    /// A backend label among Early / Late / On Time wins over anything
    /// derived locally.
    pub fn classify(
        &self,
        check_in: Option<&str>,
        backend_label: Option<&str>,
        office: FixedOffset,
    ) -> TimeStatus {
        let Some(check_in) = check_in.filter(|s| !s.trim().is_empty()) else {
            return self.missing;
        };

        if let Some(status) = backend_label.and_then(TimeStatus::from_backend_label) {
            return status;
        }

        match parse_timestamp(check_in) {
            Some(at) => self.classify_instant(at, office),
            None => {
                log::debug!("Unparseable check-in timestamp: {}", check_in);
                self.missing
            }
        }
    }

    /// The clock this rule reads wall time on
    pub fn offset(&self, office: FixedOffset) -> FixedOffset {
        match self.clock {
            RuleClock::Utc => Utc.fix(),
            RuleClock::Office => office,
        }
    }

    /// Classify an already-parsed instant.
    pub fn classify_instant(&self, at: DateTime<Utc>, office: FixedOffset) -> TimeStatus {
        let local = at.with_timezone(&self.offset(office));
        let (hour, minute) = (local.hour(), local.minute());

        if let Some(early) = self.early_before_hour {
            if hour < early {
                return TimeStatus::Early;
            }
        }

        if (hour, minute) <= (self.cutoff_hour, self.cutoff_minute) {
            TimeStatus::OnTime
        } else {
            TimeStatus::Late
        }
    }
}

/// Parse a backend timestamp. RFC 3339 is preferred; naive timestamps are
/// taken to be UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}
