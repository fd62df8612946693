//! Data behind each screen: what the backend sent, reshaped for display.

pub mod dashboard;
pub mod employee;
pub mod home;
pub mod records;
pub mod settings;

use chrono::{DateTime, FixedOffset, Utc};
use thiserror::Error;

/// Input problems caught before anything is sent to the backend
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please capture or upload a face image")]
    MissingImage,
    #[error("Invalid image data")]
    InvalidImage,
    #[error("Please fill in all required fields (missing: {})", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("Please enter a Bot Token first to find the Group ID")]
    MissingBotToken,
    #[error("No updates found. Send a message to your bot first.")]
    NoTelegramUpdates,
    #[error("Group ID not found in recent updates.")]
    GroupIdNotFound,
}

/// "09:05 AM"
pub fn format_clock_time(at: DateTime<Utc>, tz: FixedOffset) -> String {
    at.with_timezone(&tz).format("%I:%M %p").to_string()
}

/// "Mon, Mar 3"
pub fn format_short_date(at: DateTime<Utc>, tz: FixedOffset) -> String {
    at.with_timezone(&tz).format("%a, %b %-d").to_string()
}

/// "Monday, March 3"
pub fn format_long_date(at: DateTime<FixedOffset>) -> String {
    at.format("%A, %B %-d").to_string()
}
