//! Request and response bodies exchanged with the attendance backend.
//!
//! The backend is loose about types (ids may be numbers or UUID strings,
//! settings come back as numbers, strings or null), so several fields go
//! through lenient deserializers.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, alias = "isAdmin")]
    pub is_admin: Option<bool>,
    #[serde(default, alias = "employee")]
    pub user: Option<LoginUser>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl LoginResponse {
    pub fn admin(&self) -> bool {
        self.is_admin
            .or_else(|| self.user.as_ref().and_then(|u| u.is_admin))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginUser {
    #[serde(default, alias = "isAdmin")]
    pub is_admin: Option<bool>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Window for the employee attendance history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryRange {
    Today,
    #[default]
    Week,
    Month,
    Year,
}

impl HistoryRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryRange::Today => "today",
            HistoryRange::Week => "week",
            HistoryRange::Month => "month",
            HistoryRange::Year => "year",
        }
    }
}

impl fmt::Display for HistoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "today" => Ok(HistoryRange::Today),
            "week" => Ok(HistoryRange::Week),
            "month" => Ok(HistoryRange::Month),
            "year" => Ok(HistoryRange::Year),
            other => Err(format!(
                "unknown range '{}' (expected today, week, month or year)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeName {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub employee_id: Option<String>,
}

impl EmployeeName {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub employee: Option<EmployeeName>,
    #[serde(default)]
    pub data: Vec<AttendanceRow>,
    #[serde(default)]
    pub stats: Option<HistoryStats>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryStats {
    #[serde(default)]
    pub present: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendanceRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub check_in_time: Option<String>,
    #[serde(default)]
    pub check_out_time: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Backend-computed time status label, when the backend provides one
    #[serde(default)]
    pub status_time: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceSubmission<'a> {
    pub image: &'a str,
}

/// Generic `{ message }` / `{ error }` body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Employee {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub is_admin: Option<bool>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// `GET /admin/employees` answers either `{ data: [...] }` or a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EmployeeList {
    Wrapped { data: Vec<Employee> },
    Bare(Vec<Employee>),
}

impl EmployeeList {
    pub fn into_vec(self) -> Vec<Employee> {
        match self {
            EmployeeList::Wrapped { data } => data,
            EmployeeList::Bare(list) => list,
        }
    }
}

/// Body of `POST /admin/employees`
#[derive(Debug, Clone, Serialize)]
pub struct NewEmployee {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub employee_id: String,
    pub password: String,
    pub is_admin: bool,
    /// Base64 JPEG without the data-URL prefix
    pub image: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateEmployeeResponse {
    #[serde(default)]
    pub employee: Option<Employee>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct OfficeSettings {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub office_latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub office_longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub office_radius_meters: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub telegram_bot_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub telegram_group_id: Option<String>,
}

/// `GET /admin/settings` answers either `{ data: {...} }` or the bare object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SettingsEnvelope {
    Wrapped { data: OfficeSettings },
    Bare(OfficeSettings),
}

impl SettingsEnvelope {
    pub fn into_settings(self) -> OfficeSettings {
        match self {
            SettingsEnvelope::Wrapped { data } => data,
            SettingsEnvelope::Bare(settings) => settings,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopPerformers {
    pub top_attendance: Vec<PerformerStat>,
    pub top_late: Vec<PerformerStat>,
    pub top_early: Vec<PerformerStat>,
    pub top_overtime: Vec<PerformerStat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformerStat {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub attendance_count: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub late_count: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub early_count: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub overtime_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminAttendanceResponse {
    #[serde(default)]
    pub data: Vec<AdminAttendanceRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminAttendanceRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub check_in_time: Option<String>,
    #[serde(default)]
    pub check_out_time: Option<String>,
    #[serde(default)]
    pub employees: Option<EmployeeName>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TelegramUpdatesRequest<'a> {
    pub token: &'a str,
}

/// Raw Telegram `getUpdates` answer relayed by the backend
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramUpdates {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub result: Vec<Value>,
}

/// Accepts a number, a numeric string, an empty string or null.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected a number, got '{}'", s))),
        other => Err(de::Error::custom(format!("expected a number, got {}", other))),
    }
}

/// Accepts a string, number or bool; empty strings and null become `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(de::Error::custom(format!("expected a scalar, got {}", other))),
    }
}
