use super::{format_clock_time, format_short_date};
use crate::api::models::HistoryResponse;
use crate::status::{parse_timestamp, StatusRule, TimeStatus};
use chrono::{DateTime, FixedOffset, Utc};

/// One row of the attendance history as the screens see it.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub id: Option<String>,
    pub employee_name: String,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub time_status: TimeStatus,
    /// Backend status (`present`, ...)
    pub status: Option<String>,
}

impl AttendanceRecord {
    /// No check-out yet means the employee is still clocked in.
    pub fn is_working(&self) -> bool {
        self.check_out.is_none()
    }

    pub fn work_state(&self) -> &'static str {
        if self.is_working() {
            "Working"
        } else {
            "Offline"
        }
    }

    pub fn check_in_at(&self) -> Option<DateTime<Utc>> {
        self.check_in.as_deref().and_then(parse_timestamp)
    }

    pub fn check_out_at(&self) -> Option<DateTime<Utc>> {
        self.check_out.as_deref().and_then(parse_timestamp)
    }

    pub fn is_present(&self) -> bool {
        self.status.as_deref() == Some("present")
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.trim().is_empty()).cloned()
}

/// Map a history response through the given status rule.
pub fn map_history(
    response: &HistoryResponse,
    rule: &StatusRule,
    office: FixedOffset,
) -> Vec<AttendanceRecord> {
    let employee_name = response
        .employee
        .as_ref()
        .map(|e| e.full_name())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "You".to_string());

    response
        .data
        .iter()
        .map(|row| AttendanceRecord {
            id: row.id.clone(),
            employee_name: employee_name.clone(),
            check_in: non_empty(&row.check_in_time),
            check_out: non_empty(&row.check_out_time),
            time_status: rule.classify(
                row.check_in_time.as_deref(),
                row.status_time.as_deref(),
                office,
            ),
            status: row.status.clone(),
        })
        .collect()
}

/// Two-letter avatar initials
pub fn initials(name: &str) -> String {
    let parts: Vec<&str> = name.split_whitespace().collect();
    match parts.as_slice() {
        [] => "NA".to_string(),
        [single] => single.chars().take(2).collect::<String>().to_uppercase(),
        [first, second, ..] => first
            .chars()
            .take(1)
            .chain(second.chars().take(1))
            .collect::<String>()
            .to_uppercase(),
    }
}

/// A record formatted for the records table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRow {
    pub date: String,
    pub initials: String,
    pub employee: String,
    pub check_in: String,
    pub check_out: String,
    pub time_status: String,
    pub state: String,
}

impl RecordRow {
    /// Times are shown on the `display` clock
    pub fn from_record(record: &AttendanceRecord, display: FixedOffset) -> Self {
        let check_in_at = record.check_in_at();
        Self {
            date: check_in_at
                .map(|at| format_short_date(at, display))
                .unwrap_or_default(),
            initials: initials(&record.employee_name),
            employee: record.employee_name.clone(),
            check_in: check_in_at
                .map(|at| format_clock_time(at, display))
                .unwrap_or_else(|| "N/A".to_string()),
            check_out: match record.check_out_at() {
                Some(at) => format_clock_time(at, display),
                None if record.check_out.is_some() => "N/A".to_string(),
                None => "Active".to_string(),
            },
            time_status: record.time_status.to_string(),
            state: record.work_state().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{AttendanceRow, EmployeeName};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn row(check_in: Option<&str>, check_out: Option<&str>) -> AttendanceRow {
        AttendanceRow {
            id: Some("1".to_string()),
            check_in_time: check_in.map(str::to_string),
            check_out_time: check_out.map(str::to_string),
            status: Some("present".to_string()),
            status_time: None,
        }
    }

    #[test]
    fn test_map_history_names_and_status() {
        let response = HistoryResponse {
            employee: Some(EmployeeName {
                first_name: "Dara".to_string(),
                last_name: "Sok".to_string(),
                employee_id: None,
            }),
            data: vec![
                row(Some("2025-03-03T09:20:00Z"), None),
                row(Some("2025-03-04T08:50:00Z"), Some("2025-03-04T17:00:00Z")),
            ],
            stats: None,
        };

        let records = map_history(&response, &StatusRule::records(), utc());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].employee_name, "Dara Sok");
        assert_eq!(records[0].time_status, TimeStatus::Late);
        assert_eq!(records[0].work_state(), "Working");
        assert_eq!(records[1].time_status, TimeStatus::OnTime);
        assert_eq!(records[1].work_state(), "Offline");
    }

    #[test]
    fn test_anonymous_history_is_you() {
        let response = HistoryResponse {
            employee: None,
            data: vec![row(None, Some(""))],
            stats: None,
        };
        let records = map_history(&response, &StatusRule::records(), utc());
        assert_eq!(records[0].employee_name, "You");
        assert_eq!(records[0].time_status, TimeStatus::NotApplicable);
        // an empty check-out string counts as none
        assert!(records[0].is_working());
    }

    #[test]
    fn test_initials() {
        assert_eq!(initials("Dara Sok"), "DS");
        assert_eq!(initials("vanna"), "VA");
        assert_eq!(initials(""), "NA");
        assert_eq!(initials("a b c"), "AB");
    }

    #[test]
    fn test_record_row_formatting() {
        let record = AttendanceRecord {
            id: None,
            employee_name: "Dara Sok".to_string(),
            check_in: Some("2025-03-03T09:05:00Z".to_string()),
            check_out: None,
            time_status: TimeStatus::OnTime,
            status: Some("present".to_string()),
        };
        let row = RecordRow::from_record(&record, utc());
        assert_eq!(row.date, "Mon, Mar 3");
        assert_eq!(row.check_in, "09:05 AM");
        assert_eq!(row.check_out, "Active");
        assert_eq!(row.time_status, "On Time");
        assert_eq!(row.state, "Working");
        assert_eq!(row.initials, "DS");

        let phnom_penh = FixedOffset::east_opt(7 * 3600).unwrap();
        let row = RecordRow::from_record(&record, phnom_penh);
        assert_eq!(row.check_in, "04:05 PM");
    }
}
