use super::format_clock_time;
use super::records::{map_history, AttendanceRecord};
use crate::api::models::HistoryResponse;
use crate::status::{StatusRule, TimeStatus};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use std::collections::HashSet;

const NO_TIME: &str = "--:--";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonthStats {
    /// Present days as counted by the backend
    pub present: u32,
    pub late: u32,
    pub early: u32,
}

/// Today's attendance widget plus the month counters
#[derive(Debug, Clone, PartialEq)]
pub struct HomeSummary {
    pub employee_name: String,
    pub is_clocked_in: bool,
    pub time_status: TimeStatus,
    pub check_in_time: String,
    pub check_out_time: String,
    pub stats: MonthStats,
    pub records: Vec<AttendanceRecord>,
}

impl HomeSummary {
    /// `now` carries the office timezone; "today" and "this month" are
    /// read on that clock.
    pub fn derive(response: &HistoryResponse, rule: &StatusRule, now: DateTime<FixedOffset>) -> Self {
        let office = *now.offset();
        let records = map_history(response, rule, office);
        let today = now.date_naive();

        let employee_name = response
            .employee
            .as_ref()
            .map(|e| e.full_name())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "You".to_string());

        let today_record = records
            .iter()
            .find(|r| local_date(r, office) == Some(today));

        let (is_clocked_in, time_status, check_in_time, check_out_time) = match today_record {
            Some(record) => (
                record.is_working(),
                record.time_status,
                record
                    .check_in_at()
                    .map(|at| format_clock_time(at, office))
                    .unwrap_or_else(|| NO_TIME.to_string()),
                record
                    .check_out_at()
                    .map(|at| format_clock_time(at, office))
                    .unwrap_or_else(|| NO_TIME.to_string()),
            ),
            None => (
                false,
                TimeStatus::Absent,
                NO_TIME.to_string(),
                NO_TIME.to_string(),
            ),
        };

        let present = response
            .stats
            .as_ref()
            .and_then(|s| s.present)
            .unwrap_or(0);
        let stats = month_stats(&records, present, now);

        Self {
            employee_name,
            is_clocked_in,
            time_status,
            check_in_time,
            check_out_time,
            stats,
            records,
        }
    }
}

fn local_date(record: &AttendanceRecord, office: FixedOffset) -> Option<NaiveDate> {
    record
        .check_in_at()
        .map(|at| at.with_timezone(&office).date_naive())
}

/// Late and early days this month. Each date counts once, using the first
/// record seen for it, and only records the backend marked present.
fn month_stats(records: &[AttendanceRecord], present: u32, now: DateTime<FixedOffset>) -> MonthStats {
    let office = *now.offset();
    let month_start = NaiveDate::from_ymd_opt(now.year(), now.month(), 1);

    let mut seen = HashSet::new();
    let mut stats = MonthStats {
        present,
        ..Default::default()
    };

    for record in records.iter().filter(|r| r.is_present()) {
        let Some(at) = record.check_in_at() else {
            continue;
        };
        let local = at.with_timezone(&office);
        if Some(local.date_naive()) < month_start || local > now {
            continue;
        }
        if !seen.insert(local.date_naive()) {
            continue;
        }
        match record.time_status {
            TimeStatus::Late => stats.late += 1,
            TimeStatus::Early => stats.early += 1,
            _ => {}
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{AttendanceRow, HistoryStats};
    use chrono::TimeZone;

    fn office() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    fn now() -> DateTime<FixedOffset> {
        office().with_ymd_and_hms(2025, 3, 12, 14, 0, 0).unwrap()
    }

    fn row(check_in: &str, check_out: Option<&str>, status: &str) -> AttendanceRow {
        AttendanceRow {
            id: None,
            check_in_time: Some(check_in.to_string()),
            check_out_time: check_out.map(str::to_string),
            status: Some(status.to_string()),
            status_time: None,
        }
    }

    fn response(data: Vec<AttendanceRow>) -> HistoryResponse {
        HistoryResponse {
            employee: None,
            data,
            stats: Some(HistoryStats { present: Some(9) }),
        }
    }

    #[test]
    fn test_clocked_in_until_checkout() {
        let open = response(vec![row("2025-03-12T08:05:00+07:00", None, "present")]);
        let summary = HomeSummary::derive(&open, &StatusRule::home(), now());
        assert!(summary.is_clocked_in);
        assert_eq!(summary.time_status, TimeStatus::OnTime);
        assert_eq!(summary.check_in_time, "08:05 AM");
        assert_eq!(summary.check_out_time, "--:--");

        let closed = response(vec![row(
            "2025-03-12T08:05:00+07:00",
            Some("2025-03-12T17:30:00+07:00"),
            "present",
        )]);
        let summary = HomeSummary::derive(&closed, &StatusRule::home(), now());
        assert!(!summary.is_clocked_in);
        assert_eq!(summary.check_out_time, "05:30 PM");
    }

    #[test]
    fn test_no_record_today_is_absent() {
        let yesterday = response(vec![row("2025-03-11T08:05:00+07:00", None, "present")]);
        let summary = HomeSummary::derive(&yesterday, &StatusRule::home(), now());
        assert!(!summary.is_clocked_in);
        assert_eq!(summary.time_status, TimeStatus::Absent);
        assert_eq!(summary.check_in_time, "--:--");
        assert_eq!(summary.employee_name, "You");
    }

    #[test]
    fn test_today_uses_office_date() {
        // 18:30 UTC on the 11th is 01:30 on the 12th in the office
        let late_night = response(vec![row("2025-03-11T18:30:00Z", None, "present")]);
        let summary = HomeSummary::derive(&late_night, &StatusRule::home(), now());
        assert!(summary.is_clocked_in);
        assert_eq!(summary.time_status, TimeStatus::Early);
    }

    #[test]
    fn test_month_stats() {
        let data = vec![
            // late, counted
            row("2025-03-03T09:00:00+07:00", Some("2025-03-03T17:00:00+07:00"), "present"),
            // same day again, ignored
            row("2025-03-03T07:00:00+07:00", None, "present"),
            // early, counted
            row("2025-03-04T07:30:00+07:00", None, "present"),
            // not present
            row("2025-03-05T09:30:00+07:00", None, "absent"),
            // last month
            row("2025-02-27T09:30:00+07:00", None, "present"),
            // after now
            row("2025-03-12T15:00:00+07:00", None, "present"),
        ];
        let summary = HomeSummary::derive(&response(data), &StatusRule::home(), now());
        assert_eq!(
            summary.stats,
            MonthStats {
                present: 9,
                late: 1,
                early: 1
            }
        );
    }

    #[test]
    fn test_backend_label_used_for_today() {
        let mut labelled = row("2025-03-12T09:30:00+07:00", None, "present");
        labelled.status_time = Some("On Time".to_string());
        let summary = HomeSummary::derive(&response(vec![labelled]), &StatusRule::home(), now());
        assert_eq!(summary.time_status, TimeStatus::OnTime);
    }
}
