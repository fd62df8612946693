use crate::api::models::{AdminAttendanceResponse, PerformerStat, TopPerformers};
use crate::status::parse_timestamp;
use chrono::FixedOffset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Attendance,
    Late,
    Early,
    Overtime,
}

impl StatKind {
    pub const ALL: [StatKind; 4] = [
        StatKind::Attendance,
        StatKind::Late,
        StatKind::Early,
        StatKind::Overtime,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            StatKind::Attendance => "Top Attendance",
            StatKind::Late => "Most Late",
            StatKind::Early => "Most Early",
            StatKind::Overtime => "Top Overtime",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            StatKind::Attendance => "days",
            StatKind::Late | StatKind::Early => "times",
            StatKind::Overtime => "hours",
        }
    }

    fn entries<'a>(&self, top: &'a TopPerformers) -> &'a [PerformerStat] {
        match self {
            StatKind::Attendance => &top.top_attendance,
            StatKind::Late => &top.top_late,
            StatKind::Early => &top.top_early,
            StatKind::Overtime => &top.top_overtime,
        }
    }

    fn value(&self, stat: &PerformerStat) -> Option<f64> {
        match self {
            StatKind::Attendance => stat.attendance_count,
            StatKind::Late => stat.late_count,
            StatKind::Early => stat.early_count,
            StatKind::Overtime => stat.overtime_hours,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatCard {
    pub title: &'static str,
    /// (name, "12 days"); empty when there is no data
    pub entries: Vec<(String, String)>,
}

pub fn stat_cards(top: &TopPerformers) -> Vec<StatCard> {
    StatKind::ALL
        .iter()
        .map(|kind| StatCard {
            title: kind.title(),
            entries: kind
                .entries(top)
                .iter()
                .map(|stat| {
                    let value = kind
                        .value(stat)
                        .map(format_stat_value)
                        .unwrap_or_else(|| "-".to_string());
                    (stat.name.clone(), format!("{} {}", value, kind.unit()))
                })
                .collect(),
        })
        .collect()
}

/// One decimal place, with a trailing ".0" dropped: 12.0 → "12"
pub fn format_stat_value(value: f64) -> String {
    let formatted = format!("{:.1}", value);
    match formatted.strip_suffix(".0") {
        Some(whole) => whole.to_string(),
        None => formatted,
    }
}

/// A row of the admin "Recent Activity" table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRow {
    pub employee: String,
    pub employee_id: String,
    pub date: String,
    pub check_in: String,
    pub check_out: String,
}

pub fn activity_rows(history: &AdminAttendanceResponse, tz: FixedOffset) -> Vec<ActivityRow> {
    history
        .data
        .iter()
        .map(|log| {
            let check_in = log
                .check_in_time
                .as_deref()
                .and_then(parse_timestamp)
                .map(|at| at.with_timezone(&tz));
            let check_out = log
                .check_out_time
                .as_deref()
                .and_then(parse_timestamp)
                .map(|at| at.with_timezone(&tz));

            ActivityRow {
                employee: log
                    .employees
                    .as_ref()
                    .map(|e| e.full_name())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| "Unknown".to_string()),
                employee_id: log
                    .employees
                    .as_ref()
                    .and_then(|e| e.employee_id.clone())
                    .unwrap_or_default(),
                date: check_in
                    .map(|at| at.format("%-m/%-d/%Y").to_string())
                    .unwrap_or_else(|| "-".to_string()),
                check_in: check_in
                    .map(|at| at.format("%-I:%M:%S %p").to_string())
                    .unwrap_or_else(|| "-".to_string()),
                check_out: check_out
                    .map(|at| at.format("%-I:%M:%S %p").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{AdminAttendanceRow, EmployeeName};

    #[test]
    fn test_format_stat_value() {
        assert_eq!(format_stat_value(12.0), "12");
        assert_eq!(format_stat_value(12.5), "12.5");
        assert_eq!(format_stat_value(0.04), "0");
        assert_eq!(format_stat_value(3.96), "4");
    }

    #[test]
    fn test_stat_cards() {
        let top = TopPerformers {
            top_attendance: vec![PerformerStat {
                name: "Dara Sok".to_string(),
                attendance_count: Some(20.0),
                ..Default::default()
            }],
            top_overtime: vec![PerformerStat {
                name: "Vanna Chea".to_string(),
                overtime_hours: Some(12.5),
                ..Default::default()
            }],
            ..Default::default()
        };
        let cards = stat_cards(&top);
        assert_eq!(cards.len(), 4);
        assert_eq!(cards[0].title, "Top Attendance");
        assert_eq!(cards[0].entries, vec![("Dara Sok".to_string(), "20 days".to_string())]);
        assert!(cards[1].entries.is_empty());
        assert_eq!(cards[3].entries[0].1, "12.5 hours");
    }

    #[test]
    fn test_activity_rows() {
        let history = AdminAttendanceResponse {
            data: vec![
                AdminAttendanceRow {
                    id: Some("1".to_string()),
                    check_in_time: Some("2025-03-03T01:05:00Z".to_string()),
                    check_out_time: None,
                    employees: Some(EmployeeName {
                        first_name: "Dara".to_string(),
                        last_name: "Sok".to_string(),
                        employee_id: Some("EMP001".to_string()),
                    }),
                },
                AdminAttendanceRow::default(),
            ],
        };
        let tz = FixedOffset::east_opt(7 * 3600).unwrap();
        let rows = activity_rows(&history, tz);
        assert_eq!(rows[0].employee, "Dara Sok");
        assert_eq!(rows[0].employee_id, "EMP001");
        assert_eq!(rows[0].date, "3/3/2025");
        assert_eq!(rows[0].check_in, "8:05:00 AM");
        assert_eq!(rows[0].check_out, "-");
        assert_eq!(rows[1].employee, "Unknown");
    }
}
