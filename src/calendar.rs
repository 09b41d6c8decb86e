use crate::model::{
    days_in_month, iso_day_of_week, money_zero, week_start, DateRange, PaymentStatus,
    ScheduledClass, Session,
};
use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Session,
    Scheduled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEntry {
    pub kind: EntryKind,
    pub session_id: Option<String>,
    pub scheduled_class_id: Option<String>,
    pub student_id: String,
    pub student_name: String,
    pub start_time: Option<String>,
    pub duration_minutes: i64,
    pub payment_status: Option<PaymentStatus>,
    pub total_amount: Option<Decimal>,
}

/// A grid cell. Placeholders have no date, no label and no entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCell {
    pub date: Option<NaiveDate>,
    pub label: Option<String>,
    pub is_today: bool,
    pub entries: Vec<CalendarEntry>,
}

impl DayCell {
    fn placeholder() -> Self {
        Self {
            date: None,
            label: None,
            is_today: false,
            entries: Vec::new(),
        }
    }

    fn real(date: NaiveDate, today: Option<NaiveDate>, entries: Vec<CalendarEntry>) -> Self {
        Self {
            date: Some(date),
            label: Some(date.day().to_string()),
            is_today: today == Some(date),
            entries,
        }
    }

    #[cfg(test)]
    pub fn is_placeholder(&self) -> bool {
        self.date.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub title: String,
    pub weekdays: [&'static str; 7],
    pub weeks: Vec<Vec<DayCell>>,
    pub session_count: usize,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekView {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub days: Vec<DayCell>,
}

pub const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

pub type EntriesByDate = BTreeMap<NaiveDate, Vec<CalendarEntry>>;

/// Groups sessions by date and, when `schedules` is non-empty, projects each
/// active weekly slot onto days in `range` that have no session for that
/// student. Entries within a day are ordered by start time.
pub fn entries_by_date(
    sessions: &[Session],
    schedules: &[ScheduledClass],
    range: &DateRange,
) -> EntriesByDate {
    let mut out: EntriesByDate = BTreeMap::new();
    let mut logged: HashSet<(String, NaiveDate)> = HashSet::new();

    for s in sessions.iter().filter(|s| range.contains(s.date)) {
        logged.insert((s.student_id.clone(), s.date));
        out.entry(s.date).or_default().push(CalendarEntry {
            kind: EntryKind::Session,
            session_id: Some(s.id.clone()),
            scheduled_class_id: s.scheduled_class_id.clone(),
            student_id: s.student_id.clone(),
            student_name: s.student_name.clone(),
            start_time: s.start_time.clone(),
            duration_minutes: s.duration_minutes,
            payment_status: Some(s.payment_status),
            total_amount: Some(s.total_amount),
        });
    }

    if let (Some(start), Some(end)) = (range.start, range.end) {
        let mut day = start;
        while day <= end && !schedules.is_empty() {
            for c in schedules.iter().filter(|c| c.occurs_on(day)) {
                if logged.contains(&(c.student_id.clone(), day)) {
                    continue;
                }
                out.entry(day).or_default().push(CalendarEntry {
                    kind: EntryKind::Scheduled,
                    session_id: None,
                    scheduled_class_id: Some(c.id.clone()),
                    student_id: c.student_id.clone(),
                    student_name: c.student_name.clone(),
                    start_time: Some(c.start_time.clone()),
                    duration_minutes: c.duration_minutes,
                    payment_status: None,
                    total_amount: None,
                });
            }
            day += Duration::days(1);
        }
    }

    for entries in out.values_mut() {
        entries.sort_by(|a, b| a.start_time.cmp(&b.start_time));
    }
    out
}

/// Monday-first month grid. Rows before day 1 and after the last day are
/// padded with placeholders so every row has exactly 7 cells.
pub fn build_month_grid(
    year: i32,
    month: u32,
    entries: &EntriesByDate,
    today: Option<NaiveDate>,
) -> Option<MonthGrid> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let days = days_in_month(year, month);
    let leading = (iso_day_of_week(first.weekday().num_days_from_sunday()) - 1) as usize;

    let mut cells: Vec<DayCell> = Vec::with_capacity(42);
    cells.extend((0..leading).map(|_| DayCell::placeholder()));

    let mut session_count = 0usize;
    let mut total_amount = money_zero();
    for d in 1..=days {
        let date = NaiveDate::from_ymd_opt(year, month, d)?;
        let day_entries = entries.get(&date).cloned().unwrap_or_default();
        for e in day_entries.iter().filter(|e| e.kind == EntryKind::Session) {
            session_count += 1;
            if e.payment_status != Some(PaymentStatus::Cancelled) {
                total_amount += e.total_amount.unwrap_or_default();
            }
        }
        cells.push(DayCell::real(date, today, day_entries));
    }
    while cells.len() % 7 != 0 {
        cells.push(DayCell::placeholder());
    }

    let mut weeks: Vec<Vec<DayCell>> = Vec::with_capacity(cells.len() / 7);
    let mut it = cells.into_iter().peekable();
    while it.peek().is_some() {
        weeks.push(it.by_ref().take(7).collect());
    }

    Some(MonthGrid {
        year,
        month,
        title: first.format("%B %Y").to_string(),
        weekdays: WEEKDAY_LABELS,
        weeks,
        session_count,
        total_amount,
    })
}

pub fn build_week(date: NaiveDate, entries: &EntriesByDate, today: Option<NaiveDate>) -> WeekView {
    let start = week_start(date);
    let days = (0..7)
        .map(|i| {
            let d = start + Duration::days(i);
            DayCell::real(d, today, entries.get(&d).cloned().unwrap_or_default())
        })
        .collect();
    WeekView {
        week_start: start,
        week_end: start + Duration::days(6),
        days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_session;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    fn real_dates(grid: &MonthGrid) -> BTreeSet<NaiveDate> {
        grid.weeks
            .iter()
            .flat_map(|w| w.iter().filter_map(|c| c.date))
            .collect()
    }

    #[test]
    fn every_row_has_seven_cells_and_covers_the_month() {
        for (year, month) in [(2024, 1), (2024, 2), (2023, 2), (2024, 9), (2026, 3)] {
            let grid = build_month_grid(year, month, &EntriesByDate::new(), None).expect("grid");
            assert!(grid.weeks.iter().all(|w| w.len() == 7), "{year}-{month}");
            let expected: BTreeSet<NaiveDate> = (1..=days_in_month(year, month))
                .map(|day| NaiveDate::from_ymd_opt(year, month, day).expect("day"))
                .collect();
            assert_eq!(real_dates(&grid), expected, "{year}-{month}");
        }
    }

    #[test]
    fn leading_placeholders_follow_monday_start() {
        // 2024-09-01 is a Sunday: six placeholders, then the 1st in the last column.
        let grid = build_month_grid(2024, 9, &EntriesByDate::new(), None).expect("grid");
        let first_row = &grid.weeks[0];
        assert!(first_row[..6].iter().all(DayCell::is_placeholder));
        assert_eq!(first_row[6].label.as_deref(), Some("1"));
        // 2024-01-01 is a Monday: no leading padding.
        let jan = build_month_grid(2024, 1, &EntriesByDate::new(), None).expect("grid");
        assert_eq!(jan.weeks[0][0].date, Some(d("2024-01-01")));
        assert!(build_month_grid(2024, 13, &EntriesByDate::new(), None).is_none());
    }

    #[test]
    fn sessions_land_on_their_day_and_schedules_fill_gaps() {
        let sessions = vec![
            test_session("Ana", "2024-01-10", 60, dec!(40), PaymentStatus::Paid),
            test_session("Ana", "2024-01-12", 60, dec!(40), PaymentStatus::Cancelled),
        ];
        let schedule = ScheduledClass {
            id: "c1".to_string(),
            student_id: "ana".to_string(),
            student_name: "Ana".to_string(),
            day_of_week: 3,
            start_time: "16:00".to_string(),
            duration_minutes: 60,
            is_active: true,
            notes: None,
            created_at: String::new(),
        };
        let range = DateRange::month(2024, 1).expect("range");
        let entries = entries_by_date(&sessions, &[schedule], &range);
        // Wednesday the 10th was logged, so no projection there.
        assert_eq!(entries[&d("2024-01-10")].len(), 1);
        assert_eq!(entries[&d("2024-01-10")][0].kind, EntryKind::Session);
        assert_eq!(entries[&d("2024-01-17")][0].kind, EntryKind::Scheduled);

        let grid = build_month_grid(2024, 1, &entries, Some(d("2024-01-10"))).expect("grid");
        assert_eq!(grid.session_count, 2);
        assert_eq!(grid.total_amount, dec!(40));
        let today_cells: Vec<&DayCell> = grid.weeks.iter().flatten().filter(|c| c.is_today).collect();
        assert_eq!(today_cells.len(), 1);
    }

    #[test]
    fn week_view_runs_monday_to_sunday() {
        let week = build_week(d("2024-01-07"), &EntriesByDate::new(), None);
        assert_eq!(week.week_start, d("2024-01-01"));
        assert_eq!(week.week_end, d("2024-01-07"));
        assert_eq!(week.days.len(), 7);
    }
}
