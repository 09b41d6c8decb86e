use crate::model::{money, money_zero, week_start, CancelledBy, DateRange, Period, Session, Student};
use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// 1-decimal rounding used for rates and averages shown on the dashboard.
pub fn round_1(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

pub fn round_2(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

fn in_range<'a>(sessions: &'a [Session], range: &'a DateRange) -> impl Iterator<Item = &'a Session> {
    sessions.iter().filter(move |s| range.contains(s.date))
}

fn billable<'a>(sessions: &'a [Session], range: &'a DateRange) -> impl Iterator<Item = &'a Session> {
    in_range(sessions, range).filter(|s| !s.is_cancelled())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRevenue {
    pub key: String,
    pub month: String,
    pub revenue: Decimal,
    pub sessions: usize,
    pub hours: f64,
}

/// Buckets billable sessions by calendar month. Buckets keep the order in
/// which their month first appears in `sessions`.
pub fn revenue_by_month(sessions: &[Session], range: &DateRange) -> Vec<MonthRevenue> {
    let mut out: Vec<MonthRevenue> = Vec::new();
    let mut index: HashMap<(i32, u32), usize> = HashMap::new();
    let mut minutes: Vec<i64> = Vec::new();

    for s in billable(sessions, range) {
        let key = (s.date.year(), s.date.month());
        let idx = *index.entry(key).or_insert_with(|| {
            out.push(MonthRevenue {
                key: format!("{:04}-{:02}", key.0, key.1),
                month: s.date.format("%b %Y").to_string(),
                revenue: money_zero(),
                sessions: 0,
                hours: 0.0,
            });
            minutes.push(0);
            out.len() - 1
        });
        out[idx].revenue += s.total_amount;
        out[idx].sessions += 1;
        minutes[idx] += s.duration_minutes;
    }
    for (bucket, m) in out.iter_mut().zip(minutes) {
        bucket.hours = round_2(m as f64 / 60.0);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekHours {
    pub week_start: NaiveDate,
    pub label: String,
    pub hours: f64,
    pub sessions: usize,
    pub revenue: Decimal,
}

/// Widest window `weekly_hours` will bucket: about ten years of weeks.
pub const MAX_WEEKLY_SPAN_DAYS: i64 = 3653;

/// The concrete window `weekly_hours` buckets. Open bounds fall back to the
/// earliest/latest billable session; `None` when there is nothing to chart.
pub fn weekly_span(sessions: &[Session], range: &DateRange) -> Option<(NaiveDate, NaiveDate)> {
    let dates: Vec<NaiveDate> = billable(sessions, range).map(|s| s.date).collect();
    let start = range.start.or_else(|| dates.iter().min().copied())?;
    let end = range.end.or_else(|| dates.iter().max().copied())?;
    (end >= start).then_some((start, end))
}

/// One bucket per Monday-started week touching the span, zero-filled.
pub fn weekly_hours(sessions: &[Session], range: &DateRange) -> Vec<WeekHours> {
    let Some((start, end)) = weekly_span(sessions, range) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut cursor = week_start(start);
    while cursor <= end {
        out.push(WeekHours {
            week_start: cursor,
            label: cursor.format("%b %d").to_string(),
            hours: 0.0,
            sessions: 0,
            revenue: money_zero(),
        });
        cursor += Duration::days(7);
    }

    let first = week_start(start);
    let mut minutes = vec![0i64; out.len()];
    for s in billable(sessions, range) {
        let idx = ((week_start(s.date) - first).num_days() / 7) as usize;
        if let Some(bucket) = out.get_mut(idx) {
            bucket.sessions += 1;
            bucket.revenue += s.total_amount;
            minutes[idx] += s.duration_minutes;
        }
    }
    for (bucket, m) in out.iter_mut().zip(minutes) {
        bucket.hours = round_2(m as f64 / 60.0);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountCount {
    pub amount: Decimal,
    pub count: usize,
}

impl Default for AmountCount {
    fn default() -> Self {
        Self {
            amount: money_zero(),
            count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBreakdown {
    pub paid: AmountCount,
    pub unpaid: AmountCount,
    pub total: Decimal,
    pub paid_percent: f64,
}

pub fn payment_breakdown(sessions: &[Session], range: &DateRange) -> PaymentBreakdown {
    let mut paid = AmountCount::default();
    let mut unpaid = AmountCount::default();
    for s in billable(sessions, range) {
        let slot = if s.is_paid() { &mut paid } else { &mut unpaid };
        slot.amount += s.total_amount;
        slot.count += 1;
    }
    let total = paid.amount + unpaid.amount;
    let paid_percent = if total > Decimal::ZERO {
        let ratio = (paid.amount / total).to_f64().unwrap_or(0.0);
        round_1(ratio * 100.0)
    } else {
        0.0
    };
    PaymentBreakdown {
        paid,
        unpaid,
        total,
        paid_percent,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationBreakdown {
    pub total_sessions: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub by_tutor: usize,
    pub by_student: usize,
    pub unspecified: usize,
    pub rate: f64,
}

/// Cancelled sessions count in the denominator here, unlike every other metric.
pub fn cancellation_breakdown(sessions: &[Session], range: &DateRange) -> CancellationBreakdown {
    let mut out = CancellationBreakdown {
        total_sessions: 0,
        completed: 0,
        cancelled: 0,
        by_tutor: 0,
        by_student: 0,
        unspecified: 0,
        rate: 0.0,
    };
    for s in in_range(sessions, range) {
        out.total_sessions += 1;
        if !s.is_cancelled() {
            out.completed += 1;
            continue;
        }
        out.cancelled += 1;
        match s.cancelled_by {
            Some(CancelledBy::Tutor) => out.by_tutor += 1,
            Some(CancelledBy::Student) => out.by_student += 1,
            None => out.unspecified += 1,
        }
    }
    if out.total_sessions > 0 {
        out.rate = round_1(out.cancelled as f64 / out.total_sessions as f64 * 100.0);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationBucket {
    pub label: &'static str,
    pub min_minutes: i64,
    pub max_minutes: Option<i64>,
    pub count: usize,
}

const DURATION_EDGES: [(&str, i64, Option<i64>); 5] = [
    ("0-30", 0, Some(30)),
    ("31-60", 31, Some(60)),
    ("61-90", 61, Some(90)),
    ("91-120", 91, Some(120)),
    ("120+", 121, None),
];

pub fn duration_histogram(sessions: &[Session], range: &DateRange) -> Vec<DurationBucket> {
    let mut out: Vec<DurationBucket> = DURATION_EDGES
        .iter()
        .map(|(label, min, max)| DurationBucket {
            label: *label,
            min_minutes: *min,
            max_minutes: *max,
            count: 0,
        })
        .collect();
    for s in billable(sessions, range) {
        let idx = out
            .iter()
            .position(|b| b.max_minutes.map_or(true, |max| s.duration_minutes <= max))
            .unwrap_or(out.len() - 1);
        out[idx].count += 1;
    }
    out
}

pub fn average_duration_minutes(sessions: &[Session], range: &DateRange) -> f64 {
    let (count, total) = billable(sessions, range)
        .fold((0usize, 0i64), |(c, t), s| (c + 1, t + s.duration_minutes));
    if count == 0 {
        return 0.0;
    }
    round_1(total as f64 / count as f64)
}

/// Billable sessions divided by the number of distinct months they touch.
pub fn sessions_per_month(sessions: &[Session], range: &DateRange) -> f64 {
    let mut months: HashSet<(i32, u32)> = HashSet::new();
    let mut count = 0usize;
    for s in billable(sessions, range) {
        months.insert((s.date.year(), s.date.month()));
        count += 1;
    }
    round_1(count as f64 / months.len().max(1) as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRollup {
    pub student_id: String,
    pub student_name: String,
    pub sessions: usize,
    pub cancelled: usize,
    pub hours: f64,
    pub revenue: Decimal,
    pub paid: Decimal,
    pub unpaid: Decimal,
    pub last_session_date: Option<NaiveDate>,
    pub sessions_per_month: f64,
}

/// Per-student totals, ordered by each student's first appearance.
pub fn student_rollups(sessions: &[Session], range: &DateRange) -> Vec<StudentRollup> {
    let mut order: Vec<String> = Vec::new();
    let mut by_student: HashMap<String, Vec<Session>> = HashMap::new();
    for s in in_range(sessions, range) {
        if !by_student.contains_key(&s.student_id) {
            order.push(s.student_id.clone());
        }
        by_student
            .entry(s.student_id.clone())
            .or_default()
            .push(s.clone());
    }

    let all = DateRange::all();
    order
        .into_iter()
        .filter_map(|id| {
            let rows = by_student.remove(&id)?;
            let student_name = rows.first().map(|s| s.student_name.clone())?;
            let payments = payment_breakdown(&rows, &all);
            let minutes: i64 = billable(&rows, &all).map(|s| s.duration_minutes).sum();
            Some(StudentRollup {
                student_id: id,
                student_name,
                sessions: payments.paid.count + payments.unpaid.count,
                cancelled: rows.iter().filter(|s| s.is_cancelled()).count(),
                hours: round_2(minutes as f64 / 60.0),
                revenue: payments.total,
                paid: payments.paid.amount,
                unpaid: payments.unpaid.amount,
                last_session_date: billable(&rows, &all).map(|s| s.date).max(),
                sessions_per_month: sessions_per_month(&rows, &all),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    pub range: DateRange,
    pub sessions: usize,
    pub hours: f64,
    pub revenue: Decimal,
    pub average_duration_minutes: f64,
    pub sessions_per_month: f64,
    pub payments: PaymentBreakdown,
    pub cancellations: CancellationBreakdown,
}

pub fn period_summary(sessions: &[Session], range: &DateRange) -> PeriodSummary {
    let payments = payment_breakdown(sessions, range);
    let minutes: i64 = billable(sessions, range).map(|s| s.duration_minutes).sum();
    PeriodSummary {
        range: *range,
        sessions: payments.paid.count + payments.unpaid.count,
        hours: round_2(minutes as f64 / 60.0),
        revenue: payments.total,
        average_duration_minutes: average_duration_minutes(sessions, range),
        sessions_per_month: sessions_per_month(sessions, range),
        cancellations: cancellation_breakdown(sessions, range),
        payments,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub today: NaiveDate,
    pub active_students: usize,
    pub total_students: usize,
    pub this_week_sessions: usize,
    pub this_week_hours: f64,
    pub this_week_earnings: Decimal,
    pub this_month_earnings: Decimal,
    pub unpaid_total: Decimal,
    pub unpaid_sessions: usize,
    pub average_duration_minutes: f64,
    pub sessions_per_month: f64,
}

pub fn overview(sessions: &[Session], students: &[Student], today: NaiveDate) -> Overview {
    let week = DateRange::for_period(Period::ThisWeek, today);
    let month = DateRange::for_period(Period::ThisMonth, today);
    let all = DateRange::all();

    let this_week = period_summary(sessions, &week);
    let this_month = payment_breakdown(sessions, &month);
    let all_time = payment_breakdown(sessions, &all);

    Overview {
        today,
        active_students: students.iter().filter(|s| s.is_active).count(),
        total_students: students.len(),
        this_week_sessions: this_week.sessions,
        this_week_hours: this_week.hours,
        this_week_earnings: money(this_week.revenue),
        this_month_earnings: money(this_month.total),
        unpaid_total: money(all_time.unpaid.amount),
        unpaid_sessions: all_time.unpaid.count,
        average_duration_minutes: average_duration_minutes(sessions, &all),
        sessions_per_month: sessions_per_month(sessions, &all),
    }
}
