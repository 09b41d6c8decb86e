use crate::store::{StoreError, StoreResult};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Longest single session or weekly slot: one full day.
pub const MAX_SESSION_MINUTES: i64 = 24 * 60;
/// Upper bound for any hourly rate accepted from a caller.
pub const MAX_HOURLY_RATE: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "paid" => Some(PaymentStatus::Paid),
            "pending" | "unpaid" => Some(PaymentStatus::Pending),
            "cancelled" | "canceled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelledBy {
    Tutor,
    Student,
}

impl CancelledBy {
    pub fn as_str(self) -> &'static str {
        match self {
            CancelledBy::Tutor => "tutor",
            CancelledBy::Student => "student",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "tutor" | "teacher" => Some(CancelledBy::Tutor),
            "student" | "parent" => Some(CancelledBy::Student),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
}

impl Currency {
    pub fn symbol(self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Eur => "€",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "USD" | "$" => Some(Currency::Usd),
            "EUR" | "€" => Some(Currency::Eur),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub business_name: String,
    pub tutor_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub currency: Currency,
    pub default_hourly_rate: Decimal,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            business_name: "My Tutoring".to_string(),
            tutor_name: String::new(),
            email: None,
            phone: None,
            currency: Currency::Usd,
            default_hourly_rate: money(Decimal::from(40)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub parent_name: Option<String>,
    pub subject: Option<String>,
    pub hourly_rate: Decimal,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Recurring weekly slot. `day_of_week` counts from Sunday = 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledClass {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub day_of_week: u32,
    pub start_time: String,
    pub duration_minutes: i64,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: String,
}

impl ScheduledClass {
    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        self.is_active && self.day_of_week == day_of_week(date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub scheduled_class_id: Option<String>,
    pub date: NaiveDate,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub duration_minutes: i64,
    pub hourly_rate: Decimal,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub cancelled_by: Option<CancelledBy>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Session {
    pub fn is_cancelled(&self) -> bool {
        self.payment_status == PaymentStatus::Cancelled
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    /// Re-derives the stored amount. Only called when duration or rate is edited.
    pub fn reprice(&mut self) -> StoreResult<()> {
        self.total_amount = session_total(self.duration_minutes, self.hourly_rate)
            .ok_or_else(|| StoreError::Invalid("session amount is out of range".to_string()))?;
        Ok(())
    }

    pub fn retime(&mut self) {
        self.end_time = self
            .start_time
            .as_deref()
            .and_then(|t| end_time(t, self.duration_minutes));
    }
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub student_id: String,
    pub scheduled_class_id: Option<String>,
    pub date: NaiveDate,
    pub start_time: Option<String>,
    pub duration_minutes: i64,
    pub hourly_rate: Decimal,
    pub payment_status: PaymentStatus,
    pub cancelled_by: Option<CancelledBy>,
    pub notes: Option<String>,
}

impl NewSession {
    /// Snapshots the rate and fixes `total_amount` at creation time.
    pub fn into_session(self, id: String, now: String) -> StoreResult<Session> {
        let cancelled_by = match self.payment_status {
            PaymentStatus::Cancelled => self.cancelled_by,
            _ => None,
        };
        let mut session = Session {
            id,
            student_id: self.student_id,
            student_name: String::new(),
            scheduled_class_id: self.scheduled_class_id,
            date: self.date,
            start_time: self.start_time,
            end_time: None,
            duration_minutes: self.duration_minutes,
            hourly_rate: money(self.hourly_rate),
            total_amount: money_zero(),
            payment_status: self.payment_status,
            cancelled_by,
            notes: self.notes,
            created_at: now.clone(),
            updated_at: now,
        };
        session.reprice()?;
        session.retime();
        Ok(session)
    }
}

pub fn minutes_between(start_time: &str, end_time: &str) -> Option<i64> {
    let start = NaiveTime::parse_from_str(start_time, "%H:%M").ok()?;
    let end = NaiveTime::parse_from_str(end_time, "%H:%M").ok()?;
    let minutes = (end - start).num_minutes();
    (minutes > 0).then_some(minutes)
}

/// Inclusive date window. A missing bound is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = NaiveDate::from_ymd_opt(year, month, days_in_month(year, month))?;
        Some(Self::between(start, end))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    pub fn for_period(period: Period, today: NaiveDate) -> Self {
        let (y, m) = (today.year(), today.month());
        let month_span = |back: i32| {
            let (sy, sm) = shift_month(y, m, -back);
            let start = NaiveDate::from_ymd_opt(sy, sm, 1);
            let end = NaiveDate::from_ymd_opt(y, m, days_in_month(y, m));
            Self::new(start, end)
        };
        match period {
            Period::ThisWeek => {
                let start = week_start(today);
                Self::between(start, start + Duration::days(6))
            }
            Period::ThisMonth => month_span(0),
            Period::LastMonth => {
                let (ly, lm) = shift_month(y, m, -1);
                Self::month(ly, lm).unwrap_or_default()
            }
            Period::Last3Months => month_span(2),
            Period::Last6Months => month_span(5),
            Period::ThisYear => Self::new(
                NaiveDate::from_ymd_opt(y, 1, 1),
                NaiveDate::from_ymd_opt(y, 12, 31),
            ),
            Period::All => Self::all(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    ThisWeek,
    ThisMonth,
    LastMonth,
    Last3Months,
    Last6Months,
    ThisYear,
    All,
}

impl Period {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "thisWeek" | "week" => Some(Period::ThisWeek),
            "thisMonth" | "month" => Some(Period::ThisMonth),
            "lastMonth" => Some(Period::LastMonth),
            "last3Months" | "quarter" => Some(Period::Last3Months),
            "last6Months" => Some(Period::Last6Months),
            "thisYear" | "year" => Some(Period::ThisYear),
            "all" => Some(Period::All),
            _ => None,
        }
    }
}

/// Rounds to cents with banker's rounding and pins the scale to 2.
pub fn money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(2);
    rounded
}

pub fn money_zero() -> Decimal {
    Decimal::new(0, 2)
}

/// The stored amount for a session: duration in hours times the rate snapshot.
/// `None` when the product does not fit in a `Decimal`.
pub fn session_total(duration_minutes: i64, hourly_rate: Decimal) -> Option<Decimal> {
    Decimal::from(duration_minutes)
        .checked_mul(hourly_rate)?
        .checked_div(Decimal::from(60))
        .map(money)
}

pub fn normalize_time(raw: &str) -> Option<String> {
    let t = raw.trim();
    NaiveTime::parse_from_str(t, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M:%S"))
        .ok()
        .map(|v| v.format("%H:%M").to_string())
}

pub fn end_time(start_time: &str, duration_minutes: i64) -> Option<String> {
    let start = NaiveTime::parse_from_str(start_time, "%H:%M").ok()?;
    let (end, _) = start.overflowing_add_signed(Duration::try_minutes(duration_minutes)?);
    Some(end.format("%H:%M").to_string())
}

/// Sunday = 0 .. Saturday = 6.
pub fn day_of_week(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_sunday()
}

/// Maps Sunday(0) to 7 so that Monday-first comparisons work.
pub fn iso_day_of_week(day_of_week: u32) -> u32 {
    if day_of_week == 0 {
        7
    } else {
        day_of_week
    }
}

pub fn week_start(date: NaiveDate) -> NaiveDate {
    let iso = iso_day_of_week(day_of_week(date)) as i64;
    date - Duration::days(iso - 1)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        2 => 28,
        _ => 30,
    }
}

pub fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let idx = year * 12 + (month as i32 - 1) + delta;
    (idx.div_euclid(12), (idx.rem_euclid(12) + 1) as u32)
}

pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
pub(crate) fn test_session(
    student: &str,
    date: &str,
    minutes: i64,
    rate: Decimal,
    status: PaymentStatus,
) -> Session {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("test date");
    Session {
        id: format!("{}-{}", student, date),
        student_id: student.to_ascii_lowercase().replace(' ', "-"),
        student_name: student.to_string(),
        scheduled_class_id: None,
        date,
        start_time: Some("16:00".to_string()),
        end_time: end_time("16:00", minutes),
        duration_minutes: minutes,
        hourly_rate: rate,
        total_amount: session_total(minutes, rate).expect("test total"),
        payment_status: status,
        cancelled_by: None,
        notes: None,
        created_at: String::new(),
        updated_at: String::new(),
    }
}
