use crate::model::{money_zero, Currency, DateRange, PaymentStatus, Profile, Session, Student};
use askama::Template;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

pub const SESSIONS_CSV_HEADER: &str =
    "Date,Student,Duration (hours),Hourly Rate,Total Amount,Paid Status,Notes";

pub fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn format_hours(duration_minutes: i64) -> String {
    format!("{:.2}", duration_minutes as f64 / 60.0)
}

pub fn format_money(amount: Decimal, currency: Currency) -> String {
    format!("{}{:.2}", currency.symbol(), amount)
}

fn paid_label(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Paid => "Paid",
        PaymentStatus::Pending => "Unpaid",
        PaymentStatus::Cancelled => "Cancelled",
    }
}

pub fn sessions_csv(sessions: &[Session]) -> String {
    let mut csv = String::from(SESSIONS_CSV_HEADER);
    csv.push('\n');
    for s in sessions {
        csv.push_str(&format!(
            "{},{},{},{:.2},{:.2},{},{}\n",
            s.date.format("%Y-%m-%d"),
            csv_quote(&s.student_name),
            format_hours(s.duration_minutes),
            s.hourly_rate,
            s.total_amount,
            paid_label(s.payment_status),
            csv_quote(s.notes.as_deref().unwrap_or(""))
        ));
    }
    csv
}

pub fn sessions_csv_filename(range: &DateRange) -> String {
    let bound = |d: Option<NaiveDate>| {
        d.map(|v| v.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "all".to_string())
    };
    format!(
        "tutoring-sessions-{}-to-{}.csv",
        bound(range.start),
        bound(range.end)
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    pub session_id: String,
    pub date: NaiveDate,
    pub description: String,
    pub duration_minutes: i64,
    pub hourly_rate: Decimal,
    pub amount: Decimal,
    pub paid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub number: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub period: DateRange,
    pub from: Profile,
    pub bill_to: Student,
    pub lines: Vec<InvoiceLine>,
    pub notes: Option<String>,
}

impl Invoice {
    /// Collects the student's non-cancelled sessions inside `period`.
    pub fn build(
        number: String,
        issue_date: NaiveDate,
        from: Profile,
        bill_to: Student,
        sessions: &[Session],
        period: DateRange,
        unpaid_only: bool,
    ) -> Self {
        let lines = sessions
            .iter()
            .filter(|s| s.student_id == bill_to.id && period.contains(s.date))
            .filter(|s| !s.is_cancelled())
            .filter(|s| !unpaid_only || !s.is_paid())
            .map(|s| InvoiceLine {
                session_id: s.id.clone(),
                date: s.date,
                description: match bill_to.subject.as_deref() {
                    Some(subject) if !subject.trim().is_empty() => {
                        format!("{} tutoring", subject.trim())
                    }
                    _ => "Tutoring session".to_string(),
                },
                duration_minutes: s.duration_minutes,
                hourly_rate: s.hourly_rate,
                amount: s.total_amount,
                paid: s.is_paid(),
            })
            .collect();
        Self {
            number,
            issue_date,
            due_date: None,
            period,
            from,
            bill_to,
            lines,
            notes: None,
        }
    }

    pub fn total(&self) -> Decimal {
        self.lines.iter().fold(money_zero(), |acc, l| acc + l.amount)
    }

    pub fn amount_due(&self) -> Decimal {
        self.lines
            .iter()
            .filter(|l| !l.paid)
            .fold(money_zero(), |acc, l| acc + l.amount)
    }

    pub fn currency(&self) -> Currency {
        self.from.currency
    }
}

struct InvoiceRow {
    date: String,
    description: String,
    hours: String,
    rate: String,
    amount: String,
    status: &'static str,
}

#[derive(Template)]
#[template(path = "invoice.html")]
struct InvoiceTemplate {
    number: String,
    issue_date: String,
    due_date: Option<String>,
    period: String,
    business_name: String,
    tutor_name: String,
    from_email: String,
    from_phone: String,
    student_name: String,
    parent_name: String,
    student_email: String,
    rows: Vec<InvoiceRow>,
    total: String,
    amount_due: String,
    notes: Option<String>,
}

fn period_label(range: &DateRange) -> String {
    match (range.start, range.end) {
        (Some(s), Some(e)) => format!("{} to {}", s.format("%b %d, %Y"), e.format("%b %d, %Y")),
        (Some(s), None) => format!("From {}", s.format("%b %d, %Y")),
        (None, Some(e)) => format!("Through {}", e.format("%b %d, %Y")),
        (None, None) => "All sessions".to_string(),
    }
}

/// Renders a standalone printable invoice document.
pub fn invoice_html(invoice: &Invoice) -> Result<String, askama::Error> {
    let currency = invoice.currency();
    let rows = invoice
        .lines
        .iter()
        .map(|l| InvoiceRow {
            date: l.date.format("%b %d, %Y").to_string(),
            description: l.description.clone(),
            hours: format_hours(l.duration_minutes),
            rate: format_money(l.hourly_rate, currency),
            amount: format_money(l.amount, currency),
            status: if l.paid { "Paid" } else { "Due" },
        })
        .collect();
    InvoiceTemplate {
        number: invoice.number.clone(),
        issue_date: invoice.issue_date.format("%b %d, %Y").to_string(),
        due_date: invoice.due_date.map(|d| d.format("%b %d, %Y").to_string()),
        period: period_label(&invoice.period),
        business_name: invoice.from.business_name.clone(),
        tutor_name: invoice.from.tutor_name.clone(),
        from_email: invoice.from.email.clone().unwrap_or_default(),
        from_phone: invoice.from.phone.clone().unwrap_or_default(),
        student_name: invoice.bill_to.name.clone(),
        parent_name: invoice.bill_to.parent_name.clone().unwrap_or_default(),
        student_email: invoice.bill_to.email.clone().unwrap_or_default(),
        rows,
        total: format_money(invoice.total(), currency),
        amount_due: format_money(invoice.amount_due(), currency),
        notes: invoice.notes.clone(),
    }
    .render()
}
