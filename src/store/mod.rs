mod demo;
mod sqlite;

pub use demo::DemoStore;
pub use sqlite::SqliteStore;

use crate::model::{DateRange, Profile, ScheduledClass, Session, Student};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("a session already exists for this student on this day")]
    SessionExists { student_id: String, date: NaiveDate },
    #[error("{0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("stored value could not be decoded: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::SessionExists { .. } => "session_exists",
            StoreError::Invalid(_) => "bad_params",
            StoreError::Db(_) | StoreError::Corrupt(_) => "db_query_failed",
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    Workspace,
    Demo,
}

#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub range: DateRange,
    pub student_id: Option<String>,
}

impl SessionFilter {
    pub fn matches(&self, s: &Session) -> bool {
        self.range.contains(s.date)
            && self.student_id.as_deref().map_or(true, |id| s.student_id == id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeSummary {
    pub sessions_deleted: usize,
    pub scheduled_classes_deleted: usize,
}

/// Persistence for one tutor's data. Business rules (totals, derived end
/// times, logging from a schedule) live with the callers so that every
/// implementation applies them identically.
///
/// Lists are ordered: students by name, scheduled classes by day then start
/// time, sessions by date then start time.
pub trait Store {
    fn mode(&self) -> StoreMode;

    /// Bumped by every successful write.
    fn revision(&self) -> i64;

    fn profile(&self) -> StoreResult<Profile>;
    fn save_profile(&mut self, profile: &Profile) -> StoreResult<()>;

    fn list_students(&self) -> StoreResult<Vec<Student>>;
    fn get_student(&self, id: &str) -> StoreResult<Student>;
    fn insert_student(&mut self, student: &Student) -> StoreResult<()>;
    fn update_student(&mut self, student: &Student) -> StoreResult<()>;
    /// Removes the student together with its sessions and scheduled classes.
    fn delete_student(&mut self, id: &str) -> StoreResult<CascadeSummary>;

    fn list_schedules(&self) -> StoreResult<Vec<ScheduledClass>>;
    fn get_schedule(&self, id: &str) -> StoreResult<ScheduledClass>;
    fn insert_schedule(&mut self, class: &ScheduledClass) -> StoreResult<()>;
    fn update_schedule(&mut self, class: &ScheduledClass) -> StoreResult<()>;
    fn delete_schedule(&mut self, id: &str) -> StoreResult<()>;

    fn list_sessions(&self, filter: &SessionFilter) -> StoreResult<Vec<Session>>;
    fn get_session(&self, id: &str) -> StoreResult<Session>;
    /// Fails with `SessionExists` when the student already has a session that day.
    fn insert_session(&mut self, session: &Session) -> StoreResult<()>;
    fn update_session(&mut self, session: &Session) -> StoreResult<()>;
    fn delete_session(&mut self, id: &str) -> StoreResult<()>;
    /// Marks non-cancelled sessions paid or pending. Returns how many changed.
    fn set_paid(&mut self, ids: &[String], paid: bool) -> StoreResult<usize>;
}
