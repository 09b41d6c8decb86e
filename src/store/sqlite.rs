use super::{CascadeSummary, SessionFilter, Store, StoreError, StoreMode, StoreResult};
use crate::db;
use crate::model::{
    now_timestamp, CancelledBy, PaymentStatus, Profile, ScheduledClass, Session, Student,
};
use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

const PROFILE_KEY: &str = "profile";
const REVISION_KEY: &str = "revision";

const STUDENT_COLUMNS: &str = "id, name, email, phone, parent_name, subject, hourly_rate, is_active, notes, created_at, updated_at";

const SCHEDULE_SELECT: &str = "SELECT c.id, c.student_id, s.name, c.day_of_week, c.start_time,
        c.duration_minutes, c.is_active, c.notes, c.created_at
     FROM scheduled_classes c
     JOIN students s ON s.id = c.student_id";

const SESSION_SELECT: &str = "SELECT t.id, t.student_id, s.name, t.scheduled_class_id, t.date,
        t.start_time, t.end_time, t.duration_minutes, t.hourly_rate, t.total_amount,
        t.payment_status, t.cancelled_by, t.notes, t.created_at, t.updated_at
     FROM tutoring_sessions t
     JOIN students s ON s.id = t.student_id";

pub struct SqliteStore {
    conn: Connection,
    revision: i64,
}

fn conversion_err(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn decimal_col(r: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = r.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_err(idx, format!("bad decimal {raw:?}: {e}")))
}

fn date_col(r: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = r.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|e| conversion_err(idx, format!("bad date {raw:?}: {e}")))
}

fn student_from_row(r: &Row) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        name: r.get(1)?,
        email: r.get(2)?,
        phone: r.get(3)?,
        parent_name: r.get(4)?,
        subject: r.get(5)?,
        hourly_rate: decimal_col(r, 6)?,
        is_active: r.get::<_, i64>(7)? != 0,
        notes: r.get(8)?,
        created_at: r.get(9)?,
        updated_at: r.get(10)?,
    })
}

fn schedule_from_row(r: &Row) -> rusqlite::Result<ScheduledClass> {
    Ok(ScheduledClass {
        id: r.get(0)?,
        student_id: r.get(1)?,
        student_name: r.get(2)?,
        day_of_week: r.get(3)?,
        start_time: r.get(4)?,
        duration_minutes: r.get(5)?,
        is_active: r.get::<_, i64>(6)? != 0,
        notes: r.get(7)?,
        created_at: r.get(8)?,
    })
}

fn session_from_row(r: &Row) -> rusqlite::Result<Session> {
    let status_raw: String = r.get(10)?;
    let payment_status = PaymentStatus::parse(&status_raw)
        .ok_or_else(|| conversion_err(10, format!("bad payment_status {status_raw:?}")))?;
    let cancelled_by = r
        .get::<_, Option<String>>(11)?
        .as_deref()
        .and_then(CancelledBy::parse);
    Ok(Session {
        id: r.get(0)?,
        student_id: r.get(1)?,
        student_name: r.get(2)?,
        scheduled_class_id: r.get(3)?,
        date: date_col(r, 4)?,
        start_time: r.get(5)?,
        end_time: r.get(6)?,
        duration_minutes: r.get(7)?,
        hourly_rate: decimal_col(r, 8)?,
        total_amount: decimal_col(r, 9)?,
        payment_status,
        cancelled_by,
        notes: r.get(12)?,
        created_at: r.get(13)?,
        updated_at: r.get(14)?,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        let conn = db::open_db(workspace)?;
        let revision = db::settings_get_json(&conn, REVISION_KEY)?
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        Ok(Self {
            conn,
            revision,
        })
    }

    fn bump(&mut self) -> StoreResult<()> {
        self.revision += 1;
        db::settings_set_json(&self.conn, REVISION_KEY, &serde_json::json!(self.revision))?;
        Ok(())
    }

    fn ensure_student(&self, id: &str) -> StoreResult<()> {
        let exists: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM students WHERE id = ?", [id], |r| r.get(0))
            .optional()?;
        exists.map(|_| ()).ok_or(StoreError::NotFound("student"))
    }

    fn ensure_free_day(&self, session: &Session) -> StoreResult<()> {
        let taken: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM tutoring_sessions WHERE student_id = ? AND date = ? AND id <> ?",
                (&session.student_id, session.date.to_string(), &session.id),
                |r| r.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(StoreError::SessionExists {
                student_id: session.student_id.clone(),
                date: session.date,
            });
        }
        Ok(())
    }

    fn session_exists_err(session: &Session) -> impl Fn(rusqlite::Error) -> StoreError + '_ {
        move |e| {
            if is_unique_violation(&e) {
                StoreError::SessionExists {
                    student_id: session.student_id.clone(),
                    date: session.date,
                }
            } else {
                StoreError::Db(e)
            }
        }
    }
}

impl Store for SqliteStore {
    fn mode(&self) -> StoreMode {
        StoreMode::Workspace
    }

    fn revision(&self) -> i64 {
        self.revision
    }

    fn profile(&self) -> StoreResult<Profile> {
        match db::settings_get_json(&self.conn, PROFILE_KEY)? {
            Some(v) => serde_json::from_value(v).map_err(|e| StoreError::Corrupt(e.to_string())),
            None => Ok(Profile::default()),
        }
    }

    fn save_profile(&mut self, profile: &Profile) -> StoreResult<()> {
        let value = serde_json::to_value(profile).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        db::settings_set_json(&self.conn, PROFILE_KEY, &value)?;
        self.bump()
    }

    fn list_students(&self) -> StoreResult<Vec<Student>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students ORDER BY name COLLATE NOCASE, id"
        ))?;
        let rows = stmt
            .query_map([], student_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_student(&self, id: &str) -> StoreResult<Student> {
        self.conn
            .query_row(
                &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?"),
                [id],
                student_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound("student"))
    }

    fn insert_student(&mut self, s: &Student) -> StoreResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO students({STUDENT_COLUMNS}) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            rusqlite::params![
                s.id,
                s.name,
                s.email,
                s.phone,
                s.parent_name,
                s.subject,
                s.hourly_rate.to_string(),
                s.is_active as i64,
                s.notes,
                s.created_at,
                s.updated_at
            ],
        )?;
        self.bump()
    }

    fn update_student(&mut self, s: &Student) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE students SET
               name = ?, email = ?, phone = ?, parent_name = ?, subject = ?,
               hourly_rate = ?, is_active = ?, notes = ?, updated_at = ?
             WHERE id = ?",
            rusqlite::params![
                s.name,
                s.email,
                s.phone,
                s.parent_name,
                s.subject,
                s.hourly_rate.to_string(),
                s.is_active as i64,
                s.notes,
                s.updated_at,
                s.id
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound("student"));
        }
        self.bump()
    }

    fn delete_student(&mut self, id: &str) -> StoreResult<CascadeSummary> {
        self.ensure_student(id)?;
        let tx = self.conn.unchecked_transaction()?;
        // Dependency order: the schema has no ON DELETE CASCADE.
        let sessions_deleted =
            tx.execute("DELETE FROM tutoring_sessions WHERE student_id = ?", [id])?;
        let scheduled_classes_deleted =
            tx.execute("DELETE FROM scheduled_classes WHERE student_id = ?", [id])?;
        tx.execute("DELETE FROM students WHERE id = ?", [id])?;
        tx.commit()?;
        self.bump()?;
        Ok(CascadeSummary {
            sessions_deleted,
            scheduled_classes_deleted,
        })
    }

    fn list_schedules(&self) -> StoreResult<Vec<ScheduledClass>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SCHEDULE_SELECT} ORDER BY c.day_of_week, c.start_time, s.name COLLATE NOCASE"
        ))?;
        let rows = stmt
            .query_map([], schedule_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_schedule(&self, id: &str) -> StoreResult<ScheduledClass> {
        self.conn
            .query_row(
                &format!("{SCHEDULE_SELECT} WHERE c.id = ?"),
                [id],
                schedule_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound("scheduled class"))
    }

    fn insert_schedule(&mut self, c: &ScheduledClass) -> StoreResult<()> {
        self.ensure_student(&c.student_id)?;
        self.conn.execute(
            "INSERT INTO scheduled_classes(
               id, student_id, day_of_week, start_time, duration_minutes, is_active, notes, created_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                c.id,
                c.student_id,
                c.day_of_week,
                c.start_time,
                c.duration_minutes,
                c.is_active as i64,
                c.notes,
                c.created_at
            ],
        )?;
        self.bump()
    }

    fn update_schedule(&mut self, c: &ScheduledClass) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE scheduled_classes SET
               day_of_week = ?, start_time = ?, duration_minutes = ?, is_active = ?, notes = ?
             WHERE id = ?",
            rusqlite::params![
                c.day_of_week,
                c.start_time,
                c.duration_minutes,
                c.is_active as i64,
                c.notes,
                c.id
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound("scheduled class"));
        }
        self.bump()
    }

    fn delete_schedule(&mut self, id: &str) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM scheduled_classes WHERE id = ?", [id])?;
        if changed == 0 {
            return Err(StoreError::NotFound("scheduled class"));
        }
        self.bump()
    }

    fn list_sessions(&self, filter: &SessionFilter) -> StoreResult<Vec<Session>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut binds: Vec<Value> = Vec::new();
        if let Some(start) = filter.range.start {
            clauses.push("t.date >= ?");
            binds.push(Value::Text(start.to_string()));
        }
        if let Some(end) = filter.range.end {
            clauses.push("t.date <= ?");
            binds.push(Value::Text(end.to_string()));
        }
        if let Some(student_id) = &filter.student_id {
            clauses.push("t.student_id = ?");
            binds.push(Value::Text(student_id.clone()));
        }
        let mut sql = SESSION_SELECT.to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY t.date, COALESCE(t.start_time, ''), s.name COLLATE NOCASE");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(binds), session_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_session(&self, id: &str) -> StoreResult<Session> {
        self.conn
            .query_row(
                &format!("{SESSION_SELECT} WHERE t.id = ?"),
                [id],
                session_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound("session"))
    }

    fn insert_session(&mut self, s: &Session) -> StoreResult<()> {
        self.ensure_student(&s.student_id)?;
        self.ensure_free_day(s)?;
        self.conn
            .execute(
                "INSERT INTO tutoring_sessions(
                   id, student_id, scheduled_class_id, date, start_time, end_time,
                   duration_minutes, hourly_rate, total_amount, payment_status, cancelled_by,
                   notes, created_at, updated_at
                 ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                rusqlite::params![
                    s.id,
                    s.student_id,
                    s.scheduled_class_id,
                    s.date.to_string(),
                    s.start_time,
                    s.end_time,
                    s.duration_minutes,
                    s.hourly_rate.to_string(),
                    s.total_amount.to_string(),
                    s.payment_status.as_str(),
                    s.cancelled_by.map(CancelledBy::as_str),
                    s.notes,
                    s.created_at,
                    s.updated_at
                ],
            )
            .map_err(Self::session_exists_err(s))?;
        self.bump()
    }

    fn update_session(&mut self, s: &Session) -> StoreResult<()> {
        self.ensure_free_day(s)?;
        let changed = self
            .conn
            .execute(
                "UPDATE tutoring_sessions SET
                   date = ?, start_time = ?, end_time = ?, duration_minutes = ?,
                   hourly_rate = ?, total_amount = ?, payment_status = ?, cancelled_by = ?,
                   notes = ?, updated_at = ?
                 WHERE id = ?",
                rusqlite::params![
                    s.date.to_string(),
                    s.start_time,
                    s.end_time,
                    s.duration_minutes,
                    s.hourly_rate.to_string(),
                    s.total_amount.to_string(),
                    s.payment_status.as_str(),
                    s.cancelled_by.map(CancelledBy::as_str),
                    s.notes,
                    s.updated_at,
                    s.id
                ],
            )
            .map_err(Self::session_exists_err(s))?;
        if changed == 0 {
            return Err(StoreError::NotFound("session"));
        }
        self.bump()
    }

    fn delete_session(&mut self, id: &str) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tutoring_sessions WHERE id = ?", [id])?;
        if changed == 0 {
            return Err(StoreError::NotFound("session"));
        }
        self.bump()
    }

    fn set_paid(&mut self, ids: &[String], paid: bool) -> StoreResult<usize> {
        let status = if paid {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        };
        let now = now_timestamp();
        let tx = self.conn.unchecked_transaction()?;
        let mut changed = 0usize;
        for id in ids {
            changed += tx.execute(
                "UPDATE tutoring_sessions SET payment_status = ?, updated_at = ?
                 WHERE id = ? AND payment_status <> 'cancelled' AND payment_status <> ?",
                (status.as_str(), &now, id, status.as_str()),
            )?;
        }
        tx.commit()?;
        if changed > 0 {
            self.bump()?;
        }
        Ok(changed)
    }
}
