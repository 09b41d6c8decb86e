use super::{CascadeSummary, SessionFilter, Store, StoreError, StoreMode, StoreResult};
use crate::model::{
    end_time, money, money_zero, now_timestamp, session_total, CancelledBy, PaymentStatus,
    Profile, ScheduledClass, Session, Student,
};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use uuid::Uuid;

/// In-memory mirror of the workspace store used for the try-before-signup
/// flow. Nothing here survives the process.
#[derive(Debug, Default)]
pub struct DemoStore {
    profile: Profile,
    students: Vec<Student>,
    schedules: Vec<ScheduledClass>,
    sessions: Vec<Session>,
    revision: i64,
}

struct SeedStudent {
    name: &'static str,
    email: &'static str,
    parent_name: &'static str,
    subject: &'static str,
    rate: i64,
    day_of_week: u32,
    start_time: &'static str,
    minutes: i64,
}

const SEED_STUDENTS: [SeedStudent; 3] = [
    SeedStudent {
        name: "Emma Johnson",
        email: "emma.j@example.com",
        parent_name: "Laura Johnson",
        subject: "Mathematics",
        rate: 45,
        day_of_week: 1,
        start_time: "16:00",
        minutes: 60,
    },
    SeedStudent {
        name: "Liam Chen",
        email: "liam.chen@example.com",
        parent_name: "Wei Chen",
        subject: "Physics",
        rate: 50,
        day_of_week: 3,
        start_time: "17:30",
        minutes: 90,
    },
    SeedStudent {
        name: "Sofia Martinez",
        email: "sofia.m@example.com",
        parent_name: "Carmen Martinez",
        subject: "English",
        rate: 40,
        day_of_week: 6,
        start_time: "10:00",
        minutes: 45,
    },
];

const SEED_WEEKS: i64 = 8;

impl DemoStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Three students with weekly slots and eight weeks of history ending at
    /// `today`. Older sessions are paid, the last two weeks are pending and
    /// every fifth occurrence is cancelled.
    pub fn seeded(today: NaiveDate) -> Self {
        let mut store = Self::empty();
        store.profile = Profile {
            business_name: "Demo Tutoring Co.".to_string(),
            tutor_name: "Alex Demo".to_string(),
            email: Some("demo@example.com".to_string()),
            phone: None,
            ..Profile::default()
        };
        let now = now_timestamp();
        let first_day = today - Duration::weeks(SEED_WEEKS);

        for (i, seed) in SEED_STUDENTS.iter().enumerate() {
            let student = Student {
                id: Uuid::new_v4().to_string(),
                name: seed.name.to_string(),
                email: Some(seed.email.to_string()),
                phone: None,
                parent_name: Some(seed.parent_name.to_string()),
                subject: Some(seed.subject.to_string()),
                hourly_rate: money(Decimal::from(seed.rate)),
                is_active: true,
                notes: None,
                created_at: now.clone(),
                updated_at: now.clone(),
            };
            let class = ScheduledClass {
                id: Uuid::new_v4().to_string(),
                student_id: student.id.clone(),
                student_name: student.name.clone(),
                day_of_week: seed.day_of_week,
                start_time: seed.start_time.to_string(),
                duration_minutes: seed.minutes,
                is_active: true,
                notes: None,
                created_at: now.clone(),
            };

            let mut day = first_day;
            let mut occurrence = i;
            while day <= today {
                if class.occurs_on(day) {
                    let cancelled = occurrence % 5 == 4;
                    let payment_status = if cancelled {
                        PaymentStatus::Cancelled
                    } else if today - day > Duration::days(14) {
                        PaymentStatus::Paid
                    } else {
                        PaymentStatus::Pending
                    };
                    store.sessions.push(Session {
                        id: Uuid::new_v4().to_string(),
                        student_id: student.id.clone(),
                        student_name: student.name.clone(),
                        scheduled_class_id: Some(class.id.clone()),
                        date: day,
                        start_time: Some(class.start_time.clone()),
                        end_time: end_time(&class.start_time, class.duration_minutes),
                        duration_minutes: class.duration_minutes,
                        hourly_rate: student.hourly_rate,
                        total_amount: session_total(class.duration_minutes, student.hourly_rate)
                            .unwrap_or_else(money_zero),
                        payment_status,
                        cancelled_by: cancelled.then_some(if occurrence % 2 == 0 {
                            CancelledBy::Student
                        } else {
                            CancelledBy::Tutor
                        }),
                        notes: None,
                        created_at: now.clone(),
                        updated_at: now.clone(),
                    });
                    occurrence += 1;
                }
                day += Duration::days(1);
            }
            store.students.push(student);
            store.schedules.push(class);
        }
        store.sort();
        store
    }

    fn sort(&mut self) {
        self.students
            .sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        self.schedules.sort_by(|a, b| {
            (a.day_of_week, &a.start_time, a.student_name.to_lowercase()).cmp(&(
                b.day_of_week,
                &b.start_time,
                b.student_name.to_lowercase(),
            ))
        });
        self.sessions.sort_by(|a, b| {
            (a.date, a.start_time.as_deref().unwrap_or(""))
                .cmp(&(b.date, b.start_time.as_deref().unwrap_or("")))
        });
    }

    fn touch(&mut self) {
        self.sort();
        self.revision += 1;
    }

    fn student_name(&self, id: &str) -> StoreResult<String> {
        self.students
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.name.clone())
            .ok_or(StoreError::NotFound("student"))
    }

    fn ensure_free_day(&self, session: &Session) -> StoreResult<()> {
        let taken = self.sessions.iter().any(|s| {
            s.id != session.id && s.student_id == session.student_id && s.date == session.date
        });
        if taken {
            return Err(StoreError::SessionExists {
                student_id: session.student_id.clone(),
                date: session.date,
            });
        }
        Ok(())
    }
}

impl Store for DemoStore {
    fn mode(&self) -> StoreMode {
        StoreMode::Demo
    }

    fn revision(&self) -> i64 {
        self.revision
    }

    fn profile(&self) -> StoreResult<Profile> {
        Ok(self.profile.clone())
    }

    fn save_profile(&mut self, profile: &Profile) -> StoreResult<()> {
        self.profile = profile.clone();
        self.touch();
        Ok(())
    }

    fn list_students(&self) -> StoreResult<Vec<Student>> {
        Ok(self.students.clone())
    }

    fn get_student(&self, id: &str) -> StoreResult<Student> {
        self.students
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(StoreError::NotFound("student"))
    }

    fn insert_student(&mut self, student: &Student) -> StoreResult<()> {
        if self.students.iter().any(|s| s.id == student.id) {
            return Err(StoreError::Invalid("student id already in use".to_string()));
        }
        self.students.push(student.clone());
        self.touch();
        Ok(())
    }

    fn update_student(&mut self, student: &Student) -> StoreResult<()> {
        let slot = self
            .students
            .iter_mut()
            .find(|s| s.id == student.id)
            .ok_or(StoreError::NotFound("student"))?;
        *slot = student.clone();
        // Keep the denormalized names in step with the workspace join.
        for c in self.schedules.iter_mut().filter(|c| c.student_id == student.id) {
            c.student_name = student.name.clone();
        }
        for s in self.sessions.iter_mut().filter(|s| s.student_id == student.id) {
            s.student_name = student.name.clone();
        }
        self.touch();
        Ok(())
    }

    fn delete_student(&mut self, id: &str) -> StoreResult<CascadeSummary> {
        let before = self.students.len();
        self.students.retain(|s| s.id != id);
        if self.students.len() == before {
            return Err(StoreError::NotFound("student"));
        }
        let sessions_before = self.sessions.len();
        self.sessions.retain(|s| s.student_id != id);
        let schedules_before = self.schedules.len();
        self.schedules.retain(|c| c.student_id != id);
        self.touch();
        Ok(CascadeSummary {
            sessions_deleted: sessions_before - self.sessions.len(),
            scheduled_classes_deleted: schedules_before - self.schedules.len(),
        })
    }

    fn list_schedules(&self) -> StoreResult<Vec<ScheduledClass>> {
        Ok(self.schedules.clone())
    }

    fn get_schedule(&self, id: &str) -> StoreResult<ScheduledClass> {
        self.schedules
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(StoreError::NotFound("scheduled class"))
    }

    fn insert_schedule(&mut self, class: &ScheduledClass) -> StoreResult<()> {
        let mut class = class.clone();
        class.student_name = self.student_name(&class.student_id)?;
        self.schedules.push(class);
        self.touch();
        Ok(())
    }

    fn update_schedule(&mut self, class: &ScheduledClass) -> StoreResult<()> {
        let slot = self
            .schedules
            .iter_mut()
            .find(|c| c.id == class.id)
            .ok_or(StoreError::NotFound("scheduled class"))?;
        let student_name = slot.student_name.clone();
        *slot = ScheduledClass {
            student_name,
            ..class.clone()
        };
        self.touch();
        Ok(())
    }

    fn delete_schedule(&mut self, id: &str) -> StoreResult<()> {
        let before = self.schedules.len();
        self.schedules.retain(|c| c.id != id);
        if self.schedules.len() == before {
            return Err(StoreError::NotFound("scheduled class"));
        }
        self.touch();
        Ok(())
    }

    fn list_sessions(&self, filter: &SessionFilter) -> StoreResult<Vec<Session>> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    fn get_session(&self, id: &str) -> StoreResult<Session> {
        self.sessions
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(StoreError::NotFound("session"))
    }

    fn insert_session(&mut self, session: &Session) -> StoreResult<()> {
        let student_name = self.student_name(&session.student_id)?;
        self.ensure_free_day(session)?;
        self.sessions.push(Session {
            student_name,
            ..session.clone()
        });
        self.touch();
        Ok(())
    }

    fn update_session(&mut self, session: &Session) -> StoreResult<()> {
        self.ensure_free_day(session)?;
        let slot = self
            .sessions
            .iter_mut()
            .find(|s| s.id == session.id)
            .ok_or(StoreError::NotFound("session"))?;
        let student_name = slot.student_name.clone();
        *slot = Session {
            student_name,
            ..session.clone()
        };
        self.touch();
        Ok(())
    }

    fn delete_session(&mut self, id: &str) -> StoreResult<()> {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != id);
        if self.sessions.len() == before {
            return Err(StoreError::NotFound("session"));
        }
        self.touch();
        Ok(())
    }

    fn set_paid(&mut self, ids: &[String], paid: bool) -> StoreResult<usize> {
        let status = if paid {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        };
        let now = now_timestamp();
        let mut changed = 0usize;
        for s in self
            .sessions
            .iter_mut()
            .filter(|s| ids.contains(&s.id) && !s.is_cancelled() && s.payment_status != status)
        {
            s.payment_status = status;
            s.updated_at = now.clone();
            changed += 1;
        }
        if changed > 0 {
            self.touch();
        }
        Ok(changed)
    }
}
