/// Embedded SQLite storage for schedule records
use async_trait::async_trait;
use rusqlite::{Connection, Row};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::error::RepositoryError;
use super::types::RecordPayload;
use super::{ScheduleFilter, ScheduleRepository};
use crate::schedule::{ScheduleId, ScheduleRecord};

const SCHEMA_SQL: &str = include_str!("../../../../sql/init_schedules.sql");

const SELECT_COLUMNS: &str = "schedule_id, class_id, day_of_week, activity_type, subject_id,
    teacher_ids, teacher_id, room_id, period_number, start_time, end_time,
    attendance_eligible, special_note";

pub struct SqliteScheduleRepository {
    db: Mutex<Connection>,
}

impl SqliteScheduleRepository {
    /// Opens (or creates) the database at `db_path` and initializes the schema
    pub fn open(db_path: &str) -> Result<Self, RepositoryError> {
        Self::from_connection(Connection::open(db_path)?)
    }

    /// A private database that lives as long as the repository
    pub fn in_memory() -> Result<Self, RepositoryError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.db.lock().map_err(|_| RepositoryError::Storage {
            message: "database lock poisoned".to_string(),
        })
    }
}

/// Column values shared by INSERT and UPDATE.
struct RowValues {
    payload: RecordPayload,
    day_index: u8,
    teacher_ids_json: String,
}

impl RowValues {
    fn new(record: &ScheduleRecord) -> Result<Self, RepositoryError> {
        let payload = RecordPayload::from(record.clone());
        let teacher_ids_json = serde_json::to_string(&payload.teacher_ids)?;
        Ok(Self {
            day_index: record.day_of_week.index(),
            payload,
            teacher_ids_json,
        })
    }
}

/// Raw column values of one `schedules` row
#[derive(Debug, Clone)]
struct StoredRow {
    schedule_id: i64,
    class_id: i64,
    day_of_week: String,
    activity_type: String,
    subject_id: Option<i64>,
    teacher_ids: String, // JSON string
    teacher_id: Option<i64>,
    room_id: Option<i64>,
    period_number: i64,
    start_time: String,
    end_time: String,
    attendance_eligible: bool,
    special_note: Option<String>,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(StoredRow {
            schedule_id: row.get(0)?,
            class_id: row.get(1)?,
            day_of_week: row.get(2)?,
            activity_type: row.get(3)?,
            subject_id: row.get(4)?,
            teacher_ids: row.get(5)?,
            teacher_id: row.get(6)?,
            room_id: row.get(7)?,
            period_number: row.get(8)?,
            start_time: row.get(9)?,
            end_time: row.get(10)?,
            attendance_eligible: row.get(11)?,
            special_note: row.get(12)?,
        })
    }

    fn into_record(self) -> Result<ScheduleRecord, RepositoryError> {
        let invalid = |what: &str, value: &str| {
            RepositoryError::invalid_record(format!("stored {} {:?} is invalid", what, value))
        };

        let payload = RecordPayload {
            id: Some(ScheduleId(self.schedule_id)),
            class_id: self.class_id,
            day_of_week: self
                .day_of_week
                .parse()
                .map_err(|_| invalid("day", &self.day_of_week))?,
            activity_type: self
                .activity_type
                .parse()
                .map_err(|_| invalid("activity type", &self.activity_type))?,
            subject_id: self.subject_id,
            teacher_ids: serde_json::from_str(&self.teacher_ids)?,
            teacher_id: self.teacher_id,
            room_id: self.room_id,
            period_number: u8::try_from(self.period_number)
                .map_err(|_| invalid("period number", &self.period_number.to_string()))?,
            start_time: self
                .start_time
                .parse()
                .map_err(|_| invalid("start time", &self.start_time))?,
            end_time: self
                .end_time
                .parse()
                .map_err(|_| invalid("end time", &self.end_time))?,
            attendance_eligible: self.attendance_eligible,
            special_note: self.special_note,
        };

        ScheduleRecord::try_from(payload)
    }
}

#[async_trait]
impl ScheduleRepository for SqliteScheduleRepository {
    async fn create(&self, record: &ScheduleRecord) -> Result<ScheduleId, RepositoryError> {
        let values = RowValues::new(record)?;
        let p = &values.payload;
        let db = self.conn()?;

        db.execute(
            "INSERT INTO schedules (
                class_id, day_of_week, day_index, activity_type, subject_id,
                teacher_ids, teacher_id, room_id, period_number, start_time, end_time,
                attendance_eligible, special_note, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, datetime('now'))",
            rusqlite::params![
                p.class_id,
                p.day_of_week.local_name(),
                values.day_index,
                p.activity_type.as_str(),
                p.subject_id,
                values.teacher_ids_json,
                p.teacher_id,
                p.room_id,
                p.period_number,
                p.start_time.to_string(),
                p.end_time.to_string(),
                p.attendance_eligible,
                p.special_note,
            ],
        )?;

        let id = ScheduleId(db.last_insert_rowid());
        debug!(id = %id, period = p.period_number, "Inserted schedule row");
        Ok(id)
    }

    async fn update(&self, id: ScheduleId, record: &ScheduleRecord) -> Result<(), RepositoryError> {
        let values = RowValues::new(record)?;
        let p = &values.payload;
        let db = self.conn()?;

        let changed = db.execute(
            "UPDATE schedules SET
                class_id = ?2, day_of_week = ?3, day_index = ?4, activity_type = ?5,
                subject_id = ?6, teacher_ids = ?7, teacher_id = ?8, room_id = ?9,
                period_number = ?10, start_time = ?11, end_time = ?12,
                attendance_eligible = ?13, special_note = ?14, updated_at = datetime('now')
             WHERE schedule_id = ?1",
            rusqlite::params![
                id.0,
                p.class_id,
                p.day_of_week.local_name(),
                values.day_index,
                p.activity_type.as_str(),
                p.subject_id,
                values.teacher_ids_json,
                p.teacher_id,
                p.room_id,
                p.period_number,
                p.start_time.to_string(),
                p.end_time.to_string(),
                p.attendance_eligible,
                p.special_note,
            ],
        )?;

        if changed == 0 {
            return Err(RepositoryError::NotFound {
                message: format!("no schedule with id {}", id),
            });
        }
        Ok(())
    }

    async fn delete(&self, id: ScheduleId) -> Result<(), RepositoryError> {
        let db = self.conn()?;
        let changed = db.execute("DELETE FROM schedules WHERE schedule_id = ?1", [id.0])?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                message: format!("no schedule with id {}", id),
            });
        }
        Ok(())
    }

    async fn list(&self, filter: &ScheduleFilter) -> Result<Vec<ScheduleRecord>, RepositoryError> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {SELECT_COLUMNS}
             FROM schedules
             WHERE (?1 IS NULL OR class_id = ?1)
               AND (?2 IS NULL OR day_index = ?2)
             ORDER BY day_index, period_number, class_id"
        ))?;

        let rows = stmt
            .query_map(
                rusqlite::params![filter.class_id, filter.day_of_week.map(|d| d.index())],
                StoredRow::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record = row.into_record()?;
            // Teachers live in a JSON column, so that filter runs here
            if filter.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{Activity, DayOfWeek, NonLessonKind, TeacherAssignment};

    fn lesson(day: DayOfWeek, period: u8, teachers: Vec<i64>) -> ScheduleRecord {
        ScheduleRecord {
            id: None,
            class_id: 1,
            day_of_week: day,
            period_number: period,
            start_time: "08:00".parse().unwrap(),
            end_time: "08:40".parse().unwrap(),
            room_id: Some(4),
            activity: Activity::Lesson {
                subject_id: 2,
                teachers: TeacherAssignment::from(teachers),
            },
        }
    }

    #[tokio::test]
    async fn test_create_and_list_sorted() {
        let repo = SqliteScheduleRepository::in_memory().unwrap();
        repo.create(&lesson(DayOfWeek::Wednesday, 1, vec![9])).await.unwrap();
        repo.create(&lesson(DayOfWeek::Monday, 3, vec![9])).await.unwrap();
        repo.create(&lesson(DayOfWeek::Monday, 2, vec![5, 9])).await.unwrap();

        let all = repo.list(&ScheduleFilter::default()).await.unwrap();
        let order: Vec<_> = all.iter().map(|r| (r.day_of_week, r.period_number)).collect();
        assert_eq!(
            order,
            vec![
                (DayOfWeek::Monday, 2),
                (DayOfWeek::Monday, 3),
                (DayOfWeek::Wednesday, 1)
            ]
        );
        assert_eq!(all[0].teachers().unwrap().as_slice(), &[5, 9]);
        assert!(all.iter().all(|r| r.id.is_some()));
    }

    #[tokio::test]
    async fn test_filters() {
        let repo = SqliteScheduleRepository::in_memory().unwrap();
        repo.create(&lesson(DayOfWeek::Monday, 1, vec![9])).await.unwrap();
        repo.create(&lesson(DayOfWeek::Monday, 2, vec![5])).await.unwrap();
        repo.create(&lesson(DayOfWeek::Friday, 1, vec![5])).await.unwrap();

        let monday = repo
            .list(&ScheduleFilter::for_class(1).on_day(DayOfWeek::Monday))
            .await
            .unwrap();
        assert_eq!(monday.len(), 2);

        let teacher_five = repo
            .list(&ScheduleFilter {
                teacher_id: Some(5),
                ..ScheduleFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(teacher_five.len(), 2);

        let other_class = repo.list(&ScheduleFilter::for_class(2)).await.unwrap();
        assert!(other_class.is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = SqliteScheduleRepository::in_memory().unwrap();
        let id = repo.create(&lesson(DayOfWeek::Monday, 1, vec![9])).await.unwrap();

        let mut edited = lesson(DayOfWeek::Monday, 1, vec![9]);
        edited.activity = Activity::Other {
            kind: NonLessonKind::Ceremony,
            special_note: "Upacara".to_string(),
        };
        repo.update(id, &edited).await.unwrap();

        let stored = repo.list(&ScheduleFilter::default()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].special_note(), Some("Upacara"));
        assert!(!stored[0].attendance_eligible());

        repo.delete(id).await.unwrap();
        assert!(repo.delete(id).await.unwrap_err().is_not_found());
        assert!(repo.update(id, &edited).await.unwrap_err().is_not_found());
    }
}
