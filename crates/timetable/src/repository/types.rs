/// Wire types for schedule records
use serde::{Deserialize, Serialize};

use super::error::RepositoryError;
use crate::schedule::{
    Activity, ActivityType, ClassId, ClockTime, DayOfWeek, RoomId, ScheduleId, ScheduleRecord,
    SubjectId, TeacherAssignment, TeacherId, MAX_PERIOD_NUMBER,
};

/// Flat JSON shape of a schedule record as the repository stores it.
///
/// Lesson-only and note-only fields are nullable here; converting into a
/// [`ScheduleRecord`] enforces which ones must be set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ScheduleId>,
    pub class_id: ClassId,
    pub day_of_week: DayOfWeek,
    #[serde(default)]
    pub activity_type: ActivityType,
    #[serde(default)]
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub teacher_ids: Vec<TeacherId>,
    /// Primary teacher, kept for single-teacher consumers
    #[serde(default)]
    pub teacher_id: Option<TeacherId>,
    #[serde(default)]
    pub room_id: Option<RoomId>,
    pub period_number: u8,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    #[serde(default)]
    pub attendance_eligible: bool,
    #[serde(default)]
    pub special_note: Option<String>,
}

impl From<ScheduleRecord> for RecordPayload {
    fn from(record: ScheduleRecord) -> Self {
        let activity_type = record.activity_type();
        let attendance_eligible = record.attendance_eligible();
        let (subject_id, teacher_ids, special_note) = match record.activity {
            Activity::Lesson {
                subject_id,
                teachers,
            } => (Some(subject_id), Vec::from(teachers), None),
            Activity::Other { special_note, .. } => (None, Vec::new(), Some(special_note)),
        };

        RecordPayload {
            id: record.id,
            class_id: record.class_id,
            day_of_week: record.day_of_week,
            activity_type,
            subject_id,
            teacher_id: teacher_ids.first().copied(),
            teacher_ids,
            room_id: record.room_id,
            period_number: record.period_number,
            start_time: record.start_time,
            end_time: record.end_time,
            attendance_eligible,
            special_note,
        }
    }
}

impl TryFrom<RecordPayload> for ScheduleRecord {
    type Error = RepositoryError;

    fn try_from(payload: RecordPayload) -> Result<Self, Self::Error> {
        let activity = match payload.activity_type.non_lesson_kind() {
            None => {
                let subject_id = payload
                    .subject_id
                    .ok_or_else(|| RepositoryError::invalid_record("lesson without a subject"))?;
                let mut teachers = TeacherAssignment::from(payload.teacher_ids);
                // Older rows only carry the single teacher column
                if teachers.is_empty() {
                    if let Some(teacher_id) = payload.teacher_id {
                        teachers.add(teacher_id);
                    }
                }
                if teachers.is_empty() {
                    return Err(RepositoryError::invalid_record("lesson without a teacher"));
                }
                Activity::Lesson {
                    subject_id,
                    teachers,
                }
            }
            Some(kind) => {
                let special_note = payload
                    .special_note
                    .map(|note| note.trim().to_string())
                    .filter(|note| !note.is_empty())
                    .ok_or_else(|| {
                        RepositoryError::invalid_record(format!(
                            "{} without a special note",
                            payload.activity_type
                        ))
                    })?;
                Activity::Other { kind, special_note }
            }
        };

        if !(1..=MAX_PERIOD_NUMBER).contains(&payload.period_number) {
            return Err(RepositoryError::invalid_record(format!(
                "period number {} is outside 1..={}",
                payload.period_number, MAX_PERIOD_NUMBER
            )));
        }

        if payload.start_time >= payload.end_time {
            return Err(RepositoryError::invalid_record(format!(
                "start time {} is not before end time {}",
                payload.start_time, payload.end_time
            )));
        }

        Ok(ScheduleRecord {
            id: payload.id,
            class_id: payload.class_id,
            day_of_week: payload.day_of_week,
            period_number: payload.period_number,
            start_time: payload.start_time,
            end_time: payload.end_time,
            room_id: payload.room_id,
            activity,
        })
    }
}
