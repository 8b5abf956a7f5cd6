//! Assembly of persist-ready records from a validated draft.

use super::error::SlotError;
use super::slots::{generate_slots, PeriodSlot};
use super::types::ScheduleRecord;
use super::validator::ValidatedDraft;

impl ValidatedDraft {
    /// Merges the draft's shared fields with one generated slot.
    pub fn record_for(&self, slot: PeriodSlot) -> ScheduleRecord {
        ScheduleRecord {
            id: None,
            class_id: self.class_id,
            day_of_week: self.day_of_week,
            period_number: slot.period_number,
            start_time: slot.start,
            end_time: slot.end,
            room_id: self.room_id,
            activity: self.activity.clone(),
        }
    }
}

/// Expands a create-mode draft into `count` records, in persistence order.
///
/// Every record of the batch shares class, day, activity, subject, teachers
/// and room; only the period number and times differ.
pub fn build_batch(draft: &ValidatedDraft) -> Result<Vec<ScheduleRecord>, SlotError> {
    let slots = generate_slots(&draft.slot_request())?;
    Ok(slots.into_iter().map(|slot| draft.record_for(slot)).collect())
}

/// Builds the single record of an edit, using the entered times verbatim.
pub fn build_edit(draft: &ValidatedDraft) -> Result<ScheduleRecord, SlotError> {
    if draft.count != 1 {
        return Err(SlotError::CountOutOfRange {
            count: draft.count,
            max: 1,
        });
    }
    let end = draft.end_time.ok_or(SlotError::MissingEndTime)?;
    let minutes = draft.start_time.minutes_until(end);
    if minutes <= 0 {
        return Err(SlotError::NonPositiveDuration { minutes });
    }

    Ok(draft.record_for(PeriodSlot {
        period_number: draft.period_number,
        start: draft.start_time,
        end,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{Activity, DayOfWeek, NonLessonKind, TeacherAssignment};

    fn validated(count: u8, end: Option<&str>) -> ValidatedDraft {
        ValidatedDraft {
            class_id: 1,
            day_of_week: DayOfWeek::Monday,
            activity: Activity::Lesson {
                subject_id: 2,
                teachers: TeacherAssignment::from(vec![9, 3]),
            },
            room_id: Some(12),
            period_number: 3,
            start_time: "08:00".parse().unwrap(),
            end_time: end.map(|e| e.parse().unwrap()),
            count,
        }
    }

    #[test]
    fn test_batch_shares_fields() {
        let records = build_batch(&validated(3, None)).unwrap();

        assert_eq!(records.len(), 3);
        let periods: Vec<u8> = records.iter().map(|r| r.period_number).collect();
        assert_eq!(periods, vec![3, 4, 5]);
        for record in &records {
            assert_eq!(record.id, None);
            assert_eq!(record.class_id, 1);
            assert_eq!(record.day_of_week, DayOfWeek::Monday);
            assert_eq!(record.room_id, Some(12));
            assert_eq!(record.subject_id(), Some(2));
            assert_eq!(record.primary_teacher(), Some(9));
        }
        assert_eq!(records[2].start_time.to_string(), "09:30");
        assert_eq!(records[2].end_time.to_string(), "10:10");
    }

    #[test]
    fn test_edit_uses_entered_times() {
        let record = build_edit(&validated(1, Some("09:15"))).unwrap();
        assert_eq!(record.period_number, 3);
        assert_eq!(record.end_time.to_string(), "09:15");
    }

    #[test]
    fn test_edit_guards_preconditions() {
        assert_eq!(
            build_edit(&validated(1, None)).unwrap_err(),
            SlotError::MissingEndTime
        );
        assert!(matches!(
            build_edit(&validated(2, Some("09:00"))),
            Err(SlotError::CountOutOfRange { count: 2, max: 1 })
        ));
        assert!(matches!(
            build_edit(&validated(1, Some("07:00"))),
            Err(SlotError::NonPositiveDuration { minutes: -60 })
        ));
    }

    #[test]
    fn test_non_lesson_batch() {
        let mut draft = validated(2, None);
        draft.activity = Activity::Other {
            kind: NonLessonKind::Exam,
            special_note: "Ujian tengah semester".to_string(),
        };
        let records = build_batch(&draft).unwrap();
        assert!(records.iter().all(|r| !r.attendance_eligible()));
        assert!(records
            .iter()
            .all(|r| r.special_note() == Some("Ujian tengah semester")));
    }
}
