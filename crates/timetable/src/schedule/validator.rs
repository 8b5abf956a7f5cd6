//! Field validation for the timetable edit form.

use serde::{Deserialize, Deserializer, Serialize};

use super::error::{SlotError, ValidationErrors};
use super::slots::{generate_slots, SlotRequest, MAX_BATCH_PERIODS, MAX_PERIOD_NUMBER};
use super::teachers::TeacherAssignment;
use super::time::ClockTime;
use super::types::{
    Activity, ActivityType, ClassId, DayOfWeek, RoomId, ScheduleRecord, SubjectId,
};
use crate::reference::ReferenceData;

/// Editable form state. Text inputs are kept as the operator typed them so
/// every problem can be reported, not just the first one that fails to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleDraft {
    pub class_id: Option<ClassId>,
    pub day_of_week: String,
    pub activity_type: ActivityType,
    pub subject_id: Option<SubjectId>,
    #[serde(rename = "teacher_ids")]
    pub teachers: TeacherAssignment,
    pub room_id: Option<RoomId>,
    #[serde(deserialize_with = "text_or_number")]
    pub period_number: String,
    pub start_time: String,
    pub end_time: String,
    pub special_note: String,
}

impl ScheduleDraft {
    /// Switches the activity type.
    ///
    /// Leaving `lesson` drops the subject and every teacher; entering it
    /// starts from an empty assignment that must be filled before submitting.
    pub fn set_activity_type(&mut self, activity_type: ActivityType) {
        if self.activity_type == activity_type {
            return;
        }
        if self.activity_type.is_lesson() || activity_type.is_lesson() {
            self.subject_id = None;
            self.teachers.clear();
        }
        self.activity_type = activity_type;
    }

    /// Populates a draft from a persisted record, for editing.
    pub fn from_record(record: &ScheduleRecord) -> Self {
        let mut draft = ScheduleDraft {
            class_id: Some(record.class_id),
            day_of_week: record.day_of_week.to_string(),
            activity_type: record.activity_type(),
            room_id: record.room_id,
            period_number: record.period_number.to_string(),
            start_time: record.start_time.to_string(),
            end_time: record.end_time.to_string(),
            ..ScheduleDraft::default()
        };
        match &record.activity {
            Activity::Lesson {
                subject_id,
                teachers,
            } => {
                draft.subject_id = Some(*subject_id);
                draft.teachers = teachers.clone();
            }
            Activity::Other { special_note, .. } => {
                draft.special_note = special_note.clone();
            }
        }
        draft
    }
}

/// Accepts a JSON string, number or null for numeric text inputs.
fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// A draft that passed validation, with every field parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDraft {
    pub class_id: ClassId,
    pub day_of_week: DayOfWeek,
    pub activity: Activity,
    pub room_id: Option<RoomId>,
    pub period_number: u8,
    pub start_time: ClockTime,
    /// Present whenever `count == 1`
    pub end_time: Option<ClockTime>,
    pub count: u8,
}

impl ValidatedDraft {
    pub fn slot_request(&self) -> SlotRequest {
        SlotRequest {
            start: self.start_time,
            end: self.end_time,
            start_period: self.period_number,
            count: self.count,
        }
    }
}

/// Activity-aware validation of a draft plus the requested period count.
///
/// All rules run on every call and all violations are reported together.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleValidator<'a> {
    reference: Option<&'a ReferenceData>,
}

impl<'a> ScheduleValidator<'a> {
    pub fn new() -> Self {
        Self { reference: None }
    }

    /// Also checks that referenced classes, subjects, teachers and rooms exist.
    pub fn with_reference(reference: &'a ReferenceData) -> Self {
        Self {
            reference: Some(reference),
        }
    }

    /// Human-readable violations; empty when the draft is valid.
    pub fn violations(&self, draft: &ScheduleDraft, count: i64) -> Vec<String> {
        match self.check(draft, count) {
            Ok(_) => Vec::new(),
            Err(errors) => errors.into_messages(),
        }
    }

    /// Validates `draft` for a submission of `count` consecutive periods.
    pub fn check(
        &self,
        draft: &ScheduleDraft,
        count: i64,
    ) -> Result<ValidatedDraft, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if draft.class_id.is_none() {
            errors.push("Class is required");
        }

        let day = if draft.day_of_week.trim().is_empty() {
            errors.push("Day is required");
            None
        } else {
            match draft.day_of_week.parse::<DayOfWeek>() {
                Ok(day) => Some(day),
                Err(_) => {
                    let names: Vec<_> = DayOfWeek::ALL.iter().map(|d| d.local_name()).collect();
                    errors.push(format!("Day must be one of {}", names.join(", ")));
                    None
                }
            }
        };

        let count = match u8::try_from(count) {
            Ok(c) if (1..=MAX_BATCH_PERIODS).contains(&c) => Some(c),
            _ => {
                errors.push(format!(
                    "Number of periods must be between 1 and {}",
                    MAX_BATCH_PERIODS
                ));
                None
            }
        };

        let start = parse_time_field(&draft.start_time, "Start time", &mut errors);
        // Batches derive their own end times, so the entered end is only
        // required for a single period; a supplied end is still checked
        let end_required = count.map_or(true, |c| c == 1);
        let end = if end_required || !draft.end_time.trim().is_empty() {
            parse_time_field(&draft.end_time, "End time", &mut errors)
        } else {
            None
        };
        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                errors.push("Start time must be earlier than end time");
            }
        }

        let period = match draft.period_number.trim() {
            "" => {
                errors.push("Period number is required");
                None
            }
            text => match text.parse::<u8>() {
                Ok(p) if (1..=MAX_PERIOD_NUMBER).contains(&p) => Some(p),
                _ => {
                    errors.push(format!(
                        "Period number must be a whole number between 1 and {}",
                        MAX_PERIOD_NUMBER
                    ));
                    None
                }
            },
        };

        let activity = self.check_activity(draft, &mut errors);

        let slot_end = end.filter(|_| end_required);

        if let (Some(start), Some(period), Some(count)) = (start, period, count) {
            let request = SlotRequest {
                start,
                end: slot_end,
                start_period: period,
                count,
            };
            if request.last_period() > u32::from(MAX_PERIOD_NUMBER) {
                errors.push(format!(
                    "Periods would run past period {} (last period would be {})",
                    MAX_PERIOD_NUMBER,
                    request.last_period()
                ));
            } else if !end_required || slot_end.is_some_and(|end| start < end) {
                if let Err(SlotError::CrossesMidnight { .. }) = generate_slots(&request) {
                    errors.push("Periods must end before midnight");
                }
            }
        }

        if let Some(reference) = self.reference {
            for message in reference.missing_references(draft) {
                errors.push(message);
            }
        }

        match (draft.class_id, day, start, period, count, activity) {
            (Some(class_id), Some(day_of_week), Some(start_time), Some(period_number), Some(count), Some(activity))
                if errors.is_empty() =>
            {
                Ok(ValidatedDraft {
                    class_id,
                    day_of_week,
                    activity,
                    room_id: draft.room_id,
                    period_number,
                    start_time,
                    end_time: slot_end,
                    count,
                })
            }
            _ => Err(errors),
        }
    }

    /// Lessons need a subject and at least one teacher; anything else needs a note.
    fn check_activity(
        &self,
        draft: &ScheduleDraft,
        errors: &mut ValidationErrors,
    ) -> Option<Activity> {
        match draft.activity_type.non_lesson_kind() {
            None => {
                if draft.teachers.is_empty() {
                    errors.push("Select at least one teacher");
                }
                if draft.subject_id.is_none() {
                    errors.push("Subject is required");
                }
                match draft.subject_id {
                    Some(subject_id) if !draft.teachers.is_empty() => Some(Activity::Lesson {
                        subject_id,
                        teachers: draft.teachers.clone(),
                    }),
                    _ => None,
                }
            }
            Some(kind) => {
                let note = draft.special_note.trim();
                if note.is_empty() {
                    errors.push("Special note is required for non-lesson activities");
                    None
                } else {
                    Some(Activity::Other {
                        kind,
                        special_note: note.to_string(),
                    })
                }
            }
        }
    }
}

fn parse_time_field(
    input: &str,
    label: &str,
    errors: &mut ValidationErrors,
) -> Option<ClockTime> {
    if input.trim().is_empty() {
        errors.push(format!("{label} is required"));
        return None;
    }
    match input.parse::<ClockTime>() {
        Ok(time) => Some(time),
        Err(_) => {
            errors.push(format!("{label} must be a valid time (HH:MM)"));
            None
        }
    }
}
