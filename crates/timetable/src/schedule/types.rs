/// Types for timetable schedule records
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::slots::PeriodSlot;
use super::teachers::TeacherAssignment;
use super::time::ClockTime;
use crate::repository::RecordPayload;

pub type ClassId = i64;
pub type SubjectId = i64;
pub type TeacherId = i64;
pub type RoomId = i64;

/// Identifier assigned by the schedule repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(pub i64);

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown day of week: {0:?}")]
pub struct ParseDayError(pub String);

/// School days. Sunday is never scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 6] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
    ];

    /// Name used by the school and stored by the repository (e.g. "Senin").
    pub fn local_name(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Senin",
            DayOfWeek::Tuesday => "Selasa",
            DayOfWeek::Wednesday => "Rabu",
            DayOfWeek::Thursday => "Kamis",
            DayOfWeek::Friday => "Jumat",
            DayOfWeek::Saturday => "Sabtu",
        }
    }

    /// Zero-based position in the week, Monday first.
    pub fn index(&self) -> u8 {
        *self as u8
    }
}

impl FromStr for DayOfWeek {
    type Err = ParseDayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "senin" | "monday" | "mon" => Ok(DayOfWeek::Monday),
            "selasa" | "tuesday" | "tue" => Ok(DayOfWeek::Tuesday),
            "rabu" | "wednesday" | "wed" => Ok(DayOfWeek::Wednesday),
            "kamis" | "thursday" | "thu" => Ok(DayOfWeek::Thursday),
            "jumat" | "jum'at" | "friday" | "fri" => Ok(DayOfWeek::Friday),
            "sabtu" | "saturday" | "sat" => Ok(DayOfWeek::Saturday),
            _ => Err(ParseDayError(s.to_string())),
        }
    }
}

impl TryFrom<String> for DayOfWeek {
    type Error = ParseDayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DayOfWeek> for String {
    fn from(value: DayOfWeek) -> Self {
        value.local_name().to_string()
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.local_name())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown activity type: {0:?}")]
pub struct ParseActivityTypeError(pub String);

/// Classification of a timetable row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    #[default]
    Lesson,
    Ceremony,
    Break,
    SpecialActivity,
    Holiday,
    Exam,
    Other,
}

impl ActivityType {
    pub fn is_lesson(&self) -> bool {
        matches!(self, ActivityType::Lesson)
    }

    /// The non-lesson kind, or `None` for ordinary lessons.
    pub fn non_lesson_kind(&self) -> Option<NonLessonKind> {
        match self {
            ActivityType::Lesson => None,
            ActivityType::Ceremony => Some(NonLessonKind::Ceremony),
            ActivityType::Break => Some(NonLessonKind::Break),
            ActivityType::SpecialActivity => Some(NonLessonKind::SpecialActivity),
            ActivityType::Holiday => Some(NonLessonKind::Holiday),
            ActivityType::Exam => Some(NonLessonKind::Exam),
            ActivityType::Other => Some(NonLessonKind::Other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Lesson => "lesson",
            ActivityType::Ceremony => "ceremony",
            ActivityType::Break => "break",
            ActivityType::SpecialActivity => "special_activity",
            ActivityType::Holiday => "holiday",
            ActivityType::Exam => "exam",
            ActivityType::Other => "other",
        }
    }
}

impl FromStr for ActivityType {
    type Err = ParseActivityTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lesson" => Ok(ActivityType::Lesson),
            "ceremony" => Ok(ActivityType::Ceremony),
            "break" => Ok(ActivityType::Break),
            "special_activity" => Ok(ActivityType::SpecialActivity),
            "holiday" => Ok(ActivityType::Holiday),
            "exam" => Ok(ActivityType::Exam),
            "other" => Ok(ActivityType::Other),
            _ => Err(ParseActivityTypeError(s.to_string())),
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity types that carry a special note instead of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NonLessonKind {
    Ceremony,
    Break,
    SpecialActivity,
    Holiday,
    Exam,
    Other,
}

impl From<NonLessonKind> for ActivityType {
    fn from(kind: NonLessonKind) -> Self {
        match kind {
            NonLessonKind::Ceremony => ActivityType::Ceremony,
            NonLessonKind::Break => ActivityType::Break,
            NonLessonKind::SpecialActivity => ActivityType::SpecialActivity,
            NonLessonKind::Holiday => ActivityType::Holiday,
            NonLessonKind::Exam => ActivityType::Exam,
            NonLessonKind::Other => ActivityType::Other,
        }
    }
}

/// What happens during a period. Lessons carry a subject and teachers,
/// everything else carries a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activity {
    Lesson {
        subject_id: SubjectId,
        teachers: TeacherAssignment,
    },
    Other {
        kind: NonLessonKind,
        special_note: String,
    },
}

impl Activity {
    pub fn activity_type(&self) -> ActivityType {
        match self {
            Activity::Lesson { .. } => ActivityType::Lesson,
            Activity::Other { kind, .. } => (*kind).into(),
        }
    }
}

/// One persisted timetable period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "RecordPayload", try_from = "RecordPayload")]
pub struct ScheduleRecord {
    /// Absent until the repository has created the record
    pub id: Option<ScheduleId>,
    pub class_id: ClassId,
    pub day_of_week: DayOfWeek,
    pub period_number: u8,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub room_id: Option<RoomId>,
    pub activity: Activity,
}

impl ScheduleRecord {
    pub fn activity_type(&self) -> ActivityType {
        self.activity.activity_type()
    }

    /// Attendance is only taken for lessons.
    pub fn attendance_eligible(&self) -> bool {
        self.activity_type().is_lesson()
    }

    pub fn subject_id(&self) -> Option<SubjectId> {
        match &self.activity {
            Activity::Lesson { subject_id, .. } => Some(*subject_id),
            Activity::Other { .. } => None,
        }
    }

    pub fn teachers(&self) -> Option<&TeacherAssignment> {
        match &self.activity {
            Activity::Lesson { teachers, .. } => Some(teachers),
            Activity::Other { .. } => None,
        }
    }

    pub fn primary_teacher(&self) -> Option<TeacherId> {
        self.teachers().and_then(TeacherAssignment::primary)
    }

    pub fn special_note(&self) -> Option<&str> {
        match &self.activity {
            Activity::Lesson { .. } => None,
            Activity::Other { special_note, .. } => Some(special_note),
        }
    }

    pub fn slot(&self) -> PeriodSlot {
        PeriodSlot {
            period_number: self.period_number,
            start: self.start_time,
            end: self.end_time,
        }
    }
}
