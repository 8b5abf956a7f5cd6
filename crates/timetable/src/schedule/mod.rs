//! Schedule domain: record types, slot generation, validation and the
//! submission state machine.

mod builder;
mod error;
mod form;
mod slots;
mod teachers;
mod time;
mod types;
mod validator;

pub use builder::{build_batch, build_edit};
pub use error::{SlotError, SubmitError, ValidationErrors};
pub use form::{FormMode, ScheduleForm, SubmissionState};
pub use slots::{
    generate_slots, PeriodSlot, SlotRequest, BREAK_MINUTES, DEFAULT_PERIOD_MINUTES,
    MAX_BATCH_PERIODS, MAX_PERIOD_NUMBER,
};
pub use teachers::TeacherAssignment;
pub use time::{duration_minutes, ClockTime, ParseTimeError};
pub use types::{
    Activity, ActivityType, ClassId, DayOfWeek, NonLessonKind, ParseActivityTypeError,
    ParseDayError, RoomId, ScheduleId, ScheduleRecord, SubjectId, TeacherId,
};
pub use validator::{ScheduleDraft, ScheduleValidator, ValidatedDraft};
