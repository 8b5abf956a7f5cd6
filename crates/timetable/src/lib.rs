//! Weekly class timetable engine.
//!
//! Turns the state of a timetable edit form into persist-ready period
//! records: the form is validated, expanded into consecutive periods with
//! computed times, and submitted to a schedule repository one record at a
//! time.

pub mod config;
pub mod reference;
pub mod repository;
pub mod schedule;
pub mod server;
pub mod types;

pub use config::TimetableConfig;
pub use reference::ReferenceData;
pub use repository::{RepositoryError, ScheduleFilter, ScheduleRepository};
pub use schedule::{
    ActivityType, ClockTime, DayOfWeek, ScheduleDraft, ScheduleForm, ScheduleRecord,
    SubmissionState, SubmitError, TeacherAssignment,
};
pub use types::TimetableState;
