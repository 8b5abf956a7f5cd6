//! Error types for slot generation and form submission.

use thiserror::Error;

use super::time::ClockTime;
use super::types::ScheduleId;
use crate::repository::RepositoryError;

/// Misuse of the slot generator or clock arithmetic.
///
/// The validator rejects every input that could produce one of these, so
/// seeing one at runtime means a caller skipped validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlotError {
    /// End time is not after the start time
    #[error("period duration must be positive, got {minutes} minutes")]
    NonPositiveDuration { minutes: i64 },

    /// A single edited period needs an explicit end time
    #[error("an end time is required for a single period")]
    MissingEndTime,

    #[error("period count {count} is outside 1..={max}")]
    CountOutOfRange { count: u8, max: u8 },

    #[error("period number {period} is outside 1..={max}")]
    PeriodOutOfRange { period: u32, max: u8 },

    /// Clock arithmetic wrapped past 24:00
    #[error("adding {minutes} minutes to {start} crosses midnight")]
    CrossesMidnight { start: ClockTime, minutes: i64 },
}

/// Every field-level problem found in a draft, in the order the rules ran.
#[derive(Debug, Error, Clone, Default, PartialEq, Eq)]
#[error("{}", .messages.join("; "))]
pub struct ValidationErrors {
    messages: Vec<String>,
}

impl ValidationErrors {
    /// Records a message unless an identical one is already present.
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.messages.contains(&message) {
            self.messages.push(message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }

    /// Returns true if any message contains `needle` (case-insensitive).
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.messages
            .iter()
            .any(|m| m.to_lowercase().contains(&needle))
    }
}

/// Failure of one submission attempt.
#[derive(Debug, Error, Clone)]
pub enum SubmitError {
    /// The draft failed validation; nothing reached the repository
    #[error("{0}")]
    Validation(ValidationErrors),

    /// Internal misuse of the slot generator
    #[error("slot generation failed: {0}")]
    Precondition(#[from] SlotError),

    /// A single repository call failed; the message is the server's own
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Part of a multi-period batch was persisted before a later period failed.
    /// The created prefix is not rolled back.
    #[error("{created} of {total} periods created; period {failed_period} (slot {failed_position} of {total}) failed: {source}")]
    PartiallyCommitted {
        created: usize,
        total: usize,
        /// 1-based position of the failing slot within the batch
        failed_position: usize,
        failed_period: u8,
        created_ids: Vec<ScheduleId>,
        source: RepositoryError,
    },

    /// The first period of a multi-period batch failed, so nothing was created
    #[error("0 of {total} periods created; period {failed_period} (slot 1 of {total}) failed: {source}")]
    BatchRejected {
        total: usize,
        failed_period: u8,
        source: RepositoryError,
    },

    /// Another submission for the same form is still running
    #[error("a submission is already in progress for this form")]
    InProgress,
}

impl SubmitError {
    /// Field-level messages, if this is a validation failure.
    pub fn violations(&self) -> Option<&[String]> {
        match self {
            SubmitError::Validation(errors) => Some(errors.messages()),
            _ => None,
        }
    }

    /// Returns true if some records were persisted before the failure.
    pub fn has_persisted_records(&self) -> bool {
        matches!(self, SubmitError::PartiallyCommitted { .. })
    }
}
