//! Expansion of one scheduling intent into consecutive period slots.

use serde::{Deserialize, Serialize};

use super::error::SlotError;
use super::time::{duration_minutes, ClockTime};

/// Length of a period when no explicit end time applies.
pub const DEFAULT_PERIOD_MINUTES: i64 = 40;
/// Gap between consecutive periods of one batch.
pub const BREAK_MINUTES: i64 = 5;
/// Highest period number in a school day.
pub const MAX_PERIOD_NUMBER: u8 = 12;
/// Most periods one form submission may create.
pub const MAX_BATCH_PERIODS: u8 = 6;

/// A single generated period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSlot {
    pub period_number: u8,
    pub start: ClockTime,
    pub end: ClockTime,
}

/// Inputs to the slot generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRequest {
    pub start: ClockTime,
    /// Only honoured when `count == 1`
    pub end: Option<ClockTime>,
    pub start_period: u8,
    pub count: u8,
}

impl SlotRequest {
    /// Duration of each generated period.
    ///
    /// A single period with an explicit end keeps the operator's custom length;
    /// everything else uses the default.
    pub fn period_minutes(&self) -> i64 {
        match (self.count, self.end) {
            (1, Some(end)) => duration_minutes(self.start, end),
            _ => DEFAULT_PERIOD_MINUTES,
        }
    }

    /// Period number of the last generated slot.
    pub fn last_period(&self) -> u32 {
        u32::from(self.start_period) + u32::from(self.count).saturating_sub(1)
    }
}

/// Generates `request.count` slots starting at `request.start`.
///
/// Slots are numbered consecutively from `start_period` and separated by
/// [`BREAK_MINUTES`]. The returned order is also the order records are
/// persisted in. Inputs the validator would reject are returned as
/// [`SlotError`]s rather than corrected.
pub fn generate_slots(request: &SlotRequest) -> Result<Vec<PeriodSlot>, SlotError> {
    if !(1..=MAX_BATCH_PERIODS).contains(&request.count) {
        return Err(SlotError::CountOutOfRange {
            count: request.count,
            max: MAX_BATCH_PERIODS,
        });
    }

    if request.start_period == 0 {
        return Err(SlotError::PeriodOutOfRange {
            period: 0,
            max: MAX_PERIOD_NUMBER,
        });
    }
    let last_period = request.last_period();
    if last_period > u32::from(MAX_PERIOD_NUMBER) {
        return Err(SlotError::PeriodOutOfRange {
            period: last_period,
            max: MAX_PERIOD_NUMBER,
        });
    }

    let duration = request.period_minutes();
    if duration <= 0 {
        return Err(SlotError::NonPositiveDuration { minutes: duration });
    }

    let mut slots: Vec<PeriodSlot> = Vec::with_capacity(usize::from(request.count));
    for offset in 0..request.count {
        let period_start = match slots.last() {
            Some(previous) => previous.end.add_minutes(BREAK_MINUTES)?,
            None => request.start,
        };
        let period_end = period_start.add_minutes(duration)?;

        slots.push(PeriodSlot {
            period_number: request.start_period + offset,
            start: period_start,
            end: period_end,
        });
    }

    Ok(slots)
}
