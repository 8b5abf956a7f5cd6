//! Persistence boundary for schedule records.
//!
//! The engine only ever talks to storage through [`ScheduleRepository`].
//! Two implementations ship with the crate: an HTTP client for the school's
//! schedule service and an embedded SQLite store.

mod client;
mod error;
mod sqlite;
mod types;

pub use client::{RepositoryClientConfig, ScheduleRepositoryClient};
pub use error::RepositoryError;
pub use sqlite::SqliteScheduleRepository;
pub use types::RecordPayload;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::reference::ReferenceData;
use crate::schedule::{ClassId, DayOfWeek, ScheduleId, ScheduleRecord, TeacherId};

/// Storage for schedule records.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Persists a new record and returns its assigned id.
    async fn create(&self, record: &ScheduleRecord) -> Result<ScheduleId, RepositoryError>;

    /// Replaces the stored record `id`.
    async fn update(&self, id: ScheduleId, record: &ScheduleRecord) -> Result<(), RepositoryError>;

    async fn delete(&self, id: ScheduleId) -> Result<(), RepositoryError>;

    /// Records matching `filter`, ordered by day then period number.
    async fn list(&self, filter: &ScheduleFilter) -> Result<Vec<ScheduleRecord>, RepositoryError>;
}

/// Source of the class, subject, teacher and room registries.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    async fn load_reference_data(&self) -> Result<ReferenceData, RepositoryError>;
}

/// Listing filters. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<ClassId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<DayOfWeek>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<TeacherId>,
}

impl ScheduleFilter {
    pub fn for_class(class_id: ClassId) -> Self {
        Self {
            class_id: Some(class_id),
            ..Self::default()
        }
    }

    pub fn on_day(mut self, day: DayOfWeek) -> Self {
        self.day_of_week = Some(day);
        self
    }

    pub fn matches(&self, record: &ScheduleRecord) -> bool {
        self.class_id.map_or(true, |id| record.class_id == id)
            && self.day_of_week.map_or(true, |day| record.day_of_week == day)
            && self.teacher_id.map_or(true, |id| {
                record.teachers().is_some_and(|teachers| teachers.contains(id))
            })
    }
}

/// Sorts records the way listings present them: Monday first, then by period.
pub fn sort_for_listing(records: &mut [ScheduleRecord]) {
    records.sort_by_key(|r| (r.day_of_week, r.period_number, r.class_id));
}
