//! Submission state machine for the timetable edit form.
//!
//! ```text
//! Draft -> Validating -> Rejected
//!                     -> Expanding -> Persisting -> Committed
//!                                                -> PartiallyCommitted
//! ```
//!
//! Create mode expands the draft into consecutive periods and persists them
//! one at a time, in slot order, waiting for each response before sending
//! the next. A failure part-way leaves the already-created prefix in place:
//! there is no batch endpoint to make the batch atomic, and compensating
//! deletes could fail as well.

use tracing::{debug, error, info, warn};

use super::builder::{build_batch, build_edit};
use super::error::SubmitError;
use super::types::{ScheduleId, ScheduleRecord};
use super::validator::{ScheduleDraft, ScheduleValidator};
use crate::reference::ReferenceData;
use crate::repository::ScheduleRepository;

/// Whether the form creates new periods or edits an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit { id: ScheduleId },
}

/// Where the current submission attempt is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    /// Editable, nothing submitted yet
    Draft,
    Validating,
    /// Validation or the repository refused; the draft is kept as it was
    Rejected { messages: Vec<String> },
    Expanding,
    Persisting { completed: usize, total: usize },
    /// Everything was persisted and the form was reset
    Committed { ids: Vec<ScheduleId> },
    /// A batch stopped after its first period; `created_ids` exist in the repository
    PartiallyCommitted {
        created_ids: Vec<ScheduleId>,
        total: usize,
        failed_position: usize,
    },
}

impl SubmissionState {
    /// True while a submission is running; the form takes no input then.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SubmissionState::Validating
                | SubmissionState::Expanding
                | SubmissionState::Persisting { .. }
        )
    }

    fn name(&self) -> &'static str {
        match self {
            SubmissionState::Draft => "draft",
            SubmissionState::Validating => "validating",
            SubmissionState::Rejected { .. } => "rejected",
            SubmissionState::Expanding => "expanding",
            SubmissionState::Persisting { .. } => "persisting",
            SubmissionState::Committed { .. } => "committed",
            SubmissionState::PartiallyCommitted { .. } => "partially_committed",
        }
    }
}

/// A timetable edit form: draft state plus its submission lifecycle.
#[derive(Debug, Clone)]
pub struct ScheduleForm {
    mode: FormMode,
    draft: ScheduleDraft,
    count: i64,
    state: SubmissionState,
}

impl Default for ScheduleForm {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleForm {
    /// An empty create-mode form for a single period.
    pub fn new() -> Self {
        Self {
            mode: FormMode::Create,
            draft: ScheduleDraft::default(),
            count: 1,
            state: SubmissionState::Draft,
        }
    }

    /// A create-mode form for `count` consecutive periods.
    pub fn create(draft: ScheduleDraft, count: i64) -> Self {
        Self {
            draft,
            count,
            ..Self::new()
        }
    }

    /// An edit-mode form for the stored record `id`. Edits always cover one period.
    pub fn edit(id: ScheduleId, draft: ScheduleDraft) -> Self {
        Self {
            mode: FormMode::Edit { id },
            draft,
            count: 1,
            state: SubmissionState::Draft,
        }
    }

    /// Opens a persisted record for editing, or `None` if it has no id yet.
    pub fn edit_record(record: &ScheduleRecord) -> Option<Self> {
        record
            .id
            .map(|id| Self::edit(id, ScheduleDraft::from_record(record)))
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn draft(&self) -> &ScheduleDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut ScheduleDraft {
        &mut self.draft
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    /// Sets the number of consecutive periods. Ignored in edit mode.
    pub fn set_count(&mut self, count: i64) {
        if self.mode == FormMode::Create {
            self.count = count;
        }
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    fn transition(&mut self, next: SubmissionState) {
        debug!(from = self.state.name(), to = next.name(), "Form state transition");
        self.state = next;
    }

    /// Validates, expands and persists the draft.
    ///
    /// Returns the ids of the persisted records in slot order. On success the
    /// form is reset to an empty create-mode draft; on failure the draft is
    /// left untouched so the operator can correct and resubmit.
    pub async fn submit<R>(
        &mut self,
        repository: &R,
        reference: Option<&ReferenceData>,
    ) -> Result<Vec<ScheduleId>, SubmitError>
    where
        R: ScheduleRepository + ?Sized,
    {
        self.transition(SubmissionState::Validating);

        let validator = match reference {
            Some(reference) => ScheduleValidator::with_reference(reference),
            None => ScheduleValidator::new(),
        };
        let validated = match validator.check(&self.draft, self.count) {
            Ok(validated) => validated,
            Err(errors) => {
                info!(
                    violations = errors.len(),
                    "Schedule submission rejected by validation"
                );
                self.transition(SubmissionState::Rejected {
                    messages: errors.messages().to_vec(),
                });
                return Err(SubmitError::Validation(errors));
            }
        };

        let ids = match self.mode {
            FormMode::Create => {
                self.transition(SubmissionState::Expanding);
                let records = match build_batch(&validated) {
                    Ok(records) => records,
                    Err(e) => return Err(self.precondition_failed(e)),
                };
                self.persist_batch(repository, records).await?
            }
            FormMode::Edit { id } => {
                let record = match build_edit(&validated) {
                    Ok(record) => record,
                    Err(e) => return Err(self.precondition_failed(e)),
                };
                self.persist_edit(repository, id, record).await?
            }
        };

        info!(
            count = ids.len(),
            mode = ?self.mode,
            "Schedule submission committed"
        );
        self.transition(SubmissionState::Committed { ids: ids.clone() });
        self.mode = FormMode::Create;
        self.draft = ScheduleDraft::default();
        self.count = 1;

        Ok(ids)
    }

    fn precondition_failed(&mut self, err: super::error::SlotError) -> SubmitError {
        error!(error = %err, "Slot generation failed after validation passed");
        self.transition(SubmissionState::Draft);
        SubmitError::Precondition(err)
    }

    async fn persist_batch<R>(
        &mut self,
        repository: &R,
        records: Vec<ScheduleRecord>,
    ) -> Result<Vec<ScheduleId>, SubmitError>
    where
        R: ScheduleRepository + ?Sized,
    {
        let total = records.len();
        let mut created_ids = Vec::with_capacity(total);
        self.transition(SubmissionState::Persisting {
            completed: 0,
            total,
        });

        for (index, record) in records.iter().enumerate() {
            match repository.create(record).await {
                Ok(id) => {
                    debug!(id = %id, period = record.period_number, "Persisted period");
                    created_ids.push(id);
                    self.state = SubmissionState::Persisting {
                        completed: created_ids.len(),
                        total,
                    };
                }
                Err(source) if total == 1 => {
                    warn!(error = %source, "Schedule create failed");
                    self.transition(SubmissionState::Rejected {
                        messages: vec![source.to_string()],
                    });
                    return Err(SubmitError::Repository(source));
                }
                Err(source) if index == 0 => {
                    error!(
                        total = total,
                        period = record.period_number,
                        error = %source,
                        "Batch failed on its first period; nothing was created"
                    );
                    self.transition(SubmissionState::Rejected {
                        messages: vec![source.to_string()],
                    });
                    return Err(SubmitError::BatchRejected {
                        total,
                        failed_period: record.period_number,
                        source,
                    });
                }
                Err(source) => {
                    let failed_position = index + 1;
                    error!(
                        created = created_ids.len(),
                        total = total,
                        failed_position = failed_position,
                        period = record.period_number,
                        error = %source,
                        "Batch stopped part-way; created periods are kept"
                    );
                    self.transition(SubmissionState::PartiallyCommitted {
                        created_ids: created_ids.clone(),
                        total,
                        failed_position,
                    });
                    return Err(SubmitError::PartiallyCommitted {
                        created: created_ids.len(),
                        total,
                        failed_position,
                        failed_period: record.period_number,
                        created_ids,
                        source,
                    });
                }
            }
        }

        Ok(created_ids)
    }

    async fn persist_edit<R>(
        &mut self,
        repository: &R,
        id: ScheduleId,
        record: ScheduleRecord,
    ) -> Result<Vec<ScheduleId>, SubmitError>
    where
        R: ScheduleRepository + ?Sized,
    {
        self.transition(SubmissionState::Persisting {
            completed: 0,
            total: 1,
        });

        if let Err(source) = repository.update(id, &record).await {
            warn!(id = %id, error = %source, "Schedule update failed");
            self.transition(SubmissionState::Rejected {
                messages: vec![source.to_string()],
            });
            return Err(SubmitError::Repository(source));
        }

        Ok(vec![id])
    }
}
