/// Read-only reference data used to fill selection inputs on the edit form
use serde::{Deserialize, Serialize};

use crate::schedule::ScheduleDraft;

/// One selectable entry (a class, subject, teacher or room).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceItem {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

impl ReferenceItem {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Snapshot of the external registries for one form session.
///
/// Loaded when a session starts and dropped with it; never cached beyond that.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceData {
    #[serde(default)]
    pub classes: Vec<ReferenceItem>,
    #[serde(default)]
    pub subjects: Vec<ReferenceItem>,
    #[serde(default)]
    pub teachers: Vec<ReferenceItem>,
    #[serde(default)]
    pub rooms: Vec<ReferenceItem>,
}

fn contains(items: &[ReferenceItem], id: i64) -> bool {
    items.iter().any(|item| item.id == id)
}

impl ReferenceData {
    pub fn has_class(&self, id: i64) -> bool {
        contains(&self.classes, id)
    }

    pub fn has_subject(&self, id: i64) -> bool {
        contains(&self.subjects, id)
    }

    pub fn has_teacher(&self, id: i64) -> bool {
        contains(&self.teachers, id)
    }

    pub fn has_room(&self, id: i64) -> bool {
        contains(&self.rooms, id)
    }

    /// Messages for every id in `draft` that the registries do not know.
    ///
    /// Subjects and teachers are only checked for lessons, since they are
    /// cleared for every other activity type.
    pub fn missing_references(&self, draft: &ScheduleDraft) -> Vec<String> {
        let mut missing = Vec::new();

        if let Some(class_id) = draft.class_id {
            if !self.has_class(class_id) {
                missing.push(format!("Class {} does not exist", class_id));
            }
        }

        if draft.activity_type.is_lesson() {
            if let Some(subject_id) = draft.subject_id {
                if !self.has_subject(subject_id) {
                    missing.push(format!("Subject {} does not exist", subject_id));
                }
            }
            for teacher_id in draft.teachers.iter() {
                if !self.has_teacher(teacher_id) {
                    missing.push(format!("Teacher {} does not exist", teacher_id));
                }
            }
        }

        if let Some(room_id) = draft.room_id {
            if !self.has_room(room_id) {
                missing.push(format!("Room {} does not exist", room_id));
            }
        }

        missing
    }
}
