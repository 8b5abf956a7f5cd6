//! Co-teaching assignment for a lesson period.

use serde::{Deserialize, Serialize};

use super::types::TeacherId;

/// Ordered, duplicate-free list of teachers.
///
/// The primary teacher is always the first entry; there is no separate
/// primary field that could disagree with the list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<TeacherId>", into = "Vec<TeacherId>")]
pub struct TeacherAssignment {
    ids: Vec<TeacherId>,
}

impl TeacherAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `id` unless it is already assigned. Returns true if added.
    pub fn add(&mut self, id: TeacherId) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Removes `id`. If it was the primary, the next teacher becomes primary.
    /// Returns true if something was removed.
    pub fn remove(&mut self, id: TeacherId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| *existing != id);
        self.ids.len() != before
    }

    pub fn primary(&self) -> Option<TeacherId> {
        self.ids.first().copied()
    }

    pub fn contains(&self, id: TeacherId) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = TeacherId> + '_ {
        self.ids.iter().copied()
    }

    pub fn as_slice(&self) -> &[TeacherId] {
        &self.ids
    }
}

impl FromIterator<TeacherId> for TeacherAssignment {
    fn from_iter<I: IntoIterator<Item = TeacherId>>(iter: I) -> Self {
        let mut assignment = TeacherAssignment::new();
        for id in iter {
            assignment.add(id);
        }
        assignment
    }
}

impl From<Vec<TeacherId>> for TeacherAssignment {
    fn from(ids: Vec<TeacherId>) -> Self {
        ids.into_iter().collect()
    }
}

impl From<TeacherAssignment> for Vec<TeacherId> {
    fn from(assignment: TeacherAssignment) -> Self {
        assignment.ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_primary_promotes_next() {
        let mut teachers = TeacherAssignment::new();
        teachers.add(5);
        teachers.add(7);
        assert_eq!(teachers.primary(), Some(5));

        assert!(teachers.remove(5));
        assert_eq!(teachers.as_slice(), &[7]);
        assert_eq!(teachers.primary(), Some(7));
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut teachers = TeacherAssignment::new();
        assert!(teachers.add(5));
        assert!(!teachers.add(5));
        assert_eq!(teachers.as_slice(), &[5]);
    }

    #[test]
    fn test_remove_last_clears() {
        let mut teachers = TeacherAssignment::from(vec![3]);
        assert!(teachers.remove(3));
        assert!(teachers.is_empty());
        assert_eq!(teachers.primary(), None);
        assert!(!teachers.remove(3));
    }

    #[test]
    fn test_remove_non_primary_keeps_order() {
        let mut teachers = TeacherAssignment::from(vec![1, 2, 3]);
        teachers.remove(2);
        assert_eq!(teachers.as_slice(), &[1, 3]);
        assert_eq!(teachers.primary(), Some(1));
    }

    #[test]
    fn test_deserialize_drops_duplicates() {
        let teachers: TeacherAssignment = serde_json::from_str("[4, 9, 4, 2, 9]").unwrap();
        assert_eq!(teachers.as_slice(), &[4, 9, 2]);
        assert_eq!(serde_json::to_string(&teachers).unwrap(), "[4,9,2]");
    }
}
