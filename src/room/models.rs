use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::connection::ClientHandle;
use crate::attention::AttentionStatus;

/// Metadata tracked for every student in a room.
///
/// Serialized as-is into the rosters sent to teachers, so field names are
/// part of the wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentInfo {
    pub id: String,
    pub name: String,
    pub status: String,
    pub last_update: DateTime<Utc>,
    pub alerts_count: u32,
}

impl StudentInfo {
    /// Fresh record for a newly joined student: attentive, no alerts.
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            status: AttentionStatus::Attentive.to_string(),
            last_update: Utc::now(),
            alerts_count: 0,
        }
    }
}

/// One teacher connection within a room.
#[derive(Debug, Clone)]
pub struct TeacherSeat {
    pub handle: ClientHandle,
    /// Signaling identity in the flat identity namespace.
    pub identity: String,
    pub name: String,
}

/// A live classroom session, keyed by its code for the room's whole lifetime.
///
/// `students` and `info` always hold the same key set; membership is only
/// mutated through the registry, which maintains that invariant.
#[derive(Debug)]
pub struct Room {
    pub code: String,
    pub teachers: HashMap<Uuid, TeacherSeat>,
    pub students: HashMap<String, ClientHandle>,
    pub info: HashMap<String, StudentInfo>,
}

impl Room {
    pub fn new(code: String) -> Self {
        Self {
            code,
            teachers: HashMap::new(),
            students: HashMap::new(),
            info: HashMap::new(),
        }
    }

    /// A room only exists from the caller's perspective while it has at
    /// least one active teacher.
    pub fn has_teachers(&self) -> bool {
        !self.teachers.is_empty()
    }

    /// Full student list, the reconcilable view sent to teachers.
    pub fn roster(&self) -> Vec<StudentInfo> {
        let mut roster: Vec<StudentInfo> = self.info.values().cloned().collect();
        roster.sort_by(|a, b| a.id.cmp(&b.id));
        roster
    }

    /// Snapshot of teacher connections for fan-out outside the lock.
    pub fn teacher_targets(&self) -> Vec<(Uuid, ClientHandle)> {
        self.teachers
            .iter()
            .map(|(id, seat)| (*id, seat.handle.clone()))
            .collect()
    }

    /// Snapshot of student connections, optionally excluding one identity.
    pub fn student_targets(&self, exclude: Option<&str>) -> Vec<(String, ClientHandle)> {
        self.students
            .iter()
            .filter(|(id, _)| exclude != Some(id.as_str()))
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_student_info_defaults() {
        let info = StudentInfo::new("s-1".to_string(), "Alice".to_string());

        assert_eq!(info.id, "s-1");
        assert_eq!(info.name, "Alice");
        assert_eq!(info.status, "attentive");
        assert_eq!(info.alerts_count, 0);
    }

    #[test]
    fn test_roster_is_sorted_by_id() {
        let mut room = Room::new("ABCDEF".to_string());
        for id in ["s-3", "s-1", "s-2"] {
            room.info.insert(
                id.to_string(),
                StudentInfo::new(id.to_string(), format!("name-{}", id)),
            );
        }

        let ids: Vec<String> = room.roster().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["s-1", "s-2", "s-3"]);
    }

    #[test]
    fn test_student_targets_exclude() {
        let mut room = Room::new("ABCDEF".to_string());
        let (alice, _rx_a) = ClientHandle::channel();
        let (bob, _rx_b) = ClientHandle::channel();
        room.students.insert("alice".to_string(), alice);
        room.students.insert("bob".to_string(), bob);

        let targets = room.student_targets(Some("alice"));
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].0, "bob");
    }
}
