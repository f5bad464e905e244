use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::code;
use super::connection::ClientHandle;
use super::models::{Room, StudentInfo, TeacherSeat};
use crate::shared::AppError;

/// Identity a room's teachers are addressed by in the signaling namespace.
pub fn teacher_identity(code: &str) -> String {
    format!("teacher_{}", code)
}

/// Outcome of registering a teacher connection.
#[derive(Debug, Clone)]
pub struct TeacherSession {
    pub code: String,
    pub teacher_id: Uuid,
    pub identity: String,
}

/// Outcome of attempting to add a student to a room.
#[derive(Debug)]
pub enum StudentJoinResult {
    /// Student registered; snapshots were taken under the lock so the caller
    /// can fan out without holding it.
    Joined {
        roster: Vec<StudentInfo>,
        peers: Vec<(String, ClientHandle)>,
        teachers: Vec<(Uuid, ClientHandle)>,
    },
    /// No room with that code has an active teacher.
    RoomNotFound,
    /// The identity already has a live connection.
    AlreadyConnected,
}

/// Outcome of removing a student from a room.
#[derive(Debug)]
pub enum StudentLeaveResult {
    Left {
        name: String,
        roster: Vec<StudentInfo>,
        peers: Vec<(String, ClientHandle)>,
        teachers: Vec<(Uuid, ClientHandle)>,
    },
    /// Already absent; disconnects are idempotent.
    NotFound,
}

/// Outcome of removing a teacher connection.
#[derive(Debug)]
pub enum TeacherLeaveResult {
    /// Other teachers remain; the room persists untouched.
    Remaining { code: String },
    /// The last teacher left. The room's maps are gone, but the code stays
    /// reserved until the caller finishes notifying these students and calls
    /// [`RoomRegistry::release_code`].
    RoomClosed {
        code: String,
        students: Vec<(String, ClientHandle)>,
    },
    NotFound,
}

/// Snapshot returned when a student's attention record was updated.
#[derive(Debug)]
pub struct AttentionRecorded {
    pub name: String,
    pub teachers: Vec<(Uuid, ClientHandle)>,
}

#[derive(Debug, Clone, Copy)]
pub struct RegistryStats {
    pub rooms: usize,
    pub students: usize,
}

struct RegistryInner {
    rooms: HashMap<String, Room>,
    /// Flat identity namespace used for point-to-point signaling. One entry
    /// per live connection, added and removed with room membership.
    identities: HashMap<String, ClientHandle>,
    teacher_rooms: HashMap<Uuid, String>,
    /// Codes not eligible for generation: every live room plus rooms still
    /// mid-teardown.
    reserved_codes: HashSet<String>,
}

/// Process-wide room table.
///
/// The single mutex covers the whole table and the identity index; every
/// check-then-act sequence (code generation, membership changes, teardown)
/// runs as one critical section. The lock is never held across an await:
/// operations return connection snapshots and all sends happen outside.
pub struct RoomRegistry {
    inner: Mutex<RegistryInner>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                rooms: HashMap::new(),
                identities: HashMap::new(),
                teacher_rooms: HashMap::new(),
                reserved_codes: HashSet::new(),
            }),
        }
    }

    /// Creates a brand-new room for a teacher connection.
    pub fn create_room(
        &self,
        teacher_name: &str,
        handle: ClientHandle,
    ) -> Result<TeacherSession, AppError> {
        let mut inner = self.inner.lock().unwrap();

        let code = code::generate(|candidate| {
            inner.rooms.contains_key(candidate) || inner.reserved_codes.contains(candidate)
        })?;

        let teacher_id = Uuid::new_v4();
        let identity = teacher_identity(&code);

        let mut room = Room::new(code.clone());
        room.teachers.insert(
            teacher_id,
            TeacherSeat {
                handle: handle.clone(),
                identity: identity.clone(),
                name: teacher_name.to_string(),
            },
        );

        inner.reserved_codes.insert(code.clone());
        inner.rooms.insert(code.clone(), room);
        inner.identities.insert(identity.clone(), handle);
        inner.teacher_rooms.insert(teacher_id, code.clone());

        info!(room_code = %code, teacher_name = %teacher_name, "Room created");

        Ok(TeacherSession {
            code,
            teacher_id,
            identity,
        })
    }

    /// Adds a co-teacher to an existing room.
    ///
    /// Not part of the connect path (teacher connects always create a fresh
    /// room); callers wanting rejoin semantics build them on this primitive.
    /// Returns None if the room has no active teacher.
    pub fn join_teacher(
        &self,
        code: &str,
        teacher_name: &str,
        handle: ClientHandle,
    ) -> Option<TeacherSession> {
        let mut inner = self.inner.lock().unwrap();

        let room = inner.rooms.get_mut(code)?;
        if !room.has_teachers() {
            return None;
        }

        let teacher_id = Uuid::new_v4();
        // The canonical identity belongs to the first seat; co-teachers get a
        // suffixed identity so each connection owns exactly one index entry.
        let identity = format!("{}#{}", teacher_identity(code), teacher_id);

        room.teachers.insert(
            teacher_id,
            TeacherSeat {
                handle: handle.clone(),
                identity: identity.clone(),
                name: teacher_name.to_string(),
            },
        );
        inner.identities.insert(identity.clone(), handle);
        inner.teacher_rooms.insert(teacher_id, code.to_string());

        info!(room_code = %code, teacher_name = %teacher_name, "Co-teacher joined room");

        Some(TeacherSession {
            code: code.to_string(),
            teacher_id,
            identity,
        })
    }

    /// Removes a teacher connection. Safe to call twice; the second call is a
    /// no-op.
    pub fn remove_teacher(&self, teacher_id: Uuid) -> TeacherLeaveResult {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        let Some(code) = inner.teacher_rooms.remove(&teacher_id) else {
            debug!(%teacher_id, "Teacher disconnect for unknown connection");
            return TeacherLeaveResult::NotFound;
        };

        let Some(room) = inner.rooms.get_mut(&code) else {
            return TeacherLeaveResult::NotFound;
        };

        if let Some(seat) = room.teachers.remove(&teacher_id) {
            inner.identities.remove(&seat.identity);
        }

        if room.has_teachers() {
            debug!(room_code = %code, remaining = room.teachers.len(), "Teacher left, room persists");
            return TeacherLeaveResult::Remaining { code };
        }

        // Last teacher gone: tear the room down. The code stays reserved
        // until the caller has notified every student.
        let students = room.student_targets(None);
        let student_ids: Vec<String> = room.students.keys().cloned().collect();
        for id in &student_ids {
            inner.identities.remove(id);
        }
        inner.rooms.remove(&code);

        info!(room_code = %code, students = students.len(), "Last teacher left, room closed");

        TeacherLeaveResult::RoomClosed { code, students }
    }

    /// Returns a code to the pool once teardown notifications are done.
    pub fn release_code(&self, code: &str) {
        let mut inner = self.inner.lock().unwrap();
        if inner.rooms.contains_key(code) {
            warn!(room_code = %code, "Refusing to release code of a live room");
            return;
        }
        if inner.reserved_codes.remove(code) {
            debug!(room_code = %code, "Room code released for reuse");
        }
    }

    /// Registers a student connection into a room.
    pub fn add_student(
        &self,
        code: &str,
        student_id: &str,
        student_name: &str,
        handle: ClientHandle,
    ) -> StudentJoinResult {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        if inner.identities.contains_key(student_id) {
            warn!(room_code = %code, student_id = %student_id, "Identity already connected");
            return StudentJoinResult::AlreadyConnected;
        }

        let Some(room) = inner.rooms.get_mut(code) else {
            return StudentJoinResult::RoomNotFound;
        };
        if !room.has_teachers() {
            return StudentJoinResult::RoomNotFound;
        }

        room.students.insert(student_id.to_string(), handle.clone());
        room.info.insert(
            student_id.to_string(),
            StudentInfo::new(student_id.to_string(), student_name.to_string()),
        );

        let roster = room.roster();
        let peers = room.student_targets(Some(student_id));
        let teachers = room.teacher_targets();

        inner.identities.insert(student_id.to_string(), handle);

        info!(
            room_code = %code,
            student_id = %student_id,
            student_name = %student_name,
            students = roster.len(),
            "Student joined room"
        );

        StudentJoinResult::Joined {
            roster,
            peers,
            teachers,
        }
    }

    /// Removes a student connection. Idempotent: a second call for the same
    /// identity is a no-op, because transport close can race manager cleanup.
    pub fn remove_student(&self, code: &str, student_id: &str) -> StudentLeaveResult {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        let Some(room) = inner.rooms.get_mut(code) else {
            return StudentLeaveResult::NotFound;
        };

        let Some(info) = room.info.remove(student_id) else {
            return StudentLeaveResult::NotFound;
        };
        room.students.remove(student_id);

        let roster = room.roster();
        let peers = room.student_targets(None);
        let teachers = room.teacher_targets();

        inner.identities.remove(student_id);

        info!(
            room_code = %code,
            student_id = %student_id,
            student_name = %info.name,
            students = roster.len(),
            "Student left room"
        );

        StudentLeaveResult::Left {
            name: info.name,
            roster,
            peers,
            teachers,
        }
    }

    /// Updates a student's attention record. Returns None when the student is
    /// no longer present; a late report must not resurrect removed state.
    pub fn record_attention(
        &self,
        code: &str,
        student_id: &str,
        status: &str,
    ) -> Option<AttentionRecorded> {
        let mut inner = self.inner.lock().unwrap();

        let room = inner.rooms.get_mut(code)?;
        let info = room.info.get_mut(student_id)?;

        info.status = status.to_string();
        info.last_update = chrono::Utc::now();

        Some(AttentionRecorded {
            name: info.name.clone(),
            teachers: room.teacher_targets(),
        })
    }

    /// Bumps the alert counter for a student and returns the teacher targets
    /// for the alert broadcast. None when the student already left.
    pub fn note_alert(&self, code: &str, student_id: &str) -> Option<AttentionRecorded> {
        let mut inner = self.inner.lock().unwrap();

        let room = inner.rooms.get_mut(code)?;
        let info = room.info.get_mut(student_id)?;
        info.alerts_count += 1;

        Some(AttentionRecorded {
            name: info.name.clone(),
            teachers: room.teacher_targets(),
        })
    }

    /// True iff the code names a room with at least one active teacher. The
    /// single source of truth for student admission.
    pub fn room_exists(&self, code: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.rooms.get(code).is_some_and(Room::has_teachers)
    }

    pub fn roster(&self, code: &str) -> Option<Vec<StudentInfo>> {
        let inner = self.inner.lock().unwrap();
        inner.rooms.get(code).map(Room::roster)
    }

    pub fn teachers_of(&self, code: &str) -> Vec<(Uuid, ClientHandle)> {
        let inner = self.inner.lock().unwrap();
        inner
            .rooms
            .get(code)
            .map(Room::teacher_targets)
            .unwrap_or_default()
    }

    pub fn students_of(&self, code: &str, exclude: Option<&str>) -> Vec<(String, ClientHandle)> {
        let inner = self.inner.lock().unwrap();
        inner
            .rooms
            .get(code)
            .map(|room| room.student_targets(exclude))
            .unwrap_or_default()
    }

    /// Resolves a signaling identity to its live connection.
    pub fn lookup_identity(&self, identity: &str) -> Option<ClientHandle> {
        let inner = self.inner.lock().unwrap();
        inner.identities.get(identity).cloned()
    }

    /// Every connection in a room except the sender, for untargeted
    /// signaling broadcasts.
    pub fn signal_targets(&self, code: &str, exclude: &str) -> Vec<(String, ClientHandle)> {
        let inner = self.inner.lock().unwrap();
        let Some(room) = inner.rooms.get(code) else {
            return Vec::new();
        };

        let mut targets: Vec<(String, ClientHandle)> = room
            .teachers
            .values()
            .filter(|seat| seat.identity != exclude)
            .map(|seat| (seat.identity.clone(), seat.handle.clone()))
            .collect();
        targets.extend(
            room.students
                .iter()
                .filter(|(id, _)| id.as_str() != exclude)
                .map(|(id, handle)| (id.clone(), handle.clone())),
        );
        targets
    }

    pub fn stats(&self) -> RegistryStats {
        let inner = self.inner.lock().unwrap();
        RegistryStats {
            rooms: inner.rooms.len(),
            students: inner.rooms.values().map(|r| r.students.len()).sum(),
        }
    }

    #[cfg(test)]
    fn identity_count(&self) -> usize {
        self.inner.lock().unwrap().identities.len()
    }
}
