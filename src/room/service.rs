use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::connection::{
    ClientHandle, CLOSE_DUPLICATE_IDENTITY, CLOSE_ROOM_CLOSED, CLOSE_ROOM_NOT_FOUND,
};
use super::models::StudentInfo;
use super::registry::{
    teacher_identity, RegistryStats, RoomRegistry, StudentJoinResult, StudentLeaveResult,
    TeacherLeaveResult, TeacherSession,
};
use crate::attention::AlertTransition;
use crate::shared::AppError;
use crate::websockets::messages::{Participant, WebSocketMessage};

/// A peer whose connection turned out to be dead during a fan-out and must be
/// run through its disconnect path.
#[derive(Debug)]
enum Eviction {
    Student { code: String, id: String },
    Teacher { id: Uuid },
}

/// Connection manager for classroom sessions.
///
/// Owns the room registry and exposes the connect/disconnect/broadcast
/// operations. Broadcasts are best-effort: each recipient failure is caught
/// individually and the dead peer is evicted through the matching disconnect
/// path after the fan-out completes.
pub struct ClassroomService {
    registry: Arc<RoomRegistry>,
}

impl ClassroomService {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Registers a teacher connection, always creating a brand-new room, and
    /// greets it with `room_created`.
    #[instrument(skip(self, handle))]
    pub async fn connect_teacher(
        &self,
        teacher_name: &str,
        handle: ClientHandle,
    ) -> Result<TeacherSession, AppError> {
        let session = self.registry.create_room(teacher_name, handle.clone())?;

        let greeting = WebSocketMessage::room_created(session.code.clone(), Vec::new());
        if handle.send(&greeting).is_err() {
            // Socket died between upgrade and registration.
            self.drain(vec![Eviction::Teacher {
                id: session.teacher_id,
            }]);
        }

        Ok(session)
    }

    /// Adds a co-teacher to an existing room. Optional extension on top of
    /// the connect primitive; returns None when the room is gone.
    #[instrument(skip(self, handle))]
    pub async fn join_teacher(
        &self,
        code: &str,
        teacher_name: &str,
        handle: ClientHandle,
    ) -> Option<TeacherSession> {
        let session = self.registry.join_teacher(code, teacher_name, handle.clone())?;

        let roster = self.registry.roster(code).unwrap_or_default();
        let greeting = WebSocketMessage::room_created(session.code.clone(), roster);
        if handle.send(&greeting).is_err() {
            self.drain(vec![Eviction::Teacher {
                id: session.teacher_id,
            }]);
        }

        Some(session)
    }

    /// Registers a student connection into a room.
    ///
    /// On failure the connection receives an `error` event and is closed with
    /// a distinguishing code; no membership changes. On success the join is
    /// announced to the other students (delta) and to the teachers (full
    /// roster).
    #[instrument(skip(self, handle))]
    pub async fn connect_student(
        &self,
        code: &str,
        student_id: &str,
        student_name: &str,
        handle: ClientHandle,
    ) -> bool {
        match self
            .registry
            .add_student(code, student_id, student_name, handle.clone())
        {
            StudentJoinResult::RoomNotFound => {
                warn!(room_code = %code, student_name = %student_name, "Join rejected, room not found");
                let _ = handle.send(&WebSocketMessage::error(format!(
                    "Room {} does not exist or has no active teacher",
                    code
                )));
                handle.close(CLOSE_ROOM_NOT_FOUND, "Room not found");
                false
            }
            StudentJoinResult::AlreadyConnected => {
                warn!(room_code = %code, student_id = %student_id, "Join rejected, identity in use");
                let _ = handle.send(&WebSocketMessage::error(format!(
                    "Identity {} is already connected",
                    student_id
                )));
                handle.close(CLOSE_DUPLICATE_IDENTITY, "Identity already connected");
                false
            }
            StudentJoinResult::Joined {
                roster,
                peers,
                teachers,
            } => {
                let mut evictions = self.fan_out_students(
                    code,
                    peers,
                    &WebSocketMessage::student_join(
                        student_id.to_string(),
                        student_name.to_string(),
                    ),
                );
                evictions.extend(self.fan_out_teachers(
                    code,
                    teachers,
                    &WebSocketMessage::student_join_with_roster(
                        student_id.to_string(),
                        student_name.to_string(),
                        roster,
                    ),
                ));
                self.drain(evictions);
                true
            }
        }
    }

    /// Removes a student and announces the departure. Idempotent.
    #[instrument(skip(self))]
    pub async fn disconnect_student(&self, code: &str, student_id: &str) {
        self.drain(vec![Eviction::Student {
            code: code.to_string(),
            id: student_id.to_string(),
        }]);
    }

    /// Removes a teacher connection. When the last teacher leaves, the room
    /// is torn down: students get `room_closed` and are force-closed, then
    /// the code is released for reuse. Idempotent.
    #[instrument(skip(self))]
    pub async fn disconnect_teacher(&self, teacher_id: Uuid) {
        self.drain(vec![Eviction::Teacher { id: teacher_id }]);
    }

    /// Updates a student's attention record and notifies teachers. A report
    /// for a student who already left is a no-op.
    #[instrument(skip(self))]
    pub async fn update_attention(
        &self,
        code: &str,
        student_id: &str,
        status: &str,
        confidence: f64,
    ) {
        let Some(recorded) = self.registry.record_attention(code, student_id, status) else {
            debug!(room_code = %code, student_id = %student_id, "Stale attention report dropped");
            return;
        };

        let message = WebSocketMessage::attention_update(
            student_id.to_string(),
            recorded.name,
            status.to_string(),
            confidence,
        );
        let evictions = self.fan_out_teachers(code, recorded.teachers, &message);
        self.drain(evictions);
    }

    /// Forwards an alert-state transition to the room's teachers.
    #[instrument(skip(self, transition))]
    pub async fn notify_alert(&self, code: &str, student_id: &str, transition: AlertTransition) {
        match transition {
            AlertTransition::Raised {
                alert_type,
                message,
                severity,
            } => {
                let Some(recorded) = self.registry.note_alert(code, student_id) else {
                    debug!(room_code = %code, student_id = %student_id, "Stale alert dropped");
                    return;
                };
                info!(
                    room_code = %code,
                    student_id = %student_id,
                    alert_type = %alert_type,
                    severity = %severity,
                    "Alert raised"
                );
                let message = WebSocketMessage::alert(
                    student_id.to_string(),
                    recorded.name,
                    alert_type,
                    message,
                    severity,
                );
                let evictions = self.fan_out_teachers(code, recorded.teachers, &message);
                self.drain(evictions);
            }
            AlertTransition::Cleared => {
                info!(room_code = %code, student_id = %student_id, "Alert cleared");
                let message = WebSocketMessage::clear_alert(student_id.to_string());
                let targets = self.registry.teachers_of(code);
                let evictions = self.fan_out_teachers(code, targets, &message);
                self.drain(evictions);
            }
        }
    }

    /// Fans a chat message out to everyone in the room, teachers and
    /// students alike.
    #[instrument(skip(self, text))]
    pub async fn broadcast_chat(
        &self,
        code: &str,
        user_id: &str,
        user_name: &str,
        user_type: &str,
        text: &str,
    ) {
        let message = WebSocketMessage::chat_message(
            user_id.to_string(),
            user_name.to_string(),
            user_type.to_string(),
            text.to_string(),
        );

        let mut evictions =
            self.fan_out_teachers(code, self.registry.teachers_of(code), &message);
        evictions.extend(self.fan_out_students(
            code,
            self.registry.students_of(code, None),
            &message,
        ));
        self.drain(evictions);
    }

    /// Relays a student camera frame to the room's teachers.
    pub async fn broadcast_camera_frame(&self, code: &str, student_id: &str, frame: String) {
        let message = WebSocketMessage::camera_frame(student_id.to_string(), frame);
        let evictions = self.fan_out_teachers(code, self.registry.teachers_of(code), &message);
        self.drain(evictions);
    }

    /// Relays the teacher's camera frame to every student in the room.
    pub async fn broadcast_teacher_frame(&self, code: &str, frame: String) {
        let message = WebSocketMessage::teacher_frame(frame);
        let evictions =
            self.fan_out_students(code, self.registry.students_of(code, None), &message);
        self.drain(evictions);
    }

    /// True iff the code names a room with at least one active teacher.
    pub async fn room_exists(&self, code: &str) -> bool {
        self.registry.room_exists(code)
    }

    /// Current student roster for a room.
    pub async fn roster(&self, code: &str) -> Option<Vec<StudentInfo>> {
        self.registry.roster(code)
    }

    /// Participant view sent to a newly joined student: every student plus
    /// the room's teacher under its canonical signaling identity.
    pub async fn participants(&self, code: &str) -> Vec<Participant> {
        let Some(roster) = self.registry.roster(code) else {
            return Vec::new();
        };

        let mut participants: Vec<Participant> = roster
            .into_iter()
            .map(|info| Participant {
                id: info.id,
                name: info.name,
                kind: "student".to_string(),
            })
            .collect();

        if self.registry.room_exists(code) {
            participants.push(Participant {
                id: teacher_identity(code),
                name: "Teacher".to_string(),
                kind: "teacher".to_string(),
            });
        }

        participants
    }

    /// Room and student counts for the health endpoint.
    pub async fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    /// Serializes once and queues the message to each student, collecting
    /// dead peers for eviction.
    fn fan_out_students(
        &self,
        code: &str,
        targets: Vec<(String, ClientHandle)>,
        message: &WebSocketMessage,
    ) -> Vec<Eviction> {
        let Ok(text) = serde_json::to_string(message) else {
            warn!(room_code = %code, "Failed to serialize broadcast message");
            return Vec::new();
        };

        let mut evictions = Vec::new();
        for (student_id, handle) in targets {
            if handle.send_raw(text.clone()).is_err() {
                warn!(room_code = %code, student_id = %student_id, "Send failed, evicting student");
                evictions.push(Eviction::Student {
                    code: code.to_string(),
                    id: student_id,
                });
            }
        }
        evictions
    }

    fn fan_out_teachers(
        &self,
        code: &str,
        targets: Vec<(Uuid, ClientHandle)>,
        message: &WebSocketMessage,
    ) -> Vec<Eviction> {
        let Ok(text) = serde_json::to_string(message) else {
            warn!(room_code = %code, "Failed to serialize broadcast message");
            return Vec::new();
        };

        let mut evictions = Vec::new();
        for (teacher_id, handle) in targets {
            if handle.send_raw(text.clone()).is_err() {
                warn!(room_code = %code, %teacher_id, "Send failed, evicting teacher");
                evictions.push(Eviction::Teacher { id: teacher_id });
            }
        }
        evictions
    }

    /// Runs queued evictions until none are left. Departure notifications can
    /// themselves surface more dead peers; a worklist keeps this iterative.
    fn drain(&self, mut pending: Vec<Eviction>) {
        while let Some(eviction) = pending.pop() {
            let more = match eviction {
                Eviction::Student { code, id } => self.evict_student(&code, &id),
                Eviction::Teacher { id } => self.evict_teacher(id),
            };
            pending.extend(more);
        }
    }

    fn evict_student(&self, code: &str, student_id: &str) -> Vec<Eviction> {
        let StudentLeaveResult::Left {
            name,
            roster,
            peers,
            teachers,
        } = self.registry.remove_student(code, student_id)
        else {
            return Vec::new();
        };

        let mut evictions = self.fan_out_students(
            code,
            peers,
            &WebSocketMessage::student_leave(student_id.to_string(), name.clone()),
        );
        evictions.extend(self.fan_out_teachers(
            code,
            teachers,
            &WebSocketMessage::student_leave_with_roster(student_id.to_string(), name, roster),
        ));
        evictions
    }

    fn evict_teacher(&self, teacher_id: Uuid) -> Vec<Eviction> {
        match self.registry.remove_teacher(teacher_id) {
            TeacherLeaveResult::NotFound | TeacherLeaveResult::Remaining { .. } => Vec::new(),
            TeacherLeaveResult::RoomClosed { code, students } => {
                let message = WebSocketMessage::room_closed();
                for (_, handle) in &students {
                    // Best effort: the student may already be gone.
                    let _ = handle.send(&message);
                    handle.close(CLOSE_ROOM_CLOSED, "Room closed");
                }
                // Teardown, including student notification, finished: the
                // code may now be reused.
                self.registry.release_code(&code);
                Vec::new()
            }
        }
    }
}
