use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use super::status::{AlertSeverity, AttentionStatus};

/// Per-student state owned by the monitor. Lives independently of room
/// membership and is dropped by [`AttentionMonitor::reset`].
#[derive(Debug)]
struct StudentAttention {
    current_status: AttentionStatus,
    alert_active: bool,
}

/// Alert-state transition produced by a status report.
///
/// The monitor only decides transitions; forwarding them to the teacher
/// broadcast path is the caller's job.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertTransition {
    Raised {
        alert_type: String,
        message: String,
        severity: AlertSeverity,
    },
    Cleared,
}

/// Edge-triggered attention alerting, one two-state machine per student.
///
/// A deviation raises an alert only while none is active; a return to
/// attentive clears only an active alert. Everything else is silent, so a
/// stream of identical reports produces no event spam.
pub struct AttentionMonitor {
    states: Mutex<HashMap<String, StudentAttention>>,
}

impl Default for AttentionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl AttentionMonitor {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Feeds one status report into the student's machine and returns the
    /// transition to forward, if any.
    pub fn observe(
        &self,
        student_id: &str,
        student_name: &str,
        status: &AttentionStatus,
    ) -> Option<AlertTransition> {
        let mut states = self.states.lock().unwrap();
        let state = states
            .entry(student_id.to_string())
            .or_insert_with(|| StudentAttention {
                current_status: AttentionStatus::Attentive,
                alert_active: false,
            });

        state.current_status = status.clone();

        if !status.is_attentive() && !state.alert_active {
            state.alert_active = true;
            debug!(student_id = %student_id, status = %status, "Alert raised");
            return Some(Self::raised(student_name, status));
        }

        if status.is_attentive() && state.alert_active {
            state.alert_active = false;
            debug!(student_id = %student_id, "Alert cleared");
            return Some(AlertTransition::Cleared);
        }

        None
    }

    /// Last status seen for a student, if any report has arrived since the
    /// student's state was created or reset.
    pub fn status_of(&self, student_id: &str) -> Option<AttentionStatus> {
        let states = self.states.lock().unwrap();
        states.get(student_id).map(|s| s.current_status.clone())
    }

    /// Drops all state for a student. Must run on every disconnect path so a
    /// reconnect under the same identity starts from a clean machine.
    pub fn reset(&self, student_id: &str) {
        let mut states = self.states.lock().unwrap();
        if states.remove(student_id).is_some() {
            debug!(student_id = %student_id, "Attention state reset");
        }
    }

    fn raised(student_name: &str, status: &AttentionStatus) -> AlertTransition {
        let (message, severity) = match status {
            AttentionStatus::LookingAway => {
                (format!("{} is looking away", student_name), AlertSeverity::Medium)
            }
            AttentionStatus::Drowsy => {
                (format!("{} appears drowsy", student_name), AlertSeverity::High)
            }
            AttentionStatus::NoFace => (
                format!("No face detected for {}", student_name),
                AlertSeverity::Medium,
            ),
            _ => (
                format!("{} needs attention", student_name),
                AlertSeverity::Medium,
            ),
        };

        AlertTransition::Raised {
            alert_type: status.to_string(),
            message,
            severity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    fn observe(monitor: &AttentionMonitor, status: &str) -> Option<AlertTransition> {
        let status = AttentionStatus::from_str(status).unwrap();
        monitor.observe("s-1", "Alice", &status)
    }

    #[test]
    fn test_alert_then_clear_emits_exactly_two_events() {
        let monitor = AttentionMonitor::new();

        let events: Vec<Option<AlertTransition>> =
            ["attentive", "looking_away", "looking_away", "attentive"]
                .iter()
                .map(|s| observe(&monitor, s))
                .collect();

        assert!(events[0].is_none());
        assert!(matches!(events[1], Some(AlertTransition::Raised { .. })));
        assert!(events[2].is_none());
        assert_eq!(events[3], Some(AlertTransition::Cleared));
    }

    #[test]
    fn test_repeated_deviation_emits_single_alert() {
        let monitor = AttentionMonitor::new();

        let emitted: Vec<AlertTransition> = ["looking_away", "looking_away", "looking_away"]
            .iter()
            .filter_map(|s| observe(&monitor, s))
            .collect();

        assert_eq!(emitted.len(), 1);
        assert!(matches!(emitted[0], AlertTransition::Raised { .. }));
    }

    #[test]
    fn test_attentive_stream_is_silent() {
        let monitor = AttentionMonitor::new();

        for _ in 0..5 {
            assert!(observe(&monitor, "attentive").is_none());
        }
    }

    #[rstest]
    #[case("looking_away", AlertSeverity::Medium, "Alice is looking away")]
    #[case("drowsy", AlertSeverity::High, "Alice appears drowsy")]
    #[case("no_face", AlertSeverity::Medium, "No face detected for Alice")]
    #[case("handstand", AlertSeverity::Medium, "Alice needs attention")]
    fn test_alert_severity_and_message(
        #[case] status: &str,
        #[case] expected_severity: AlertSeverity,
        #[case] expected_message: &str,
    ) {
        let monitor = AttentionMonitor::new();

        let Some(AlertTransition::Raised {
            alert_type,
            message,
            severity,
        }) = observe(&monitor, status)
        else {
            panic!("expected an alert for {}", status);
        };
        assert_eq!(alert_type, status);
        assert_eq!(severity, expected_severity);
        assert_eq!(message, expected_message);
    }

    #[test]
    fn test_switching_deviations_does_not_renotify() {
        let monitor = AttentionMonitor::new();

        assert!(observe(&monitor, "looking_away").is_some());
        // Already alerting; a different deviation stays silent.
        assert!(observe(&monitor, "drowsy").is_none());
        assert_eq!(observe(&monitor, "attentive"), Some(AlertTransition::Cleared));
    }

    #[test]
    fn test_status_of_tracks_last_report() {
        let monitor = AttentionMonitor::new();

        assert!(monitor.status_of("s-1").is_none());
        observe(&monitor, "drowsy");
        assert_eq!(monitor.status_of("s-1"), Some(AttentionStatus::Drowsy));
    }

    #[test]
    fn test_reset_forgets_active_alert() {
        let monitor = AttentionMonitor::new();

        assert!(observe(&monitor, "drowsy").is_some());
        monitor.reset("s-1");
        assert!(monitor.status_of("s-1").is_none());

        // Fresh machine after reconnect: deviation alerts again, and an
        // attentive report clears nothing.
        assert!(observe(&monitor, "drowsy").is_some());
        monitor.reset("s-1");
        assert!(observe(&monitor, "attentive").is_none());
    }

    #[test]
    fn test_students_are_independent() {
        let monitor = AttentionMonitor::new();
        let drowsy = AttentionStatus::Drowsy;

        assert!(monitor.observe("s-1", "Alice", &drowsy).is_some());
        assert!(monitor.observe("s-2", "Bob", &drowsy).is_some());
        assert!(monitor.observe("s-1", "Alice", &drowsy).is_none());
    }
}
