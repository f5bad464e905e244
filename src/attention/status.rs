use strum_macros::{Display, EnumString};

/// Engagement classification reported by a student client.
///
/// The set is open: clients may ship detectors with statuses this server has
/// never seen. Anything unrecognized lands in `Other` and is treated as a
/// deviation, never coerced to attentive.
#[derive(Debug, Clone, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AttentionStatus {
    Attentive,
    LookingAway,
    Drowsy,
    NoFace,
    #[strum(default)]
    Other(String),
}

impl AttentionStatus {
    pub fn is_attentive(&self) -> bool {
        matches!(self, AttentionStatus::Attentive)
    }
}

/// How urgently a deviation should be surfaced to the teacher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AlertSeverity {
    Medium,
    High,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case("attentive", AttentionStatus::Attentive)]
    #[case("looking_away", AttentionStatus::LookingAway)]
    #[case("drowsy", AttentionStatus::Drowsy)]
    #[case("no_face", AttentionStatus::NoFace)]
    fn test_known_statuses_parse(#[case] input: &str, #[case] expected: AttentionStatus) {
        assert_eq!(AttentionStatus::from_str(input).unwrap(), expected);
    }

    #[test]
    fn test_unknown_status_is_kept_verbatim_and_not_attentive() {
        let status = AttentionStatus::from_str("juggling").unwrap();
        assert_eq!(status, AttentionStatus::Other("juggling".to_string()));
        assert!(!status.is_attentive());
        assert_eq!(status.to_string(), "juggling");
    }

    #[test]
    fn test_status_round_trips_through_display() {
        for raw in ["attentive", "looking_away", "drowsy", "no_face"] {
            let status = AttentionStatus::from_str(raw).unwrap();
            assert_eq!(status.to_string(), raw);
        }
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(AlertSeverity::Medium.to_string(), "medium");
        assert_eq!(AlertSeverity::High.to_string(), "high");
    }
}
