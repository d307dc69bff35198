//! Maps presence changes to session transitions.
//! Pure: decides what happens, [`super::PresenceMachine`] applies it.

use chrono::{DateTime, Utc};
use presence_protocol::PresenceStatus;

use super::types::Session;

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Idle + online: a new online period begins.
    Opened { started_at: DateTime<Utc> },
    /// Active + online: logged, the open period is untouched.
    Repeated,
    /// Active + offline: the open period becomes a session.
    Closed { session: Session, clamped: bool },
    /// Idle + offline: nothing to close.
    Ignored,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Opened { .. } => "opened",
            Transition::Repeated => "repeated",
            Transition::Closed { .. } => "closed",
            Transition::Ignored => "ignored",
        }
    }

    /// Only closing a session forces a full persist.
    pub fn requires_persist(&self) -> bool {
        matches!(self, Transition::Closed { .. })
    }
}

/// `open_since` is the start of the identity's open period, if any.
///
/// An offline instant earlier than the open period's start closes the session
/// at its start instant with zero duration (`clamped = true`).
pub fn next_transition(
    open_since: Option<DateTime<Utc>>,
    status: PresenceStatus,
    at: DateTime<Utc>,
) -> Transition {
    match (open_since, status) {
        (None, PresenceStatus::Online) => Transition::Opened { started_at: at },
        (Some(_), PresenceStatus::Online) => Transition::Repeated,
        (None, PresenceStatus::Offline) => Transition::Ignored,
        (Some(start), PresenceStatus::Offline) if at < start => Transition::Closed {
            session: Session::new(start, start),
            clamped: true,
        },
        (Some(start), PresenceStatus::Offline) => Transition::Closed {
            session: Session::new(start, at),
            clamped: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, h, m, s).unwrap()
    }

    #[test]
    fn test_online_from_idle_opens() {
        assert_eq!(
            next_transition(None, PresenceStatus::Online, at(9, 0, 0)),
            Transition::Opened {
                started_at: at(9, 0, 0)
            }
        );
    }

    #[test]
    fn test_online_while_active_repeats() {
        assert_eq!(
            next_transition(Some(at(9, 0, 0)), PresenceStatus::Online, at(9, 1, 0)),
            Transition::Repeated
        );
    }

    #[test]
    fn test_offline_while_idle_is_ignored() {
        assert_eq!(
            next_transition(None, PresenceStatus::Offline, at(9, 0, 0)),
            Transition::Ignored
        );
    }

    #[test]
    fn test_offline_while_active_closes() {
        let transition = next_transition(Some(at(9, 0, 0)), PresenceStatus::Offline, at(9, 5, 30));
        assert_eq!(
            transition,
            Transition::Closed {
                session: Session {
                    start: at(9, 0, 0),
                    end: at(9, 5, 30),
                    duration: 330.0,
                },
                clamped: false,
            }
        );
        assert!(transition.requires_persist());
    }

    #[test]
    fn test_out_of_order_offline_clamps_to_zero() {
        match next_transition(Some(at(9, 5, 0)), PresenceStatus::Offline, at(9, 0, 0)) {
            Transition::Closed { session, clamped } => {
                assert!(clamped);
                assert_eq!(session.duration, 0.0);
                assert_eq!(session.start, session.end);
            }
            other => panic!("expected Closed, got {:?}", other),
        }
    }

    #[test]
    fn test_only_close_requires_persist() {
        assert!(!Transition::Repeated.requires_persist());
        assert!(!Transition::Ignored.requires_persist());
        assert!(!Transition::Opened {
            started_at: at(9, 0, 0)
        }
        .requires_persist());
    }
}
