//! Presence state machine.
//!
//! Per identity: `Idle` (no open period) or `Active` (open period with a start).
//!
//! ```text
//! Idle   + online  → Active   history: online
//! Active + online  → Active   history: online (repeats are logged, not deduplicated)
//! Active + offline → Idle     history: offline + duration, session recorded
//! Idle   + offline → Idle     nothing
//! ```
//!
//! Changes for identities outside the tracked set are dropped without side effects.

use chrono::SubsecRound;
use tracing::{debug, info, warn};

use crate::clock::ReferenceZone;
use crate::identity::IdentityTracker;

use super::transition::{next_transition, Transition};
use super::types::{HistoryEntry, PersistedState, StatusChange};

/// Result of applying one change to a tracked identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub identity_id: u64,
    pub transition: Transition,
    /// Date bucket the closed session went into.
    pub date_key: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PresenceMachine {
    zone: ReferenceZone,
}

impl PresenceMachine {
    pub fn new(zone: ReferenceZone) -> Self {
        Self { zone }
    }

    /// Applies one change. Returns `None` for identities that are not tracked.
    ///
    /// The change instant is truncated to microseconds, the precision session
    /// durations are kept at.
    pub fn apply(
        &self,
        identities: &mut IdentityTracker,
        state: &mut PersistedState,
        change: StatusChange,
    ) -> Option<Applied> {
        let change = StatusChange {
            at: change.at.trunc_subsecs(6),
            ..change
        };
        let Some(identity) = identities.get_mut(change.identity_id) else {
            debug!(identity_id = change.identity_id, "Ignoring change for untracked identity");
            return None;
        };

        let transition = next_transition(identity.open_session, change.status, change.at);
        let mut date_key = None;

        match &transition {
            Transition::Opened { started_at } => {
                state
                    .history
                    .push(HistoryEntry::online(identity.id, change.at));
                identity.open_session = Some(*started_at);
                debug!(identity_id = identity.id, "Session opened");
            }
            Transition::Repeated => {
                state
                    .history
                    .push(HistoryEntry::online(identity.id, change.at));
                debug!(identity_id = identity.id, "Repeated online signal");
            }
            Transition::Closed { session, clamped } => {
                if *clamped {
                    warn!(
                        identity_id = identity.id,
                        start = %session.start.to_rfc3339(),
                        offline_at = %change.at.to_rfc3339(),
                        "Offline instant precedes session start, clamping duration to zero"
                    );
                }
                let key = self.zone.date_key(change.at);
                state.history.push(HistoryEntry::offline(
                    identity.id,
                    change.at,
                    session.duration,
                ));
                state.record_session(identity.id, key.clone(), session.clone());
                identity.open_session = None;
                info!(
                    identity_id = identity.id,
                    duration_secs = session.duration,
                    date = %key,
                    "Session closed"
                );
                date_key = Some(key);
            }
            Transition::Ignored => {
                debug!(identity_id = identity.id, "Offline while idle, nothing to close");
            }
        }

        Some(Applied {
            identity_id: change.identity_id,
            transition,
            date_key,
        })
    }

    /// Undoes a close whose persist failed: drops the offline entry and the
    /// session, and reopens the identity at its original start so the next
    /// offline change closes it again.
    pub fn revert_close(
        &self,
        identities: &mut IdentityTracker,
        state: &mut PersistedState,
        applied: &Applied,
    ) {
        let (Transition::Closed { session, .. }, Some(date_key)) =
            (&applied.transition, applied.date_key.as_deref())
        else {
            return;
        };

        if state
            .history
            .last()
            .map(|entry| entry.identity_id == applied.identity_id && entry.duration.is_some())
            .unwrap_or(false)
        {
            state.history.pop();
        }
        state.pop_session(applied.identity_id, date_key);
        if let Some(identity) = identities.get_mut(applied.identity_id) {
            identity.open_session = Some(session.start);
        }
        warn!(
            identity_id = applied.identity_id,
            "Session close rolled back, identity remains active"
        );
    }
}
