//! Coordinator that owns all tracker state.
//!
//! [`PresenceTracker`] is the single writer: tracked identities, the in-memory
//! persisted state, and the store sit behind one mutex, so a report reload can
//! never interleave with a save from the event path.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use presence_protocol::PresenceEvent;
use tracing::{info, warn};

use crate::clock::{Clock, ReferenceZone, SystemClock};
use crate::config::TrackerConfig;
use crate::error::Result;
use crate::identity::{DirectoryLookup, IdentityTracker};
use crate::report::{ReportGenerator, ReportOutcome};
use crate::state::{
    write_report_file, PersistedState, PresenceMachine, StateStore, StatusChange, Transition,
};

struct TrackerInner {
    identities: IdentityTracker,
    state: PersistedState,
    store: StateStore,
}

pub struct PresenceTracker {
    inner: Mutex<TrackerInner>,
    machine: PresenceMachine,
    reports: ReportGenerator,
    clock: Box<dyn Clock>,
    report_path: Option<PathBuf>,
}

impl PresenceTracker {
    /// Resolves configured names, reloads committed sessions and history, and
    /// starts every identity idle.
    pub fn start(config: &TrackerConfig, directory: &dyn DirectoryLookup) -> Result<Self> {
        let zone = config.zone()?;
        let store = StateStore::new(&config.state_path()?);
        let identities = IdentityTracker::resolve_all(&config.tracked, directory);
        if identities.is_empty() {
            warn!("No identities resolved; all presence changes will be ignored");
        }

        let tracker = Self::new(store, identities, zone, Box::new(SystemClock))
            .with_report_path(config.report_path()?);
        Ok(tracker)
    }

    pub fn new(
        store: StateStore,
        identities: IdentityTracker,
        zone: ReferenceZone,
        clock: Box<dyn Clock>,
    ) -> Self {
        let state = store.load();
        info!(
            path = %store.path().display(),
            tracked = identities.len(),
            history = state.history.len(),
            "Presence tracker started"
        );
        Self {
            inner: Mutex::new(TrackerInner {
                identities,
                state,
                store,
            }),
            machine: PresenceMachine::new(zone),
            reports: ReportGenerator::new(zone),
            clock,
            report_path: None,
        }
    }

    /// Every generated report is also written here.
    pub fn with_report_path(mut self, path: PathBuf) -> Self {
        self.report_path = Some(path);
        self
    }

    fn lock(&self) -> MutexGuard<'_, TrackerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Applies an inbound event, stamping it with the clock if it carries no instant.
    pub fn handle_event(&self, event: &PresenceEvent) -> Result<Option<Transition>> {
        let at = event.observed_at_utc().unwrap_or_else(|| self.clock.now());
        self.apply(StatusChange {
            identity_id: event.identity_id,
            status: event.status,
            at,
        })
    }

    /// Applies one change. `Ok(None)` means the identity is not tracked.
    ///
    /// A close is persisted before it counts. If the save fails the close is
    /// rolled back (the identity stays active) and the error is returned.
    pub fn apply(&self, change: StatusChange) -> Result<Option<Transition>> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let Some(applied) = self
            .machine
            .apply(&mut inner.identities, &mut inner.state, change)
        else {
            return Ok(None);
        };

        if applied.transition.requires_persist() {
            if let Err(err) = inner.store.save(&inner.state) {
                warn!(
                    identity_id = applied.identity_id,
                    error = %err,
                    "Failed to persist closed session"
                );
                self.machine
                    .revert_close(&mut inner.identities, &mut inner.state, &applied);
                return Err(err);
            }
        }

        Ok(Some(applied.transition))
    }

    /// Renders a report from freshly reloaded state. `identity` selects the
    /// per-identity report; `None` renders the aggregate.
    pub fn report(&self, identity: Option<&str>) -> Result<ReportOutcome> {
        let guard = self.lock();
        let outcome = self
            .reports
            .generate(&guard.store, &guard.identities, identity);

        if let Some(path) = &self.report_path {
            write_report_file(path, &outcome.text())?;
        }
        Ok(outcome)
    }

    /// Clone of the in-memory persisted state.
    pub fn snapshot(&self) -> PersistedState {
        self.lock().state.clone()
    }

    pub fn is_active(&self, identity_id: u64) -> bool {
        self.lock()
            .identities
            .get(identity_id)
            .map(|identity| identity.is_active())
            .unwrap_or(false)
    }

    pub fn tracked_count(&self) -> usize {
        self.lock().identities.len()
    }
}
