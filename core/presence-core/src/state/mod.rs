//! Presence sessions: state machine, transitions, and file persistence.
//!
//! # Module Structure
//!
//! - [`transition`]: Pure mapping from (open period, status) to a [`Transition`]
//! - [`machine`]: Applies transitions to identities and the persisted state
//! - [`store`]: Reads/writes the JSON state file (`~/.presence-tracker/sessions.json`)
//! - [`types`]: Sessions, history entries, and the persisted state document

mod machine;
mod store;
mod transition;
pub(crate) mod types;

pub use machine::{Applied, PresenceMachine};
pub use store::{write_report_file, StateStore, STORE_VERSION};
pub use transition::{next_transition, Transition};
pub use types::{
    seconds_between, HistoryEntry, HistoryKind, Identity, PersistedState, Session, StatusChange,
    OFFLINE_MARKER, ONLINE_MARKER,
};
