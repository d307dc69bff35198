//! # presence-core
//!
//! Turns presence-status notifications for a fixed set of tracked identities
//! into online-to-offline session records, persists them, and renders reports.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. The daemon drives it from a single queue.
//! - **Single writer**: [`PresenceTracker`] guards every load/save behind one mutex.
//! - **Graceful degradation**: Missing or corrupt state files load as empty state.
//! - **UTC at rest**: Instants are stored in UTC and converted to the reference
//!   timezone only when bucketing by date or rendering.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use presence_core::{PresenceTracker, TrackerConfig};
//!
//! let config = TrackerConfig::load(None)?;
//! let tracker = PresenceTracker::start(&config, &directory)?;
//! tracker.handle_event(&event)?;
//! let report = tracker.report(Some("alice"))?;
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod report;
pub mod state;
pub mod tracker;

pub use clock::{Clock, FixedClock, ReferenceZone, SystemClock};
pub use config::TrackerConfig;
pub use error::{Result, TrackerError};
pub use identity::{DirectoryLookup, IdentityTracker, ResolvedIdentity, StaticDirectory};
pub use report::{ReportGenerator, ReportOutcome};
pub use state::{
    HistoryEntry, HistoryKind, Identity, PersistedState, PresenceMachine, Session, StateStore,
    Transition,
};
pub use tracker::PresenceTracker;
