//! Identity tracking: configured name references → stable numeric ids.
//!
//! Names are resolved once at startup through a [`DirectoryLookup`]. A name that
//! fails to resolve is logged and left out of the tracked set; there is no retry
//! during the run.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::{Result, TrackerError};
use crate::state::Identity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub id: u64,
    pub display_name: String,
}

/// External directory that turns a name reference into an identity.
pub trait DirectoryLookup {
    fn lookup(&self, name: &str) -> Result<ResolvedIdentity>;
}

/// Strips surrounding whitespace and a leading `@`.
pub fn normalize_name(name: &str) -> &str {
    name.trim().trim_start_matches('@')
}

fn name_key(name: &str) -> String {
    normalize_name(name).to_lowercase()
}

/// In-memory directory backed by a name → id table (the `[directory]` config section).
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entries: HashMap<String, (u64, String)>,
}

impl StaticDirectory {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .map(|(name, id)| {
                let display = normalize_name(name.as_ref()).to_string();
                (name_key(&display), (id, display))
            })
            .collect();
        Self { entries }
    }
}

impl DirectoryLookup for StaticDirectory {
    fn lookup(&self, name: &str) -> Result<ResolvedIdentity> {
        let key = name_key(name);
        match self.entries.get(&key) {
            Some((id, display)) if *id != 0 => Ok(ResolvedIdentity {
                id: *id,
                display_name: display.clone(),
            }),
            Some(_) => Err(TrackerError::LookupFailed {
                name: name.to_string(),
                details: "directory entry has id 0".to_string(),
            }),
            None => Err(TrackerError::IdentityNotFound(name.to_string())),
        }
    }
}

/// Working set of tracked identities, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct IdentityTracker {
    identities: Vec<Identity>,
}

impl IdentityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves every name; failures are logged and skipped.
    pub fn resolve_all<I, S>(names: I, directory: &dyn DirectoryLookup) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tracker = Self::new();
        for name in names {
            let name = name.as_ref();
            match directory.lookup(name) {
                Ok(resolved) => {
                    let id = resolved.id;
                    if tracker.track(resolved) {
                        info!(identity_id = id, name = %normalize_name(name), "Tracking identity");
                    }
                }
                Err(err) => {
                    warn!(name = %name, error = %err, "Failed to resolve identity, not tracking");
                }
            }
        }
        tracker
    }

    /// Adds an identity with no open session. Returns false if the id is already tracked.
    pub fn track(&mut self, resolved: ResolvedIdentity) -> bool {
        if self.contains(resolved.id) {
            warn!(identity_id = resolved.id, "Identity already tracked");
            return false;
        }
        self.identities
            .push(Identity::new(resolved.id, resolved.display_name));
        true
    }

    pub fn contains(&self, id: u64) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: u64) -> Option<&Identity> {
        self.identities.iter().find(|identity| identity.id == id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Identity> {
        self.identities.iter_mut().find(|identity| identity.id == id)
    }

    /// Case-insensitive match on display name, folded the same way as
    /// [`StaticDirectory`] keys; a leading `@` is ignored.
    pub fn find_by_name(&self, name: &str) -> Option<&Identity> {
        let wanted = name_key(name);
        self.identities
            .iter()
            .find(|identity| name_key(&identity.display_name) == wanted)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.identities.iter()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingDirectory;

    impl DirectoryLookup for FailingDirectory {
        fn lookup(&self, name: &str) -> Result<ResolvedIdentity> {
            Err(TrackerError::LookupFailed {
                name: name.to_string(),
                details: "network unreachable".to_string(),
            })
        }
    }

    fn directory() -> StaticDirectory {
        StaticDirectory::new([("alice", 1001), ("@Bob", 1002)])
    }

    #[test]
    fn test_resolves_configured_names() {
        let tracker = IdentityTracker::resolve_all(["alice", "@bob"], &directory());
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.get(1002).unwrap().display_name, "Bob");
        assert!(tracker.iter().all(|identity| !identity.is_active()));
    }

    #[test]
    fn test_unresolved_name_is_skipped() {
        let tracker = IdentityTracker::resolve_all(["alice", "carol"], &directory());
        assert_eq!(tracker.len(), 1);
        assert!(tracker.find_by_name("carol").is_none());
    }

    #[test]
    fn test_lookup_error_is_not_fatal() {
        let tracker = IdentityTracker::resolve_all(["alice"], &FailingDirectory);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_duplicate_ids_are_tracked_once() {
        let tracker = IdentityTracker::resolve_all(["alice", "ALICE"], &directory());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_find_by_name_ignores_case_and_at_sign() {
        let tracker = IdentityTracker::resolve_all(["alice"], &directory());
        assert_eq!(tracker.find_by_name("@Alice").unwrap().id, 1001);
    }

    #[test]
    fn test_zero_id_entry_fails_lookup() {
        let directory = StaticDirectory::new([("ghost", 0)]);
        assert!(directory.lookup("ghost").is_err());
    }

    #[test]
    fn test_non_ascii_names_resolve_and_match_in_any_case() {
        let directory = StaticDirectory::new([("Алиса", 7)]);
        let tracker = IdentityTracker::resolve_all(["алиса"], &directory);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.find_by_name("алиса").unwrap().id, 7);
        assert_eq!(tracker.find_by_name("@АЛИСА").unwrap().id, 7);
    }
}
