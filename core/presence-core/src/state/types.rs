//! Serialized state types for sessions and the presence history log.
//!
//! On-disk shape (field names kept compatible with older tracker files):
//!
//! ```json
//! {
//!   "version": 1,
//!   "sessions": { "1001": { "19.10.2026": [ { "start": "...", "end": "...", "duration": 330.0 } ] } },
//!   "history": [ { "user_id": "1001", "time": "...", "emoji": "🟢", "type": "online" } ]
//! }
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use presence_protocol::PresenceStatus;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const ONLINE_MARKER: &str = "🟢";
pub const OFFLINE_MARKER: &str = "🔴";

/// A tracked identity and its open online period, if any.
///
/// `open_session` is only ever changed by [`super::PresenceMachine`] and is never
/// persisted: a restart always begins with every identity idle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: u64,
    pub display_name: String,
    pub open_session: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn new(id: u64, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            open_session: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.open_session.is_some()
    }
}

/// One inbound presence change, already stamped with its instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub identity_id: u64,
    pub status: PresenceStatus,
    pub at: DateTime<Utc>,
}

/// A closed online interval. The owning identity is the key it is stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Seconds between `start` and `end`.
    pub duration: f64,
}

impl Session {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            duration: seconds_between(start, end),
        }
    }
}

pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let delta = end.signed_duration_since(start);
    delta
        .num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
        .unwrap_or_else(|| delta.num_seconds() as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryKind {
    #[serde(rename = "online", alias = "онлайн")]
    Online,
    #[serde(rename = "offline", alias = "оффлайн")]
    Offline,
}

impl HistoryKind {
    pub fn marker(&self) -> &'static str {
        match self {
            HistoryKind::Online => ONLINE_MARKER,
            HistoryKind::Offline => OFFLINE_MARKER,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Online => "online",
            HistoryKind::Offline => "offline",
        }
    }
}

/// Append-only record of a single online/offline transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(
        rename = "user_id",
        serialize_with = "serialize_id",
        deserialize_with = "deserialize_id"
    )]
    pub identity_id: u64,
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub emoji: String,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    /// Present only on offline entries.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_duration"
    )]
    pub duration: Option<f64>,
}

impl HistoryEntry {
    pub fn online(identity_id: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            identity_id,
            timestamp,
            emoji: HistoryKind::Online.marker().to_string(),
            kind: HistoryKind::Online,
            duration: None,
        }
    }

    pub fn offline(identity_id: u64, timestamp: DateTime<Utc>, duration: f64) -> Self {
        Self {
            identity_id,
            timestamp,
            emoji: HistoryKind::Offline.marker().to_string(),
            kind: HistoryKind::Offline,
            duration: Some(duration),
        }
    }

    pub fn marker(&self) -> &str {
        if self.emoji.is_empty() {
            self.kind.marker()
        } else {
            &self.emoji
        }
    }
}

/// Everything that survives a restart: closed sessions and the history log.
///
/// Sessions are grouped by identity id, then by `DD.MM.YYYY` date key in the
/// reference timezone. Within a date they stay in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub sessions: BTreeMap<u64, BTreeMap<String, Vec<Session>>>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl PersistedState {
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty() && self.history.is_empty()
    }

    pub fn record_session(&mut self, identity_id: u64, date_key: String, session: Session) {
        self.sessions
            .entry(identity_id)
            .or_default()
            .entry(date_key)
            .or_default()
            .push(session);
    }

    /// Removes the most recently recorded session for `identity_id` under `date_key`.
    pub(crate) fn pop_session(&mut self, identity_id: u64, date_key: &str) -> Option<Session> {
        let by_date = self.sessions.get_mut(&identity_id)?;
        let list = by_date.get_mut(date_key)?;
        let popped = list.pop();
        if list.is_empty() {
            by_date.remove(date_key);
        }
        if by_date.is_empty() {
            self.sessions.remove(&identity_id);
        }
        popped
    }

    pub fn sessions_for(&self, identity_id: u64) -> Option<&BTreeMap<String, Vec<Session>>> {
        self.sessions.get(&identity_id)
    }

    pub fn session_count(&self, identity_id: u64) -> usize {
        self.sessions_for(identity_id)
            .map(|by_date| by_date.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Sum of all session durations for an identity across every date.
    pub fn total_seconds(&self, identity_id: u64) -> f64 {
        self.sessions_for(identity_id)
            .map(|by_date| by_date.values().flatten().map(|s| s.duration).sum())
            .unwrap_or(0.0)
    }

    pub fn history_for(&self, identity_id: u64) -> impl DoubleEndedIterator<Item = &HistoryEntry> {
        self.history
            .iter()
            .filter(move |entry| entry.identity_id == identity_id)
    }
}

fn serialize_id<S: Serializer>(id: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&id.to_string())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid identity id: {}", text))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(f64),
    Text(String),
}

/// Accepts numeric seconds, `null`, and legacy strings such as `"330 сек"` or `""`.
fn deserialize_duration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    match Option::<RawDuration>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawDuration::Seconds(seconds)) => Ok(Some(seconds)),
        Some(RawDuration::Text(text)) => {
            let digits: String = text
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            if digits.is_empty() {
                Ok(None)
            } else {
                Ok(digits.parse().ok())
            }
        }
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
    fn session_duration_matches_interval() {
        let session = Session::new(at(9, 0, 0), at(9, 5, 30));
        assert_eq!(session.duration, 330.0);
    }

    #[test]
    fn session_duration_keeps_subsecond_precision() {
        let start = at(9, 0, 0);
        let end = start + chrono::Duration::microseconds(1_500_250);
        assert_eq!(Session::new(start, end).duration, 1.50025);
    }

    #[test]
    fn history_entry_serializes_id_as_string() {
        let entry = HistoryEntry::online(1001, at(9, 0, 0));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["user_id"], "1001");
        assert_eq!(value["type"], "online");
        assert_eq!(value["emoji"], ONLINE_MARKER);
        assert!(value.get("duration").is_none());
    }

    #[test]
    fn history_entry_accepts_legacy_fields() {
        let raw = r#"{
            "user_id": "1001",
            "time": "2026-10-19T12:05:30.250000+03:00",
            "emoji": "🔴",
            "type": "оффлайн",
            "duration": "330 сек"
        }"#;
        let entry: HistoryEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.identity_id, 1001);
        assert_eq!(entry.kind, HistoryKind::Offline);
        assert_eq!(entry.duration, Some(330.0));
        assert_eq!(
            entry.timestamp,
            at(9, 5, 30) + chrono::Duration::milliseconds(250)
        );
    }

    #[test]
    fn history_entry_treats_empty_legacy_duration_as_absent() {
        let raw = r#"{"user_id":"7","time":"2026-10-19T09:00:00Z","emoji":"🟢","type":"онлайн","duration":""}"#;
        let entry: HistoryEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.kind, HistoryKind::Online);
        assert_eq!(entry.duration, None);
    }

    #[test]
    fn pop_session_prunes_empty_buckets() {
        let mut state = PersistedState::default();
        state.record_session(1, "19.10.2026".into(), Session::new(at(9, 0, 0), at(9, 1, 0)));
        assert!(state.pop_session(1, "19.10.2026").is_some());
        assert!(state.sessions.is_empty());
    }

    #[test]
    fn total_seconds_spans_dates() {
        let mut state = PersistedState::default();
        state.record_session(1, "18.10.2026".into(), Session::new(at(9, 0, 0), at(9, 1, 0)));
        state.record_session(1, "19.10.2026".into(), Session::new(at(10, 0, 0), at(10, 0, 30)));
        assert_eq!(state.total_seconds(1), 90.0);
        assert_eq!(state.session_count(1), 2);
        assert_eq!(state.total_seconds(2), 0.0);
    }
}
