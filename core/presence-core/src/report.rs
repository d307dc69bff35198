//! Report rendering: per-identity history and the aggregate summary.
//!
//! [`ReportGenerator::generate`] always reloads the state file first, so a
//! report reflects what is durable rather than what is only in memory.

use std::cmp::Ordering;

use presence_protocol::ReportKind;

use crate::clock::{parse_date_key, ReferenceZone};
use crate::identity::{normalize_name, IdentityTracker};
use crate::state::{PersistedState, StateStore};

pub const NO_DATA_TEXT: &str = "📭 No data to display";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Identity { name: String, text: String },
    Aggregate { text: String },
    NoData,
    NotFound { reference: String },
}

impl ReportOutcome {
    pub fn kind(&self) -> ReportKind {
        match self {
            ReportOutcome::Identity { .. } => ReportKind::Identity,
            ReportOutcome::Aggregate { .. } => ReportKind::Aggregate,
            ReportOutcome::NoData => ReportKind::NoData,
            ReportOutcome::NotFound { .. } => ReportKind::NotFound,
        }
    }

    /// Text to hand to the delivery side, sentinels included.
    pub fn text(&self) -> String {
        match self {
            ReportOutcome::Identity { text, .. } | ReportOutcome::Aggregate { text } => {
                text.clone()
            }
            ReportOutcome::NoData => NO_DATA_TEXT.to_string(),
            ReportOutcome::NotFound { reference } => {
                format!("❌ Identity not found: @{}", normalize_name(reference))
            }
        }
    }

    pub fn caption(&self) -> String {
        match self {
            ReportOutcome::Identity { name, .. } => format!("📋 Activity report for @{}", name),
            _ => "📋 Activity report".to_string(),
        }
    }
}

/// Whole seconds, truncated toward zero.
pub fn format_seconds(seconds: f64) -> String {
    format!("{} sec", seconds.trunc() as i64)
}

#[derive(Debug, Clone, Default)]
pub struct ReportGenerator {
    zone: ReferenceZone,
}

impl ReportGenerator {
    pub fn new(zone: ReferenceZone) -> Self {
        Self { zone }
    }

    /// Reloads `store` and renders the report for `identity`, or the aggregate when `None`.
    pub fn generate(
        &self,
        store: &StateStore,
        identities: &IdentityTracker,
        identity: Option<&str>,
    ) -> ReportOutcome {
        let state = store.load();
        match identity {
            Some(reference) => self.render_identity(identities, &state, reference),
            None => self.render_aggregate(identities, &state),
        }
    }

    pub fn render_identity(
        &self,
        identities: &IdentityTracker,
        state: &PersistedState,
        reference: &str,
    ) -> ReportOutcome {
        let Some(identity) = identities.find_by_name(reference) else {
            return ReportOutcome::NotFound {
                reference: reference.to_string(),
            };
        };

        let mut lines = vec![format!("📝 Session history for @{}:", identity.display_name)];
        lines.push(String::new());

        for entry in state.history_for(identity.id).rev() {
            let annotation = entry
                .duration
                .map(|secs| format!(" ({})", format_seconds(secs)))
                .unwrap_or_default();
            let local = self.zone.local(entry.timestamp);
            lines.push(format!(
                "{} {} {}{}",
                entry.marker(),
                local.format("%d.%m.%Y %H:%M:%S"),
                entry.kind.as_str(),
                annotation
            ));
        }

        lines.push(String::new());
        lines.push("📊 Daily statistics:".to_string());
        lines.push(String::new());

        if let Some(by_date) = state.sessions_for(identity.id) {
            let mut dates: Vec<&String> = by_date.keys().collect();
            dates.sort_by(|a, b| compare_date_keys_desc(a, b));

            for date in dates {
                let sessions = &by_date[date];
                let total: f64 = sessions.iter().map(|s| s.duration).sum();
                lines.push(format!("📅 {}:", date));
                for (i, session) in sessions.iter().enumerate() {
                    lines.push(format!(
                        "{}. {} - {} ({})",
                        i + 1,
                        self.zone.time_of_day(session.start),
                        self.zone.time_of_day(session.end),
                        format_seconds(session.duration)
                    ));
                }
                lines.push(format!("✅ Day total: {}", format_seconds(total)));
                lines.push(String::new());
            }
        }

        ReportOutcome::Identity {
            name: identity.display_name.clone(),
            text: lines.join("\n"),
        }
    }

    /// One line per tracked identity with its all-time total, followed by any
    /// identities that have stored sessions but are no longer tracked.
    pub fn render_aggregate(
        &self,
        identities: &IdentityTracker,
        state: &PersistedState,
    ) -> ReportOutcome {
        if state.sessions.is_empty() {
            return ReportOutcome::NoData;
        }

        let mut lines = vec!["📊 Summary report".to_string(), String::new()];
        for identity in identities.iter() {
            lines.push(format!(
                "👤 @{}: {}",
                identity.display_name,
                format_seconds(state.total_seconds(identity.id))
            ));
        }
        for id in state.sessions.keys().filter(|id| !identities.contains(**id)) {
            lines.push(format!(
                "👤 unknown ({}): {}",
                id,
                format_seconds(state.total_seconds(*id))
            ));
        }

        ReportOutcome::Aggregate {
            text: lines.join("\n"),
        }
    }
}

/// Newest calendar date first; keys that are not `DD.MM.YYYY` sort last.
fn compare_date_keys_desc(a: &str, b: &str) -> Ordering {
    match (parse_date_key(a), parse_date_key(b)) {
        (Some(da), Some(db)) => db.cmp(&da),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.cmp(a),
    }
}
