//! Loaded revisions and how they are labelled.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use revgrid_config::HistorySettings;
use revgrid_engine::RevisionIndex;
use revgrid_protocol::{RevisionId, UserRef};
use serde_json::Value;

/// Wire format of revision timestamps (UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What a revision does, with undo/redo targets resolved to arena indices.
#[derive(Debug, Clone, PartialEq)]
pub enum RevisionKind {
    /// Ordinary edit. Commands stay opaque until replayed.
    Edit { commands: Vec<Value> },
    Undone {
        /// `None` when no earlier revision produces `reference`
        target: Option<RevisionIndex>,
        reference: String,
    },
    Redone {
        target: Option<RevisionIndex>,
        reference: String,
    },
    /// Checkpoint marker; a chain link without content
    SnapshotCreated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Revision {
    pub id: RevisionId,
    pub name: Option<String>,
    pub server_revision_id: String,
    pub next_revision_id: String,
    pub timestamp: NaiveDateTime,
    pub user: UserRef,
    pub kind: RevisionKind,
}

impl Revision {
    pub fn is_restorable(&self) -> bool {
        !matches!(self.kind, RevisionKind::SnapshotCreated)
    }

    /// Name, or the formatted timestamp when unnamed.
    pub fn label(&self, formatter: &TimestampFormatter) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => formatter.format(&self.timestamp),
        }
    }
}

/// Parse a wire timestamp. RFC 3339 is accepted as well.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.naive_utc()))
}

/// Formats UTC timestamps for display.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampFormatter {
    offset: FixedOffset,
    pattern: String,
}

impl TimestampFormatter {
    pub fn new(utc_offset_minutes: i32, pattern: &str) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix());
        Self { offset, pattern: pattern.to_string() }
    }

    pub fn from_settings(settings: &HistorySettings) -> Self {
        Self::new(settings.utc_offset_minutes, &settings.timestamp_format)
    }

    pub fn format(&self, timestamp: &NaiveDateTime) -> String {
        use std::fmt::Write;

        let local = self.offset.from_utc_datetime(timestamp);
        let mut out = String::new();
        // Unknown specifiers make chrono's formatter fail
        if write!(out, "{}", local.format(&self.pattern)).is_err() {
            out.clear();
            let _ = write!(out, "{}", timestamp.format(TIMESTAMP_FORMAT));
        }
        out
    }
}

impl Default for TimestampFormatter {
    fn default() -> Self {
        Self::from_settings(&HistorySettings::default())
    }
}
