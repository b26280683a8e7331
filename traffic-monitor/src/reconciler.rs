// traffic-monitor/src/reconciler.rs
use chrono::{DateTime, Utc};
use common::{EntryKey, LogEntry, RawLogEntry};
use std::collections::{HashSet, VecDeque};

/// Canonical, most-recent-first set of log entries for one application.
///
/// Fetched pages and pushed events both land here. Every entry is unique
/// under [`EntryKey`]; the first occurrence in most-recent-first order wins.
#[derive(Debug, Default)]
pub struct LogSet {
    entries: VecDeque<LogEntry>,
    keys: HashSet<EntryKey>,
}

impl LogSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Owned snapshot in display order
    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.keys.clear();
    }

    /// Merge one fetched page.
    ///
    /// Page 1 replaces the whole set; later pages are older history and go to
    /// the tail. Returns the number of entries that were new.
    pub fn ingest_page(&mut self, entries: Vec<LogEntry>, is_first_page: bool) -> usize {
        if is_first_page {
            self.clear();
        }

        let mut added = 0;
        for entry in entries {
            if self.keys.insert(entry.key()) {
                self.entries.push_back(entry);
                added += 1;
            }
        }

        tracing::debug!("Merged page: {} new entries, {} total", added, self.entries.len());
        added
    }

    /// Normalize and prepend one pushed record. Returns false on a duplicate.
    pub fn ingest_pushed(&mut self, raw: RawLogEntry) -> bool {
        self.ingest_pushed_at(raw, Utc::now())
    }

    pub fn ingest_pushed_at(&mut self, raw: RawLogEntry, now: DateTime<Utc>) -> bool {
        let (entry, malformed) = raw.normalize(now);
        if let Some(report) = malformed {
            tracing::warn!("Pushed entry normalized: {}", report);
        }

        if !self.keys.insert(entry.key()) {
            tracing::debug!("Discarding duplicate pushed entry: {} {}", entry.timestamp, entry.url);
            return false;
        }

        self.entries.push_front(entry);
        true
    }

    /// Entries recorded for one source IP, most recent first
    pub fn entries_for_ip<'a>(&'a self, ip: &'a str) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.entries
            .iter()
            .filter(move |entry| entry.source_ip.as_deref() == Some(ip))
    }
}
