use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Local, Utc};

pub const DIAGNOSIS_CAPACITY: usize = 50;

/// One timestamped line of operator-facing diagnosis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosisEntry {
    pub message: String,
    pub at: DateTime<Utc>,
}

impl DiagnosisEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            at: Utc::now(),
        }
    }
}

impl fmt::Display for DiagnosisEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let local: DateTime<Local> = self.at.into();
        write!(f, "[{}] {}", local.format("%H:%M:%S"), self.message)
    }
}

/// Append-only log that keeps the most recent `DIAGNOSIS_CAPACITY` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosisLog {
    entries: VecDeque<DiagnosisEntry>,
}

impl DiagnosisLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: DiagnosisEntry) {
        if self.entries.len() == DIAGNOSIS_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn record(&mut self, message: impl Into<String>) {
        self.push(DiagnosisEntry::now(message));
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = DiagnosisEntry>) {
        for entry in entries {
            self.push(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &DiagnosisEntry> {
        self.entries.iter()
    }

    /// Newest first, the order the debug console shows.
    pub fn recent(&self) -> impl Iterator<Item = &DiagnosisEntry> {
        self.entries.iter().rev()
    }

    pub fn last(&self) -> Option<&DiagnosisEntry> {
        self.entries.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut log = DiagnosisLog::new();
        for i in 0..DIAGNOSIS_CAPACITY {
            log.record(format!("line {}", i));
        }
        assert_eq!(log.len(), 50);
        log.record("line 50");
        assert_eq!(log.len(), 50);
        assert_eq!(log.entries().next().unwrap().message, "line 1");
        assert_eq!(log.last().unwrap().message, "line 50");
        assert_eq!(log.recent().next().unwrap().message, "line 50");
    }

    #[test]
    fn extend_respects_capacity() {
        let mut log = DiagnosisLog::new();
        log.extend((0..120).map(|i| DiagnosisEntry::now(i.to_string())));
        assert_eq!(log.len(), DIAGNOSIS_CAPACITY);
        assert_eq!(log.entries().next().unwrap().message, "70");
    }

    #[test]
    fn display_prefixes_clock_time() {
        let line = DiagnosisEntry::now("Status: 404 Not Found").to_string();
        assert!(line.starts_with('['));
        assert!(line.ends_with("] Status: 404 Not Found"));
        assert_eq!(line.find(']'), Some(9));
    }
}
