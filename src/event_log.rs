use std::sync::{Arc, Mutex};
use std::time::Instant;

/// One milestone in the event log
///
/// Entries are immutable once appended. The duration is only present when the
/// operation was recorded with a start instant.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: String,
    pub message: String,
    pub duration_ms: Option<u64>,
}

impl LogEntry {
    pub fn formatted(&self) -> String {
        match self.duration_ms {
            Some(ms) => format!("[{}] {} ({}ms)", self.timestamp, self.message, ms),
            None => format!("[{}] {}", self.timestamp, self.message),
        }
    }
}

/// Append-only, time-ordered record of operation milestones
///
/// Cloning is cheap and all clones share the same log, so delayed diagnostic
/// tasks can keep appending after the flow that spawned them has returned.
/// Every appended line is mirrored to the tracing sink; the mirror is
/// fire-and-forget and cannot fail.
#[derive(Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message with no duration
    pub fn record(&self, message: impl Into<String>) {
        self.append(message.into(), None);
    }

    /// Append a message with the elapsed time since `started_at`
    pub fn record_since(&self, message: impl Into<String>, started_at: Instant) {
        let duration_ms = started_at.elapsed().as_millis() as u64;
        self.append(message.into(), Some(duration_ms));
    }

    fn append(&self, message: String, duration_ms: Option<u64>) {
        let timestamp = chrono::Local::now().format("%H:%M:%S%.3f").to_string();
        let entry = LogEntry {
            timestamp,
            message,
            duration_ms,
        };

        tracing::info!("{}", entry.formatted());

        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            // A panicked appender can't leave the Vec half-written; keep logging.
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push(entry);
    }

    /// Snapshot of all entries in insertion order
    pub fn entries(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
