use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use crate::index::manager::IndexOperation;

/// A logged repository change not yet reflected in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeLogEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub logger_type: String,
    pub logger_id: u32,
    pub uri: String,
    pub operation: IndexOperation,
}

pub trait ChangeLogSource: Send + Sync {
    /// Oldest pending entry of the given logger stamped at or before `timestamp`.
    fn oldest_pending_before(
        &self,
        logger_type: &str,
        logger_id: u32,
        timestamp: DateTime<Utc>,
    ) -> Option<ChangeLogEntry>;
}

/// In-memory change log. Entries stay pending until an updater removes them
/// after committing them to the index.
#[derive(Default)]
pub struct ChangeLog {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: BTreeMap<u64, ChangeLogEntry>, // By id, so oldest first
    next_id: u64,
}

impl ChangeLog {
    pub fn new() -> Self {
        ChangeLog::default()
    }

    pub fn append(&self, logger_type: &str, logger_id: u32, operation: IndexOperation) -> u64 {
        self.append_at(Utc::now(), logger_type, logger_id, operation)
    }

    /// Append with an explicit timestamp; ids still follow append order.
    pub fn append_at(
        &self,
        timestamp: DateTime<Utc>,
        logger_type: &str,
        logger_id: u32,
        operation: IndexOperation,
    ) -> u64 {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.insert(
            id,
            ChangeLogEntry {
                id,
                timestamp,
                logger_type: logger_type.to_string(),
                logger_id,
                uri: operation.uri().to_string(),
                operation,
            },
        );
        id
    }

    /// Up to `limit` pending entries of one logger, oldest first.
    pub fn pending(&self, logger_type: &str, logger_id: u32, limit: usize) -> Vec<ChangeLogEntry> {
        let inner = self.inner.lock();
        inner
            .entries
            .values()
            .filter(|e| e.logger_type == logger_type && e.logger_id == logger_id)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn remove(&self, ids: &[u64]) {
        let mut inner = self.inner.lock();
        for id in ids {
            inner.entries.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChangeLogSource for ChangeLog {
    fn oldest_pending_before(
        &self,
        logger_type: &str,
        logger_id: u32,
        timestamp: DateTime<Utc>,
    ) -> Option<ChangeLogEntry> {
        let inner = self.inner.lock();
        inner
            .entries
            .values()
            .filter(|e| e.logger_type == logger_type && e.logger_id == logger_id && e.timestamp <= timestamp)
            .min_by_key(|e| (e.timestamp, e.id))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn oldest_pending_respects_logger_and_time() {
        let log = ChangeLog::new();
        let t0 = Utc::now();
        log.append_at(t0 + Duration::seconds(5), "index", 1, IndexOperation::Delete("/late".into()));
        log.append_at(t0, "index", 1, IndexOperation::Delete("/early".into()));
        log.append_at(t0 - Duration::seconds(5), "other", 1, IndexOperation::Delete("/other".into()));

        let oldest = log.oldest_pending_before("index", 1, t0 + Duration::seconds(10)).unwrap();
        assert_eq!(oldest.uri, "/early");
        assert!(log.oldest_pending_before("index", 1, t0 - Duration::seconds(1)).is_none());
        assert!(log.oldest_pending_before("index", 2, t0 + Duration::seconds(10)).is_none());
    }

    #[test]
    fn pending_is_in_append_order_and_removable() {
        let log = ChangeLog::new();
        let a = log.append("index", 1, IndexOperation::Delete("/a".into()));
        let b = log.append("index", 1, IndexOperation::Delete("/b".into()));
        log.append("index", 1, IndexOperation::Delete("/c".into()));

        let batch = log.pending("index", 1, 2);
        assert_eq!(batch.iter().map(|e| e.id).collect::<Vec<_>>(), vec![a, b]);
        log.remove(&[a, b]);
        assert_eq!(log.len(), 1);
        assert_eq!(log.pending("index", 1, 10)[0].uri, "/c");
    }
}
