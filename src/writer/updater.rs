use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use crossbeam::channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};
use crate::core::config::Config;
use crate::core::error::Result;
use crate::index::manager::{IndexBatch, IndexManager};
use crate::writer::change_log::ChangeLog;

pub trait IncrementalUpdate: Send + Sync {
    /// Block until the next batch completes. False if `timeout` passed first.
    fn wait_for_next_batch(&self, timeout: Duration) -> bool;
}

/// Moves pending change-log entries into the index, one batch at a time.
pub struct IncrementalUpdater {
    index: Arc<IndexManager>,
    change_log: Arc<ChangeLog>,
    logger_type: String,
    logger_id: u32,
    batch_size: usize,
    batches: Mutex<u64>, // Completed batches
    batch_done: Condvar,
}

impl IncrementalUpdater {
    pub fn new(index: Arc<IndexManager>, change_log: Arc<ChangeLog>, config: &Config) -> Self {
        IncrementalUpdater {
            index,
            change_log,
            logger_type: config.change_logger_type.clone(),
            logger_id: config.change_logger_id,
            batch_size: config.updater_batch_size.max(1),
            batches: Mutex::new(0),
            batch_done: Condvar::new(),
        }
    }

    /// Commit up to one batch of pending entries and wake batch waiters.
    /// A round with nothing pending still counts as a completed batch, so
    /// waiters re-check the log at least once per round.
    pub fn run_once(&self) -> Result<usize> {
        let pending = self.change_log.pending(&self.logger_type, self.logger_id, self.batch_size);
        let applied = pending.len();

        if !pending.is_empty() {
            let mut batch = IndexBatch::new();
            let mut ids = Vec::with_capacity(pending.len());
            for entry in pending {
                ids.push(entry.id);
                batch.push(entry.operation);
            }
            let generation = self.index.commit(batch)?;
            self.change_log.remove(&ids);
            debug!(generation = %generation, applied, "applied change log batch");
        }

        let mut batches = self.batches.lock();
        *batches += 1;
        drop(batches);
        self.batch_done.notify_all();
        Ok(applied)
    }

    pub fn batches_completed(&self) -> u64 {
        *self.batches.lock()
    }

    /// Run batches every `interval` on a background thread until the
    /// returned worker is stopped or dropped.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> UpdaterWorker {
        let (shutdown, stop_requested) = bounded::<()>(1);
        let handle = thread::spawn(move || {
            info!(interval_ms = interval.as_millis() as u64, "incremental updater started");
            loop {
                match stop_requested.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Err(err) = self.run_once() {
                            error!(error = %err, "incremental update failed");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            info!("incremental updater stopped");
        });

        UpdaterWorker {
            shutdown,
            handle: Some(handle),
        }
    }
}

impl IncrementalUpdate for IncrementalUpdater {
    fn wait_for_next_batch(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut batches = self.batches.lock();
        let seen = *batches;
        while *batches == seen {
            match deadline {
                Some(deadline) => {
                    if self.batch_done.wait_until(&mut batches, deadline).timed_out() {
                        return *batches != seen;
                    }
                }
                None => self.batch_done.wait(&mut batches),
            }
        }
        true
    }
}

/// Handle to the background updater thread.
pub struct UpdaterWorker {
    shutdown: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl UpdaterWorker {
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        let _ = self.shutdown.try_send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("incremental updater thread panicked");
            }
        }
    }
}

impl Drop for UpdaterWorker {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::IndexDocument;
    use crate::index::manager::IndexOperation;
    use crate::security::acl::Acl;

    fn setup() -> (Arc<IndexManager>, Arc<ChangeLog>, Arc<IncrementalUpdater>) {
        let index = Arc::new(IndexManager::new());
        let log = Arc::new(ChangeLog::new());
        let updater = Arc::new(IncrementalUpdater::new(index.clone(), log.clone(), &Config::default()));
        (index, log, updater)
    }

    #[test]
    fn run_once_drains_the_log() {
        let (index, log, updater) = setup();
        let doc = IndexDocument::new("/a", "file", "alice", Acl::owner_default()).unwrap();
        log.append("index", 1, IndexOperation::Upsert(doc));
        log.append("other", 1, IndexOperation::Delete("/b".into()));

        assert_eq!(updater.run_once().unwrap(), 1);
        assert_eq!(log.len(), 1);
        assert_eq!(index.stats().live_documents, 1);
        assert_eq!(updater.batches_completed(), 1);
    }

    #[test]
    fn waiting_times_out_without_batches() {
        let (_, _, updater) = setup();
        let started = Instant::now();
        assert!(!updater.wait_for_next_batch(Duration::from_millis(50)));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn worker_wakes_waiters() {
        let (_, _, updater) = setup();
        let worker = updater.clone().spawn(Duration::from_millis(20));
        assert!(updater.wait_for_next_batch(Duration::from_secs(5)));
        worker.stop();
    }

    #[test]
    fn unbounded_wait_returns_on_the_next_batch() {
        let (_, _, updater) = setup();
        let worker = updater.clone().spawn(Duration::from_millis(20));
        assert!(updater.wait_for_next_batch(Duration::MAX));
        worker.stop();
    }
}
