use std::sync::Arc;
use std::time::Instant;
use chrono::{DateTime, Utc};
use tracing::{debug, trace};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::search::results::ResultSet;
use crate::search::search::{Search, WaitSpec};
use crate::search::searcher::{MatchCallback, Searcher};
use crate::search::semaphore::FairSemaphore;
use crate::security::token::SecurityToken;
use crate::writer::change_log::ChangeLogSource;
use crate::writer::updater::IncrementalUpdate;

struct RecencySource {
    change_log: Arc<dyn ChangeLogSource>,
    updater: Arc<dyn IncrementalUpdate>,
}

/// Front door for searches: waits for index freshness when asked to, then
/// bounds how many searches run against the index at once.
pub struct SearchDispatcher {
    searcher: Arc<dyn Searcher>,
    semaphore: FairSemaphore,
    recency: Option<RecencySource>,
    logger_type: String,
    logger_id: u32,
}

impl SearchDispatcher {
    pub fn new(searcher: Arc<dyn Searcher>, config: &Config) -> Self {
        SearchDispatcher {
            searcher,
            semaphore: FairSemaphore::new(config.max_concurrent_queries),
            recency: None,
            logger_type: config.change_logger_type.clone(),
            logger_id: config.change_logger_id,
        }
    }

    /// Enable recency waits against a change log and the updater draining it.
    pub fn with_recency(mut self, change_log: Arc<dyn ChangeLogSource>, updater: Arc<dyn IncrementalUpdate>) -> Self {
        self.recency = Some(RecencySource { change_log, updater });
        self
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Shut the dispatcher down: every blocked and future search fails with
    /// `ErrorKind::Interrupted`. This cannot be undone; a caller that only
    /// wants to bound its own wait sets `WaitSpec::timeout`.
    pub fn interrupt(&self) {
        self.semaphore.interrupt();
    }

    /// Block until no change logged at or before `wait.timestamp` is still
    /// pending, or until `wait.timeout` has passed. Returns the point in
    /// time up to which the index is known to be current. Running out of
    /// time is not an error.
    pub fn wait_for_pending_updates(&self, wait: &WaitSpec) -> Result<DateTime<Utc>> {
        let Some(source) = &self.recency else {
            return Ok(Utc::now());
        };

        let started = Instant::now();
        // A timeout too large to represent as an instant never expires
        let deadline = started.checked_add(wait.timeout);
        let mut rounds = 0u32;
        loop {
            if self.semaphore.is_interrupted() {
                return Err(Error::new(ErrorKind::Interrupted, "interrupted while waiting for index updates"));
            }

            // An empty log, even a momentarily empty one, means caught up
            let Some(pending) = source
                .change_log
                .oldest_pending_before(&self.logger_type, self.logger_id, wait.timestamp)
            else {
                trace!(rounds, waited_ms = started.elapsed().as_millis() as u64, "index caught up");
                return Ok(Utc::now());
            };

            let now = Instant::now();
            let remaining = match deadline {
                Some(deadline) if now >= deadline => {
                    debug!(
                        recency = %pending.timestamp,
                        pending_uri = %pending.uri,
                        "recency wait timed out"
                    );
                    return Ok(pending.timestamp);
                }
                Some(deadline) => deadline - now,
                None => wait.timeout,
            };
            rounds += 1;
            if !source.updater.wait_for_next_batch(remaining) {
                debug!(recency = %pending.timestamp, rounds, "no index batch completed before the deadline");
                return Ok(pending.timestamp);
            }
        }
    }
}

impl Searcher for SearchDispatcher {
    fn execute(&self, token: Option<&SecurityToken>, search: &Search) -> Result<ResultSet> {
        let recency = match search.wait() {
            Some(wait) => Some(self.wait_for_pending_updates(wait)?),
            None => None,
        };

        let _permit = self.semaphore.acquire()?;
        let mut result = self.searcher.execute(token, search)?;
        if let Some(recency) = recency {
            result.set_recency(recency);
        }
        Ok(result)
    }

    fn iterate_matching(
        &self,
        token: Option<&SecurityToken>,
        search: &Search,
        callback: &mut dyn MatchCallback,
    ) -> Result<()> {
        if let Some(wait) = search.wait() {
            self.wait_for_pending_updates(wait)?;
        }
        let _permit = self.semaphore.acquire()?;
        self.searcher.iterate_matching(token, search, callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;
    use crate::query::ast::Query;

    /// Records how many calls run at the same time.
    #[derive(Default)]
    struct SlowSearcher {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Searcher for SlowSearcher {
        fn execute(&self, _token: Option<&SecurityToken>, _search: &Search) -> Result<ResultSet> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(ResultSet::empty(0))
        }

        fn iterate_matching(
            &self,
            _token: Option<&SecurityToken>,
            _search: &Search,
            _callback: &mut dyn MatchCallback,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn concurrent_searches_are_capped() {
        let searcher = Arc::new(SlowSearcher::default());
        let config = Config {
            max_concurrent_queries: 2,
            ..Config::default()
        };
        let dispatcher = Arc::new(SearchDispatcher::new(searcher.clone(), &config));

        let workers: Vec<_> = (0..6)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                thread::spawn(move || dispatcher.execute(None, &Search::new(Query::MatchAll)).map(|_| ()))
            })
            .collect();
        for worker in workers {
            worker.join().unwrap().unwrap();
        }

        assert!(searcher.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(dispatcher.available_permits(), 2);
    }

    #[test]
    fn interrupted_dispatcher_rejects_searches() {
        let dispatcher = SearchDispatcher::new(Arc::new(SlowSearcher::default()), &Config::default());
        dispatcher.interrupt();
        let err = dispatcher.execute(None, &Search::new(Query::MatchAll)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Interrupted);
        assert!(err.kind().is_query_failure());
    }

    #[test]
    fn no_change_log_means_current() {
        let dispatcher = SearchDispatcher::new(Arc::new(SlowSearcher::default()), &Config::default());
        let before = Utc::now();
        let search = Search::new(Query::MatchAll).wait_for(WaitSpec::new(before, Duration::from_secs(5)));
        let result = dispatcher.execute(None, &search).unwrap();
        assert!(result.recency().unwrap() >= before);
    }
}
