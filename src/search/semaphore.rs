use futures::executor::block_on;
use tokio::sync::{Semaphore, SemaphorePermit};
use crate::core::error::{Error, ErrorKind, Result};

/// One unit of search concurrency, returned on drop.
pub type Permit<'a> = SemaphorePermit<'a>;

/// Counting semaphore that grants permits in arrival order, usable from
/// plain worker threads.
pub struct FairSemaphore {
    inner: Semaphore,
    permits: usize,
}

impl FairSemaphore {
    pub fn new(permits: usize) -> Self {
        let permits = permits.max(1);
        FairSemaphore {
            inner: Semaphore::new(permits),
            permits,
        }
    }

    /// Block the calling thread until a permit is free and every earlier
    /// caller has been served.
    pub fn acquire(&self) -> Result<Permit<'_>> {
        block_on(self.inner.acquire()).map_err(|_| {
            Error::new(ErrorKind::Interrupted, "interrupted while waiting for a search permit")
        })
    }

    /// Fail every current and future `acquire` with `ErrorKind::Interrupted`.
    /// There is no way back; this is a shutdown switch.
    pub fn interrupt(&self) {
        self.inner.close();
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn available_permits(&self) -> usize {
        self.inner.available_permits()
    }

    pub fn permits(&self) -> usize {
        self.permits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use parking_lot::Mutex;

    #[test]
    fn permits_are_returned_on_drop() {
        let semaphore = FairSemaphore::new(2);
        let first = semaphore.acquire().unwrap();
        let _second = semaphore.acquire().unwrap();
        assert_eq!(semaphore.available_permits(), 0);
        drop(first);
        assert_eq!(semaphore.available_permits(), 1);
    }

    #[test]
    fn zero_permits_still_admits_one_search() {
        let semaphore = FairSemaphore::new(0);
        assert_eq!(semaphore.permits(), 1);
        assert!(semaphore.acquire().is_ok());
    }

    #[test]
    fn waiters_are_served_in_arrival_order() {
        let semaphore = Arc::new(FairSemaphore::new(1));
        let order = Arc::new(Mutex::new(Vec::new()));
        let held = semaphore.acquire().unwrap();

        let mut workers = Vec::new();
        for id in 0..4 {
            let semaphore = semaphore.clone();
            let order = order.clone();
            workers.push(thread::spawn(move || {
                let _permit = semaphore.acquire().unwrap();
                order.lock().push(id);
            }));
            // Queue strictly one after another
            thread::sleep(Duration::from_millis(30));
        }

        drop(held);
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn interrupt_wakes_waiters() {
        let semaphore = Arc::new(FairSemaphore::new(1));
        let _held = semaphore.acquire().unwrap();

        let waiter = {
            let semaphore = semaphore.clone();
            thread::spawn(move || semaphore.acquire().map(|_| ()))
        };
        thread::sleep(Duration::from_millis(30));
        semaphore.interrupt();

        let err = waiter.join().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Interrupted);
        assert!(semaphore.is_interrupted());
    }

    #[test]
    fn interrupt_is_permanent() {
        let semaphore = FairSemaphore::new(4);
        semaphore.interrupt();
        for _ in 0..2 {
            assert_eq!(semaphore.acquire().unwrap_err().kind(), ErrorKind::Interrupted);
        }
    }
}
