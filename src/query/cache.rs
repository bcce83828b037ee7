use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;
use crate::core::error::Result;
use crate::index::generation::{Generation, GenerationKey};
use crate::query::native::NativeQuery;
use crate::query::sort::NativeSort;
use crate::search::results::TopDocs;

/// Everything that determines a top-docs result within one generation.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CacheKey {
    pub query: NativeQuery,
    pub filter: Option<NativeQuery>,
    pub sort: Option<NativeSort>,
    pub limit: usize,
}

struct Partition {
    generation: Weak<Generation>,
    entries: LruCache<CacheKey, Arc<TopDocs>>,
}

struct Partitions {
    newest: Option<GenerationKey>,
    by_generation: HashMap<GenerationKey, Partition>,
}

/// Top-docs cache partitioned by index generation.
///
/// A partition only holds a `Weak` to its generation: once the index manager
/// and every search handle have let go, the partition is purged on the next
/// access. Seeing a newer generation drops all older partitions at once.
pub struct ResultCache {
    partitions: Mutex<Partitions>,
    capacity: NonZeroUsize,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl ResultCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        ResultCache {
            partitions: Mutex::new(Partitions {
                newest: None,
                by_generation: HashMap::new(),
            }),
            capacity,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        }
    }

    /// `None` for a zero capacity, which disables caching.
    pub fn with_capacity(capacity: usize) -> Option<Self> {
        NonZeroUsize::new(capacity).map(ResultCache::new)
    }

    pub fn get(&self, generation: &Arc<Generation>, key: &CacheKey) -> Option<Arc<TopDocs>> {
        let mut partitions = self.partitions.lock();
        let found = self
            .partition(&mut partitions, generation)
            .and_then(|partition| partition.entries.get(key).cloned());

        match &found {
            Some(_) => self.hit_count.fetch_add(1, Ordering::Relaxed),
            None => self.miss_count.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Results computed against a generation older than the newest one seen
    /// are not stored.
    pub fn insert(&self, generation: &Arc<Generation>, key: CacheKey, docs: Arc<TopDocs>) {
        let mut partitions = self.partitions.lock();
        if let Some(partition) = self.partition(&mut partitions, generation) {
            partition.entries.put(key, docs);
        }
    }

    /// Cached top docs for `key`, computing and storing them on a miss. The
    /// lock is not held while `compute` runs.
    pub fn get_or_compute<F>(&self, generation: &Arc<Generation>, key: CacheKey, compute: F) -> Result<Arc<TopDocs>>
    where
        F: FnOnce() -> Result<TopDocs>,
    {
        if let Some(docs) = self.get(generation, &key) {
            trace!(generation = %generation.key(), "result cache hit");
            return Ok(docs);
        }
        let docs = Arc::new(compute()?);
        self.insert(generation, key, docs.clone());
        Ok(docs)
    }

    pub fn clear(&self) {
        let mut partitions = self.partitions.lock();
        partitions.by_generation.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let partitions = self.partitions.lock();
        CacheStats {
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            partitions: partitions.by_generation.len(),
            entries: partitions.by_generation.values().map(|p| p.entries.len()).sum(),
            capacity: self.capacity.get(),
        }
    }

    // Purges dead or superseded partitions, then returns the live partition
    // for `generation` unless a newer generation has already been seen.
    fn partition<'a>(&self, partitions: &'a mut Partitions, generation: &Arc<Generation>) -> Option<&'a mut Partition> {
        let key = generation.key();
        partitions
            .by_generation
            .retain(|_, partition| partition.generation.strong_count() > 0);

        match partitions.newest {
            Some(newest) if key < newest => return None,
            Some(newest) if key == newest => {}
            _ => {
                partitions.newest = Some(key);
                partitions.by_generation.retain(|existing, _| *existing >= key);
            }
        }

        let weak = Arc::downgrade(generation);
        let capacity = self.capacity;
        let partition = partitions.by_generation.entry(key).or_insert_with(|| Partition {
            generation: weak.clone(),
            entries: LruCache::new(capacity),
        });
        if !Weak::ptr_eq(&partition.generation, &weak) {
            // Same epoch from a different snapshot; never mix them
            *partition = Partition {
                generation: weak,
                entries: LruCache::new(capacity),
            };
        }
        Some(partition)
    }
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hit_count: u64,
    pub miss_count: u64,
    pub partitions: usize,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}
