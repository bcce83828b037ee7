use std::collections::{HashMap, HashSet};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use parking_lot::{Mutex, RwLock};
use roaring::RoaringBitmap;
use tracing::{debug, trace};
use crate::core::error::Result;
use crate::index::document::IndexDocument;
use crate::index::generation::{Generation, GenerationKey, LiveSegment};
use crate::index::segment::SegmentBuilder;
use crate::index::term::{self, encode_str, term_key};

#[derive(Debug, Clone, PartialEq)]
pub enum IndexOperation {
    Upsert(IndexDocument),
    Delete(String),
}

impl IndexOperation {
    pub fn uri(&self) -> &str {
        match self {
            IndexOperation::Upsert(doc) => doc.uri(),
            IndexOperation::Delete(uri) => uri,
        }
    }
}

/// Ordered writes applied atomically by `IndexManager::commit`.
/// For a URI touched more than once, the last operation wins.
#[derive(Debug, Clone, Default)]
pub struct IndexBatch {
    operations: Vec<IndexOperation>,
}

impl IndexBatch {
    pub fn new() -> Self {
        IndexBatch::default()
    }

    pub fn upsert(mut self, doc: IndexDocument) -> Self {
        self.operations.push(IndexOperation::Upsert(doc));
        self
    }

    pub fn delete(mut self, uri: &str) -> Self {
        self.operations.push(IndexOperation::Delete(uri.to_string()));
        self
    }

    pub fn push(&mut self, operation: IndexOperation) {
        self.operations.push(operation);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct IndexStats {
    pub generation: GenerationKey,
    pub segment_count: usize,
    pub live_documents: u64,
    pub deleted_documents: u64,
    pub open_handles: usize,
    pub handles_acquired: u64,
}

/// Scoped access to one generation. Released exactly once, on drop.
pub struct SearchHandle {
    generation: Arc<Generation>,
    open_handles: Arc<AtomicUsize>,
}

impl SearchHandle {
    pub fn generation(&self) -> &Arc<Generation> {
        &self.generation
    }
}

impl Deref for SearchHandle {
    type Target = Generation;

    fn deref(&self) -> &Generation {
        &self.generation
    }
}

impl Drop for SearchHandle {
    fn drop(&mut self) {
        self.open_handles.fetch_sub(1, Ordering::AcqRel);
        trace!(generation = %self.generation.key(), "released search handle");
    }
}

/// Owns the current generation and publishes a new one per commit.
/// Readers never block writers: a handle pins its generation, and old
/// generations are freed when their last handle is dropped.
pub struct IndexManager {
    current: RwLock<Arc<Generation>>,
    next_key: AtomicU64,
    open_handles: Arc<AtomicUsize>,
    handles_acquired: AtomicU64,
    commit_lock: Mutex<()>, // Single writer
}

impl IndexManager {
    pub fn new() -> Self {
        IndexManager {
            current: RwLock::new(Arc::new(Generation::empty(GenerationKey(0)))),
            next_key: AtomicU64::new(1),
            open_handles: Arc::new(AtomicUsize::new(0)),
            handles_acquired: AtomicU64::new(0),
            commit_lock: Mutex::new(()),
        }
    }

    pub fn acquire(&self) -> SearchHandle {
        let generation = self.current.read().clone();
        self.open_handles.fetch_add(1, Ordering::AcqRel);
        self.handles_acquired.fetch_add(1, Ordering::Relaxed);
        trace!(generation = %generation.key(), "acquired search handle");
        SearchHandle {
            generation,
            open_handles: self.open_handles.clone(),
        }
    }

    pub fn current_key(&self) -> GenerationKey {
        self.current.read().key()
    }

    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::Acquire)
    }

    /// Apply a batch and publish the resulting generation. An empty batch
    /// leaves the index, and therefore the generation key, unchanged.
    pub fn commit(&self, batch: IndexBatch) -> Result<GenerationKey> {
        let _writer = self.commit_lock.lock();
        let base = self.current.read().clone();
        if batch.is_empty() {
            return Ok(base.key());
        }

        let mut last_op: HashMap<&str, usize> = HashMap::new();
        for (position, operation) in batch.operations.iter().enumerate() {
            last_op.insert(operation.uri(), position);
        }
        let touched: HashSet<&str> = last_op.keys().copied().collect();

        // Tombstone every existing version of a touched URI
        let mut segments = Vec::with_capacity(base.segments().len() + 1);
        for live in base.segments() {
            let mut deletes: Option<RoaringBitmap> = None;
            for uri in &touched {
                if let Some(docs) = live.segment().postings(&term_key(term::URI, &encode_str(uri))) {
                    let pending = deletes.get_or_insert_with(|| live.deleted_docs().as_ref().clone());
                    *pending |= docs;
                }
            }
            let next = match deletes {
                Some(deletes) => LiveSegment::new(live.segment().clone(), Arc::new(deletes)),
                None => live.clone(),
            };
            if next.num_live() > 0 {
                segments.push(next);
            }
        }

        let mut builder = SegmentBuilder::new();
        for (position, operation) in batch.operations.iter().enumerate() {
            if let IndexOperation::Upsert(doc) = operation {
                if last_op.get(doc.uri()) == Some(&position) {
                    builder.add(doc)?;
                }
            }
        }
        if builder.doc_count() > 0 {
            let segment = Arc::new(builder.build()?);
            segments.push(LiveSegment::new(segment, Arc::new(RoaringBitmap::new())));
        }

        let key = GenerationKey(self.next_key.fetch_add(1, Ordering::SeqCst));
        let generation = Arc::new(Generation::new(key, segments));
        debug!(
            generation = %key,
            operations = batch.len(),
            segments = generation.segments().len(),
            live_docs = generation.num_docs(),
            "committed index batch"
        );
        *self.current.write() = generation;
        Ok(key)
    }

    pub fn stats(&self) -> IndexStats {
        let current = self.current.read().clone();
        IndexStats {
            generation: current.key(),
            segment_count: current.segments().len(),
            live_documents: current.num_docs(),
            deleted_documents: current.num_deleted(),
            open_handles: self.open_handles(),
            handles_acquired: self.handles_acquired.load(Ordering::Relaxed),
        }
    }
}

impl Default for IndexManager {
    fn default() -> Self {
        Self::new()
    }
}
