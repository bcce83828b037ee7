use std::fmt;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use roaring::RoaringBitmap;
use crate::index::segment::Segment;

/// Identity of one committed index state. Equal keys observe the same
/// segment set with the same deletions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenerationKey(pub u64);

impl fmt::Display for GenerationKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// A segment as seen by one generation: shared immutable data plus the
/// tombstones that were committed on top of it.
#[derive(Clone)]
pub struct LiveSegment {
    segment: Arc<Segment>,
    deletes: Arc<RoaringBitmap>,
    live: Arc<RoaringBitmap>,
}

impl LiveSegment {
    pub fn new(segment: Arc<Segment>, deletes: Arc<RoaringBitmap>) -> Self {
        let mut live = segment.all_docs();
        live -= deletes.as_ref();
        LiveSegment {
            segment,
            deletes,
            live: Arc::new(live),
        }
    }

    pub fn segment(&self) -> &Arc<Segment> {
        &self.segment
    }

    pub fn deleted_docs(&self) -> &Arc<RoaringBitmap> {
        &self.deletes
    }

    pub fn live_docs(&self) -> &RoaringBitmap {
        &self.live
    }

    pub fn num_live(&self) -> u64 {
        self.live.len()
    }
}

/// Immutable snapshot of the index at one commit.
pub struct Generation {
    key: GenerationKey,
    segments: Vec<LiveSegment>,
    committed_at: DateTime<Utc>,
}

impl Generation {
    pub fn new(key: GenerationKey, segments: Vec<LiveSegment>) -> Self {
        Generation {
            key,
            segments,
            committed_at: Utc::now(),
        }
    }

    pub fn empty(key: GenerationKey) -> Self {
        Generation::new(key, Vec::new())
    }

    pub fn key(&self) -> GenerationKey {
        self.key
    }

    pub fn segments(&self) -> &[LiveSegment] {
        &self.segments
    }

    pub fn committed_at(&self) -> DateTime<Utc> {
        self.committed_at
    }

    pub fn num_docs(&self) -> u64 {
        self.segments.iter().map(LiveSegment::num_live).sum()
    }

    pub fn num_deleted(&self) -> u64 {
        self.segments.iter().map(|s| s.deleted_docs().len()).sum()
    }

    /// Document frequency of a term key. Like most engines this counts
    /// tombstoned documents until their segment is dropped.
    pub fn doc_freq(&self, key: &[u8]) -> u64 {
        self.segments.iter().map(|s| s.segment().doc_freq(key)).sum()
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Generation")
            .field("key", &self.key)
            .field("segments", &self.segments.len())
            .field("num_docs", &self.num_docs())
            .finish()
    }
}
