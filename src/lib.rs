pub mod core;
pub mod analysis;
pub mod index;
pub mod scoring;
pub mod query;
pub mod search;
pub mod security;
pub mod writer;

/*
┌──────────────────────────────────────────────────────────────────────────────────────┐
│                              ARCHIVEX SEARCH ARCHITECTURE                            │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── REQUEST PATH ────────────────────────────────────┐
│                                                                                      │
│   Search ──> SearchDispatcher ──(recency wait)──(FairSemaphore permit)──┐            │
│                                                                         │            │
│              QueryExecutor <────────────────────────────────────────────┘            │
│                │  IndexManager::acquire() ──> SearchHandle (released on drop)        │
│                │  QueryBuilder: Query ──> NativeQuery, Sorting ──> NativeSort,        │
│                │                token + FilterFlags ──> ACL filter                   │
│                │  ResultCache::get_or_compute (partition per GenerationKey, Weak)     │
│                │  TopDocsCollector ──> [cursor, cursor + limit) ──> DocumentMapper    │
│                ▼                                                                     │
│             ResultSet { results, total_hits, recency }                               │
│                                                                                      │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── WRITE PATH ─────────────────────────────────────┐
│                                                                                      │
│   IndexDocument (Acl::validate) ──> ChangeLog ──> IncrementalUpdater::run_once       │
│                                                      │                               │
│                                                      ▼                               │
│                         IndexManager::commit ──> Generation N+1                      │
│                         (new Segment + tombstones on older segments)                 │
│                                                      │                               │
│                                  batch_done.notify_all() wakes recency waiters       │
│                                                                                      │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────────── SEGMENT ───────────────────────────────────────┐
│                                                                                      │
│   terms: fst::Map  "field \0 tag value" ──> ordinal ──> postings: RoaringBitmap      │
│   field_docs: field ──> RoaringBitmap        doc_values: field ──> first value/doc   │
│   stored: bincode fields, decoded only for the requested FieldSet                    │
│                                                                                      │
└──────────────────────────────────────────────────────────────────────────────────────┘
*/
