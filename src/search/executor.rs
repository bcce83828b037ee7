use std::sync::Arc;
use std::time::{Duration, Instant};
use fst::map::OpBuilder;
use fst::Streamer;
use roaring::RoaringBitmap;
use tracing::{debug, error, warn};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::index::generation::{Generation, LiveSegment};
use crate::index::manager::IndexManager;
use crate::index::segment::{FieldSet, Segment};
use crate::index::term;
use crate::query::builder::QueryBuilder;
use crate::query::cache::{CacheKey, ResultCache};
use crate::query::native::{CompileContext, NativeQuery};
use crate::query::sort::{NativeSort, NativeSortField, SortDirection};
use crate::scoring::scorer::{Bm25Scorer, Scorer};
use crate::search::mapper::{DocumentMapper, StoredFieldMapper};
use crate::search::results::{Hit, ResultSet, TopDocs, TopDocsCollector};
use crate::search::search::{PropertySelect, Search};
use crate::search::searcher::{MatchCallback, Searcher};
use crate::security::token::SecurityToken;

/// Runs searches against the current index generation.
pub struct QueryExecutor {
    index: Arc<IndexManager>,
    builder: Arc<dyn QueryBuilder>,
    mapper: Arc<dyn DocumentMapper>,
    scorer: Arc<dyn Scorer>,
    cache: Option<Arc<ResultCache>>,
    global_search_limit: usize,
    warn_threshold: Duration,
    max_query_depth: usize,
    cache_authenticated: bool,
}

impl QueryExecutor {
    pub fn new(index: Arc<IndexManager>, builder: Arc<dyn QueryBuilder>, config: &Config) -> Self {
        QueryExecutor {
            index,
            builder,
            mapper: Arc::new(StoredFieldMapper),
            scorer: Arc::new(Bm25Scorer),
            cache: ResultCache::with_capacity(config.result_cache_capacity).map(Arc::new),
            global_search_limit: config.global_search_limit,
            warn_threshold: config.warn_threshold(),
            max_query_depth: config.max_query_depth,
            cache_authenticated: config.cache_authenticated_queries,
        }
    }

    pub fn with_mapper(mut self, mapper: Arc<dyn DocumentMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_cache(mut self, cache: Option<Arc<ResultCache>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    fn execute_window(&self, token: Option<&SecurityToken>, search: &Search) -> Result<ResultSet> {
        search.query().validate(self.max_query_depth)?;

        // Released on every return path
        let handle = self.index.acquire();
        let generation = handle.generation();

        let started = Instant::now();
        let query = self.builder.to_native_query(search.query())?;
        let filter = self.builder.to_native_auth_filter(token, search.flags())?;

        if search.limit() == 0 {
            let total_hits = self.count(generation, &NativeQuery::filtered(query, filter))?;
            return Ok(ResultSet::empty(total_hits));
        }

        let need = search.cursor().saturating_add(search.limit());
        let search_cap = need.min(self.global_search_limit);
        let sort = self.builder.to_native_sort(search.sorting());
        let anonymous = self.builder.is_anonymous(token);
        let query = if anonymous { query.constant_score() } else { query };

        let top = match &self.cache {
            Some(cache) if anonymous || self.cache_authenticated => {
                let key = CacheKey {
                    query: query.clone(),
                    filter: filter.clone(),
                    sort: sort.clone(),
                    limit: search_cap,
                };
                cache.get_or_compute(generation, key, || {
                    self.top_docs(generation, &query, filter.as_ref(), sort.as_ref(), search_cap)
                })?
            }
            _ => Arc::new(self.top_docs(generation, &query, filter.as_ref(), sort.as_ref(), search_cap)?),
        };

        let mut results = Vec::new();
        if search.cursor() < top.hits.len() {
            let end = need.min(top.hits.len());
            let fields = self.mapper.fields_to_load(search.select());
            for hit in &top.hits[search.cursor()..end] {
                let segment = generation.segments()[hit.segment_ord].segment();
                let raw = segment.load(hit.doc, &fields)?;
                results.push(self.mapper.map_document(raw, search.select())?);
            }
        }

        let elapsed = started.elapsed();
        if elapsed > self.warn_threshold {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                query = ?search.query(),
                generation = %generation.key(),
                "slow search"
            );
        }
        debug!(
            generation = %generation.key(),
            total_hits = top.total_hits,
            returned = results.len(),
            cursor = search.cursor(),
            elapsed_us = elapsed.as_micros() as u64,
            "search executed"
        );
        Ok(ResultSet::new(results, top.total_hits))
    }

    /// Rank every live match and keep the best `limit`.
    fn top_docs(
        &self,
        generation: &Generation,
        query: &NativeQuery,
        filter: Option<&NativeQuery>,
        sort: Option<&NativeSort>,
        limit: usize,
    ) -> Result<TopDocs> {
        let native = NativeQuery::filtered(query.clone(), filter.cloned());
        let ctx = CompileContext {
            generation,
            scorer: self.scorer.as_ref(),
        };

        let mut collector = TopDocsCollector::new(limit, sort);
        for (segment_ord, live) in generation.segments().iter().enumerate() {
            let tree = native.compile(live, &ctx)?;
            let docs = tree.docs() & live.live_docs();
            for doc in &docs {
                let sort_values = match sort {
                    Some(sort) => sort
                        .fields
                        .iter()
                        .map(|field| sort_value(live.segment(), field, doc))
                        .collect(),
                    None => Vec::new(),
                };
                collector.collect(Hit {
                    segment_ord,
                    doc,
                    score: tree.score(doc),
                    sort_values,
                });
            }
        }
        Ok(collector.finish())
    }

    fn count(&self, generation: &Generation, native: &NativeQuery) -> Result<u64> {
        let ctx = CompileContext {
            generation,
            scorer: self.scorer.as_ref(),
        };
        let mut total = 0;
        for live in generation.segments() {
            let tree = native.compile(live, &ctx)?;
            total += tree.docs().intersection_len(live.live_docs());
        }
        Ok(total)
    }

    fn iterate(
        &self,
        token: Option<&SecurityToken>,
        search: &Search,
        callback: &mut dyn MatchCallback,
    ) -> Result<()> {
        search.query().validate(self.max_query_depth)?;
        let sort_field = match search.sorting() {
            None => None,
            Some(sorting) => {
                let [field] = sorting.fields() else {
                    return Err(Error::new(
                        ErrorKind::UnsupportedIteration,
                        "sorted iteration supports exactly one sort field",
                    ));
                };
                if field.direction() == SortDirection::Descending {
                    return Err(Error::new(
                        ErrorKind::UnsupportedIteration,
                        "sorted iteration supports ascending order only",
                    ));
                }
                Some(field.field_key())
            }
        };

        let handle = self.index.acquire();
        let generation = handle.generation();
        let native = NativeQuery::filtered(
            self.builder.to_native_query(search.query())?,
            self.builder.to_native_auth_filter(token, search.flags())?,
        );
        let ctx = CompileContext {
            generation,
            scorer: self.scorer.as_ref(),
        };
        let mut matching = Vec::with_capacity(generation.segments().len());
        for live in generation.segments() {
            matching.push(native.compile(live, &ctx)?.into_docs() & live.live_docs());
        }

        let mut emitter = Emitter {
            skip: search.cursor(),
            remaining: search.limit(),
            fields: self.mapper.fields_to_load(search.select()),
            select: search.select(),
            mapper: self.mapper.as_ref(),
            callback,
        };
        match sort_field {
            None => iterate_unsorted(generation.segments(), &matching, &mut emitter),
            Some(field) => iterate_by_term(generation.segments(), &matching, &field, &mut emitter),
        }
    }
}

impl Searcher for QueryExecutor {
    fn execute(&self, token: Option<&SecurityToken>, search: &Search) -> Result<ResultSet> {
        self.execute_window(token, search).map_err(|err| {
            log_failure(&err, "search");
            err.into_query_failure("search failed")
        })
    }

    fn iterate_matching(
        &self,
        token: Option<&SecurityToken>,
        search: &Search,
        callback: &mut dyn MatchCallback,
    ) -> Result<()> {
        self.iterate(token, search, callback).map_err(|err| {
            log_failure(&err, "iteration");
            err.into_query_failure("iteration failed")
        })
    }
}

fn log_failure(err: &Error, operation: &str) {
    match err.kind() {
        ErrorKind::InvalidArgument | ErrorKind::UnsupportedIteration | ErrorKind::Callback => {
            debug!(error = %err, "{} rejected", operation)
        }
        _ => error!(error = %err, "{} failed", operation),
    }
}

fn sort_value(segment: &Segment, field: &NativeSortField, doc: u32) -> Option<Vec<u8>> {
    let value = segment.doc_value(&field.field, doc)?;
    if field.case_insensitive {
        Some(term::fold_case(value))
    } else {
        Some(value.to_vec())
    }
}

/// Applies cursor and limit, then feeds the callback.
struct Emitter<'a> {
    skip: usize,
    remaining: usize,
    fields: FieldSet,
    select: &'a PropertySelect,
    mapper: &'a dyn DocumentMapper,
    callback: &'a mut dyn MatchCallback,
}

impl Emitter<'_> {
    /// False once iteration has to stop.
    fn emit(&mut self, segment: &Segment, doc: u32) -> Result<bool> {
        if self.skip > 0 {
            self.skip -= 1;
            return Ok(true);
        }
        if self.remaining == 0 {
            return Ok(false);
        }

        let raw = segment.load(doc, &self.fields)?;
        let result = self.mapper.map_document(raw, self.select)?;
        self.remaining -= 1;
        let more = self
            .callback
            .matching(result)
            .map_err(|err| Error::with_source(ErrorKind::Callback, "match callback failed", err))?;
        Ok(more && self.remaining > 0)
    }
}

fn iterate_unsorted(segments: &[LiveSegment], matching: &[RoaringBitmap], emitter: &mut Emitter) -> Result<()> {
    for (live, docs) in segments.iter().zip(matching) {
        for doc in docs {
            if !emitter.emit(live.segment(), doc)? {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Walks the union of the segments' term dictionaries for `field` in byte
/// order. A document with several values is emitted under its first term.
fn iterate_by_term(
    segments: &[LiveSegment],
    matching: &[RoaringBitmap],
    field: &str,
    emitter: &mut Emitter,
) -> Result<()> {
    let mut op = OpBuilder::new();
    for live in segments {
        op.push(live.segment().field_terms(field));
    }
    let mut emitted: Vec<RoaringBitmap> = vec![RoaringBitmap::new(); segments.len()];

    let mut union = op.union();
    while let Some((_, indexed)) = union.next() {
        let mut indexed = indexed.to_vec();
        indexed.sort_by_key(|iv| iv.index);
        for iv in indexed {
            let segment = segments[iv.index].segment();
            let mut docs = segment.postings_at(iv.value) & &matching[iv.index];
            docs -= &emitted[iv.index];
            for doc in &docs {
                if !emitter.emit(segment, doc)? {
                    return Ok(());
                }
            }
            emitted[iv.index] |= docs;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::searcher::CallbackResult;
    use crate::core::types::{PropertyName, PropertySet};
    use crate::index::document::IndexDocument;
    use crate::index::manager::IndexBatch;
    use crate::query::ast::{Field, Query};
    use crate::query::builder::IndexQueryBuilder;
    use crate::query::sort::{SortField, Sorting};
    use crate::security::acl::{Acl, Action, Principal};
    use crate::security::principal::StaticPrincipalStore;
    use crate::security::token::TokenRegistry;

    fn public(uri: &str) -> IndexDocument {
        let acl = Acl::owner_default().with_grant(Action::Read, Principal::PseudoAll);
        IndexDocument::new(uri, "file", "alice", acl).unwrap()
    }

    fn executor(index: Arc<IndexManager>) -> QueryExecutor {
        let builder = IndexQueryBuilder::new(Arc::new(TokenRegistry::new()), Arc::new(StaticPrincipalStore::new()));
        QueryExecutor::new(index, Arc::new(builder), &Config::default())
    }

    #[test]
    fn count_only_when_limit_is_zero() {
        let index = Arc::new(IndexManager::new());
        let mut batch = IndexBatch::new();
        for i in 0..5 {
            batch = batch.upsert(public(&format!("/doc{}", i)));
        }
        index.commit(batch).unwrap();

        let executor = executor(index.clone());
        let result = executor.execute(None, &Search::new(Query::MatchAll).with_limit(0)).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.total_hits(), 5);
        assert_eq!(index.open_handles(), 0);
    }

    #[test]
    fn search_cap_bounds_ranked_hits() {
        let index = Arc::new(IndexManager::new());
        let mut batch = IndexBatch::new();
        for i in 0..10 {
            batch = batch.upsert(public(&format!("/doc{:02}", i)));
        }
        index.commit(batch).unwrap();

        let config = Config {
            global_search_limit: 4,
            ..Config::default()
        };
        let builder = IndexQueryBuilder::new(Arc::new(TokenRegistry::new()), Arc::new(StaticPrincipalStore::new()));
        let executor = QueryExecutor::new(index, Arc::new(builder), &config);
        let result = executor
            .execute(None, &Search::new(Query::MatchAll).with_cursor(2).with_limit(5))
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.total_hits(), 10);
    }

    #[test]
    fn multi_field_iteration_is_unsupported() {
        let index = Arc::new(IndexManager::new());
        let executor = executor(index.clone());
        let sorting = Sorting::new(vec![
            SortField::property(PropertyName::local("a"), SortDirection::Ascending),
            SortField::property(PropertyName::local("b"), SortDirection::Ascending),
        ])
        .unwrap();
        let search = Search::new(Query::MatchAll).with_sorting(sorting);
        let err = executor
            .iterate_matching(None, &search, &mut |_: PropertySet| -> CallbackResult { Ok(true) })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedIteration);
        assert_eq!(index.open_handles(), 0);
    }

    #[test]
    fn malformed_queries_fail_as_query_errors() {
        let executor = executor(Arc::new(IndexManager::new()));
        let err = executor
            .execute(None, &Search::new(Query::and(vec![])))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Query);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn multi_valued_docs_are_iterated_once() {
        let tag = PropertyName::local("tag");
        let index = Arc::new(IndexManager::new());
        index
            .commit(
                IndexBatch::new()
                    .upsert(public("/x").with_values(tag.clone(), vec!["b".into(), "a".into()]))
                    .upsert(public("/y").with_property(tag.clone(), "c")),
            )
            .unwrap();

        let executor = executor(index);
        let search = Search::new(Query::exists(Field::Property(tag.clone())))
            .with_sorting(Sorting::by(SortField::property(tag, SortDirection::Ascending)));
        let mut seen = Vec::new();
        executor
            .iterate_matching(None, &search, &mut |set: PropertySet| -> CallbackResult {
                seen.push(set.uri);
                Ok(true)
            })
            .unwrap();
        assert_eq!(seen, vec!["/x", "/y"]);
    }
}
