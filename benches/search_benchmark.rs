use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use archivex::core::config::Config;
use archivex::core::types::{PropertyName, PropertySet};
use archivex::index::document::IndexDocument;
use archivex::index::manager::{IndexBatch, IndexManager};
use archivex::query::ast::{Field, Query};
use archivex::query::builder::IndexQueryBuilder;
use archivex::query::sort::{SortDirection, SortField, Sorting};
use archivex::search::executor::QueryExecutor;
use archivex::search::search::{PropertySelect, Search};
use archivex::search::searcher::{CallbackResult, MatchCallback, Searcher};
use archivex::security::acl::{Acl, Action, Principal};
use archivex::security::principal::StaticPrincipalStore;
use archivex::security::token::TokenRegistry;
use rand::Rng;
use std::sync::Arc;

const WORDS: [&str; 8] = ["the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog"];

/// Index `docs` documents spread over `segments` commits
fn build_index(docs: usize, segments: usize) -> Arc<IndexManager> {
    let mut rng = rand::thread_rng();
    let index = Arc::new(IndexManager::new());
    let title = PropertyName::new("dc", "title");
    let size = PropertyName::new("dc", "size");
    let per_segment = docs.div_ceil(segments);

    for segment in 0..segments {
        let mut batch = IndexBatch::new();
        for i in 0..per_segment {
            let text: Vec<&str> = (0..12).map(|_| WORDS[rng.gen_range(0..WORDS.len())]).collect();
            let acl = Acl::owner_default().with_grant(Action::Read, Principal::PseudoAll);
            let doc = IndexDocument::new(&format!("/bench/{}/{}", segment, i), "file", "bench", acl)
                .unwrap()
                .with_property(title.clone(), text.join(" "))
                .with_property(size.clone(), rng.gen_range(0..1_000_000i64));
            batch = batch.upsert(doc);
        }
        index.commit(batch).unwrap();
    }
    index
}

fn executor(index: Arc<IndexManager>, cache_capacity: usize) -> QueryExecutor {
    let config = Config {
        result_cache_capacity: cache_capacity,
        ..Config::default()
    };
    let builder = IndexQueryBuilder::new(Arc::new(TokenRegistry::new()), Arc::new(StaticPrincipalStore::new()));
    QueryExecutor::new(index, Arc::new(builder), &config)
}

fn bench_term_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("term_search");
    for docs in [1_000, 10_000] {
        let executor = executor(build_index(docs, 4), 0);
        let search = Search::new(Query::phrase(Field::property("dc", "title"), "quick brown"))
            .with_limit(20)
            .with_select(PropertySelect::None);
        group.bench_with_input(BenchmarkId::from_parameter(docs), &search, |b, search| {
            b.iter(|| black_box(executor.execute(None, search).unwrap()));
        });
    }
    group.finish();
}

fn bench_sorted_window(c: &mut Criterion) {
    let executor = executor(build_index(10_000, 4), 0);
    let sorting = Sorting::by(SortField::property(PropertyName::new("dc", "size"), SortDirection::Descending));
    let search = Search::new(Query::MatchAll)
        .with_sorting(sorting)
        .with_cursor(100)
        .with_limit(50);

    c.bench_function("sorted_window_10k", |b| {
        b.iter(|| black_box(executor.execute(None, &search).unwrap()));
    });
}

fn bench_cached_search(c: &mut Criterion) {
    let executor = executor(build_index(10_000, 4), 100);
    let search = Search::new(Query::prefix(Field::Uri, "/bench/1/")).with_limit(50);

    c.bench_function("cached_anonymous_search", |b| {
        b.iter(|| black_box(executor.execute(None, &search).unwrap()));
    });
}

fn bench_sorted_iteration(c: &mut Criterion) {
    let executor = executor(build_index(10_000, 4), 0);
    let sorting = Sorting::by(SortField::property(PropertyName::new("dc", "size"), SortDirection::Ascending));
    let search = Search::new(Query::MatchAll)
        .with_sorting(sorting)
        .with_select(PropertySelect::None);

    c.bench_function("sorted_iteration_10k", |b| {
        b.iter(|| {
            let mut count = 0usize;
            let mut callback = |_: PropertySet| -> CallbackResult {
                count += 1;
                Ok(true)
            };
            executor
                .iterate_matching(None, &search, &mut callback as &mut dyn MatchCallback)
                .unwrap();
            black_box(count)
        });
    });
}

criterion_group!(
    benches,
    bench_term_search,
    bench_sorted_window,
    bench_cached_search,
    bench_sorted_iteration
);
criterion_main!(benches);
