mod common;

use archivex::query::ast::{Field, Query};
use archivex::search::search::Search;
use archivex::search::searcher::Searcher;
use archivex::security::acl::Principal;
use archivex::security::token::SecurityToken;
use common::*;

#[test]
fn repeated_anonymous_search_is_served_from_cache() {
    let fx = fixture();
    commit(&fx.index, vec![public_doc("/a"), public_doc("/b")]);
    let cache = fx.executor.cache().unwrap().clone();
    let search = Search::new(Query::prefix(Field::Uri, "/"));

    let first = fx.executor.execute(None, &search).unwrap();
    let before = cache.stats();
    let second = fx.executor.execute(None, &search).unwrap();
    let after = cache.stats();

    assert_eq!(first, second);
    assert_eq!(after.hit_count, before.hit_count + 1);
    assert_eq!(after.miss_count, before.miss_count);
    assert!(after.hit_rate() > 0.0);
}

#[test]
fn new_generation_is_not_served_stale_results() {
    let fx = fixture();
    commit(&fx.index, vec![public_doc("/a")]);
    let cache = fx.executor.cache().unwrap().clone();
    let search = Search::new(Query::MatchAll);

    assert_eq!(fx.executor.execute(None, &search).unwrap().uris(), vec!["/a"]);
    commit(&fx.index, vec![public_doc("/b")]);

    let misses = cache.stats().miss_count;
    let result = fx.executor.execute(None, &search).unwrap();
    assert_eq!(result.uris(), vec!["/a", "/b"]);
    assert_eq!(cache.stats().miss_count, misses + 1);
    // The old generation's partition is gone
    assert_eq!(cache.stats().partitions, 1);
}

#[test]
fn authenticated_searches_bypass_the_cache_by_default() {
    let fx = fixture();
    commit(&fx.index, vec![public_doc("/a")]);
    let cache = fx.executor.cache().unwrap().clone();
    let token = fx.tokens.issue(Principal::user("carol"));

    for _ in 0..3 {
        fx.executor.execute(Some(&token), &Search::new(Query::MatchAll)).unwrap();
    }
    let stats = cache.stats();
    assert_eq!(stats.hit_count + stats.miss_count, 0);
}

#[test]
fn unknown_tokens_share_the_anonymous_cache() {
    let fx = fixture();
    commit(&fx.index, vec![public_doc("/a"), public_doc("/b")]);
    let cache = fx.executor.cache().unwrap().clone();
    let search = Search::new(Query::MatchAll);
    let stale = SecurityToken::new("expired-session");

    let anonymous = fx.executor.execute(None, &search).unwrap();
    let unknown = fx.executor.execute(Some(&stale), &search).unwrap();

    assert_eq!(anonymous, unknown);
    let stats = cache.stats();
    assert_eq!(stats.miss_count, 1);
    assert_eq!(stats.hit_count, 1);
}
