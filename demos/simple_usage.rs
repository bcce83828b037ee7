/// Archivex search demo
///
/// Walks through the main pieces:
/// - indexing resources through the change log and incremental updater
/// - anonymous and authenticated searches with ACL filtering
/// - sorting, paging and property selection
/// - waiting for index freshness before searching
/// - streaming matches with a callback

use archivex::core::config::Config;
use archivex::core::types::{PropertyName, PropertySet};
use archivex::index::document::IndexDocument;
use archivex::index::manager::{IndexManager, IndexOperation};
use archivex::query::ast::{Field, Query};
use archivex::query::builder::IndexQueryBuilder;
use archivex::query::sort::{SortDirection, SortField, Sorting};
use archivex::search::dispatcher::SearchDispatcher;
use archivex::search::executor::QueryExecutor;
use archivex::search::search::{FilterFlag, PropertySelect, Search, WaitSpec};
use archivex::search::searcher::{CallbackResult, Searcher};
use archivex::security::acl::{Acl, Action, Principal};
use archivex::security::principal::StaticPrincipalStore;
use archivex::security::token::TokenRegistry;
use archivex::writer::change_log::ChangeLog;
use archivex::writer::updater::IncrementalUpdater;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("\n╔═══════════════════════════════════════════════╗");
    println!("║         Archivex Search - API Demo            ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    // Step 1: Wire the components
    let config = Config::default();
    let index = Arc::new(IndexManager::new());
    let tokens = Arc::new(TokenRegistry::new());
    let principals = Arc::new(StaticPrincipalStore::new());
    let builder = IndexQueryBuilder::new(tokens.clone(), principals.clone());
    let executor = Arc::new(QueryExecutor::new(index.clone(), Arc::new(builder), &config));

    let change_log = Arc::new(ChangeLog::new());
    let updater = Arc::new(IncrementalUpdater::new(index.clone(), change_log.clone(), &config));
    let worker = updater.clone().spawn(config.updater_interval());
    let dispatcher = SearchDispatcher::new(executor.clone(), &config).with_recency(change_log.clone(), updater);

    // Step 2: Log some changes
    println!("Step 2: Logging resources...");
    let title = PropertyName::new("dc", "title");
    let year = PropertyName::new("dc", "year");
    let public = Acl::owner_default().with_grant(Action::Read, Principal::PseudoAll);
    let staff = Acl::owner_default().with_grant(Action::Read, Principal::group("staff"));
    let docs = vec![
        IndexDocument::new("/articles/rust.html", "article", "alice", public.clone())?
            .with_property(title.clone(), "Rust in production")
            .with_property(year.clone(), 2021i64),
        IndexDocument::new("/articles/search.html", "article", "alice", public.clone())?
            .with_property(title.clone(), "Search engines in practice")
            .with_property(year.clone(), 2019i64),
        IndexDocument::new("/articles/draft.html", "article", "alice", public)?
            .with_property(title.clone(), "Unfinished thoughts")
            .unpublished(),
        IndexDocument::new("/internal/plan.html", "article", "alice", staff)?
            .with_property(title.clone(), "Next year's plan")
            .with_property(year.clone(), 2025i64),
    ];
    for doc in docs {
        change_log.append(&config.change_logger_type, config.change_logger_id, IndexOperation::Upsert(doc));
    }

    // Invalid ACLs are rejected before they can be logged or indexed
    let world_writable = Acl::owner_default().with_grant(Action::Write, Principal::PseudoAll);
    if let Err(err) = IndexDocument::new("/bad.html", "article", "alice", world_writable) {
        println!("  Rejected: {}", err);
    }

    // Step 3: Wait until the index reflects everything logged so far
    println!("\nStep 3: Searching with a freshness requirement...");
    let wait = WaitSpec::new(Utc::now(), Duration::from_secs(5));
    let search = Search::new(Query::term(Field::Type, "article"))
        .with_flag(FilterFlag::ExcludeUnpublished)
        .wait_for(wait);
    let result = dispatcher.execute(None, &search)?;
    println!(
        "  Anonymous: {} of {} hits, fresh as of {:?}",
        result.len(),
        result.total_hits(),
        result.recency()
    );

    // Step 4: Authenticated search sees group-restricted resources
    println!("\nStep 4: Authenticated search...");
    principals.add_member(Principal::group("staff"), Principal::user("dave"));
    let dave = tokens.issue(Principal::user("dave"));
    let sorting = Sorting::by(SortField::property(year.clone(), SortDirection::Descending));
    let search = Search::new(Query::exists(Field::Property(year.clone())))
        .with_sorting(sorting)
        .with_select(PropertySelect::named([title.clone(), year.clone()], false));
    for set in dispatcher.execute(Some(&dave), &search)?.results() {
        println!("  {} {:?} {:?}", set.uri, set.property(&year), set.property(&title));
    }

    // Step 5: Paging
    println!("\nStep 5: Paging...");
    let page = Search::new(Query::MatchAll).with_cursor(1).with_limit(1);
    let result = dispatcher.execute(Some(&dave), &page)?;
    println!("  Page 2: {:?} (total {})", result.uris(), result.total_hits());

    // Step 6: Stream matches in year order
    println!("\nStep 6: Iterating by year...");
    let by_year = Search::new(Query::exists(Field::Property(year.clone())))
        .with_sorting(Sorting::by(SortField::property(year.clone(), SortDirection::Ascending)));
    dispatcher.iterate_matching(None, &by_year, &mut |set: PropertySet| -> CallbackResult {
        println!("  {} {:?}", set.uri, set.property(&year));
        Ok(true)
    })?;

    // Step 7: Statistics
    println!("\nStep 7: Statistics...");
    let stats = index.stats();
    println!("  Generation: {}", stats.generation);
    println!("  Segments: {}", stats.segment_count);
    println!("  Live documents: {}", stats.live_documents);
    if let Some(cache) = executor.cache() {
        println!("  Cache hit rate: {:.1}%", cache.stats().hit_rate() * 100.0);
    }
    println!("  Free permits: {}", dispatcher.available_permits());

    worker.stop();
    println!("\nDone!");
    Ok(())
}
