#![allow(dead_code)]

use std::sync::Arc;
use archivex::core::config::Config;
use archivex::core::types::PropertyName;
use archivex::index::document::IndexDocument;
use archivex::index::manager::{IndexBatch, IndexManager};
use archivex::query::builder::IndexQueryBuilder;
use archivex::search::executor::QueryExecutor;
use archivex::security::acl::{Acl, Action, Principal};
use archivex::security::principal::StaticPrincipalStore;
use archivex::security::token::TokenRegistry;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Fixture {
    pub config: Config,
    pub index: Arc<IndexManager>,
    pub tokens: Arc<TokenRegistry>,
    pub principals: Arc<StaticPrincipalStore>,
    pub executor: Arc<QueryExecutor>,
}

pub fn fixture() -> Fixture {
    fixture_with(Config::default())
}

pub fn fixture_with(config: Config) -> Fixture {
    init_tracing();
    let index = Arc::new(IndexManager::new());
    let tokens = Arc::new(TokenRegistry::new());
    let principals = Arc::new(StaticPrincipalStore::new());
    let builder = IndexQueryBuilder::new(tokens.clone(), principals.clone());
    let executor = Arc::new(QueryExecutor::new(index.clone(), Arc::new(builder), &config));
    Fixture {
        config,
        index,
        tokens,
        principals,
        executor,
    }
}

pub fn rank() -> PropertyName {
    PropertyName::new("test", "rank")
}

/// Readable by everyone, owned by alice.
pub fn public_doc(uri: &str) -> IndexDocument {
    let acl = Acl::owner_default().with_grant(Action::Read, Principal::PseudoAll);
    IndexDocument::new(uri, "file", "alice", acl).unwrap()
}

pub fn ranked_doc(uri: &str, value: i64) -> IndexDocument {
    public_doc(uri).with_property(rank(), value)
}

pub fn commit(index: &IndexManager, docs: Vec<IndexDocument>) {
    let mut batch = IndexBatch::new();
    for doc in docs {
        batch = batch.upsert(doc);
    }
    index.commit(batch).unwrap();
}
